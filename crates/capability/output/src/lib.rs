//! 语音输出生成
//!
//! 按配置的 `output` 段把当前状态快照拼成一句话：先是 intro，然后按声明顺序
//! 输出每个有值的 text 条目，以单个空格连接。

pub mod template;

pub use template::Template;

use domain::Snapshot;
use iot2alexa_config::OutputConfig;
use tracing::warn;

/// 未配置 error 文案时使用的默认值。
pub const DEFAULT_ERROR_MESSAGE: &str = "error";

/// 输出错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutputError {
    #[error("invalid output template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },
    #[error("output template {template:?} can not format a {found} value")]
    ValueMismatch {
        template: String,
        found: &'static str,
    },
}

#[derive(Debug, Clone)]
struct TextLine {
    key: String,
    template: Template,
}

/// 输出生成器。
#[derive(Debug, Clone)]
pub struct OutputGenerator {
    title: String,
    intro: String,
    error: String,
    lines: Vec<TextLine>,
}

impl OutputGenerator {
    /// 预解析所有模板；key 或 format 为空的条目被忽略。
    pub fn new(config: &OutputConfig) -> Result<Self, OutputError> {
        let lines = config
            .text
            .iter()
            .filter(|entry| !entry.key.is_empty() && !entry.format.is_empty())
            .map(|entry| {
                Ok(TextLine {
                    key: entry.key.clone(),
                    template: Template::parse(&entry.format)?,
                })
            })
            .collect::<Result<Vec<_>, OutputError>>()?;

        let error = if config.error.is_empty() {
            DEFAULT_ERROR_MESSAGE.to_string()
        } else {
            config.error.clone()
        };

        Ok(Self {
            title: config.title.clone(),
            intro: config.intro.clone(),
            error,
            lines,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn error_message(&self) -> &str {
        &self.error
    }

    /// 生成输出文本。
    ///
    /// 值与模板类型不符的条目被跳过并记录告警。
    pub fn output_message(&self, data: &Snapshot) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.lines.len() + 1);
        if !self.intro.is_empty() {
            parts.push(self.intro.clone());
        }
        for line in &self.lines {
            let Some(value) = data.get(&line.key) else {
                continue;
            };
            match line.template.render(value) {
                Ok(text) => parts.push(text),
                Err(err) => {
                    warn!(
                        target: "iot2alexa.skill",
                        key = %line.key,
                        error = %err,
                        "output_entry_skipped"
                    );
                }
            }
        }
        parts.join(" ").trim_matches(' ').to_string()
    }
}
