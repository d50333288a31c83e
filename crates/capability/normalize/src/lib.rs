//! 字段映射：结构化负载 + 映射规则 -> 命名字段值。
//!
//! 纯函数，无状态、无 I/O。单条规则失败不影响其余规则，
//! 失败原因随结果一并返回，由调用方决定如何记录。

pub mod path;

pub use path::{JsonPath, Segment};

use domain::{FieldValue, Snapshot};
use path::json_type_name;
use serde_json::Value;
use std::collections::HashSet;

/// 映射错误。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("invalid mapping rule: {0}")]
    InvalidRule(String),
    #[error("key {key}: cannot resolve {path}: {reason}")]
    Unresolved {
        key: String,
        path: String,
        reason: String,
    },
    #[error("key {key}: non-numeric {found} value can not be scaled")]
    NotNumeric { key: String, found: &'static str },
    #[error("key {key}: unsupported {found} value at {path}")]
    UnsupportedValue {
        key: String,
        path: String,
        found: &'static str,
    },
}

impl NormalizeError {
    /// 出错规则的 key（配置期错误返回 None）。
    pub fn key(&self) -> Option<&str> {
        match self {
            NormalizeError::Unresolved { key, .. }
            | NormalizeError::NotNumeric { key, .. }
            | NormalizeError::UnsupportedValue { key, .. } => Some(key.as_str()),
            _ => None,
        }
    }
}

/// 映射规则。
#[derive(Debug, Clone, PartialEq)]
pub struct MappingRule {
    pub key: String,
    pub path: JsonPath,
    /// 缩放系数；None 或 0 表示不缩放。
    pub scale: Option<f64>,
    /// 浮点结果是否四舍五入为整数。
    pub round: bool,
}

impl MappingRule {
    pub fn new(key: impl Into<String>, path: &str) -> Result<Self, NormalizeError> {
        Ok(Self {
            key: key.into(),
            path: JsonPath::parse(path)?,
            scale: None,
            round: false,
        })
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_round(mut self, round: bool) -> Self {
        self.round = round;
        self
    }

    fn effective_scale(&self) -> Option<f64> {
        self.scale.filter(|scale| *scale != 0.0)
    }
}

/// 一次映射的结果。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingOutcome {
    pub values: Snapshot,
    /// 按规则声明顺序排列的单规则错误。
    pub errors: Vec<NormalizeError>,
}

/// 校验规则集：key 非空且唯一。
pub fn validate_rules(rules: &[MappingRule]) -> Result<(), NormalizeError> {
    let mut seen = HashSet::new();
    for rule in rules {
        if rule.key.trim().is_empty() {
            return Err(NormalizeError::InvalidRule(format!(
                "empty key for path {}",
                rule.path
            )));
        }
        if !seen.insert(rule.key.as_str()) {
            return Err(NormalizeError::InvalidRule(format!(
                "duplicate key {}",
                rule.key
            )));
        }
    }
    Ok(())
}

/// 按声明顺序对负载逐条应用规则。
///
/// 同一 key 出现多次时后者覆盖前者。
pub fn map_payload(payload: &Value, rules: &[MappingRule]) -> MappingOutcome {
    let mut outcome = MappingOutcome::default();
    for rule in rules {
        match apply_rule(payload, rule) {
            Ok(value) => {
                outcome.values.insert(rule.key.clone(), value);
            }
            Err(err) => outcome.errors.push(err),
        }
    }
    outcome
}

/// 持有已校验规则集的映射器。
#[derive(Debug, Clone)]
pub struct FieldMapper {
    rules: Vec<MappingRule>,
}

impl FieldMapper {
    pub fn new(rules: Vec<MappingRule>) -> Result<Self, NormalizeError> {
        validate_rules(&rules)?;
        Ok(Self { rules })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.key.as_str())
    }

    pub fn map(&self, payload: &Value) -> MappingOutcome {
        map_payload(payload, &self.rules)
    }
}

fn apply_rule(payload: &Value, rule: &MappingRule) -> Result<FieldValue, NormalizeError> {
    let resolved = rule
        .path
        .lookup(payload)
        .map_err(|reason| NormalizeError::Unresolved {
            key: rule.key.clone(),
            path: rule.path.to_string(),
            reason,
        })?;
    let mut value = to_field_value(resolved).ok_or_else(|| NormalizeError::UnsupportedValue {
        key: rule.key.clone(),
        path: rule.path.to_string(),
        found: json_type_name(resolved),
    })?;

    if let Some(scale) = rule.effective_scale() {
        let number = value.as_f64().ok_or_else(|| NormalizeError::NotNumeric {
            key: rule.key.clone(),
            found: value.type_name(),
        })?;
        value = FieldValue::F64(number * scale);
    }

    if rule.round {
        if let FieldValue::F64(number) = value {
            value = FieldValue::I64(round_half_up(number));
        }
    }

    Ok(value)
}

/// `floor(x + 0.5)`，超出 i64 范围时饱和。
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn to_field_value(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Bool(v) => Some(FieldValue::Bool(*v)),
        Value::String(v) => Some(FieldValue::String(v.clone())),
        Value::Number(number) => {
            if let Some(v) = number.as_i64() {
                Some(FieldValue::I64(v))
            } else {
                number.as_f64().map(FieldValue::F64)
            }
        }
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
