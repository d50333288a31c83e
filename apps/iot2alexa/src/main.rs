//! iot2alexa：把 IoT 设备的最新读数以语音助手 Skill 的形式对外提供。
//!
//! 启动流程：解析命令行 -> 读取配置 -> 初始化日志 -> 选定并启动后端 ->
//! 构建输出生成器 -> 在 `0.0.0.0:<port>` 上提供 HTTP 服务。

mod handlers;
mod middleware;
mod routes;
mod utils;

use clap::Parser;
use iot2alexa_backend::{Backend, BackendRegistry};
use iot2alexa_config::AppConfig;
use iot2alexa_output::OutputGenerator;
use iot2alexa_telemetry::{TracingOptions, init_tracing};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// 命令行参数。
#[derive(Debug, Parser)]
#[command(
    name = "iot2alexa",
    version,
    about = "Alexa skill server reporting the current values of IoT devices"
)]
struct Cli {
    /// 配置文件路径（必填）
    #[arg(short, long, env = "IOT2ALEXA_CONFIG")]
    config: PathBuf,
    /// 以 JSON 格式输出日志
    #[arg(long, env = "IOT2ALEXA_LOG_JSON")]
    log_json: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub appid: Arc<str>,
    pub backend: Arc<dyn Backend>,
    pub output: Arc<OutputGenerator>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），其中可设置 IOT2ALEXA_CONFIG 等变量
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)?;
    init_tracing(TracingOptions {
        debug: config.debug,
        json: cli.log_json,
    });

    let output = OutputGenerator::new(&config.skill.output)?;
    let backend = BackendRegistry::builtin().lookup(&config.skill)?;
    backend.init().await?;

    let state = AppState {
        appid: Arc::from(config.skill.appid.as_str()),
        backend,
        output: Arc::new(output),
    };
    let app = routes::create_router(state, &config.skill.path);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!(
        target: "iot2alexa.skill",
        addr = %addr,
        path = %config.skill.path,
        config = %cli.config.display(),
        "skill_server_listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_parses_config_and_log_json() {
        let cli = Cli::try_parse_from(["iot2alexa", "--config", "skill.yml", "--log-json"])
            .expect("cli");
        assert_eq!(cli.config.to_str(), Some("skill.yml"));
        assert!(cli.log_json);
    }
}
