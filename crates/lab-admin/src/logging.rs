//! 日志初始化
//!
//! 根据配置或命令行覆盖值安装全局 tracing 订阅者

use crate::config::LoggingConfig;
use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Plain,
    Json,
}

impl LogFormat {
    /// 从配置字符串解析，未知格式视为错误
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" => Ok(LogFormat::Plain),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow::anyhow!("Unsupported log format: {}", other)),
        }
    }
}

/// 构建过滤器，命令行级别优先于配置文件
pub fn build_filter(config: &LoggingConfig, override_level: Option<&str>) -> Result<EnvFilter> {
    let directive = override_level.unwrap_or(config.level.as_str());
    EnvFilter::try_new(directive).context(format!("Invalid log filter: {}", directive))
}

/// 初始化全局日志订阅者
pub fn init_logging(config: &LoggingConfig, override_level: Option<&str>) -> Result<()> {
    let filter = build_filter(config, override_level)?;
    let format = LogFormat::parse(&config.format)?;

    let result = match format {
        LogFormat::Plain => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
