//! # 实验室管理模块
//!
//! 提供配置加载、校验和日志初始化

pub mod config;
pub mod logging;

pub use config::{ConfigManager, ConfigValidator, LabConfig, LoggingConfig};
pub use logging::{init_logging, LogFormat};
