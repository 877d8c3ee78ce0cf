//! 配置管理
//!
//! 从可选的TOML文件和 `LAB_` 前缀环境变量加载配置，并在使用前校验

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use lab_core::ValueRules;
use lab_workflow::ServiceSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 配置数据
    config: Arc<RwLock<LabConfig>>,
    /// 配置文件路径
    config_path: Option<String>,
    /// 配置验证器
    validator: ConfigValidator,
}

/// 实验室系统完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LabConfig {
    /// 实验室信息
    pub laboratorio: LaboratorioConfig,
    /// 结果值校验配置
    pub validation: ValidationConfig,
    /// 工作流配置
    pub workflow: WorkflowConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 实验室信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LaboratorioConfig {
    /// 实验室名称
    pub nome: String,
    /// 未指定科室的检查使用该科室
    pub setor_padrao: String,
}

/// 结果值校验配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    /// 接受逗号小数点
    pub accept_decimal_comma: bool,
    /// 文本字段最大长度
    pub max_text_length: usize,
}

/// 工作流配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    /// 是否记录操作历史
    pub history_enabled: bool,
    /// 新检查的默认周转时间（小时）
    pub default_trl_horas: u32,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或 EnvFilter 过滤表达式
    pub level: String,
    /// 输出格式: plain 或 json
    pub format: String,
}

impl LabConfig {
    /// 转换为工作流服务设置
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            value_rules: ValueRules {
                accept_decimal_comma: self.validation.accept_decimal_comma,
                max_text_length: self.validation.max_text_length,
            },
            history_enabled: self.workflow.history_enabled,
            default_trl_horas: self.workflow.default_trl_horas,
            default_setor: self.laboratorio.setor_padrao.clone(),
        }
    }
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    field_path: &'static str,
    validator: fn(&LabConfig) -> Result<()>,
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    validation_rules: Vec<ValidationRule>,
}

impl ConfigManager {
    /// 创建新的配置管理器，未指定文件时只读取默认值和环境变量
    pub fn new(config_path: Option<&str>) -> Result<Self> {
        let validator = ConfigValidator::new();
        let config = Self::load_config(config_path)?;
        validator.validate(&config)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path: config_path.map(str::to_string),
            validator,
        })
    }

    /// 加载配置
    fn load_config(config_path: Option<&str>) -> Result<LabConfig> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("LAB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: LabConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        match config_path {
            Some(path) => info!("Configuration loaded successfully from: {}", path),
            None => info!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    /// 获取配置
    pub async fn get_config(&self) -> LabConfig {
        let config = self.config.read().await;
        config.clone()
    }

    /// 更新配置
    pub async fn update_config(&self, new_config: LabConfig) -> Result<()> {
        self.validator.validate(&new_config)?;

        {
            let mut config = self.config.write().await;
            *config = new_config;
        }

        info!("Configuration updated successfully");
        Ok(())
    }

    /// 保存配置到文件
    pub async fn save_to(&self, path: &str) -> Result<()> {
        let config = self.config.read().await;
        let config_str = toml::to_string_pretty(&*config)
            .context("Failed to serialize configuration")?;

        tokio::fs::write(path, config_str)
            .await
            .context("Failed to write configuration file")?;

        info!("Configuration saved to: {}", path);
        Ok(())
    }

    /// 重新加载配置
    pub async fn reload_config(&self) -> Result<()> {
        let new_config = Self::load_config(self.config_path.as_deref())?;
        self.update_config(new_config).await
    }

    /// 按点分路径获取配置值，例如 "validation.max_text_length"
    pub async fn get_value<T>(&self, path: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let config = self.config.read().await;
        let value = extract_nested_value(&config, path)
            .context(format!("Configuration path not found: {}", path))?;

        serde_json::from_value(value).context("Failed to deserialize configuration value")
    }
}

/// 提取嵌套值
fn extract_nested_value(config: &LabConfig, path: &str) -> Result<serde_json::Value> {
    let config_json = serde_json::to_value(config).context("Failed to serialize config to JSON")?;

    let mut current = &config_json;
    for part in path.split('.') {
        match current {
            serde_json::Value::Object(map) => {
                current = map
                    .get(part)
                    .ok_or_else(|| anyhow::anyhow!("Path segment not found: {}", part))?;
            }
            _ => return Err(anyhow::anyhow!("Invalid path at segment: {}", part)),
        }
    }

    Ok(current.clone())
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "validation.max_text_length",
                validator: |config| {
                    if config.validation.max_text_length == 0 {
                        Err(anyhow::anyhow!("Maximum text length cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "workflow.default_trl_horas",
                validator: |config| {
                    if config.workflow.default_trl_horas == 0 {
                        Err(anyhow::anyhow!("Default turnaround hours cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "logging.format",
                validator: |config| match config.logging.format.as_str() {
                    "plain" | "json" => Ok(()),
                    other => Err(anyhow::anyhow!("Unsupported log format: {}", other)),
                },
            },
            ValidationRule {
                field_path: "laboratorio.nome",
                validator: |config| {
                    if config.laboratorio.nome.trim().is_empty() {
                        Err(anyhow::anyhow!("Laboratory name cannot be empty"))
                    } else {
                        Ok(())
                    }
                },
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &LabConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("Invalid {}: {}", rule.field_path, e));
            }
        }
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for LaboratorioConfig {
    fn default() -> Self {
        Self {
            nome: "AnaBioLink".to_string(),
            setor_padrao: "Análises Clínicas".to_string(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let rules = ValueRules::default();
        Self {
            accept_decimal_comma: rules.accept_decimal_comma,
            max_text_length: rules.max_text_length,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            history_enabled: true,
            default_trl_horas: 24,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "plain".to_string(),
        }
    }
}
