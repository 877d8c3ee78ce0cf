//! 结果值校验
//!
//! 每种字段类型对应一个校验函数。校验通过时返回规范化后的值，
//! 存储层只保存规范化结果。

use crate::error::{LabError, Result};
use crate::models::{ExameCampo, TipoCampo};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const TRUE_WORDS: &[&str] = &["true", "sim", "s", "1", "positivo", "yes"];
const FALSE_WORDS: &[&str] = &["false", "nao", "não", "n", "0", "negativo", "no"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// 值校验规则
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValueRules {
    /// 是否接受逗号作为小数点 (例如 "5,5")
    pub accept_decimal_comma: bool,
    /// 文本字段最大字符数
    pub max_text_length: usize,
}

impl Default for ValueRules {
    fn default() -> Self {
        Self {
            accept_decimal_comma: true,
            max_text_length: 1024,
        }
    }
}

/// 按字段类型校验并规范化原始输入
pub fn normalize_value(
    tipo: TipoCampo,
    raw: &str,
    rules: &ValueRules,
) -> std::result::Result<String, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err("value is empty".to_string());
    }

    match tipo {
        TipoCampo::Texto => {
            let len = value.chars().count();
            if len > rules.max_text_length {
                Err(format!(
                    "text exceeds maximum length of {} characters",
                    rules.max_text_length
                ))
            } else {
                Ok(value.to_string())
            }
        }
        TipoCampo::Numero => {
            let candidate = if rules.accept_decimal_comma && !value.contains('.') {
                value.replacen(',', ".", 1)
            } else {
                value.to_string()
            };
            match candidate.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(n.to_string()),
                _ => Err("not a number".to_string()),
            }
        }
        TipoCampo::Inteiro => value
            .parse::<i64>()
            .map(|n| n.to_string())
            .map_err(|_| "not an integer".to_string()),
        TipoCampo::Booleano => {
            let lower = value.to_lowercase();
            if TRUE_WORDS.contains(&lower.as_str()) {
                Ok("true".to_string())
            } else if FALSE_WORDS.contains(&lower.as_str()) {
                Ok("false".to_string())
            } else {
                Err("not a boolean".to_string())
            }
        }
        TipoCampo::Data => DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
            .map(|d| d.format("%Y-%m-%d").to_string())
            .ok_or_else(|| "not a date (expected YYYY-MM-DD or DD/MM/YYYY)".to_string()),
    }
}

/// 校验某字段的输入值
pub fn validate_valor(campo: &ExameCampo, raw: &str, rules: &ValueRules) -> Result<String> {
    normalize_value(campo.tipo, raw, rules).map_err(|reason| LabError::InvalidValue {
        campo: campo.nome.clone(),
        tipo: campo.tipo.to_string(),
        valor: raw.to_string(),
        reason,
    })
}

/// 校验必填文本并去除首尾空白
pub fn require_non_empty(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(LabError::Validation(format!("{} cannot be empty", field)))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ValueRules {
        ValueRules::default()
    }

    #[test]
    fn test_numeric_values() {
        assert_eq!(normalize_value(TipoCampo::Numero, "90", &rules()).unwrap(), "90");
        assert_eq!(normalize_value(TipoCampo::Numero, " 5,5 ", &rules()).unwrap(), "5.5");
        assert_eq!(normalize_value(TipoCampo::Numero, "13.2", &rules()).unwrap(), "13.2");
        assert!(normalize_value(TipoCampo::Numero, "abc", &rules()).is_err());
        assert!(normalize_value(TipoCampo::Numero, "NaN", &rules()).is_err());
        assert!(normalize_value(TipoCampo::Numero, "", &rules()).is_err());
    }

    #[test]
    fn test_decimal_comma_can_be_disabled() {
        let strict = ValueRules {
            accept_decimal_comma: false,
            ..ValueRules::default()
        };
        assert!(normalize_value(TipoCampo::Numero, "5,5", &strict).is_err());
    }

    #[test]
    fn test_integer_boolean_and_date() {
        assert_eq!(normalize_value(TipoCampo::Inteiro, "+42", &rules()).unwrap(), "42");
        assert!(normalize_value(TipoCampo::Inteiro, "4.2", &rules()).is_err());

        assert_eq!(normalize_value(TipoCampo::Booleano, "Sim", &rules()).unwrap(), "true");
        assert_eq!(normalize_value(TipoCampo::Booleano, "negativo", &rules()).unwrap(), "false");
        assert!(normalize_value(TipoCampo::Booleano, "talvez", &rules()).is_err());

        assert_eq!(
            normalize_value(TipoCampo::Data, "15/03/2024", &rules()).unwrap(),
            "2024-03-15"
        );
        assert!(normalize_value(TipoCampo::Data, "31/02/2024", &rules()).is_err());
    }

    #[test]
    fn test_text_length_limit() {
        let short = ValueRules {
            max_text_length: 3,
            ..ValueRules::default()
        };
        assert!(normalize_value(TipoCampo::Texto, "abcd", &short).is_err());
        assert_eq!(normalize_value(TipoCampo::Texto, " abc ", &short).unwrap(), "abc");
    }
}
