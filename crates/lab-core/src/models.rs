//! 核心数据模型定义

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 检查目录条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Exame {
    pub id: Uuid,
    pub nome: String,
    pub codigo: String,              // 全局唯一的检查代码
    pub setor: String,               // 所属科室
    pub activo: bool,
    pub descricao: Option<String>,
    pub trl_horas: u32,              // 报告周转时间（小时）
    pub created_at: DateTime<Utc>,
}

/// 结果字段的声明类型
///
/// 序列化为小写英文名；反序列化经由 `FromStr`，同样接受旧数据写法。
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
pub enum TipoCampo {
    #[serde(rename = "text")]
    Texto,
    #[serde(rename = "number")]
    Numero,
    #[serde(rename = "integer")]
    Inteiro,
    #[serde(rename = "boolean")]
    Booleano,
    #[serde(rename = "date")]
    Data,
}

impl TipoCampo {
    pub fn as_str(&self) -> &'static str {
        match self {
            TipoCampo::Texto => "text",
            TipoCampo::Numero => "number",
            TipoCampo::Inteiro => "integer",
            TipoCampo::Booleano => "boolean",
            TipoCampo::Data => "date",
        }
    }
}

impl fmt::Display for TipoCampo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TipoCampo {
    type Err = String;

    /// 兼容旧数据中的 "NUM"/"TXT" 写法
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" | "texto" => Ok(TipoCampo::Texto),
            "number" | "num" | "numero" | "número" => Ok(TipoCampo::Numero),
            "integer" | "int" | "inteiro" => Ok(TipoCampo::Inteiro),
            "boolean" | "bool" | "booleano" => Ok(TipoCampo::Booleano),
            "date" | "data" => Ok(TipoCampo::Data),
            other => Err(format!("Unknown field type: {}", other)),
        }
    }
}

impl<'de> Deserialize<'de> for TipoCampo {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// 检查下声明的结果字段
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExameCampo {
    pub id: Uuid,
    pub exame_id: Uuid,
    pub nome: String,
    pub tipo: TipoCampo,
    pub unidade: Option<String>,
    pub valor_referencia: Option<String>,
    pub ordem: u32, // 声明顺序
}

/// 性别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Genero {
    #[serde(rename = "M")]
    Masculino,
    #[serde(rename = "F")]
    Feminino,
}

/// 患者基本信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paciente {
    pub id: Uuid,
    pub nome: String,
    pub activo: bool,
    pub numero_id: Option<String>, // 身份证件号码
    pub genero: Option<Genero>,
    pub data_nascimento: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Paciente {
    /// 按给定日期计算周岁
    pub fn idade(&self, hoje: NaiveDate) -> Option<u32> {
        let nascimento = self.data_nascimento?;
        let mut anos = hoje.year() - nascimento.year();
        if (hoje.month(), hoje.day()) < (nascimento.month(), nascimento.day()) {
            anos -= 1;
        }
        u32::try_from(anos).ok()
    }
}

/// 申请单状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RequisicaoStatus {
    Pendente,  // 待处理
    Concluida, // 已完成
    Cancelada, // 已取消
}

impl fmt::Display for RequisicaoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequisicaoStatus::Pendente => "pendente",
            RequisicaoStatus::Concluida => "concluida",
            RequisicaoStatus::Cancelada => "cancelada",
        };
        f.write_str(s)
    }
}

/// 检验申请单
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Requisicao {
    pub id: Uuid,
    pub paciente_id: Uuid,
    pub exame_ids: Vec<Uuid>, // 按加入顺序排列，无重复
    pub data: NaiveDate,
    pub status: RequisicaoStatus,
    pub analista: Option<String>,
    pub observacoes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Requisicao {
    pub fn includes_exame(&self, exame_id: Uuid) -> bool {
        self.exame_ids.contains(&exame_id)
    }
}

/// 某申请单中单个检查的结果分组
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resultado {
    pub id: Uuid,
    pub requisicao_id: Uuid,
    pub exame_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// 单个字段的结果值
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultadoItem {
    pub id: Uuid,
    pub resultado_id: Uuid,
    pub exame_campo_id: Uuid,
    pub valor: String,
    pub unidade: Option<String>,
    pub valor_referencia: Option<String>,
    pub validado: bool,
    pub validado_por: Option<String>,
    pub data_validacao: Option<DateTime<Utc>>,
    pub atualizado_em: DateTime<Utc>,
}

/// 操作历史的动作类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AcaoHistorico {
    CriacaoRequisicao,
    AdicaoExames,
    RemocaoExames,
    CriacaoResultado,
    AtualizacaoResultado,
    ValidacaoResultado,
    ConclusaoRequisicao,
    CancelamentoRequisicao,
    RemocaoOrfaos,
}

/// 操作历史记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricoOperacao {
    pub id: Uuid,
    pub requisicao_id: Uuid,
    pub utilizador: Option<String>,
    pub acao: AcaoHistorico,
    pub detalhes: String,
    pub registado_em: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tipo_campo_aliases() {
        assert_eq!("NUM".parse::<TipoCampo>().unwrap(), TipoCampo::Numero);
        assert_eq!("TXT".parse::<TipoCampo>().unwrap(), TipoCampo::Texto);
        assert_eq!("boolean".parse::<TipoCampo>().unwrap(), TipoCampo::Booleano);
        assert!("color".parse::<TipoCampo>().is_err());
    }

    #[test]
    fn test_tipo_campo_serde_names() {
        let json = serde_json::to_string(&TipoCampo::Numero).unwrap();
        assert_eq!(json, "\"number\"");
        let status = serde_json::to_string(&RequisicaoStatus::Concluida).unwrap();
        assert_eq!(status, "\"concluida\"");

        let legacy: TipoCampo = serde_json::from_str("\"NUM\"").unwrap();
        assert_eq!(legacy, TipoCampo::Numero);
        let current: TipoCampo = serde_json::from_str(&json).unwrap();
        assert_eq!(current, TipoCampo::Numero);
        assert!(serde_json::from_str::<TipoCampo>("\"color\"").is_err());
    }

    #[test]
    fn test_idade() {
        let paciente = Paciente {
            id: Uuid::new_v4(),
            nome: "Ana".to_string(),
            activo: true,
            numero_id: None,
            genero: Some(Genero::Feminino),
            data_nascimento: NaiveDate::from_ymd_opt(1990, 6, 15),
            created_at: Utc::now(),
        };

        let antes = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();
        let depois = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert_eq!(paciente.idade(antes), Some(33));
        assert_eq!(paciente.idade(depois), Some(34));
    }
}
