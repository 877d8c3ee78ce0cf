//! 错误定义模块

use thiserror::Error;
use uuid::Uuid;

/// 实验室系统统一错误类型
///
/// 所有错误都是同步返回给调用方的本地校验失败，不会在内部重试。
#[derive(Error, Debug)]
pub enum LabError {
    #[error("检查代码已存在: {codigo}")]
    DuplicateCode { codigo: String },

    #[error("检查 {exame_id} 中字段名称重复: {nome}")]
    DuplicateFieldName { exame_id: Uuid, nome: String },

    #[error("检查不存在: {0}")]
    UnknownExame(Uuid),

    #[error("检查字段不存在: {0}")]
    UnknownCampo(Uuid),

    #[error("患者不存在: {0}")]
    UnknownPaciente(Uuid),

    #[error("患者已停用: {0}")]
    InactivePaciente(Uuid),

    #[error("申请单不存在: {0}")]
    UnknownRequisicao(Uuid),

    #[error("结果项不存在: {0}")]
    UnknownResultadoItem(Uuid),

    #[error("检查已停用，不能加入申请单: {codigo} ({exame_id})")]
    InactiveExame { exame_id: Uuid, codigo: String },

    #[error("申请单 {requisicao_id} 处于 {status} 状态，不允许修改")]
    RequisicaoLocked { requisicao_id: Uuid, status: String },

    #[error("字段 {campo_id} (检查 {exame_id}) 不适用于申请单 {requisicao_id}")]
    FieldNotApplicable {
        requisicao_id: Uuid,
        exame_id: Uuid,
        campo_id: Uuid,
    },

    #[error("字段 {campo} 的值无效 (类型 {tipo}): {valor:?}: {reason}")]
    InvalidValue {
        campo: String,
        tipo: String,
        valor: String,
        reason: String,
    },

    #[error("检查 {exame_id} 已被 {requisicoes} 个申请单引用，不能删除")]
    ExameInUse { exame_id: Uuid, requisicoes: usize },

    #[error("检查字段 {campo_id} 已有结果记录，不能删除")]
    CampoInUse { campo_id: Uuid },

    #[error("申请单至少需要选择一个检查")]
    EmptySelection,

    #[error("证件号码已存在: {0}")]
    DuplicateNumeroId(String),

    #[error("申请单 {requisicao_id} 仍有 {missing} 个字段未录入结果")]
    ResultsIncomplete { requisicao_id: Uuid, missing: usize },

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 实验室系统统一结果类型
pub type Result<T> = std::result::Result<T, LabError>;
