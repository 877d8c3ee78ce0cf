//! # 实验室工作流模块
//!
//! 动态检查字段模式与结果组合引擎，包括：
//! - 检查目录：每个检查独立声明其带类型的结果字段
//! - 申请单组合：根据所选检查子集计算适用字段
//! - 可见性划分：按界面当前选择显示或隐藏字段
//! - 结果录入：按字段类型校验并以覆盖方式保存结果
//! - 状态机与操作历史：申请单状态单向前进，所有修改留痕

pub mod catalog;
pub mod engine;
pub mod history;
pub mod patients;
pub mod requisition;
pub mod results;
pub mod snapshot;
pub mod state_machine;
pub mod visibility;

// 重新导出主要类型
pub use catalog::{ExamCatalog, NovoCampo, NovoExame};
pub use engine::{LabService, ServiceSettings};
pub use history::OperationHistory;
pub use patients::{NovoPaciente, PatientRegistry};
pub use requisition::{ApplicableField, NovaRequisicao, RequisitionComposer, SelectionChange};
pub use results::{CompletionStatus, RecordOutcome, RecordedItem, ResultRecorder, ResultSheet};
pub use snapshot::{CampoSnapshot, ExameSnapshot, RequisicaoSnapshot};
pub use state_machine::{RequisicaoEvent, RequisicaoStateMachine};
pub use visibility::{visibility_partition, FieldState, FieldVisibility, VisibilityPartition};
