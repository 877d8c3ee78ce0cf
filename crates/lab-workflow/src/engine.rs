//! 实验室工作流服务
//!
//! 协调检查目录、患者登记、申请单组合、结果录入和操作历史的核心服务。
//!
//! 锁顺序固定为：目录 → 患者 → 申请单表 → 单个申请单 → 历史。
//! 同一申请单上的所有修改都在该申请单的互斥锁内完成。

use crate::catalog::{ExamCatalog, NovoCampo, NovoExame, DEFAULT_TRL_HORAS};
use crate::history::OperationHistory;
use crate::patients::{NovoPaciente, PatientRegistry};
use crate::requisition::{ApplicableField, NovaRequisicao, RequisitionComposer};
use crate::results::{CompletionStatus, RecordOutcome, ResultRecorder, ResultSheet};
use crate::snapshot::RequisicaoSnapshot;
use crate::state_machine::{RequisicaoEvent, RequisicaoStateMachine};
use crate::visibility::{visibility_partition, FieldState, VisibilityPartition};
use chrono::Utc;
use lab_core::{
    AcaoHistorico, Exame, ExameCampo, HistoricoOperacao, LabError, Paciente, Requisicao,
    RequisicaoStatus, Result, ResultadoItem, TipoCampo, ValueRules,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// 服务设置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    pub value_rules: ValueRules,
    pub history_enabled: bool,
    pub default_trl_horas: u32,
    pub default_setor: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            value_rules: ValueRules::default(),
            history_enabled: true,
            default_trl_horas: DEFAULT_TRL_HORAS,
            default_setor: String::new(),
        }
    }
}

/// 单个申请单及其结果表
#[derive(Debug)]
struct RequisicaoState {
    requisicao: Requisicao,
    sheet: ResultSheet,
}

type SharedRequisicao = Arc<Mutex<RequisicaoState>>;

/// 实验室工作流服务
#[derive(Debug)]
pub struct LabService {
    catalog: RwLock<ExamCatalog>,
    pacientes: RwLock<PatientRegistry>,
    requisicoes: RwLock<HashMap<Uuid, SharedRequisicao>>,
    history: Mutex<OperationHistory>,
    state_machine: RequisicaoStateMachine,
    rules: ValueRules,
}

impl LabService {
    /// 创建新的服务
    pub fn new(settings: ServiceSettings) -> Self {
        Self {
            catalog: RwLock::new(
                ExamCatalog::with_default_trl(settings.default_trl_horas)
                    .with_default_setor(settings.default_setor),
            ),
            pacientes: RwLock::new(PatientRegistry::new()),
            requisicoes: RwLock::new(HashMap::new()),
            history: Mutex::new(OperationHistory::new(settings.history_enabled)),
            state_machine: RequisicaoStateMachine::new(),
            rules: settings.value_rules,
        }
    }

    // ---------------------------------------------------------------
    // 检查目录
    // ---------------------------------------------------------------

    pub async fn define_exame(&self, nome: &str, codigo: &str, setor: &str) -> Result<Exame> {
        self.catalog.write().await.define_exame(nome, codigo, setor)
    }

    pub async fn define_exame_with(&self, novo: NovoExame) -> Result<Exame> {
        self.catalog.write().await.define_exame_with(novo)
    }

    pub async fn add_campo(&self, exame_id: Uuid, nome: &str, tipo: TipoCampo) -> Result<ExameCampo> {
        self.catalog.write().await.add_campo(exame_id, nome, tipo)
    }

    pub async fn add_campo_with(&self, exame_id: Uuid, novo: NovoCampo) -> Result<ExameCampo> {
        self.catalog.write().await.add_campo_with(exame_id, novo)
    }

    /// 停用检查，只影响之后的新选择
    pub async fn deactivate_exame(&self, exame_id: Uuid) -> Result<()> {
        self.catalog.write().await.deactivate_exame(exame_id)
    }

    pub async fn reactivate_exame(&self, exame_id: Uuid) -> Result<()> {
        self.catalog.write().await.reactivate_exame(exame_id)
    }

    /// 物理删除检查，被任何申请单引用时拒绝
    pub async fn delete_exame(&self, exame_id: Uuid) -> Result<Exame> {
        let mut catalog = self.catalog.write().await;
        let mut referencing = 0;
        for state in self.all_requisicoes().await {
            let state = state.lock().await;
            if state.requisicao.includes_exame(exame_id) || state.sheet.resultado_for(exame_id).is_some() {
                referencing += 1;
            }
        }
        let result = catalog.delete_exame(exame_id, referencing);
        if let Err(e) = &result {
            tracing::warn!("Rejected delete of exame {}: {}", exame_id, e);
        }
        result
    }

    /// 删除字段，已有结果项引用时拒绝
    pub async fn delete_campo(&self, campo_id: Uuid) -> Result<ExameCampo> {
        let mut catalog = self.catalog.write().await;
        let mut referencing = 0;
        for state in self.all_requisicoes().await {
            referencing += state.lock().await.sheet.references_campo(campo_id);
        }
        catalog.delete_campo(campo_id, referencing)
    }

    pub async fn get_exame(&self, exame_id: Uuid) -> Option<Exame> {
        self.catalog.read().await.get_exame(exame_id).cloned()
    }

    pub async fn find_exame_by_codigo(&self, codigo: &str) -> Option<Exame> {
        self.catalog.read().await.find_by_codigo(codigo).cloned()
    }

    pub async fn list_exames(&self) -> Vec<Exame> {
        self.catalog.read().await.list_exames().into_iter().cloned().collect()
    }

    pub async fn list_campos_for_exame(&self, exame_id: Uuid) -> Result<Vec<ExameCampo>> {
        let catalog = self.catalog.read().await;
        Ok(catalog
            .list_campos_for_exame(exame_id)?
            .into_iter()
            .cloned()
            .collect())
    }

    // ---------------------------------------------------------------
    // 患者
    // ---------------------------------------------------------------

    pub async fn register_paciente(&self, novo: NovoPaciente) -> Result<Paciente> {
        let hoje = Utc::now().date_naive();
        self.pacientes.write().await.register_paciente(novo, hoje)
    }

    pub async fn deactivate_paciente(&self, paciente_id: Uuid) -> Result<()> {
        self.pacientes.write().await.deactivate_paciente(paciente_id)
    }

    pub async fn get_paciente(&self, paciente_id: Uuid) -> Option<Paciente> {
        self.pacientes.read().await.get(paciente_id).cloned()
    }

    /// 按姓名排序的患者列表
    pub async fn list_pacientes(&self) -> Vec<Paciente> {
        self.pacientes.read().await.list().into_iter().cloned().collect()
    }

    // ---------------------------------------------------------------
    // 申请单
    // ---------------------------------------------------------------

    /// 创建申请单
    pub async fn create_requisicao(&self, nova: NovaRequisicao) -> Result<Requisicao> {
        let catalog = self.catalog.read().await;
        let pacientes = self.pacientes.read().await;

        let paciente = pacientes.require_active(nova.paciente_id)?;
        let requisicao = RequisitionComposer::new(&catalog).new_requisicao(paciente, nova)?;

        let codigos = Self::codigos(&catalog, &requisicao.exame_ids);
        let detalhes = format!(
            "Requisição criada para {} com exames {}.",
            paciente.nome, codigos
        );

        self.requisicoes.write().await.insert(
            requisicao.id,
            Arc::new(Mutex::new(RequisicaoState {
                requisicao: requisicao.clone(),
                sheet: ResultSheet::new(),
            })),
        );
        self.history.lock().await.record(
            requisicao.id,
            requisicao.analista.as_deref(),
            AcaoHistorico::CriacaoRequisicao,
            detalhes,
        );

        tracing::info!(
            "Created requisicao {} for paciente {} with {} exames",
            requisicao.id,
            requisicao.paciente_id,
            requisicao.exame_ids.len()
        );
        Ok(requisicao)
    }

    pub async fn get_requisicao(&self, requisicao_id: Uuid) -> Result<Requisicao> {
        let state = self.requisicao_state(requisicao_id).await?;
        let state = state.lock().await;
        Ok(state.requisicao.clone())
    }

    /// 申请单的适用字段
    pub async fn applicable_fields(&self, requisicao_id: Uuid) -> Result<Vec<ApplicableField>> {
        let catalog = self.catalog.read().await;
        let state = self.requisicao_state(requisicao_id).await?;
        let state = state.lock().await;
        RequisitionComposer::new(&catalog).applicable_fields(&state.requisicao)
    }

    /// 更新检查选择，移除的检查的结果项保留为孤立项
    pub async fn update_exam_selection(
        &self,
        requisicao_id: Uuid,
        new_exame_ids: &[Uuid],
    ) -> Result<Requisicao> {
        let catalog = self.catalog.read().await;
        let state = self.requisicao_state(requisicao_id).await?;
        let mut state = state.lock().await;

        let change = RequisitionComposer::new(&catalog)
            .plan_selection(&state.requisicao, new_exame_ids)
            .map_err(|e| {
                tracing::warn!("Rejected selection update on requisicao {}: {}", requisicao_id, e);
                e
            })?;
        if change.is_noop() {
            return Ok(state.requisicao.clone());
        }

        state.requisicao.exame_ids = change.exame_ids.clone();
        state.requisicao.updated_at = Utc::now();

        let analista = state.requisicao.analista.clone();
        let mut history = self.history.lock().await;
        if !change.added.is_empty() {
            history.record(
                requisicao_id,
                analista.as_deref(),
                AcaoHistorico::AdicaoExames,
                format!("Exames adicionados: {}.", Self::codigos(&catalog, &change.added)),
            );
        }
        if !change.removed.is_empty() {
            history.record(
                requisicao_id,
                analista.as_deref(),
                AcaoHistorico::RemocaoExames,
                format!("Exames removidos: {}.", Self::codigos(&catalog, &change.removed)),
            );
        }

        tracing::info!(
            "Requisicao {} selection updated: +{} -{}",
            requisicao_id,
            change.added.len(),
            change.removed.len()
        );
        Ok(state.requisicao.clone())
    }

    /// 对整个目录按给定选择计算可见性
    pub async fn visibility_partition(&self, selected_exame_ids: &[Uuid]) -> VisibilityPartition {
        let catalog = self.catalog.read().await;
        visibility_partition(catalog.all_campos(), selected_exame_ids)
    }

    /// 按给定选择计算申请单的字段状态，附带每个字段已保存的结果项
    pub async fn requisicao_visibility(
        &self,
        requisicao_id: Uuid,
        selected_exame_ids: &[Uuid],
    ) -> Result<Vec<FieldState>> {
        let catalog = self.catalog.read().await;
        let state = self.requisicao_state(requisicao_id).await?;
        let state = state.lock().await;

        let partition = visibility_partition(catalog.all_campos(), selected_exame_ids);
        Ok(partition
            .fields
            .into_iter()
            .map(|visibility| FieldState {
                item: state
                    .sheet
                    .item_for(visibility.exame_id, visibility.campo_id)
                    .cloned(),
                visibility,
            })
            .collect())
    }

    /// 录入结果值
    pub async fn record_resultado(
        &self,
        requisicao_id: Uuid,
        exame_id: Uuid,
        campo_id: Uuid,
        valor: &str,
    ) -> Result<ResultadoItem> {
        let catalog = self.catalog.read().await;
        let state = self.requisicao_state(requisicao_id).await?;
        let mut state = state.lock().await;

        let RequisicaoState { requisicao, sheet } = &mut *state;
        let recorded = ResultRecorder::new(&catalog, &self.rules)
            .record(requisicao, sheet, exame_id, campo_id, valor)
            .map_err(|e| {
                tracing::warn!("Rejected resultado on requisicao {}: {}", requisicao_id, e);
                e
            })?;

        let campo_nome = catalog
            .get_campo(campo_id)
            .map(|c| c.nome.clone())
            .unwrap_or_default();
        let (acao, detalhes) = match recorded.outcome {
            RecordOutcome::Created => (
                AcaoHistorico::CriacaoResultado,
                format!("Campo '{}' registado: {}.", campo_nome, recorded.item.valor),
            ),
            RecordOutcome::Updated => (
                AcaoHistorico::AtualizacaoResultado,
                format!(
                    "Campo '{}' atualizado: {} -> {}.",
                    campo_nome,
                    recorded.previous_valor.as_deref().unwrap_or(""),
                    recorded.item.valor
                ),
            ),
        };
        self.history
            .lock()
            .await
            .record(requisicao_id, requisicao.analista.as_deref(), acao, detalhes);

        tracing::info!(
            "Recorded resultado for campo {} on requisicao {} ({:?})",
            campo_id,
            requisicao_id,
            recorded.outcome
        );
        Ok(recorded.item)
    }

    /// 完成度：所有适用字段都已录入时可以转为已完成
    pub async fn completion_status(&self, requisicao_id: Uuid) -> Result<CompletionStatus> {
        let catalog = self.catalog.read().await;
        let state = self.requisicao_state(requisicao_id).await?;
        let state = state.lock().await;
        let fields = RequisitionComposer::new(&catalog).applicable_fields(&state.requisicao)?;
        Ok(state.sheet.completion_status(&fields))
    }

    /// 待处理 → 已完成，要求全部适用字段已录入
    pub async fn conclude_requisicao(
        &self,
        requisicao_id: Uuid,
        utilizador: Option<&str>,
    ) -> Result<Requisicao> {
        let catalog = self.catalog.read().await;
        let state = self.requisicao_state(requisicao_id).await?;
        let mut state = state.lock().await;

        let new_status = self
            .state_machine
            .transition(state.requisicao.status, RequisicaoEvent::Concluir)?;

        let fields = RequisitionComposer::new(&catalog).applicable_fields(&state.requisicao)?;
        let completion = state.sheet.completion_status(&fields);
        if !completion.is_complete() {
            return Err(LabError::ResultsIncomplete {
                requisicao_id,
                missing: completion.missing.len(),
            });
        }

        state.requisicao.status = new_status;
        state.requisicao.updated_at = Utc::now();
        self.history.lock().await.record(
            requisicao_id,
            utilizador,
            AcaoHistorico::ConclusaoRequisicao,
            format!("Requisição concluída com {} campos.", completion.total),
        );

        tracing::info!("Requisicao {} concluded", requisicao_id);
        Ok(state.requisicao.clone())
    }

    /// 待处理 → 已取消
    pub async fn cancel_requisicao(
        &self,
        requisicao_id: Uuid,
        utilizador: Option<&str>,
    ) -> Result<Requisicao> {
        let state = self.requisicao_state(requisicao_id).await?;
        let mut state = state.lock().await;

        let new_status = self
            .state_machine
            .transition(state.requisicao.status, RequisicaoEvent::Cancelar)?;
        state.requisicao.status = new_status;
        state.requisicao.updated_at = Utc::now();

        self.history.lock().await.record(
            requisicao_id,
            utilizador,
            AcaoHistorico::CancelamentoRequisicao,
            "Requisição cancelada.",
        );

        tracing::info!("Requisicao {} cancelled", requisicao_id);
        Ok(state.requisicao.clone())
    }

    /// 审核结果项
    pub async fn validate_resultado_item(
        &self,
        requisicao_id: Uuid,
        item_id: Uuid,
        utilizador: &str,
    ) -> Result<ResultadoItem> {
        let state = self.requisicao_state(requisicao_id).await?;
        let mut state = state.lock().await;

        if state.requisicao.status == RequisicaoStatus::Cancelada {
            return Err(LabError::RequisicaoLocked {
                requisicao_id,
                status: state.requisicao.status.to_string(),
            });
        }

        let RequisicaoState { requisicao, sheet } = &mut *state;
        let item = sheet.validate_item(requisicao, item_id, utilizador)?;

        self.history.lock().await.record(
            requisicao_id,
            Some(utilizador),
            AcaoHistorico::ValidacaoResultado,
            format!("Resultado {} validado por {}.", item_id, utilizador),
        );
        Ok(item)
    }

    /// 孤立结果项
    pub async fn orphaned_items(&self, requisicao_id: Uuid) -> Result<Vec<ResultadoItem>> {
        let state = self.requisicao_state(requisicao_id).await?;
        let state = state.lock().await;
        Ok(state
            .sheet
            .orphaned_items(&state.requisicao)
            .into_iter()
            .cloned()
            .collect())
    }

    /// 显式清除孤立结果项，仅限待处理状态
    pub async fn purge_orphans(&self, requisicao_id: Uuid, utilizador: Option<&str>) -> Result<usize> {
        let state = self.requisicao_state(requisicao_id).await?;
        let mut state = state.lock().await;

        if state.requisicao.status != RequisicaoStatus::Pendente {
            return Err(LabError::RequisicaoLocked {
                requisicao_id,
                status: state.requisicao.status.to_string(),
            });
        }

        let RequisicaoState { requisicao, sheet } = &mut *state;
        let purged = sheet.purge_orphans(requisicao);
        if purged > 0 {
            self.history.lock().await.record(
                requisicao_id,
                utilizador,
                AcaoHistorico::RemocaoOrfaos,
                format!("{} resultados órfãos removidos.", purged),
            );
            tracing::info!("Purged {} orphaned items from requisicao {}", purged, requisicao_id);
        }
        Ok(purged)
    }

    /// PDF导出用的只读快照
    pub async fn export_snapshot(&self, requisicao_id: Uuid) -> Result<RequisicaoSnapshot> {
        let catalog = self.catalog.read().await;
        let pacientes = self.pacientes.read().await;
        let state = self.requisicao_state(requisicao_id).await?;
        let state = state.lock().await;

        let paciente = pacientes
            .get(state.requisicao.paciente_id)
            .cloned()
            .ok_or(LabError::UnknownPaciente(state.requisicao.paciente_id))?;
        let exames = state
            .requisicao
            .exame_ids
            .iter()
            .map(|id| catalog.get_exame(*id).cloned().ok_or(LabError::UnknownExame(*id)))
            .collect::<Result<Vec<_>>>()?;
        let fields = RequisitionComposer::new(&catalog).applicable_fields(&state.requisicao)?;

        Ok(RequisicaoSnapshot::assemble(
            state.requisicao.clone(),
            paciente,
            exames,
            fields,
            &state.sheet,
        ))
    }

    /// 申请单的操作历史
    pub async fn history(&self, requisicao_id: Uuid) -> Vec<HistoricoOperacao> {
        self.history.lock().await.for_requisicao(requisicao_id)
    }

    pub async fn requisicao_count(&self) -> usize {
        self.requisicoes.read().await.len()
    }

    async fn requisicao_state(&self, requisicao_id: Uuid) -> Result<SharedRequisicao> {
        self.requisicoes
            .read()
            .await
            .get(&requisicao_id)
            .cloned()
            .ok_or(LabError::UnknownRequisicao(requisicao_id))
    }

    async fn all_requisicoes(&self) -> Vec<SharedRequisicao> {
        self.requisicoes.read().await.values().cloned().collect()
    }

    fn codigos(catalog: &ExamCatalog, ids: &[Uuid]) -> String {
        ids.iter()
            .filter_map(|id| catalog.get_exame(*id))
            .map(|e| e.codigo.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for LabService {
    fn default() -> Self {
        Self::new(ServiceSettings::default())
    }
}
