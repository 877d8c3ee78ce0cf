//! 申请单组合
//!
//! 根据患者选择的检查子集计算申请单的适用字段集合

use crate::catalog::ExamCatalog;
use chrono::{NaiveDate, Utc};
use lab_core::utils::dedup_preserving_order;
use lab_core::{Exame, ExameCampo, LabError, Paciente, Requisicao, RequisicaoStatus, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 新建申请单的参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NovaRequisicao {
    pub paciente_id: Uuid,
    pub exame_ids: Vec<Uuid>,
    pub data: NaiveDate,
    #[serde(default)]
    pub analista: Option<String>,
    #[serde(default)]
    pub observacoes: Option<String>,
}

impl NovaRequisicao {
    pub fn new(paciente_id: Uuid, exame_ids: Vec<Uuid>, data: NaiveDate) -> Self {
        Self {
            paciente_id,
            exame_ids,
            data,
            analista: None,
            observacoes: None,
        }
    }
}

/// 适用字段：字段及其所属检查
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicableField {
    pub exame: Exame,
    pub campo: ExameCampo,
}

/// 检查选择变更
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionChange {
    pub exame_ids: Vec<Uuid>,
    pub added: Vec<Uuid>,
    pub removed: Vec<Uuid>,
}

impl SelectionChange {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// 申请单组合器
pub struct RequisitionComposer<'a> {
    catalog: &'a ExamCatalog,
}

impl<'a> RequisitionComposer<'a> {
    pub fn new(catalog: &'a ExamCatalog) -> Self {
        Self { catalog }
    }

    /// 为患者创建申请单
    pub fn new_requisicao(&self, paciente: &Paciente, nova: NovaRequisicao) -> Result<Requisicao> {
        let change = self.resolve_selection(&nova.exame_ids, &[])?;
        let now = Utc::now();

        Ok(Requisicao {
            id: Uuid::new_v4(),
            paciente_id: paciente.id,
            exame_ids: change.exame_ids,
            data: nova.data,
            status: RequisicaoStatus::Pendente,
            analista: nova.analista,
            observacoes: nova.observacoes,
            created_at: now,
            updated_at: now,
        })
    }

    /// 计算检查选择变更，仅允许待处理状态的申请单
    pub fn plan_selection(&self, requisicao: &Requisicao, requested: &[Uuid]) -> Result<SelectionChange> {
        if requisicao.status != RequisicaoStatus::Pendente {
            return Err(LabError::RequisicaoLocked {
                requisicao_id: requisicao.id,
                status: requisicao.status.to_string(),
            });
        }
        self.resolve_selection(requested, &requisicao.exame_ids)
    }

    /// 解析请求的检查选择
    ///
    /// 已加入的检查保持原有位置（即使已停用），新检查按请求顺序追加到末尾且必须处于启用状态。
    fn resolve_selection(&self, requested: &[Uuid], current: &[Uuid]) -> Result<SelectionChange> {
        let requested = dedup_preserving_order(requested);
        if requested.is_empty() {
            return Err(LabError::EmptySelection);
        }

        for exame_id in &requested {
            let exame = self
                .catalog
                .get_exame(*exame_id)
                .ok_or(LabError::UnknownExame(*exame_id))?;
            if !exame.activo && !current.contains(exame_id) {
                return Err(LabError::InactiveExame {
                    exame_id: exame.id,
                    codigo: exame.codigo.clone(),
                });
            }
        }

        let kept: Vec<Uuid> = current
            .iter()
            .copied()
            .filter(|id| requested.contains(id))
            .collect();
        let added: Vec<Uuid> = requested
            .iter()
            .copied()
            .filter(|id| !current.contains(id))
            .collect();
        let removed: Vec<Uuid> = current
            .iter()
            .copied()
            .filter(|id| !requested.contains(id))
            .collect();

        let mut exame_ids = kept;
        exame_ids.extend(added.iter().copied());

        Ok(SelectionChange {
            exame_ids,
            added,
            removed,
        })
    }

    /// 适用字段集合：检查按加入顺序，字段按声明顺序
    ///
    /// 每次调用都基于当前目录与当前选择重新计算。
    pub fn applicable_fields(&self, requisicao: &Requisicao) -> Result<Vec<ApplicableField>> {
        let mut fields = Vec::new();
        for exame_id in &requisicao.exame_ids {
            let exame = self
                .catalog
                .get_exame(*exame_id)
                .ok_or(LabError::UnknownExame(*exame_id))?;
            for campo in self.catalog.list_campos_for_exame(*exame_id)? {
                fields.push(ApplicableField {
                    exame: exame.clone(),
                    campo: campo.clone(),
                });
            }
        }
        Ok(fields)
    }
}
