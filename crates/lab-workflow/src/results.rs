//! 结果录入
//!
//! 校验并保存申请单中各字段的结果值。每个 (结果分组, 字段) 只有一个结果项，
//! 重复录入覆盖旧值。

use crate::catalog::ExamCatalog;
use crate::requisition::ApplicableField;
use chrono::Utc;
use lab_core::validation::{validate_valor, ValueRules};
use lab_core::{
    ExameCampo, LabError, Requisicao, RequisicaoStatus, Result, Resultado, ResultadoItem,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// 录入结果的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Created,
    Updated,
}

/// 录入后的结果项
#[derive(Debug, Clone)]
pub struct RecordedItem {
    pub item: ResultadoItem,
    pub outcome: RecordOutcome,
    pub previous_valor: Option<String>,
}

/// 申请单完成度
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionStatus {
    pub total: usize,
    pub recorded: usize,
    /// 尚未录入的 (检查, 字段)
    pub missing: Vec<(Uuid, Uuid)>,
}

impl CompletionStatus {
    /// 所有适用字段都已录入，可以转为已完成
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// 单个申请单的结果表
#[derive(Debug, Clone, Default)]
pub struct ResultSheet {
    resultados: HashMap<Uuid, Resultado>,              // 按检查ID
    itens: HashMap<(Uuid, Uuid), ResultadoItem>,       // 按 (结果分组ID, 字段ID)
}

impl ResultSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resultado_for(&self, exame_id: Uuid) -> Option<&Resultado> {
        self.resultados.get(&exame_id)
    }

    /// 某检查字段已录入的结果项
    pub fn item_for(&self, exame_id: Uuid, campo_id: Uuid) -> Option<&ResultadoItem> {
        let resultado = self.resultados.get(&exame_id)?;
        self.itens.get(&(resultado.id, campo_id))
    }

    pub fn item_count(&self) -> usize {
        self.itens.len()
    }

    /// 引用某字段的结果项数量
    pub fn references_campo(&self, campo_id: Uuid) -> usize {
        self.itens
            .values()
            .filter(|item| item.exame_campo_id == campo_id)
            .count()
    }

    /// 按 (结果分组, 字段) 写入或覆盖
    fn upsert(&mut self, requisicao_id: Uuid, campo: &ExameCampo, valor: String) -> RecordedItem {
        let now = Utc::now();
        let resultado = self
            .resultados
            .entry(campo.exame_id)
            .or_insert_with(|| Resultado {
                id: Uuid::new_v4(),
                requisicao_id,
                exame_id: campo.exame_id,
                created_at: now,
            });

        let key = (resultado.id, campo.id);
        match self.itens.get_mut(&key) {
            Some(item) => {
                let previous = std::mem::replace(&mut item.valor, valor);
                if previous != item.valor {
                    // 值变化后需要重新审核
                    item.validado = false;
                    item.validado_por = None;
                    item.data_validacao = None;
                }
                item.atualizado_em = now;
                RecordedItem {
                    item: item.clone(),
                    outcome: RecordOutcome::Updated,
                    previous_valor: Some(previous),
                }
            }
            None => {
                let item = ResultadoItem {
                    id: Uuid::new_v4(),
                    resultado_id: resultado.id,
                    exame_campo_id: campo.id,
                    valor,
                    unidade: campo.unidade.clone(),
                    valor_referencia: campo.valor_referencia.clone(),
                    validado: false,
                    validado_por: None,
                    data_validacao: None,
                    atualizado_em: now,
                };
                self.itens.insert(key, item.clone());
                RecordedItem {
                    item,
                    outcome: RecordOutcome::Created,
                    previous_valor: None,
                }
            }
        }
    }

    /// 完成度，只统计适用字段
    pub fn completion_status(&self, fields: &[ApplicableField]) -> CompletionStatus {
        let missing: Vec<(Uuid, Uuid)> = fields
            .iter()
            .filter(|f| self.item_for(f.exame.id, f.campo.id).is_none())
            .map(|f| (f.exame.id, f.campo.id))
            .collect();

        CompletionStatus {
            total: fields.len(),
            recorded: fields.len() - missing.len(),
            missing,
        }
    }

    /// 孤立结果项：所属检查已不在申请单选择中
    pub fn orphaned_items(&self, requisicao: &Requisicao) -> Vec<&ResultadoItem> {
        let orphan_groups: Vec<Uuid> = self
            .resultados
            .values()
            .filter(|r| !requisicao.includes_exame(r.exame_id))
            .map(|r| r.id)
            .collect();

        self.itens
            .values()
            .filter(|item| orphan_groups.contains(&item.resultado_id))
            .collect()
    }

    /// 显式清除孤立结果项，返回清除数量
    pub fn purge_orphans(&mut self, requisicao: &Requisicao) -> usize {
        let orphan_groups: Vec<Uuid> = self
            .resultados
            .values()
            .filter(|r| !requisicao.includes_exame(r.exame_id))
            .map(|r| r.id)
            .collect();

        let before = self.itens.len();
        self.itens
            .retain(|(resultado_id, _), _| !orphan_groups.contains(resultado_id));
        self.resultados
            .retain(|_, r| !orphan_groups.contains(&r.id));
        before - self.itens.len()
    }

    /// 审核结果项
    pub fn validate_item(
        &mut self,
        requisicao: &Requisicao,
        item_id: Uuid,
        utilizador: &str,
    ) -> Result<ResultadoItem> {
        let item = self
            .itens
            .values_mut()
            .find(|item| item.id == item_id)
            .ok_or(LabError::UnknownResultadoItem(item_id))?;

        let resultado = self
            .resultados
            .values()
            .find(|r| r.id == item.resultado_id)
            .ok_or(LabError::UnknownResultadoItem(item_id))?;
        if !requisicao.includes_exame(resultado.exame_id) {
            return Err(LabError::FieldNotApplicable {
                requisicao_id: requisicao.id,
                exame_id: resultado.exame_id,
                campo_id: item.exame_campo_id,
            });
        }

        let now = Utc::now();
        item.validado = true;
        item.validado_por = Some(utilizador.to_string());
        item.data_validacao = Some(now);
        Ok(item.clone())
    }
}

/// 结果录入器
pub struct ResultRecorder<'a> {
    catalog: &'a ExamCatalog,
    rules: &'a ValueRules,
}

impl<'a> ResultRecorder<'a> {
    pub fn new(catalog: &'a ExamCatalog, rules: &'a ValueRules) -> Self {
        Self { catalog, rules }
    }

    /// 录入结果值
    ///
    /// 依次检查：申请单未取消、检查在申请单中、字段属于该检查、值符合字段类型。
    /// 所有检查通过后才写入，失败时结果表保持不变。
    pub fn record(
        &self,
        requisicao: &Requisicao,
        sheet: &mut ResultSheet,
        exame_id: Uuid,
        campo_id: Uuid,
        valor: &str,
    ) -> Result<RecordedItem> {
        if requisicao.status == RequisicaoStatus::Cancelada {
            return Err(LabError::RequisicaoLocked {
                requisicao_id: requisicao.id,
                status: requisicao.status.to_string(),
            });
        }

        let not_applicable = || LabError::FieldNotApplicable {
            requisicao_id: requisicao.id,
            exame_id,
            campo_id,
        };

        if !requisicao.includes_exame(exame_id) {
            return Err(not_applicable());
        }

        let campo = self
            .catalog
            .get_campo(campo_id)
            .filter(|c| c.exame_id == exame_id)
            .ok_or_else(not_applicable)?;

        let valor = validate_valor(campo, valor, self.rules)?;
        Ok(sheet.upsert(requisicao.id, campo, valor))
    }
}
