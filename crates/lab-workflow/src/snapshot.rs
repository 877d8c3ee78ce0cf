//! 导出快照
//!
//! 为PDF导出组装只读数据，本模块不负责任何排版

use crate::requisition::ApplicableField;
use crate::results::ResultSheet;
use lab_core::{Exame, ExameCampo, Paciente, Requisicao, Result, ResultadoItem};
use serde::{Deserialize, Serialize};

/// 单个字段及其结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampoSnapshot {
    pub campo: ExameCampo,
    pub item: Option<ResultadoItem>,
}

/// 单个检查及其字段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExameSnapshot {
    pub exame: Exame,
    pub campos: Vec<CampoSnapshot>,
}

/// 申请单快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequisicaoSnapshot {
    pub requisicao: Requisicao,
    pub paciente: Paciente,
    pub exames: Vec<ExameSnapshot>,
}

impl RequisicaoSnapshot {
    /// 按申请单检查顺序组装，孤立结果项不会出现
    ///
    /// `exames` 为申请单当前选择的检查（按加入顺序），`fields` 为其适用字段。
    /// 没有声明字段的检查也会出现在快照中。
    pub fn assemble(
        requisicao: Requisicao,
        paciente: Paciente,
        exames: Vec<Exame>,
        fields: Vec<ApplicableField>,
        sheet: &ResultSheet,
    ) -> Self {
        let mut snapshots: Vec<ExameSnapshot> = exames
            .into_iter()
            .map(|exame| ExameSnapshot {
                exame,
                campos: Vec::new(),
            })
            .collect();

        for field in fields {
            let item = sheet.item_for(field.exame.id, field.campo.id).cloned();
            if let Some(snapshot) = snapshots.iter_mut().find(|s| s.exame.id == field.exame.id) {
                snapshot.campos.push(CampoSnapshot {
                    campo: field.campo,
                    item,
                });
            }
        }

        Self {
            requisicao,
            paciente,
            exames: snapshots,
        }
    }

    /// 已录入的字段数
    pub fn recorded_count(&self) -> usize {
        self.exames
            .iter()
            .flat_map(|e| e.campos.iter())
            .filter(|c| c.item.is_some())
            .count()
    }

    /// 交给PDF导出方的JSON文档
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
