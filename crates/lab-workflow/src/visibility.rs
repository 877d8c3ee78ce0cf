//! 字段可见性
//!
//! 根据界面当前勾选的检查，把全部字段划分为可见（可编辑）与隐藏两部分。
//! 纯函数，不读写任何状态；选择可以与已保存的申请单不同。

use lab_core::{ExameCampo, ResultadoItem};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// 单个字段的可见性
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldVisibility {
    pub exame_id: Uuid,
    pub campo_id: Uuid,
    pub visible: bool,
}

/// 字段可见性及申请单中已保存的结果项
///
/// 隐藏字段的结果项原样保留，重新勾选检查后再次显示。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldState {
    #[serde(flatten)]
    pub visibility: FieldVisibility,
    pub item: Option<ResultadoItem>,
}

/// 可见性划分结果，保持输入字段的顺序
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VisibilityPartition {
    pub fields: Vec<FieldVisibility>,
}

impl VisibilityPartition {
    pub fn visible(&self) -> impl Iterator<Item = &FieldVisibility> {
        self.fields.iter().filter(|f| f.visible)
    }

    pub fn hidden(&self) -> impl Iterator<Item = &FieldVisibility> {
        self.fields.iter().filter(|f| !f.visible)
    }

    /// 未知字段视为隐藏
    pub fn is_visible(&self, campo_id: Uuid) -> bool {
        self.fields
            .iter()
            .any(|f| f.campo_id == campo_id && f.visible)
    }
}

/// 计算可见性划分
pub fn visibility_partition<'a, I>(campos: I, selected_exame_ids: &[Uuid]) -> VisibilityPartition
where
    I: IntoIterator<Item = &'a ExameCampo>,
{
    let selected: HashSet<Uuid> = selected_exame_ids.iter().copied().collect();
    let fields = campos
        .into_iter()
        .map(|campo| FieldVisibility {
            exame_id: campo.exame_id,
            campo_id: campo.id,
            visible: selected.contains(&campo.exame_id),
        })
        .collect();

    VisibilityPartition { fields }
}
