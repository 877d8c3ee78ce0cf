//! 申请单状态机
//!
//! 管理申请单状态转换，状态只能单向前进

use lab_core::{LabError, RequisicaoStatus, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 申请单状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RequisicaoEvent {
    Concluir,
    Cancelar,
}

/// 申请单状态机
#[derive(Debug)]
pub struct RequisicaoStateMachine {
    transitions: HashMap<(RequisicaoStatus, RequisicaoEvent), RequisicaoStatus>,
}

impl RequisicaoStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        transitions.insert(
            (RequisicaoStatus::Pendente, RequisicaoEvent::Concluir),
            RequisicaoStatus::Concluida,
        );
        transitions.insert(
            (RequisicaoStatus::Pendente, RequisicaoEvent::Cancelar),
            RequisicaoStatus::Cancelada,
        );

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: RequisicaoStatus, event: RequisicaoEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: RequisicaoStatus, event: RequisicaoEvent) -> Result<RequisicaoStatus> {
        self.transitions
            .get(&(from, event))
            .copied()
            .ok_or_else(|| LabError::InvalidStateTransition {
                from: from.to_string(),
                event: format!("{:?}", event),
            })
    }

    /// 获取状态的所有可能事件
    pub fn get_possible_events(&self, current: RequisicaoStatus) -> Vec<RequisicaoEvent> {
        self.transitions
            .keys()
            .filter(|(state, _)| *state == current)
            .map(|(_, event)| *event)
            .collect()
    }
}

impl Default for RequisicaoStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let sm = RequisicaoStateMachine::new();

        assert!(sm.can_transition(RequisicaoStatus::Pendente, RequisicaoEvent::Concluir));
        assert!(sm.can_transition(RequisicaoStatus::Pendente, RequisicaoEvent::Cancelar));
        assert_eq!(sm.get_possible_events(RequisicaoStatus::Pendente).len(), 2);
    }

    #[test]
    fn test_no_reverse_transitions() {
        let sm = RequisicaoStateMachine::new();

        assert!(!sm.can_transition(RequisicaoStatus::Concluida, RequisicaoEvent::Cancelar));
        assert!(!sm.can_transition(RequisicaoStatus::Cancelada, RequisicaoEvent::Concluir));
        assert!(sm.get_possible_events(RequisicaoStatus::Cancelada).is_empty());
    }

    #[test]
    fn test_state_execution() {
        let sm = RequisicaoStateMachine::new();

        let result = sm.transition(RequisicaoStatus::Pendente, RequisicaoEvent::Concluir);
        assert_eq!(result.unwrap(), RequisicaoStatus::Concluida);

        let result = sm.transition(RequisicaoStatus::Concluida, RequisicaoEvent::Concluir);
        assert!(matches!(result, Err(LabError::InvalidStateTransition { .. })));
    }
}
