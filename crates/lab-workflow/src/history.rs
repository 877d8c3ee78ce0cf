//! 操作历史
//!
//! 只追加的审计记录，按写入顺序保存

use chrono::Utc;
use lab_core::{AcaoHistorico, HistoricoOperacao};
use uuid::Uuid;

/// 操作历史记录器
#[derive(Debug)]
pub struct OperationHistory {
    enabled: bool,
    entries: Vec<HistoricoOperacao>,
}

impl OperationHistory {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Vec::new(),
        }
    }

    /// 追加一条记录，禁用时忽略
    pub fn record(
        &mut self,
        requisicao_id: Uuid,
        utilizador: Option<&str>,
        acao: AcaoHistorico,
        detalhes: impl Into<String>,
    ) {
        if !self.enabled {
            return;
        }

        let entry = HistoricoOperacao {
            id: Uuid::new_v4(),
            requisicao_id,
            utilizador: utilizador.map(str::to_string),
            acao,
            detalhes: detalhes.into(),
            registado_em: Utc::now(),
        };
        tracing::debug!("History {:?} on requisicao {}", entry.acao, requisicao_id);
        self.entries.push(entry);
    }

    pub fn for_requisicao(&self, requisicao_id: Uuid) -> Vec<HistoricoOperacao> {
        self.entries
            .iter()
            .filter(|e| e.requisicao_id == requisicao_id)
            .cloned()
            .collect()
    }
}

impl Default for OperationHistory {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_filters_by_requisicao() {
        let mut history = OperationHistory::default();
        let r1 = Uuid::new_v4();
        let r2 = Uuid::new_v4();

        history.record(r1, Some("tecnico"), AcaoHistorico::CriacaoRequisicao, "criada");
        history.record(r2, None, AcaoHistorico::CriacaoRequisicao, "criada");
        history.record(r1, None, AcaoHistorico::AdicaoExames, "GLI01");

        let entries = history.for_requisicao(r1);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].acao, AcaoHistorico::CriacaoRequisicao);
        assert_eq!(entries[0].utilizador.as_deref(), Some("tecnico"));
        assert_eq!(entries[1].acao, AcaoHistorico::AdicaoExames);
    }

    #[test]
    fn test_disabled_history_records_nothing() {
        let mut history = OperationHistory::new(false);
        let requisicao_id = Uuid::new_v4();
        history.record(requisicao_id, None, AcaoHistorico::CriacaoRequisicao, "criada");
        assert!(history.for_requisicao(requisicao_id).is_empty());
    }
}
