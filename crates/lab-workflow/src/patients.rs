//! 患者登记

use chrono::{NaiveDate, Utc};
use lab_core::utils::normalize_key;
use lab_core::validation::require_non_empty;
use lab_core::{Genero, LabError, Paciente, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// 登记患者的参数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NovoPaciente {
    pub nome: String,
    #[serde(default)]
    pub numero_id: Option<String>,
    #[serde(default)]
    pub genero: Option<Genero>,
    #[serde(default)]
    pub data_nascimento: Option<NaiveDate>,
}

impl NovoPaciente {
    pub fn new(nome: impl Into<String>) -> Self {
        Self {
            nome: nome.into(),
            ..Self::default()
        }
    }
}

/// 患者登记表
#[derive(Debug, Default)]
pub struct PatientRegistry {
    pacientes: HashMap<Uuid, Paciente>,
    numeros_id: HashMap<String, Uuid>,
}

impl PatientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记新患者，`hoje` 用于校验出生日期
    pub fn register_paciente(&mut self, novo: NovoPaciente, hoje: NaiveDate) -> Result<Paciente> {
        let nome = require_non_empty(&novo.nome, "paciente.nome")?;

        if let Some(nascimento) = novo.data_nascimento {
            if nascimento > hoje {
                return Err(LabError::Validation(
                    "paciente.data_nascimento cannot be in the future".to_string(),
                ));
            }
        }

        let numero_id = novo
            .numero_id
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if let Some(numero) = &numero_id {
            if self.numeros_id.contains_key(&normalize_key(numero)) {
                return Err(LabError::DuplicateNumeroId(numero.clone()));
            }
        }

        let paciente = Paciente {
            id: Uuid::new_v4(),
            nome,
            activo: true,
            numero_id,
            genero: novo.genero,
            data_nascimento: novo.data_nascimento,
            created_at: Utc::now(),
        };

        if let Some(numero) = &paciente.numero_id {
            self.numeros_id.insert(normalize_key(numero), paciente.id);
        }
        self.pacientes.insert(paciente.id, paciente.clone());

        tracing::info!("Registered paciente {}", paciente.id);
        Ok(paciente)
    }

    /// 停用患者，可重复调用
    pub fn deactivate_paciente(&mut self, paciente_id: Uuid) -> Result<()> {
        let paciente = self
            .pacientes
            .get_mut(&paciente_id)
            .ok_or(LabError::UnknownPaciente(paciente_id))?;
        paciente.activo = false;
        Ok(())
    }

    pub fn get(&self, paciente_id: Uuid) -> Option<&Paciente> {
        self.pacientes.get(&paciente_id)
    }

    /// 获取可接受新申请单的患者
    pub fn require_active(&self, paciente_id: Uuid) -> Result<&Paciente> {
        let paciente = self
            .pacientes
            .get(&paciente_id)
            .ok_or(LabError::UnknownPaciente(paciente_id))?;
        if !paciente.activo {
            return Err(LabError::InactivePaciente(paciente_id));
        }
        Ok(paciente)
    }

    /// 按名称排序
    pub fn list(&self) -> Vec<&Paciente> {
        let mut pacientes: Vec<&Paciente> = self.pacientes.values().collect();
        pacientes.sort_by(|a, b| a.nome.cmp(&b.nome));
        pacientes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hoje() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn test_register_and_deactivate() {
        let mut registry = PatientRegistry::new();
        let ana = registry.register_paciente(NovoPaciente::new("Ana"), hoje()).unwrap();
        assert!(registry.require_active(ana.id).is_ok());

        registry.deactivate_paciente(ana.id).unwrap();
        assert!(matches!(
            registry.require_active(ana.id).unwrap_err(),
            LabError::InactivePaciente(_)
        ));
        assert!(matches!(
            registry.require_active(Uuid::new_v4()).unwrap_err(),
            LabError::UnknownPaciente(_)
        ));
    }

    #[test]
    fn test_nome_required() {
        let mut registry = PatientRegistry::new();
        let err = registry.register_paciente(NovoPaciente::new("   "), hoje()).unwrap_err();
        assert!(matches!(err, LabError::Validation(_)));
    }

    #[test]
    fn test_numero_id_unique_and_birth_date_checked() {
        let mut registry = PatientRegistry::new();
        let mut novo = NovoPaciente::new("Ana");
        novo.numero_id = Some("1234567890".to_string());
        registry.register_paciente(novo.clone(), hoje()).unwrap();

        novo.nome = "Outra Ana".to_string();
        assert!(matches!(
            registry.register_paciente(novo, hoje()).unwrap_err(),
            LabError::DuplicateNumeroId(_)
        ));

        let mut futuro = NovoPaciente::new("Bebé");
        futuro.data_nascimento = NaiveDate::from_ymd_opt(2030, 1, 1);
        assert!(registry.register_paciente(futuro, hoje()).is_err());
    }
}
