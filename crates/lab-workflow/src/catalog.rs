//! 检查目录与字段目录
//!
//! 维护检查定义及每个检查独立声明的结果字段

use chrono::Utc;
use lab_core::utils::normalize_key;
use lab_core::validation::require_non_empty;
use lab_core::{Exame, ExameCampo, LabError, Result, TipoCampo};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// 默认报告周转时间（小时）
pub const DEFAULT_TRL_HORAS: u32 = 24;

/// 新建检查的参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NovoExame {
    pub nome: String,
    pub codigo: String,
    /// 为空时使用目录的默认科室
    #[serde(default)]
    pub setor: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub trl_horas: Option<u32>,
}

impl NovoExame {
    pub fn new(nome: impl Into<String>, codigo: impl Into<String>, setor: impl Into<String>) -> Self {
        Self {
            nome: nome.into(),
            codigo: codigo.into(),
            setor: setor.into(),
            descricao: None,
            trl_horas: None,
        }
    }
}

/// 新建字段的参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NovoCampo {
    pub nome: String,
    pub tipo: TipoCampo,
    #[serde(default)]
    pub unidade: Option<String>,
    #[serde(default)]
    pub valor_referencia: Option<String>,
}

impl NovoCampo {
    pub fn new(nome: impl Into<String>, tipo: TipoCampo) -> Self {
        Self {
            nome: nome.into(),
            tipo,
            unidade: None,
            valor_referencia: None,
        }
    }
}

/// 检查目录
///
/// 唯一性索引：检查代码全局唯一，字段名称在所属检查内唯一。
#[derive(Debug)]
pub struct ExamCatalog {
    exames: HashMap<Uuid, Exame>,
    codigos: HashMap<String, Uuid>,
    campos: HashMap<Uuid, ExameCampo>,
    campos_por_exame: HashMap<Uuid, Vec<Uuid>>,
    default_trl_horas: u32,
    default_setor: String,
}

impl ExamCatalog {
    /// 创建空目录
    pub fn new() -> Self {
        Self::with_default_trl(DEFAULT_TRL_HORAS)
    }

    pub fn with_default_trl(default_trl_horas: u32) -> Self {
        Self {
            exames: HashMap::new(),
            codigos: HashMap::new(),
            campos: HashMap::new(),
            campos_por_exame: HashMap::new(),
            default_trl_horas,
            default_setor: String::new(),
        }
    }

    /// 未指定科室的检查归入该科室
    pub fn with_default_setor(mut self, setor: impl Into<String>) -> Self {
        self.default_setor = setor.into().trim().to_string();
        self
    }

    /// 定义新检查
    pub fn define_exame(&mut self, nome: &str, codigo: &str, setor: &str) -> Result<Exame> {
        self.define_exame_with(NovoExame::new(nome, codigo, setor))
    }

    /// 使用完整参数定义新检查
    pub fn define_exame_with(&mut self, novo: NovoExame) -> Result<Exame> {
        let nome = require_non_empty(&novo.nome, "exame.nome")?;
        let codigo = require_non_empty(&novo.codigo, "exame.codigo")?;
        let key = normalize_key(&codigo);

        if self.codigos.contains_key(&key) {
            return Err(LabError::DuplicateCode { codigo });
        }

        let exame = Exame {
            id: Uuid::new_v4(),
            nome,
            codigo,
            setor: match novo.setor.trim() {
                "" => self.default_setor.clone(),
                setor => setor.to_string(),
            },
            activo: true,
            descricao: novo.descricao.filter(|d| !d.trim().is_empty()),
            trl_horas: novo.trl_horas.unwrap_or(self.default_trl_horas),
            created_at: Utc::now(),
        };

        self.codigos.insert(key, exame.id);
        self.campos_por_exame.insert(exame.id, Vec::new());
        self.exames.insert(exame.id, exame.clone());

        tracing::info!("Defined exame {} ({})", exame.codigo, exame.id);
        Ok(exame)
    }

    /// 为检查添加字段
    pub fn add_campo(&mut self, exame_id: Uuid, nome: &str, tipo: TipoCampo) -> Result<ExameCampo> {
        self.add_campo_with(exame_id, NovoCampo::new(nome, tipo))
    }

    /// 使用完整参数为检查添加字段
    pub fn add_campo_with(&mut self, exame_id: Uuid, novo: NovoCampo) -> Result<ExameCampo> {
        if !self.exames.contains_key(&exame_id) {
            return Err(LabError::UnknownExame(exame_id));
        }

        let nome = require_non_empty(&novo.nome, "campo.nome")?;
        let key = normalize_key(&nome);

        let ids = self.campos_por_exame.entry(exame_id).or_default();
        let duplicate = ids
            .iter()
            .filter_map(|id| self.campos.get(id))
            .any(|c| normalize_key(&c.nome) == key);
        if duplicate {
            return Err(LabError::DuplicateFieldName { exame_id, nome });
        }

        let ordem = ids
            .last()
            .and_then(|id| self.campos.get(id))
            .map(|c| c.ordem + 1)
            .unwrap_or(0);

        let campo = ExameCampo {
            id: Uuid::new_v4(),
            exame_id,
            nome,
            tipo: novo.tipo,
            unidade: novo.unidade.filter(|u| !u.trim().is_empty()),
            valor_referencia: novo.valor_referencia.filter(|v| !v.trim().is_empty()),
            ordem,
        };

        ids.push(campo.id);
        self.campos.insert(campo.id, campo.clone());

        tracing::info!("Added campo '{}' ({}) to exame {}", campo.nome, campo.tipo, exame_id);
        Ok(campo)
    }

    /// 停用检查，可重复调用
    pub fn deactivate_exame(&mut self, exame_id: Uuid) -> Result<()> {
        let exame = self
            .exames
            .get_mut(&exame_id)
            .ok_or(LabError::UnknownExame(exame_id))?;
        if exame.activo {
            exame.activo = false;
            tracing::info!("Deactivated exame {}", exame.codigo);
        }
        Ok(())
    }

    /// 重新启用检查
    pub fn reactivate_exame(&mut self, exame_id: Uuid) -> Result<()> {
        let exame = self
            .exames
            .get_mut(&exame_id)
            .ok_or(LabError::UnknownExame(exame_id))?;
        if !exame.activo {
            exame.activo = true;
            tracing::info!("Reactivated exame {}", exame.codigo);
        }
        Ok(())
    }

    /// 物理删除检查及其字段
    ///
    /// `requisicoes_referencing` 为仍引用该检查的申请单数量，大于0时拒绝删除。
    pub fn delete_exame(&mut self, exame_id: Uuid, requisicoes_referencing: usize) -> Result<Exame> {
        if !self.exames.contains_key(&exame_id) {
            return Err(LabError::UnknownExame(exame_id));
        }
        if requisicoes_referencing > 0 {
            return Err(LabError::ExameInUse {
                exame_id,
                requisicoes: requisicoes_referencing,
            });
        }

        let exame = self
            .exames
            .remove(&exame_id)
            .ok_or(LabError::UnknownExame(exame_id))?;
        self.codigos.remove(&normalize_key(&exame.codigo));
        for campo_id in self.campos_por_exame.remove(&exame_id).unwrap_or_default() {
            self.campos.remove(&campo_id);
        }

        tracing::info!("Deleted exame {} and its campos", exame.codigo);
        Ok(exame)
    }

    /// 删除字段
    ///
    /// `itens_referencing` 为引用该字段的结果项数量，大于0时拒绝删除。
    pub fn delete_campo(&mut self, campo_id: Uuid, itens_referencing: usize) -> Result<ExameCampo> {
        if !self.campos.contains_key(&campo_id) {
            return Err(LabError::UnknownCampo(campo_id));
        }
        if itens_referencing > 0 {
            return Err(LabError::CampoInUse { campo_id });
        }

        let campo = self
            .campos
            .remove(&campo_id)
            .ok_or(LabError::UnknownCampo(campo_id))?;
        if let Some(ids) = self.campos_por_exame.get_mut(&campo.exame_id) {
            ids.retain(|id| *id != campo_id);
        }

        tracing::info!("Deleted campo '{}' from exame {}", campo.nome, campo.exame_id);
        Ok(campo)
    }

    pub fn get_exame(&self, exame_id: Uuid) -> Option<&Exame> {
        self.exames.get(&exame_id)
    }

    pub fn get_campo(&self, campo_id: Uuid) -> Option<&ExameCampo> {
        self.campos.get(&campo_id)
    }

    /// 按代码查找检查
    pub fn find_by_codigo(&self, codigo: &str) -> Option<&Exame> {
        self.codigos
            .get(&normalize_key(codigo))
            .and_then(|id| self.exames.get(id))
    }

    /// 按名称排序的全部检查
    pub fn list_exames(&self) -> Vec<&Exame> {
        let mut exames: Vec<&Exame> = self.exames.values().collect();
        exames.sort_by(|a, b| a.nome.cmp(&b.nome).then_with(|| a.codigo.cmp(&b.codigo)));
        exames
    }

    /// 检查的字段，按声明顺序
    pub fn list_campos_for_exame(&self, exame_id: Uuid) -> Result<Vec<&ExameCampo>> {
        let ids = self
            .campos_por_exame
            .get(&exame_id)
            .ok_or(LabError::UnknownExame(exame_id))?;
        Ok(ids.iter().filter_map(|id| self.campos.get(id)).collect())
    }

    /// 目录中全部字段：检查按名称排序，字段按声明顺序
    pub fn all_campos(&self) -> Vec<&ExameCampo> {
        let campos = &self.campos;
        let por_exame = &self.campos_por_exame;
        self.list_exames()
            .into_iter()
            .flat_map(move |exame| {
                por_exame
                    .get(&exame.id)
                    .into_iter()
                    .flatten()
                    .filter_map(move |id| campos.get(id))
            })
            .collect()
    }

    pub fn exame_count(&self) -> usize {
        self.exames.len()
    }
}

impl Default for ExamCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_codigo_rejected() {
        let mut catalog = ExamCatalog::new();
        catalog.define_exame("Hemograma", "HEM01", "Hematologia").unwrap();

        let err = catalog.define_exame("Outro", " hem01 ", "Bioquímica").unwrap_err();
        assert!(matches!(err, LabError::DuplicateCode { .. }));
        assert_eq!(catalog.exame_count(), 1);
    }

    #[test]
    fn test_empty_setor_uses_default() {
        let mut catalog = ExamCatalog::new().with_default_setor(" Análises Clínicas ");
        let ureia = catalog.define_exame("Ureia", "URE01", "  ").unwrap();
        assert_eq!(ureia.setor, "Análises Clínicas");

        let hem = catalog.define_exame("Hemograma", "HEM01", "Hematologia").unwrap();
        assert_eq!(hem.setor, "Hematologia");
    }

    #[test]
    fn test_campos_keep_declaration_order() {
        let mut catalog = ExamCatalog::new();
        let hem = catalog.define_exame("Hemograma", "HEM01", "Hematologia").unwrap();
        catalog.add_campo(hem.id, "Hemoglobina", TipoCampo::Numero).unwrap();
        catalog.add_campo(hem.id, "Leucocitos", TipoCampo::Numero).unwrap();
        catalog.add_campo(hem.id, "Observação", TipoCampo::Texto).unwrap();

        let nomes: Vec<&str> = catalog
            .list_campos_for_exame(hem.id)
            .unwrap()
            .iter()
            .map(|c| c.nome.as_str())
            .collect();
        assert_eq!(nomes, vec!["Hemoglobina", "Leucocitos", "Observação"]);
    }

    #[test]
    fn test_field_names_scoped_per_exame() {
        let mut catalog = ExamCatalog::new();
        let hem = catalog.define_exame("Hemograma", "HEM01", "Hematologia").unwrap();
        let gli = catalog.define_exame("Glicemia", "GLI01", "Bioquímica").unwrap();

        catalog.add_campo(hem.id, "Resultado", TipoCampo::Numero).unwrap();
        catalog.add_campo(gli.id, "Resultado", TipoCampo::Numero).unwrap();

        let err = catalog.add_campo(hem.id, "RESULTADO", TipoCampo::Texto).unwrap_err();
        assert!(matches!(err, LabError::DuplicateFieldName { .. }));

        let err = catalog.add_campo(Uuid::new_v4(), "X", TipoCampo::Texto).unwrap_err();
        assert!(matches!(err, LabError::UnknownExame(_)));
    }

    #[test]
    fn test_deactivate_is_idempotent() {
        let mut catalog = ExamCatalog::new();
        let hem = catalog.define_exame("Hemograma", "HEM01", "Hematologia").unwrap();

        catalog.deactivate_exame(hem.id).unwrap();
        catalog.deactivate_exame(hem.id).unwrap();
        assert!(!catalog.get_exame(hem.id).unwrap().activo);

        catalog.reactivate_exame(hem.id).unwrap();
        assert!(catalog.get_exame(hem.id).unwrap().activo);
    }

    #[test]
    fn test_delete_exame_cascades_and_respects_references() {
        let mut catalog = ExamCatalog::new();
        let hem = catalog.define_exame("Hemograma", "HEM01", "Hematologia").unwrap();
        let campo = catalog.add_campo(hem.id, "Hemoglobina", TipoCampo::Numero).unwrap();

        let err = catalog.delete_exame(hem.id, 2).unwrap_err();
        assert!(matches!(err, LabError::ExameInUse { requisicoes: 2, .. }));

        catalog.delete_exame(hem.id, 0).unwrap();
        assert!(catalog.get_exame(hem.id).is_none());
        assert!(catalog.get_campo(campo.id).is_none());
        assert!(catalog.find_by_codigo("HEM01").is_none());

        // 代码释放后可以重新使用
        catalog.define_exame("Hemograma", "HEM01", "Hematologia").unwrap();
    }

    #[test]
    fn test_delete_campo() {
        let mut catalog = ExamCatalog::new();
        let hem = catalog.define_exame("Hemograma", "HEM01", "Hematologia").unwrap();
        let a = catalog.add_campo(hem.id, "Hemoglobina", TipoCampo::Numero).unwrap();
        let b = catalog.add_campo(hem.id, "Leucocitos", TipoCampo::Numero).unwrap();

        assert!(matches!(
            catalog.delete_campo(a.id, 1).unwrap_err(),
            LabError::CampoInUse { .. }
        ));
        catalog.delete_campo(a.id, 0).unwrap();

        let restantes = catalog.list_campos_for_exame(hem.id).unwrap();
        assert_eq!(restantes.len(), 1);
        assert_eq!(restantes[0].id, b.id);

        let c = catalog.add_campo(hem.id, "Plaquetas", TipoCampo::Inteiro).unwrap();
        assert!(c.ordem > b.ordem);
    }
}
