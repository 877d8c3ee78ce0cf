//! 初始数据加载
//!
//! 从JSON文件或内置演示数据建立检查目录、患者和申请单

use anyhow::{Context, Result};
use chrono::NaiveDate;
use lab_core::TipoCampo;
use lab_workflow::{LabService, NovaRequisicao, NovoCampo, NovoExame, NovoPaciente};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// 初始数据文件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub exames: Vec<SeedExame>,
    #[serde(default)]
    pub pacientes: Vec<NovoPaciente>,
    #[serde(default)]
    pub requisicoes: Vec<SeedRequisicao>,
}

/// 检查及其字段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedExame {
    #[serde(flatten)]
    pub exame: NovoExame,
    #[serde(default)]
    pub campos: Vec<NovoCampo>,
}

/// 申请单，患者按姓名、检查按代码引用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRequisicao {
    pub paciente: String,
    pub exames: Vec<String>,
    pub data: NaiveDate,
    #[serde(default)]
    pub analista: Option<String>,
    /// 录入结果前替换检查选择
    #[serde(default)]
    pub selecao: Option<Vec<String>>,
    #[serde(default)]
    pub resultados: Vec<SeedResultado>,
    #[serde(default)]
    pub concluir: bool,
}

/// 单个结果值，字段按名称引用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedResultado {
    pub exame: String,
    pub campo: String,
    pub valor: String,
}

impl SeedFile {
    /// 读取JSON初始数据文件
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .context(format!("Failed to read seed file: {}", path.display()))?;
        serde_json::from_str(&content).context("Failed to parse seed file")
    }
}

/// 内置演示数据：血常规申请单在录入前追加血糖检查
pub fn built_in_seed() -> SeedFile {
    let mut hemoglobina = NovoCampo::new("Hemoglobina", TipoCampo::Numero);
    hemoglobina.unidade = Some("g/dL".to_string());
    hemoglobina.valor_referencia = Some("12-16".to_string());
    let mut leucocitos = NovoCampo::new("Leucocitos", TipoCampo::Numero);
    leucocitos.unidade = Some("10^3/uL".to_string());
    let mut glicose = NovoCampo::new("Glicose", TipoCampo::Numero);
    glicose.unidade = Some("mg/dL".to_string());
    glicose.valor_referencia = Some("70-99".to_string());

    SeedFile {
        exames: vec![
            SeedExame {
                exame: NovoExame::new("Hemograma", "HEM01", "Hematologia"),
                campos: vec![hemoglobina, leucocitos],
            },
            SeedExame {
                exame: NovoExame::new("Glicemia", "GLI01", "Bioquímica"),
                campos: vec![glicose],
            },
        ],
        pacientes: vec![NovoPaciente::new("Ana")],
        requisicoes: vec![SeedRequisicao {
            paciente: "Ana".to_string(),
            exames: vec!["HEM01".to_string()],
            data: chrono::Utc::now().date_naive(),
            analista: Some("dra.silva".to_string()),
            selecao: Some(vec!["HEM01".to_string(), "GLI01".to_string()]),
            resultados: vec![
                SeedResultado::new("HEM01", "Hemoglobina", "13.4"),
                SeedResultado::new("HEM01", "Leucocitos", "6,8"),
                SeedResultado::new("GLI01", "Glicose", "90"),
                SeedResultado::new("GLI01", "Glicose", "95"),
            ],
            concluir: true,
        }],
    }
}

impl SeedResultado {
    fn new(exame: &str, campo: &str, valor: &str) -> Self {
        Self {
            exame: exame.to_string(),
            campo: campo.to_string(),
            valor: valor.to_string(),
        }
    }
}

/// 将初始数据写入服务，返回创建的申请单ID
pub async fn apply_seed(service: &LabService, seed: &SeedFile) -> Result<Vec<Uuid>> {
    for entry in &seed.exames {
        let exame = service
            .define_exame_with(entry.exame.clone())
            .await
            .context(format!("Failed to define exame {}", entry.exame.codigo))?;
        for campo in &entry.campos {
            service
                .add_campo_with(exame.id, campo.clone())
                .await
                .context(format!("Failed to add campo {} to {}", campo.nome, exame.codigo))?;
        }
        debug!("Seeded exame {} with {} campos", exame.codigo, entry.campos.len());
    }

    let mut pacientes: HashMap<String, Uuid> = HashMap::new();
    for novo in &seed.pacientes {
        let paciente = service
            .register_paciente(novo.clone())
            .await
            .context(format!("Failed to register paciente {}", novo.nome))?;
        pacientes.insert(paciente.nome.to_lowercase(), paciente.id);
    }

    let mut ids = Vec::with_capacity(seed.requisicoes.len());
    for entry in &seed.requisicoes {
        let paciente_id = *pacientes
            .get(&entry.paciente.trim().to_lowercase())
            .ok_or_else(|| anyhow::anyhow!("Seed references unknown paciente: {}", entry.paciente))?;

        let exame_ids = resolve_codigos(service, &entry.exames).await?;
        let mut nova = NovaRequisicao::new(paciente_id, exame_ids, entry.data);
        nova.analista = entry.analista.clone();
        let requisicao = service.create_requisicao(nova).await?;

        if let Some(selecao) = &entry.selecao {
            let exame_ids = resolve_codigos(service, selecao).await?;
            service.update_exam_selection(requisicao.id, &exame_ids).await?;
        }

        for resultado in &entry.resultados {
            let (exame_id, campo_id) = resolve_campo(service, resultado).await?;
            service
                .record_resultado(requisicao.id, exame_id, campo_id, &resultado.valor)
                .await
                .context(format!(
                    "Failed to record {}/{} = {}",
                    resultado.exame, resultado.campo, resultado.valor
                ))?;
        }

        if entry.concluir {
            service
                .conclude_requisicao(requisicao.id, entry.analista.as_deref())
                .await?;
        }
        ids.push(requisicao.id);
    }

    info!(
        "Seed applied: {} exames, {} pacientes, {} requisicoes",
        seed.exames.len(),
        seed.pacientes.len(),
        ids.len()
    );
    Ok(ids)
}

async fn resolve_codigos(service: &LabService, codigos: &[String]) -> Result<Vec<Uuid>> {
    let mut ids = Vec::with_capacity(codigos.len());
    for codigo in codigos {
        let exame = service
            .find_exame_by_codigo(codigo)
            .await
            .ok_or_else(|| anyhow::anyhow!("Seed references unknown exame code: {}", codigo))?;
        ids.push(exame.id);
    }
    Ok(ids)
}

async fn resolve_campo(service: &LabService, resultado: &SeedResultado) -> Result<(Uuid, Uuid)> {
    let exame = service
        .find_exame_by_codigo(&resultado.exame)
        .await
        .ok_or_else(|| anyhow::anyhow!("Seed references unknown exame code: {}", resultado.exame))?;
    let campos = service.list_campos_for_exame(exame.id).await?;
    let campo = campos
        .iter()
        .find(|c| c.nome.eq_ignore_ascii_case(resultado.campo.trim()))
        .ok_or_else(|| {
            anyhow::anyhow!("Exame {} has no campo named {}", exame.codigo, resultado.campo)
        })?;
    Ok((exame.id, campo.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lab_core::RequisicaoStatus;
    use lab_workflow::ServiceSettings;

    #[tokio::test]
    async fn test_built_in_seed() {
        let service = LabService::default();
        let ids = apply_seed(&service, &built_in_seed()).await.unwrap();
        assert_eq!(ids.len(), 1);

        let snapshot = service.export_snapshot(ids[0]).await.unwrap();
        assert_eq!(snapshot.requisicao.status, RequisicaoStatus::Concluida);
        assert_eq!(snapshot.exames.len(), 2);
        assert_eq!(snapshot.recorded_count(), 3);
        assert_eq!(snapshot.exames[1].campos[0].item.as_ref().unwrap().valor, "95");
    }

    #[tokio::test]
    async fn test_json_seed_accepts_legacy_field_types() {
        let seed: SeedFile = serde_json::from_str(
            r#"{
                "exames": [
                    {"nome": "Ureia", "codigo": "URE01",
                     "campos": [{"nome": "Ureia", "tipo": "NUM"},
                                {"nome": "Observacao", "tipo": "TXT"}]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(seed.exames[0].campos[0].tipo, TipoCampo::Numero);
        assert_eq!(seed.exames[0].campos[1].tipo, TipoCampo::Texto);

        let service = LabService::new(ServiceSettings {
            default_setor: "Bioquímica".to_string(),
            ..ServiceSettings::default()
        });
        apply_seed(&service, &seed).await.unwrap();
        let ureia = service.find_exame_by_codigo("URE01").await.unwrap();
        assert_eq!(ureia.setor, "Bioquímica");
        let campos = service.list_campos_for_exame(ureia.id).await.unwrap();
        assert_eq!(campos[0].tipo, TipoCampo::Numero);

        let bad = serde_json::from_str::<SeedFile>(
            r#"{"exames": [{"nome": "X", "codigo": "X1", "setor": "Y",
                            "campos": [{"nome": "Z", "tipo": "COLOR"}]}]}"#,
        );
        assert!(bad.is_err());
    }

    #[tokio::test]
    async fn test_json_seed_with_unknown_campo_fails() {
        let seed: SeedFile = serde_json::from_str(
            r#"{
                "exames": [
                    {"nome": "Ureia", "codigo": "URE01", "setor": "Bioquímica",
                     "campos": [{"nome": "Ureia", "tipo": "number", "unidade": "mg/dL"}]}
                ],
                "pacientes": [{"nome": "Joao", "genero": "M"}],
                "requisicoes": [
                    {"paciente": "Joao", "exames": ["URE01"], "data": "2024-06-01",
                     "resultados": [{"exame": "URE01", "campo": "Creatinina", "valor": "1"}]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(seed.exames[0].campos.len(), 1);

        let service = LabService::default();
        let err = apply_seed(&service, &seed).await.unwrap_err();
        assert!(err.to_string().contains("Creatinina"));
        assert_eq!(service.requisicao_count().await, 1);
    }
}
