//! 血常规/血糖申请单的端到端流程

use chrono::NaiveDate;
use lab_core::{LabError, RequisicaoStatus, TipoCampo};
use lab_workflow::{LabService, NovaRequisicao, NovoPaciente};

#[tokio::test]
async fn test_hemograma_glicemia_flow() {
    let service = LabService::default();

    let hemograma = service.define_exame("Hemograma", "HEM01", "Hematologia").await.unwrap();
    let hemoglobina = service
        .add_campo(hemograma.id, "Hemoglobina", TipoCampo::Numero)
        .await
        .unwrap();
    let leucocitos = service
        .add_campo(hemograma.id, "Leucocitos", TipoCampo::Numero)
        .await
        .unwrap();
    let glicemia = service.define_exame("Glicemia", "GLI01", "Bioquímica").await.unwrap();
    let glicose = service
        .add_campo(glicemia.id, "Glicose", TipoCampo::Numero)
        .await
        .unwrap();

    let ana = service.register_paciente(NovoPaciente::new("Ana")).await.unwrap();
    let data = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
    let r1 = service
        .create_requisicao(NovaRequisicao::new(ana.id, vec![hemograma.id], data))
        .await
        .unwrap();

    let fields = service.applicable_fields(r1.id).await.unwrap();
    let pairs: Vec<(&str, &str)> = fields
        .iter()
        .map(|f| (f.exame.nome.as_str(), f.campo.nome.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![("Hemograma", "Hemoglobina"), ("Hemograma", "Leucocitos")]
    );

    let err = service
        .record_resultado(r1.id, glicemia.id, glicose.id, "90")
        .await
        .unwrap_err();
    assert!(matches!(err, LabError::FieldNotApplicable { .. }));

    service
        .update_exam_selection(r1.id, &[hemograma.id, glicemia.id])
        .await
        .unwrap();
    let item = service
        .record_resultado(r1.id, glicemia.id, glicose.id, "90")
        .await
        .unwrap();
    assert_eq!(item.valor, "90");

    let fields = service.applicable_fields(r1.id).await.unwrap();
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[2].exame.id, glicemia.id);
    assert_eq!(fields[2].campo.id, glicose.id);

    // 同一字段再次录入只保留最后的值
    service
        .record_resultado(r1.id, glicemia.id, glicose.id, "95")
        .await
        .unwrap();
    service
        .record_resultado(r1.id, hemograma.id, hemoglobina.id, "13.4")
        .await
        .unwrap();
    service
        .record_resultado(r1.id, hemograma.id, leucocitos.id, "6,8")
        .await
        .unwrap();

    let concluded = service.conclude_requisicao(r1.id, Some("dra.silva")).await.unwrap();
    assert_eq!(concluded.status, RequisicaoStatus::Concluida);

    let snapshot = service.export_snapshot(r1.id).await.unwrap();
    assert_eq!(snapshot.paciente.nome, "Ana");
    assert_eq!(snapshot.exames.len(), 2);
    assert_eq!(snapshot.recorded_count(), 3);
    let glicose_item = snapshot.exames[1].campos[0].item.as_ref().unwrap();
    assert_eq!(glicose_item.valor, "95");
    assert_eq!(snapshot.exames[0].campos[1].item.as_ref().unwrap().valor, "6.8");

    let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
    assert_eq!(json["requisicao"]["status"], "concluida");
    assert_eq!(json["exames"][0]["campos"][0]["campo"]["tipo"], "number");
}
