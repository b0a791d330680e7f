// libs/visit-cell/tests/visit_test.rs
use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};
use visit_cell::models::{CreatePrescriptionRequest, RecordSymptomsRequest, VisitError};
use visit_cell::services::visit::VisitService;

const TOKEN: &str = "test-token";

fn service(uri: &str) -> VisitService {
    VisitService::new(&TestConfig::for_mock_server(uri).to_app_config())
}

async fn mount_appointment(server: &MockServer, appointment_id: &str, status: &str) -> (String, String) {
    let doctor_id = Uuid::new_v4().to_string();
    let patient_id = Uuid::new_v4().to_string();
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                appointment_id,
                &doctor_id,
                &patient_id,
                "2026-08-31",
                "10:00:00",
                status,
            )
        ])))
        .mount(server)
        .await;
    (doctor_id, patient_id)
}

#[tokio::test]
async fn first_access_creates_the_visit() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let visit_id = Uuid::new_v4();

    let (doctor_id, patient_id) =
        mount_appointment(&server, &appointment_id.to_string(), "confirmed").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patient_visits"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::visit_row(
                &visit_id.to_string(),
                &patient_id,
                &doctor_id,
                &appointment_id.to_string(),
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let visit = service(&server.uri())
        .get_or_create_for_appointment(appointment_id, TOKEN)
        .await
        .expect("visit should be created");

    assert_eq!(visit.id, visit_id);
    assert_eq!(visit.appointment_id, Some(appointment_id));
}

#[tokio::test]
async fn existing_visit_is_returned_without_insert() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let visit_id = Uuid::new_v4();

    let (doctor_id, patient_id) =
        mount_appointment(&server, &appointment_id.to_string(), "confirmed").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::visit_row(
                &visit_id.to_string(),
                &patient_id,
                &doctor_id,
                &appointment_id.to_string(),
            )
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patient_visits"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let visit = service(&server.uri())
        .get_or_create_for_appointment(appointment_id, TOKEN)
        .await
        .expect("existing visit should be returned");
    assert_eq!(visit.id, visit_id);
}

#[tokio::test]
async fn visit_requires_a_checked_in_appointment() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();

    mount_appointment(&server, &appointment_id.to_string(), "pending").await;

    let err = service(&server.uri())
        .get_or_create_for_appointment(appointment_id, TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, VisitError::AppointmentNotConfirmed);
}

#[tokio::test]
async fn symptoms_are_rejected_once_the_appointment_is_canceled() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let visit_id = Uuid::new_v4();

    let (doctor_id, patient_id) =
        mount_appointment(&server, &appointment_id.to_string(), "canceled").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::visit_row(
                &visit_id.to_string(),
                &patient_id,
                &doctor_id,
                &appointment_id.to_string(),
            )
        ])))
        .mount(&server)
        .await;

    let request = RecordSymptomsRequest {
        symptoms: "Persistent cough".to_string(),
        notes: None,
    };
    let err = service(&server.uri())
        .record_symptoms(visit_id, request, TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, VisitError::AppointmentNotConfirmed);
}

#[tokio::test]
async fn prescription_requires_a_medicine_name() {
    let server = MockServer::start().await;

    let request = CreatePrescriptionRequest {
        medicine_name: "   ".to_string(),
        dosage: None,
        frequency: None,
        duration_days: None,
        notes: None,
    };
    let err = service(&server.uri())
        .add_prescription(Uuid::new_v4(), request, TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, VisitError::ValidationError(_));
}

#[tokio::test]
async fn prescription_is_issued_against_a_confirmed_appointment() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4();
    let visit_id = Uuid::new_v4();
    let prescription_id = Uuid::new_v4();

    let (doctor_id, patient_id) =
        mount_appointment(&server, &appointment_id.to_string(), "confirmed").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::visit_row(
                &visit_id.to_string(),
                &patient_id,
                &doctor_id,
                &appointment_id.to_string(),
            )
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/prescriptions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::prescription_row(
                &prescription_id.to_string(),
                &visit_id.to_string(),
                &doctor_id,
                &patient_id,
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let request = CreatePrescriptionRequest {
        medicine_name: "Paracetamol 500mg".to_string(),
        dosage: Some("1 tablet".to_string()),
        frequency: Some("twice daily".to_string()),
        duration_days: Some(5),
        notes: None,
    };
    let prescription = service(&server.uri())
        .add_prescription(visit_id, request, TOKEN)
        .await
        .expect("prescription should be issued");
    assert_eq!(prescription.id, prescription_id);
    assert_eq!(prescription.visit_id, visit_id);
}
