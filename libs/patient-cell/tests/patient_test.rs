// libs/patient-cell/tests/patient_test.rs
use assert_matches::assert_matches;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patient_cell::models::{CreatePatientRequest, PatientError};
use patient_cell::services::patient::PatientService;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

const TOKEN: &str = "test-token";

fn service(uri: &str) -> PatientService {
    PatientService::new(&TestConfig::for_mock_server(uri).to_app_config())
}

fn signup_request(email: &str) -> CreatePatientRequest {
    CreatePatientRequest {
        first_name: "Ravi".to_string(),
        last_name: "Kumar".to_string(),
        email: email.to_string(),
        gender: Some("M".to_string()),
        date_of_birth: NaiveDate::from_ymd_opt(1990, 4, 12).unwrap(),
        blood_group: Some("O+".to_string()),
        address: None,
        city: Some("Pune".to_string()),
        state: None,
        country: None,
        pincode: Some("411001".to_string()),
        phone_number: Some("9876543210".to_string()),
    }
}

#[tokio::test]
async fn signup_completion_creates_the_profile() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("email", "eq.ravi@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::patient_row(&user_id.to_string(), "ravi@example.com")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let patient = service(&server.uri())
        .create_patient(user_id, signup_request("ravi@example.com"), TOKEN)
        .await
        .expect("profile creation should succeed");
    assert_eq!(patient.id, user_id);
    assert_eq!(patient.email, "ravi@example.com");
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("email", "eq.taken@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(&Uuid::new_v4().to_string(), "taken@example.com")
        ])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let err = service(&server.uri())
        .create_patient(user_id, signup_request("taken@example.com"), TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, PatientError::EmailTaken);
}

#[tokio::test]
async fn malformed_pincode_fails_before_any_request() {
    let server = MockServer::start().await;

    let mut request = signup_request("ravi@example.com");
    request.pincode = Some("41-100".to_string());

    let err = service(&server.uri())
        .create_patient(Uuid::new_v4(), request, TOKEN)
        .await
        .unwrap_err();
    assert_matches!(err, PatientError::ValidationError(_));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn dashboard_aggregates_bookings_and_history() {
    let server = MockServer::start().await;
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();
    let visit_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(&patient_id.to_string(), "ravi@example.com")
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(
                &Uuid::new_v4().to_string(),
                &doctor_id.to_string(),
                &patient_id.to_string(),
                "2099-01-05",
                "10:00:00",
                "confirmed",
            )
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patient_visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::visit_row(
                &visit_id.to_string(),
                &patient_id.to_string(),
                &doctor_id.to_string(),
                &Uuid::new_v4().to_string(),
            )
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/prescriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::prescription_row(
                &Uuid::new_v4().to_string(),
                &visit_id.to_string(),
                &doctor_id.to_string(),
                &patient_id.to_string(),
            )
        ])))
        .mount(&server)
        .await;

    let dashboard = service(&server.uri())
        .get_dashboard(patient_id, TOKEN)
        .await
        .expect("dashboard should load");

    assert_eq!(dashboard.patient.id, patient_id);
    assert_eq!(dashboard.upcoming_appointments.len(), 1);
    assert_eq!(dashboard.recent_visits.len(), 1);
    assert_eq!(dashboard.recent_prescriptions.len(), 1);
}
