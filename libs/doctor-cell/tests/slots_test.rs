// libs/doctor-cell/tests/slots_test.rs
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::services::slots::SlotService;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

const TOKEN: &str = "test-token";

fn future_monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 31).unwrap()
}

fn service(uri: &str) -> SlotService {
    SlotService::new(&TestConfig::for_mock_server(uri).to_app_config())
}

async fn mount_doctor(server: &MockServer, doctor_id: &str, step: i32, cap: i32) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(doctor_id, step, cap)
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn slot_search_walks_the_working_hours() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    mount_doctor(&server, &doctor_id.to_string(), 30, 0).await;

    // Monday 09:00-11:00, with 10:00 already taken.
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_working_hours"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::working_hours_row(&doctor_id.to_string(), 0, "09:00:00", "11:00:00")
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "appointment_time": "10:00:00" }
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_unavailability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let day = service(&server.uri())
        .compute_slots(&doctor_id.to_string(), future_monday(), TOKEN)
        .await
        .expect("slot search should succeed");

    let labels: Vec<&str> = day.slots.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, vec!["09:00", "09:30", "10:00", "10:30"]);

    let booked: Vec<&str> = day
        .slots
        .iter()
        .filter(|s| s.booked)
        .map(|s| s.label.as_str())
        .collect();
    assert_eq!(booked, vec!["10:00"]);
    assert!(day.slots.iter().all(|s| !s.blocked));
}

#[tokio::test]
async fn day_without_working_hours_has_no_slots() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    mount_doctor(&server, &doctor_id.to_string(), 15, 0).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_working_hours"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let day = service(&server.uri())
        .compute_slots(&doctor_id.to_string(), future_monday(), TOKEN)
        .await
        .expect("empty schedule is not an error");
    assert!(day.slots.is_empty());
}

#[tokio::test]
async fn reaching_the_daily_cap_closes_the_day() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    mount_doctor(&server, &doctor_id.to_string(), 30, 2).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_working_hours"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::working_hours_row(&doctor_id.to_string(), 0, "09:00:00", "17:00:00")
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "appointment_time": "09:00:00" },
            { "appointment_time": "09:30:00" }
        ])))
        .mount(&server)
        .await;

    let day = service(&server.uri())
        .compute_slots(&doctor_id.to_string(), future_monday(), TOKEN)
        .await
        .expect("capped day is not an error");
    assert!(day.slots.is_empty());
}

#[tokio::test]
async fn unavailability_window_flags_covered_slots() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    mount_doctor(&server, &doctor_id.to_string(), 30, 0).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_working_hours"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::working_hours_row(&doctor_id.to_string(), 0, "09:00:00", "11:00:00")
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_unavailability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::unavailability_row(
                &doctor_id.to_string(),
                "2026-08-31",
                Some("09:30:00"),
                Some("10:00:00"),
                "ward rounds",
            )
        ])))
        .mount(&server)
        .await;

    let day = service(&server.uri())
        .compute_slots(&doctor_id.to_string(), future_monday(), TOKEN)
        .await
        .expect("slot search should succeed");

    let blocked: Vec<&str> = day
        .slots
        .iter()
        .filter(|s| s.blocked)
        .map(|s| s.label.as_str())
        .collect();
    assert_eq!(blocked, vec!["09:30", "10:00"]);
}
