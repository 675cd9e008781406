mod common;

use axum::http::{header, StatusCode};
use serde_json::json;
use tokio::sync::broadcast::error::TryRecvError;

use civisure_api::broadcast::AlertEvent;
use civisure_api::services::emergency::DEFAULT_SOS_MESSAGE;
use civisure_common::SosStatus;

use common::{data, message, TestApp, USER_EMAIL};

#[tokio::test]
async fn raising_an_alert_notifies_observers_once() {
    let app = TestApp::spawn().await;
    let user = app.login_user().await;
    let mut observer = app.state.hub.subscribe();

    let response = app
        .server
        .post("/api/sos")
        .add_header(header::COOKIE, user)
        .json(&json!({
            "locationLat": 12.97,
            "locationLng": 77.59,
            "locationAddress": "Cubbon Park",
            "message": "Being followed"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    assert_eq!(message(&response), "SOS alert sent successfully");
    let alert_id = data(&response)["alert_id"].as_i64().unwrap();

    match observer.try_recv().expect("one event") {
        AlertEvent::NewAlert(alert) => {
            assert_eq!(alert.id, alert_id);
            assert_eq!(alert.user.email, USER_EMAIL);
            assert_eq!(alert.user.name, "Test User");
            assert_eq!(alert.location.lat, 12.97);
            assert_eq!(alert.location.address.as_deref(), Some("Cubbon Park"));
            assert_eq!(alert.message, "Being followed");
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(matches!(observer.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn alerts_persist_without_observers_and_default_the_message() {
    let app = TestApp::spawn().await;
    let user = app.login_user().await;

    let response = app
        .server
        .post("/api/sos")
        .add_header(header::COOKIE, user.clone())
        .json(&json!({"locationLat": 1.0, "locationLng": 2.0}))
        .await;
    response.assert_status(StatusCode::CREATED);

    let history = app
        .server
        .get("/api/sos/user/history")
        .add_header(header::COOKIE, user)
        .await;
    history.assert_status_ok();
    let alerts = data(&history);
    assert_eq!(alerts.as_array().unwrap().len(), 1);
    assert_eq!(alerts[0]["message"], DEFAULT_SOS_MESSAGE);
    assert_eq!(alerts[0]["status"], "active");
}

#[tokio::test]
async fn location_is_required() {
    let app = TestApp::spawn().await;
    let user = app.login_user().await;

    let response = app
        .server
        .post("/api/sos")
        .add_header(header::COOKIE, user)
        .json(&json!({"locationLat": 12.0}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(message(&response), "Location is required");
}

#[tokio::test]
async fn closing_states_stamp_resolved_at() {
    let app = TestApp::spawn().await;
    let user = app.login_user().await;
    let admin = app.login_admin().await;

    let alert_id = data(
        &app.server
            .post("/api/sos")
            .add_header(header::COOKIE, user)
            .json(&json!({"locationLat": 1.0, "locationLng": 2.0}))
            .await,
    )["alert_id"]
        .as_i64()
        .unwrap();

    let mut observer = app.state.hub.subscribe();

    let update = |status: &'static str| {
        app.server
            .put(&format!("/api/sos/{}", alert_id))
            .add_header(header::COOKIE, admin.clone())
            .json(&json!({"status": status}))
    };

    let responded = update("responded").await;
    responded.assert_status_ok();
    assert_eq!(message(&responded), "SOS alert status updated");
    assert!(data(&responded)["resolved_at"].is_null());

    let resolved = update("resolved").await;
    assert!(data(&resolved)["resolved_at"].is_string());
    let stored = app.state.emergency.get(alert_id).await.unwrap();
    assert_eq!(stored.status, SosStatus::Resolved);
    assert!(stored.resolved_at.is_some());

    let reopened = update("active").await;
    assert!(data(&reopened)["resolved_at"].is_null());

    let invalid = update("panicking").await;
    invalid.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(message(&invalid), "Invalid status");

    let mut seen = Vec::new();
    while let Ok(AlertEvent::StatusChanged(change)) = observer.try_recv() {
        seen.push(change.status);
    }
    assert_eq!(seen, vec![SosStatus::Responded, SosStatus::Resolved, SosStatus::Active]);
}

#[tokio::test]
async fn admins_list_active_and_filtered_alerts() {
    let app = TestApp::spawn().await;
    let user = app.login_user().await;
    let admin = app.login_admin().await;

    for lat in [1.0, 2.0] {
        app.server
            .post("/api/sos")
            .add_header(header::COOKIE, user.clone())
            .json(&json!({"locationLat": lat, "locationLng": 2.0}))
            .await
            .assert_status(StatusCode::CREATED);
    }
    let first: i64 = sqlx::query_scalar("SELECT MIN(id) FROM sos_alerts")
        .fetch_one(&app.state.db)
        .await
        .unwrap();
    app.state
        .emergency
        .update_status(first, SosStatus::FalseAlarm)
        .await
        .unwrap();

    let active = app
        .server
        .get("/api/sos/active")
        .add_header(header::COOKIE, admin.clone())
        .await;
    active.assert_status_ok();
    assert_eq!(data(&active).as_array().unwrap().len(), 1);
    assert_eq!(data(&active)[0]["user_email"], USER_EMAIL);

    let false_alarms = app
        .server
        .get("/api/sos")
        .add_query_param("status", "false_alarm")
        .add_header(header::COOKIE, admin.clone())
        .await;
    assert_eq!(data(&false_alarms).as_array().unwrap().len(), 1);
    assert_eq!(data(&false_alarms)[0]["id"], first);

    let missing = app
        .server
        .get("/api/sos/4242")
        .add_header(header::COOKIE, admin)
        .await;
    missing.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(message(&missing), "SOS alert not found");

    app.server
        .get("/api/sos/active")
        .add_header(header::COOKIE, user)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}
