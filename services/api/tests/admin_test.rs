mod common;

use axum::http::{header, StatusCode};
use serde_json::json;

use common::{data, message, report_form, TestApp, USER_EMAIL};

#[tokio::test]
async fn dashboard_counts_reflect_activity() {
    let app = TestApp::spawn().await;
    let user = app.login_user().await;
    let admin = app.login_admin().await;

    app.submit_report(&user, report_form(true)).await.assert_status(StatusCode::CREATED);
    app.submit_report(&user, report_form(false)).await.assert_status(StatusCode::CREATED);
    app.server
        .post("/api/sos")
        .add_header(header::COOKIE, user)
        .json(&json!({"locationLat": 1.0, "locationLng": 2.0}))
        .await
        .assert_status(StatusCode::CREATED);

    let response = app
        .server
        .get("/api/admin/dashboard")
        .add_header(header::COOKIE, admin)
        .await;
    response.assert_status_ok();

    let dashboard = data(&response);
    // Admin accounts are not counted as users.
    assert_eq!(dashboard["counts"]["total_users"], 1);
    assert_eq!(dashboard["counts"]["total_reports"], 2);
    assert_eq!(dashboard["counts"]["pending_reports"], 2);
    assert_eq!(dashboard["counts"]["active_sos"], 1);
    assert_eq!(dashboard["recent_reports"].as_array().unwrap().len(), 2);
    assert_eq!(dashboard["reports_by_category"][0]["count"], 2);
    assert_eq!(dashboard["recent_activity"][0]["count"], 2);
}

#[tokio::test]
async fn analytics_cover_the_requested_period() {
    let app = TestApp::spawn().await;
    let user = app.login_user().await;
    let admin = app.login_admin().await;

    let report_id = data(&app.submit_report(&user, report_form(true)).await)["report_id"]
        .as_i64()
        .unwrap();
    app.server
        .put(&format!("/api/reports/{}", report_id))
        .add_header(header::COOKIE, admin.clone())
        .json(&json!({"status": "resolved"}))
        .await
        .assert_status_ok();

    let default_period = app
        .server
        .get("/api/admin/analytics")
        .add_header(header::COOKIE, admin.clone())
        .await;
    default_period.assert_status_ok();
    let analytics = data(&default_period);
    assert_eq!(analytics["period_days"], 30);
    assert_eq!(analytics["crime_trends"][0]["category"], "Theft");
    assert_eq!(analytics["top_locations"][0]["location_address"], "MG Road, Bengaluru");
    assert_eq!(analytics["response_time_analysis"][0]["count"], 1);
    assert!(analytics["sos_stats"].as_array().unwrap().is_empty());

    let week = app
        .server
        .get("/api/admin/analytics")
        .add_query_param("period", "7")
        .add_header(header::COOKIE, admin)
        .await;
    assert_eq!(data(&week)["period_days"], 7);
}

#[tokio::test]
async fn users_are_listed_with_a_total() {
    let app = TestApp::spawn().await;
    let admin = app.login_admin().await;
    app.register_and_login("third@example.com").await;

    let response = app
        .server
        .get("/api/admin/users")
        .add_query_param("limit", "2")
        .add_header(header::COOKIE, admin)
        .await;
    response.assert_status_ok();

    let page = data(&response);
    assert_eq!(page["total"], 3);
    assert_eq!(page["users"].as_array().unwrap().len(), 2);
    assert!(page["users"][0].get("password").is_none());
}

#[tokio::test]
async fn role_changes_apply_to_live_sessions() {
    let app = TestApp::spawn().await;
    let admin = app.login_admin().await;
    let user = app.login_user().await;
    let user_id = app.user_id(USER_EMAIL).await;

    app.server
        .get("/api/admin/dashboard")
        .add_header(header::COOKIE, user.clone())
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let promoted = app
        .server
        .put(&format!("/api/admin/users/{}/role", user_id))
        .add_header(header::COOKIE, admin)
        .json(&json!({"role": "admin"}))
        .await;
    promoted.assert_status_ok();
    assert_eq!(message(&promoted), "User role updated");

    app.server
        .get("/api/admin/dashboard")
        .add_header(header::COOKIE, user)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn role_update_rejections() {
    let app = TestApp::spawn().await;
    let admin = app.login_admin().await;
    let admin_id = app.user_id("admin@civisure.com").await;
    let user_id = app.user_id(USER_EMAIL).await;

    let own = app
        .server
        .put(&format!("/api/admin/users/{}/role", admin_id))
        .add_header(header::COOKIE, admin.clone())
        .json(&json!({"role": "user"}))
        .await;
    own.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(message(&own), "Cannot change your own role");

    let invalid = app
        .server
        .put(&format!("/api/admin/users/{}/role", user_id))
        .add_header(header::COOKIE, admin.clone())
        .json(&json!({"role": "superuser"}))
        .await;
    invalid.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(message(&invalid), "Invalid role");

    let missing = app
        .server
        .put("/api/admin/users/9999/role")
        .add_header(header::COOKIE, admin)
        .json(&json!({"role": "admin"}))
        .await;
    missing.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(message(&missing), "User not found");
}

#[tokio::test]
async fn invalid_consultation_status_is_rejected() {
    let app = TestApp::spawn().await;
    let admin = app.login_admin().await;

    let response = app
        .server
        .put("/api/admin/consultations/1")
        .add_header(header::COOKIE, admin.clone())
        .json(&json!({"status": "maybe"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(message(&response), "Invalid status");

    let filter = app
        .server
        .get("/api/admin/consultations")
        .add_query_param("status", "maybe")
        .add_header(header::COOKIE, admin)
        .await;
    filter.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_database_and_observers() {
    let app = TestApp::spawn().await;
    let _observer = app.state.hub.join("conn-1", 1, "admin@civisure.com");

    let response = app.server.get("/health").await;
    response.assert_status_ok();

    let body = response.json::<serde_json::Value>();
    assert_eq!(body["data"]["status"], "OK");
    assert_eq!(body["data"]["database"], "ok");
    assert_eq!(body["data"]["observers"], 1);
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let app = TestApp::spawn().await;

    for path in ["/health", "/api/lawyers", "/api/does-not-exist"] {
        let response = app.server.get(path).await;
        assert_eq!(response.header("x-content-type-options"), "nosniff");
        assert_eq!(response.header("x-frame-options"), "SAMEORIGIN");
        assert_eq!(response.header("referrer-policy"), "no-referrer");
        assert_eq!(response.header("x-xss-protection"), "0");
    }
}
