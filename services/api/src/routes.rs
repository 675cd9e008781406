use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers::{admin, auth, chatbot, lawyers, reports, sos};
use crate::middleware::rate_limit_middleware;
use crate::state::AppState;

/// Every `/api` route, rate limited per client.
pub fn api_routes(state: &AppState) -> Router<AppState> {
    let upload_limit = state.config.upload.max_body_bytes();

    Router::new()
        // Authentication routes
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/check", get(auth::check))

        // Crime report routes
        .route(
            "/reports",
            post(reports::submit_report)
                .layer(DefaultBodyLimit::max(upload_limit))
                .get(reports::list_reports),
        )
        .route("/reports/map", get(reports::map_reports))
        .route("/reports/stats/summary", get(reports::report_stats))
        .route("/reports/export", get(reports::export_reports))
        .route("/reports/:id", get(reports::get_report).put(reports::update_report_status))

        // SOS routes
        .route("/sos", post(sos::raise_alert).get(sos::list_alerts))
        .route("/sos/active", get(sos::active_alerts))
        .route("/sos/user/history", get(sos::my_alerts))
        .route("/sos/:id", get(sos::get_alert).put(sos::update_alert_status))

        // Legal directory routes
        .route("/lawyers", get(lawyers::search_lawyers))
        .route("/lawyers/meta/specializations", get(lawyers::specializations))
        .route("/lawyers/user/consultations", get(lawyers::my_consultations))
        .route("/lawyers/:id", get(lawyers::get_lawyer))
        .route("/lawyers/:id/reviews", post(lawyers::submit_review))
        .route("/lawyers/:id/consultation", post(lawyers::request_consultation))

        // Legal assistant routes
        .route("/chatbot/message", post(chatbot::send_message))
        .route("/chatbot/history", get(chatbot::history).delete(chatbot::clear_history))
        .route("/chatbot/suggestions", get(chatbot::suggestions))

        // Admin routes
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id/role", put(admin::update_user_role))
        .route("/admin/analytics", get(admin::analytics))
        .route("/admin/export/reports", get(reports::export_reports))
        .route("/admin/lawyers", post(admin::create_lawyer))
        .route("/admin/consultations", get(admin::list_consultations))
        .route("/admin/consultations/:id", put(admin::update_consultation_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware))
}
