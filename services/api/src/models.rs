use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use civisure_common::{Pagination, ReportStatus, SosStatus, UserRole};
use civisure_database::{
    ChatConversation, ConsultationOverview, ConversationTurn, CrimeReportRecord, Lawyer,
    LawyerReview, MapReport, SosAlert, UserSummary,
};

// Request DTOs
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserInfo,
}

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
}

#[derive(Debug, Serialize)]
pub struct CreatedUser {
    pub user_id: i64,
}

/// Body of every status-changing endpoint. Parsed into the target enum by the handler.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdateRequest {
    #[serde(default)]
    pub role: String,
}

// Reports
#[derive(Debug, Clone)]
pub struct NewCrimeReport {
    pub category: String,
    pub description: String,
    pub location_lat: f64,
    pub location_lng: f64,
    pub location_address: Option<String>,
    pub date_time: String,
    pub anonymous: bool,
}

/// Text fields of a report submission as they arrive in the multipart form.
#[derive(Debug, Default)]
pub struct ReportForm {
    pub category: Option<String>,
    pub description: Option<String>,
    pub location_lat: Option<String>,
    pub location_lng: Option<String>,
    pub location_address: Option<String>,
    pub date_time: Option<String>,
    pub anonymous: Option<String>,
}

impl ReportForm {
    pub fn set(&mut self, field: &str, value: String) {
        let slot = match field {
            "category" => &mut self.category,
            "description" => &mut self.description,
            "locationLat" => &mut self.location_lat,
            "locationLng" => &mut self.location_lng,
            "locationAddress" => &mut self.location_address,
            "dateTime" => &mut self.date_time,
            "anonymous" => &mut self.anonymous,
            _ => return,
        };
        *slot = Some(value);
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportListQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ReportListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub category: Option<String>,
    /// Inclusive lower bound on `created_at`, as `YYYY-MM-DD HH:MM:SS`.
    pub created_from: Option<String>,
    /// Inclusive upper bound on `created_at`, as `YYYY-MM-DD HH:MM:SS`.
    pub created_to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MapQuery {
    pub category: Option<String>,
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrimeReportView {
    pub id: i64,
    pub user_id: Option<i64>,
    pub category: String,
    pub description: String,
    pub location_lat: f64,
    pub location_lng: f64,
    pub location_address: Option<String>,
    pub date_time: String,
    pub evidence_files: Option<Vec<String>>,
    pub status: ReportStatus,
    pub anonymous: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reporter_email: Option<String>,
    pub reporter_name: Option<String>,
    pub reporter_phone: Option<String>,
}

impl From<CrimeReportRecord> for CrimeReportView {
    fn from(record: CrimeReportRecord) -> Self {
        let evidence_files = record.evidence_files.as_deref().and_then(|raw| {
            serde_json::from_str::<Vec<String>>(raw)
                .map_err(|e| tracing::warn!("Unreadable evidence list on report {}: {}", record.id, e))
                .ok()
        });

        // Reporter identity never leaves the server for anonymous reports.
        let (reporter_email, reporter_name, reporter_phone) = if record.anonymous {
            (None, None, None)
        } else {
            (record.reporter_email, record.reporter_name, record.reporter_phone)
        };

        Self {
            id: record.id,
            user_id: record.user_id,
            category: record.category,
            description: record.description,
            location_lat: record.location_lat,
            location_lng: record.location_lng,
            location_address: record.location_address,
            date_time: record.date_time,
            evidence_files,
            status: record.status,
            anonymous: record.anonymous,
            created_at: record.created_at,
            updated_at: record.updated_at,
            reporter_email,
            reporter_name,
            reporter_phone,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportPage {
    pub reports: Vec<CrimeReportView>,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct CreatedReport {
    pub report_id: i64,
}

#[derive(Debug, Serialize)]
pub struct MapFeed {
    pub reports: Vec<MapReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyCount {
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct ReportStats {
    pub total: i64,
    pub pending: i64,
    pub resolved: i64,
    pub by_category: Vec<CategoryCount>,
    pub by_status: Vec<StatusCount>,
}

// SOS
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaiseAlertRequest {
    pub location_lat: Option<f64>,
    pub location_lng: Option<f64>,
    pub location_address: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl AlertListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedAlert {
    pub alert_id: i64,
}

pub type AlertView = SosAlert;

// Lawyers
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LawyerSearchQuery {
    pub specialization: Option<String>,
    pub city: Option<String>,
    pub min_rating: Option<f64>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl LawyerSearchQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LawyerPage {
    pub lawyers: Vec<Lawyer>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SpecializationCount {
    pub specialization: String,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct LawyerProfile {
    pub lawyer: Lawyer,
    pub reviews: Vec<LawyerReview>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub rating: Option<i64>,
    pub review_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LawyerRating {
    pub rating: f64,
    pub total_reviews: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationRequestBody {
    pub case_type: Option<String>,
    pub description: Option<String>,
    pub preferred_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedConsultation {
    pub request_id: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateLawyerRequest {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Specialization is required"))]
    pub specialization: String,
    #[validate(range(min = 0, max = 80, message = "Experience must be between 0 and 80 years"))]
    pub experience_years: i64,
    #[validate(length(min = 1, message = "Education is required"))]
    pub education: String,
    #[validate(length(min = 1, message = "Bar registration is required"))]
    pub bar_registration: String,
    #[validate(length(min = 1, message = "Office address is required"))]
    pub office_address: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    pub bio: Option<String>,
    pub languages: Option<String>,
    #[validate(range(min = 0.0, message = "Consultation fee cannot be negative"))]
    pub consultation_fee: Option<f64>,
    #[serde(default)]
    pub availability: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedLawyer {
    pub lawyer_id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConsultationListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ConsultationListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

pub type ConsultationView = ConsultationOverview;

// Assistant
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssistantReply {
    pub response: String,
    pub conversation_id: i64,
}

pub type ConversationView = ChatConversation;

// Admin
#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl UserListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub users: Vec<UserSummary>,
    pub total: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub period: Option<i64>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DashboardCounts {
    pub total_users: i64,
    pub total_reports: i64,
    pub pending_reports: i64,
    pub active_sos: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RecentReport {
    pub id: i64,
    pub category: String,
    pub location_address: Option<String>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub counts: DashboardCounts,
    pub recent_reports: Vec<RecentReport>,
    pub reports_by_category: Vec<CategoryCount>,
    pub reports_by_status: Vec<StatusCount>,
    pub recent_activity: Vec<DailyCount>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CrimeTrend {
    pub date: String,
    pub category: String,
    pub count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LocationHotspot {
    pub location_address: String,
    pub count: i64,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ResolutionTime {
    pub category: String,
    pub avg_days: Option<f64>,
    pub count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SosStatusStat {
    pub status: SosStatus,
    pub count: i64,
    pub avg_response_minutes: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct Analytics {
    pub period_days: i64,
    pub crime_trends: Vec<CrimeTrend>,
    pub top_locations: Vec<LocationHotspot>,
    pub response_time_analysis: Vec<ResolutionTime>,
    pub sos_stats: Vec<SosStatusStat>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(anonymous: bool) -> CrimeReportRecord {
        CrimeReportRecord {
            id: 1,
            user_id: if anonymous { None } else { Some(2) },
            category: "Theft".into(),
            description: "Bike stolen".into(),
            location_lat: 12.9,
            location_lng: 77.6,
            location_address: None,
            date_time: "2024-05-01T10:00".into(),
            evidence_files: Some(r#"["evidence-1.png"]"#.into()),
            status: ReportStatus::Pending,
            anonymous,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            reporter_email: Some("user@civisure.com".into()),
            reporter_name: Some("Test User".into()),
            reporter_phone: Some("0987654321".into()),
        }
    }

    #[test]
    fn anonymous_reports_are_redacted() {
        let view = CrimeReportView::from(record(true));
        assert!(view.reporter_email.is_none());
        assert!(view.reporter_name.is_none());
        assert!(view.reporter_phone.is_none());

        let view = CrimeReportView::from(record(false));
        assert_eq!(view.reporter_email.as_deref(), Some("user@civisure.com"));
    }

    #[test]
    fn evidence_json_becomes_a_list() {
        let view = CrimeReportView::from(record(false));
        assert_eq!(view.evidence_files, Some(vec!["evidence-1.png".to_string()]));

        let mut broken = record(false);
        broken.evidence_files = Some("not json".into());
        assert!(CrimeReportView::from(broken).evidence_files.is_none());
    }

    #[test]
    fn report_form_ignores_unknown_fields() {
        let mut form = ReportForm::default();
        form.set("locationLat", "12.5".into());
        form.set("bogus", "x".into());
        assert_eq!(form.location_lat.as_deref(), Some("12.5"));
    }

    #[test]
    fn chat_history_uses_camel_case() {
        let body: ChatMessageRequest = serde_json::from_value(serde_json::json!({
            "message": "hi",
            "conversationHistory": [{"role": "assistant", "content": "hello"}]
        }))
        .unwrap();
        assert_eq!(body.conversation_history.len(), 1);
    }
}
