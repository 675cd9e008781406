use chrono::{DateTime, Utc};
use civisure_common::{ChatRole, ConsultationStatus, ReportStatus, SosStatus, UserRole};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Account listing for administrators; never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Crime report joined with its reporter. `evidence_files` is the stored JSON text.
#[derive(Debug, Clone, FromRow)]
pub struct CrimeReportRecord {
    pub id: i64,
    pub user_id: Option<i64>,
    pub category: String,
    pub description: String,
    pub location_lat: f64,
    pub location_lng: f64,
    pub location_address: Option<String>,
    pub date_time: String,
    pub evidence_files: Option<String>,
    pub status: ReportStatus,
    pub anonymous: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reporter_email: Option<String>,
    pub reporter_name: Option<String>,
    pub reporter_phone: Option<String>,
}

/// Minimal projection used to plot reports on a map.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MapReport {
    pub id: i64,
    pub category: String,
    pub location_lat: f64,
    pub location_lng: f64,
    pub location_address: Option<String>,
    pub date_time: String,
    pub status: ReportStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SosAlert {
    pub id: i64,
    pub user_id: Option<i64>,
    pub location_lat: f64,
    pub location_lng: f64,
    pub location_address: Option<String>,
    pub message: String,
    pub status: SosStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub user_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatConversation {
    pub id: i64,
    pub message: String,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

/// One prior turn supplied by the client as assistant context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lawyer {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub specialization: String,
    pub experience_years: i64,
    pub education: String,
    pub bar_registration: String,
    pub office_address: String,
    pub city: String,
    pub state: String,
    pub bio: Option<String>,
    pub languages: Option<String>,
    pub rating: f64,
    pub total_reviews: i64,
    pub consultation_fee: Option<f64>,
    pub availability: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LawyerReview {
    pub id: i64,
    pub lawyer_id: i64,
    pub user_id: i64,
    pub rating: i64,
    pub review_text: Option<String>,
    pub created_at: DateTime<Utc>,
    pub user_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConsultationRequest {
    pub id: i64,
    pub user_id: i64,
    pub lawyer_id: i64,
    pub case_type: String,
    pub description: String,
    pub preferred_date: Option<String>,
    pub status: ConsultationStatus,
    pub created_at: DateTime<Utc>,
    pub lawyer_name: String,
    pub specialization: String,
    pub lawyer_phone: String,
    pub lawyer_email: String,
}

/// Consultation as seen by an administrator: both parties attached.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConsultationOverview {
    pub id: i64,
    pub user_id: i64,
    pub lawyer_id: i64,
    pub case_type: String,
    pub description: String,
    pub preferred_date: Option<String>,
    pub status: ConsultationStatus,
    pub created_at: DateTime<Utc>,
    pub lawyer_name: String,
    pub user_name: String,
    pub user_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionRecord {
    pub user_id: i64,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
}
