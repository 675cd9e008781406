use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::{QueryBuilder, Sqlite};

use civisure_auth::Identity;
use civisure_common::{AppError, Pagination, ReportStatus};
use civisure_database::{CrimeReportRecord, DbPool, MapReport};

use crate::export::reports_to_csv;
use crate::models::{
    CategoryCount, CrimeReportView, ExportQuery, NewCrimeReport, ReportFilter, ReportForm,
    ReportPage, ReportStats, StatusCount,
};
use crate::storage::{EvidenceStorage, EvidenceUpload};

const REPORT_SELECT: &str = r#"
    SELECT r.id, r.user_id, r.category, r.description, r.location_lat, r.location_lng,
           r.location_address, r.date_time, r.evidence_files, r.status, r.anonymous,
           r.created_at, r.updated_at,
           u.email AS reporter_email, u.full_name AS reporter_name, u.phone AS reporter_phone
    FROM crime_reports r
    LEFT JOIN users u ON u.id = r.user_id
    WHERE 1 = 1
"#;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &ReportFilter) {
    if let Some(status) = filter.status {
        query.push(" AND r.status = ").push_bind(status);
    }
    if let Some(category) = &filter.category {
        query.push(" AND r.category = ").push_bind(category.clone());
    }
    if let Some(from) = &filter.created_from {
        query.push(" AND r.created_at >= ").push_bind(from.clone());
    }
    if let Some(to) = &filter.created_to {
        query.push(" AND r.created_at <= ").push_bind(to.clone());
    }
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ReportForm {
    /// Check required fields and coordinates; produce the typed submission.
    pub fn into_report(self) -> Result<NewCrimeReport, AppError> {
        let missing =
            || AppError::Validation("All required fields must be provided".to_string());

        let category = required(self.category).ok_or_else(missing)?;
        let description = required(self.description).ok_or_else(missing)?;
        let date_time = required(self.date_time).ok_or_else(missing)?;
        let lat = required(self.location_lat).ok_or_else(missing)?;
        let lng = required(self.location_lng).ok_or_else(missing)?;

        let location_lat: f64 = lat
            .parse()
            .map_err(|_| AppError::Validation("Invalid latitude".to_string()))?;
        let location_lng: f64 = lng
            .parse()
            .map_err(|_| AppError::Validation("Invalid longitude".to_string()))?;
        validate_coordinates(location_lat, location_lng)?;

        let anonymous = self
            .anonymous
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "on"))
            .unwrap_or(false);

        Ok(NewCrimeReport {
            category,
            description,
            location_lat,
            location_lng,
            location_address: required(self.location_address),
            date_time,
            anonymous,
        })
    }
}

/// Accepts `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS` (also with `T`); returns the stored timestamp format.
/// A bare date used as an upper bound covers the whole day.
fn parse_bound(value: &str, end_of_day: bool) -> Result<String, AppError> {
    let value = value.trim();
    let invalid = || AppError::Validation("Invalid date".to_string());

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let time = if end_of_day {
            NaiveTime::from_hms_opt(23, 59, 59)
        } else {
            NaiveTime::from_hms_opt(0, 0, 0)
        }
        .ok_or_else(invalid)?;
        return Ok(date.and_time(time).format(TIMESTAMP_FORMAT).to_string());
    }

    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
        .ok_or_else(invalid)
}

impl ExportQuery {
    pub fn into_filter(self) -> Result<ReportFilter, AppError> {
        Ok(ReportFilter {
            status: required(self.status).map(|s| s.parse()).transpose()?,
            category: required(self.category),
            created_from: required(self.start_date)
                .map(|d| parse_bound(&d, false))
                .transpose()?,
            created_to: required(self.end_date)
                .map(|d| parse_bound(&d, true))
                .transpose()?,
        })
    }
}

pub fn validate_coordinates(lat: f64, lng: f64) -> Result<(), AppError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(AppError::Validation("Invalid latitude".to_string()));
    }
    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        return Err(AppError::Validation("Invalid longitude".to_string()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ReportingService {
    db: DbPool,
    storage: EvidenceStorage,
}

impl ReportingService {
    pub fn new(db: DbPool, storage: EvidenceStorage) -> Self {
        Self { db, storage }
    }

    pub async fn submit(
        &self,
        caller: &Identity,
        report: NewCrimeReport,
        evidence: Vec<EvidenceUpload>,
    ) -> Result<i64, AppError> {
        self.storage.validate(&evidence)?;
        let stored = self.storage.store_all(&evidence).await?;

        let evidence_json = if stored.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&stored)
                    .map_err(|e| AppError::Internal(format!("Failed to encode evidence list: {}", e)))?,
            )
        };
        let user_id = if report.anonymous { None } else { Some(caller.user_id) };

        let inserted: Result<i64, sqlx::Error> = sqlx::query_scalar(
            r#"
            INSERT INTO crime_reports (
                user_id, category, description, location_lat, location_lng,
                location_address, date_time, evidence_files, anonymous
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(&report.category)
        .bind(&report.description)
        .bind(report.location_lat)
        .bind(report.location_lng)
        .bind(&report.location_address)
        .bind(&report.date_time)
        .bind(evidence_json)
        .bind(report.anonymous)
        .fetch_one(&self.db)
        .await;

        match inserted {
            Ok(id) => {
                tracing::info!(
                    "Crime report {} submitted ({}, anonymous: {}, evidence: {})",
                    id,
                    report.category,
                    report.anonymous,
                    stored.len()
                );
                Ok(id)
            }
            Err(e) => {
                self.storage.remove_all(&stored).await;
                Err(e.into())
            }
        }
    }

    pub async fn list(&self, filter: &ReportFilter, page: Pagination) -> Result<ReportPage, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new(REPORT_SELECT);
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY r.created_at DESC, r.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let records = query
            .build_query_as::<CrimeReportRecord>()
            .fetch_all(&self.db)
            .await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM crime_reports r WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.db).await?;

        Ok(ReportPage {
            reports: records.into_iter().map(CrimeReportView::from).collect(),
            total,
        })
    }

    pub async fn get(&self, id: i64) -> Result<CrimeReportView, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new(REPORT_SELECT);
        query.push(" AND r.id = ").push_bind(id);

        query
            .build_query_as::<CrimeReportRecord>()
            .fetch_optional(&self.db)
            .await?
            .map(CrimeReportView::from)
            .ok_or_else(|| AppError::NotFound("Report not found".to_string()))
    }

    pub async fn map_feed(&self, category: Option<String>, days: i64) -> Result<Vec<MapReport>, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT id, category, location_lat, location_lng, location_address, date_time, status
            FROM crime_reports
            WHERE created_at >= datetime('now', "#,
        );
        query.push_bind(format!("-{} days", days.max(0))).push(")");
        if let Some(category) = category {
            query.push(" AND category = ").push_bind(category);
        }
        query.push(" ORDER BY created_at DESC, id DESC");

        Ok(query.build_query_as::<MapReport>().fetch_all(&self.db).await?)
    }

    pub async fn update_status(&self, id: i64, status: ReportStatus) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE crime_reports SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(status)
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Report not found".to_string()));
        }

        tracing::info!("Crime report {} moved to {}", id, status);
        Ok(())
    }

    /// Every report matching `filter`, newest first, encoded as CSV.
    pub async fn export_csv(&self, filter: &ReportFilter) -> Result<String, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new(REPORT_SELECT);
        push_filters(&mut query, filter);
        query.push(" ORDER BY r.created_at DESC, r.id DESC");

        let records = query
            .build_query_as::<CrimeReportRecord>()
            .fetch_all(&self.db)
            .await?;
        let reports: Vec<CrimeReportView> = records.into_iter().map(CrimeReportView::from).collect();

        tracing::info!("Exporting {} crime reports", reports.len());
        Ok(reports_to_csv(&reports))
    }

    pub async fn stats(&self) -> Result<ReportStats, AppError> {
        let (total, pending, resolved): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(status = 'pending'), 0),
                   COALESCE(SUM(status = 'resolved'), 0)
            FROM crime_reports
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        let by_category = sqlx::query_as::<_, CategoryCount>(
            "SELECT category, COUNT(*) AS count FROM crime_reports GROUP BY category ORDER BY count DESC",
        )
        .fetch_all(&self.db)
        .await?;

        let by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM crime_reports GROUP BY status",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(ReportStats {
            total,
            pending,
            resolved,
            by_category,
            by_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> ReportForm {
        ReportForm {
            category: Some("Theft".into()),
            description: Some("Phone snatched".into()),
            location_lat: Some("12.97".into()),
            location_lng: Some("77.59".into()),
            location_address: Some("  ".into()),
            date_time: Some("2024-05-01T21:30".into()),
            anonymous: Some("true".into()),
        }
    }

    #[test]
    fn complete_form_becomes_a_report() {
        let report = form().into_report().unwrap();
        assert!(report.anonymous);
        assert_eq!(report.location_lat, 12.97);
        assert!(report.location_address.is_none());
    }

    #[test]
    fn missing_or_bad_fields_are_rejected() {
        let mut missing = form();
        missing.description = None;
        assert_eq!(missing.into_report().unwrap_err().status_code(), 400);

        let mut bad = form();
        bad.location_lat = Some("north".into());
        assert_eq!(bad.into_report().unwrap_err().public_message(), "Invalid latitude");

        let mut out_of_range = form();
        out_of_range.location_lng = Some("181".into());
        assert!(out_of_range.into_report().is_err());
    }

    #[test]
    fn export_bounds_are_normalised() {
        let filter = ExportQuery {
            status: Some("resolved".into()),
            category: None,
            start_date: Some("2024-01-01".into()),
            end_date: Some("2024-01-31".into()),
        }
        .into_filter()
        .unwrap();

        assert_eq!(filter.status, Some(ReportStatus::Resolved));
        assert_eq!(filter.created_from.as_deref(), Some("2024-01-01 00:00:00"));
        assert_eq!(filter.created_to.as_deref(), Some("2024-01-31 23:59:59"));

        let bad = ExportQuery {
            start_date: Some("last tuesday".into()),
            ..ExportQuery::default()
        };
        assert!(bad.into_filter().is_err());
    }

    #[test]
    fn anonymous_defaults_to_false() {
        let mut named = form();
        named.anonymous = None;
        assert!(!named.into_report().unwrap().anonymous);
    }
}
