use civisure_common::{AppError, ReportStatus, SosStatus, UserRole};
use civisure_database::DbPool;

use crate::models::{
    Analytics, CategoryCount, CrimeTrend, Dashboard, DashboardCounts, DailyCount, LocationHotspot,
    RecentReport, ResolutionTime, SosStatusStat, StatusCount,
};

pub const DEFAULT_PERIOD_DAYS: i64 = 30;
const ACTIVITY_DAYS: i64 = 7;
const RECENT_REPORTS: i64 = 5;
const TOP_LOCATIONS: i64 = 10;

fn days_ago(days: i64) -> String {
    format!("-{} days", days)
}

/// Read-only aggregates for the administrator dashboard.
#[derive(Clone)]
pub struct AnalyticsService {
    db: DbPool,
}

impl AnalyticsService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn dashboard(&self) -> Result<Dashboard, AppError> {
        let counts = sqlx::query_as::<_, DashboardCounts>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users WHERE role = ?) AS total_users,
                (SELECT COUNT(*) FROM crime_reports) AS total_reports,
                (SELECT COUNT(*) FROM crime_reports WHERE status = ?) AS pending_reports,
                (SELECT COUNT(*) FROM sos_alerts WHERE status = ?) AS active_sos
            "#,
        )
        .bind(UserRole::User)
        .bind(ReportStatus::Pending)
        .bind(SosStatus::Active)
        .fetch_one(&self.db)
        .await?;

        let recent_reports = sqlx::query_as::<_, RecentReport>(
            r#"
            SELECT id, category, location_address, status, created_at
            FROM crime_reports
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(RECENT_REPORTS)
        .fetch_all(&self.db)
        .await?;

        let reports_by_category = sqlx::query_as::<_, CategoryCount>(
            "SELECT category, COUNT(*) AS count FROM crime_reports GROUP BY category ORDER BY count DESC",
        )
        .fetch_all(&self.db)
        .await?;

        let reports_by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM crime_reports GROUP BY status",
        )
        .fetch_all(&self.db)
        .await?;

        let recent_activity = sqlx::query_as::<_, DailyCount>(
            r#"
            SELECT DATE(created_at) AS date, COUNT(*) AS count
            FROM crime_reports
            WHERE created_at >= datetime('now', ?)
            GROUP BY DATE(created_at)
            ORDER BY date
            "#,
        )
        .bind(days_ago(ACTIVITY_DAYS))
        .fetch_all(&self.db)
        .await?;

        Ok(Dashboard {
            counts,
            recent_reports,
            reports_by_category,
            reports_by_status,
            recent_activity,
        })
    }

    pub async fn analytics(&self, period: Option<i64>) -> Result<Analytics, AppError> {
        let period_days = period.filter(|p| *p > 0).unwrap_or(DEFAULT_PERIOD_DAYS);
        let since = days_ago(period_days);

        let crime_trends = sqlx::query_as::<_, CrimeTrend>(
            r#"
            SELECT DATE(created_at) AS date, category, COUNT(*) AS count
            FROM crime_reports
            WHERE created_at >= datetime('now', ?)
            GROUP BY DATE(created_at), category
            ORDER BY date, category
            "#,
        )
        .bind(&since)
        .fetch_all(&self.db)
        .await?;

        let top_locations = sqlx::query_as::<_, LocationHotspot>(
            r#"
            SELECT location_address, COUNT(*) AS count,
                   AVG(location_lat) AS lat, AVG(location_lng) AS lng
            FROM crime_reports
            WHERE location_address IS NOT NULL
            GROUP BY location_address
            ORDER BY count DESC
            LIMIT ?
            "#,
        )
        .bind(TOP_LOCATIONS)
        .fetch_all(&self.db)
        .await?;

        let response_time_analysis = sqlx::query_as::<_, ResolutionTime>(
            r#"
            SELECT category,
                   AVG(JULIANDAY(updated_at) - JULIANDAY(created_at)) AS avg_days,
                   COUNT(*) AS count
            FROM crime_reports
            WHERE status = ?
            GROUP BY category
            "#,
        )
        .bind(ReportStatus::Resolved)
        .fetch_all(&self.db)
        .await?;

        // Alerts that never closed contribute NULL and drop out of the average.
        let sos_stats = sqlx::query_as::<_, SosStatusStat>(
            r#"
            SELECT status, COUNT(*) AS count,
                   AVG(JULIANDAY(resolved_at) - JULIANDAY(created_at)) * 24 * 60 AS avg_response_minutes
            FROM sos_alerts
            WHERE created_at >= datetime('now', ?)
            GROUP BY status
            "#,
        )
        .bind(&since)
        .fetch_all(&self.db)
        .await?;

        Ok(Analytics {
            period_days,
            crime_trends,
            top_locations,
            response_time_analysis,
            sos_stats,
        })
    }
}
