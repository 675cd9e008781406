use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

use civisure_auth::Identity;
use civisure_common::{AppError, Pagination, SosStatus};
use civisure_database::{DbPool, SosAlert};

use crate::broadcast::{
    AlertEvent, AlertLocation, AlertPublisher, AlertStatusPayload, AlertUser, NewAlertPayload,
};
use crate::models::RaiseAlertRequest;
use crate::services::reporting::validate_coordinates;

pub const DEFAULT_SOS_MESSAGE: &str = "Emergency! Need immediate assistance!";
const HISTORY_LIMIT: i64 = 20;

const ALERT_SELECT: &str = r#"
    SELECT s.id, s.user_id, s.location_lat, s.location_lng, s.location_address, s.message,
           s.status, s.created_at, s.resolved_at,
           u.email AS user_email, u.full_name AS user_name, u.phone AS user_phone
    FROM sos_alerts s
    LEFT JOIN users u ON u.id = s.user_id
"#;

#[derive(Clone)]
pub struct EmergencyService {
    db: DbPool,
    publisher: Arc<dyn AlertPublisher>,
}

impl EmergencyService {
    pub fn new(db: DbPool, publisher: Arc<dyn AlertPublisher>) -> Self {
        Self { db, publisher }
    }

    pub async fn raise(&self, caller: &Identity, request: RaiseAlertRequest) -> Result<i64, AppError> {
        let (lat, lng) = match (request.location_lat, request.location_lng) {
            (Some(lat), Some(lng)) => (lat, lng),
            _ => return Err(AppError::Validation("Location is required".to_string())),
        };
        validate_coordinates(lat, lng)?;

        let message = request
            .message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_SOS_MESSAGE.to_string());
        let address = request
            .location_address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO sos_alerts (user_id, location_lat, location_lng, location_address, message, status)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, created_at
            "#,
        )
        .bind(caller.user_id)
        .bind(lat)
        .bind(lng)
        .bind(&address)
        .bind(&message)
        .bind(SosStatus::Active)
        .fetch_one(&self.db)
        .await?;

        let phone: Option<String> = sqlx::query_scalar("SELECT phone FROM users WHERE id = ?")
            .bind(caller.user_id)
            .fetch_optional(&self.db)
            .await?
            .flatten();

        tracing::warn!("SOS alert {} raised by {} ({})", id, caller.email, caller.user_id);

        self.publisher.publish(AlertEvent::NewAlert(NewAlertPayload {
            id,
            user: AlertUser {
                id: caller.user_id,
                name: caller.full_name.clone(),
                email: caller.email.clone(),
                phone,
            },
            location: AlertLocation {
                lat,
                lng,
                address,
            },
            message,
            timestamp: created_at,
        }));

        Ok(id)
    }

    pub async fn list_active(&self) -> Result<Vec<SosAlert>, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new(ALERT_SELECT);
        query
            .push(" WHERE s.status = ")
            .push_bind(SosStatus::Active)
            .push(" ORDER BY s.created_at DESC, s.id DESC");

        Ok(query.build_query_as::<SosAlert>().fetch_all(&self.db).await?)
    }

    pub async fn list(&self, status: Option<SosStatus>, page: Pagination) -> Result<Vec<SosAlert>, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new(ALERT_SELECT);
        query.push(" WHERE 1 = 1");
        if let Some(status) = status {
            query.push(" AND s.status = ").push_bind(status);
        }
        query
            .push(" ORDER BY s.created_at DESC, s.id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        Ok(query.build_query_as::<SosAlert>().fetch_all(&self.db).await?)
    }

    pub async fn get(&self, id: i64) -> Result<SosAlert, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new(ALERT_SELECT);
        query.push(" WHERE s.id = ").push_bind(id);

        query
            .build_query_as::<SosAlert>()
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("SOS alert not found".to_string()))
    }

    /// Move an alert to `status`. `resolved_at` is stamped for closing states and cleared otherwise.
    pub async fn update_status(&self, id: i64, status: SosStatus) -> Result<AlertStatusPayload, AppError> {
        let updated: Option<(i64, SosStatus, Option<DateTime<Utc>>)> = sqlx::query_as(
            r#"
            UPDATE sos_alerts
            SET status = ?,
                resolved_at = CASE WHEN ? THEN CURRENT_TIMESTAMP ELSE NULL END
            WHERE id = ?
            RETURNING id, status, resolved_at
            "#,
        )
        .bind(status)
        .bind(status.is_closed())
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        let (id, status, resolved_at) =
            updated.ok_or_else(|| AppError::NotFound("SOS alert not found".to_string()))?;

        tracing::info!("SOS alert {} moved to {}", id, status);

        let change = AlertStatusPayload {
            id,
            status,
            resolved_at,
        };
        self.publisher.publish(AlertEvent::StatusChanged(change.clone()));
        Ok(change)
    }

    pub async fn history(&self, caller: &Identity) -> Result<Vec<SosAlert>, AppError> {
        let mut query = QueryBuilder::<Sqlite>::new(ALERT_SELECT);
        query
            .push(" WHERE s.user_id = ")
            .push_bind(caller.user_id)
            .push(" ORDER BY s.created_at DESC, s.id DESC LIMIT ")
            .push_bind(HISTORY_LIMIT);

        Ok(query.build_query_as::<SosAlert>().fetch_all(&self.db).await?)
    }
}
