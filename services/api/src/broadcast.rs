use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use civisure_common::SosStatus;

/// Name of the observer group that receives emergency alert events.
pub const ADMIN_ROOM: &str = "admin-room";

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertLocation {
    pub lat: f64,
    pub lng: f64,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlertPayload {
    pub id: i64,
    pub user: AlertUser,
    pub location: AlertLocation,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertStatusPayload {
    pub id: i64,
    pub status: SosStatus,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Event pushed to every observer in the admin room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum AlertEvent {
    #[serde(rename = "new-sos")]
    NewAlert(NewAlertPayload),
    #[serde(rename = "sos-updated")]
    StatusChanged(AlertStatusPayload),
}

/// Fire-and-forget publication of alert events. Delivery failures never reach the caller.
pub trait AlertPublisher: Send + Sync {
    fn publish(&self, event: AlertEvent);
}

#[derive(Debug, Clone)]
pub struct ObserverInfo {
    pub user_id: i64,
    pub email: String,
    pub joined_at: DateTime<Utc>,
}

/// In-process fan-out of alert events to admin observers.
#[derive(Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<AlertEvent>,
    // connection_id -> observer
    observers: Arc<DashMap<String, ObserverInfo>>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            observers: Arc::new(DashMap::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.sender.subscribe()
    }

    pub fn join(&self, connection_id: &str, user_id: i64, email: &str) -> broadcast::Receiver<AlertEvent> {
        self.observers.insert(
            connection_id.to_string(),
            ObserverInfo {
                user_id,
                email: email.to_string(),
                joined_at: Utc::now(),
            },
        );
        tracing::info!("Observer {} ({}) joined {}", email, connection_id, ADMIN_ROOM);
        self.subscribe()
    }

    pub fn leave(&self, connection_id: &str) {
        if let Some((_, observer)) = self.observers.remove(connection_id) {
            tracing::info!("Observer {} ({}) left {}", observer.email, connection_id, ADMIN_ROOM);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl AlertPublisher for BroadcastHub {
    fn publish(&self, event: AlertEvent) {
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!("Alert event delivered to {} observers", receivers),
            Err(_) => tracing::debug!("Alert event dropped: no observers connected"),
        }
    }
}
