use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Closed string enum stored as TEXT and exchanged as its snake_case name.
/// Parsing failures surface as `AppError::Validation` with `$invalid` as the message.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $invalid:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                #[sqlx(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(AppError::Validation($invalid.to_string())),
                }
            }
        }
    };
}

text_enum! {
    UserRole, "Invalid role" {
        User => "user",
        Admin => "admin",
    }
}

text_enum! {
    /// Workflow state of a crime report. Only administrators move it.
    ReportStatus, "Invalid status" {
        Pending => "pending",
        Investigating => "investigating",
        Resolved => "resolved",
        Rejected => "rejected",
    }
}

text_enum! {
    SosStatus, "Invalid status" {
        Active => "active",
        Responded => "responded",
        Resolved => "resolved",
        FalseAlarm => "false_alarm",
    }
}

text_enum! {
    ConsultationStatus, "Invalid status" {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
        Completed => "completed",
    }
}

text_enum! {
    /// Speaker of one turn in an assistant conversation.
    ChatRole, "Invalid conversation role" {
        User => "user",
        Assistant => "assistant",
    }
}

impl SosStatus {
    /// Closing states stamp `resolved_at`; every other state clears it.
    pub fn is_closed(&self) -> bool {
        matches!(self, SosStatus::Resolved | SosStatus::FalseAlarm)
    }
}

// Common response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            error: None,
            timestamp: Utc::now(),
        }
    }
}

impl ApiResponse<()> {
    /// Success envelope that carries only a human-readable message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
            error: None,
            timestamp: Utc::now(),
        }
    }
}

/// Offset pagination shared by every list endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 500;

    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_round_trip_through_text() {
        for status in SosStatus::ALL {
            assert_eq!(status.as_str().parse::<SosStatus>().unwrap(), *status);
        }
        assert_eq!(SosStatus::FalseAlarm.as_str(), "false_alarm");
        assert_eq!(
            serde_json::to_string(&ReportStatus::Investigating).unwrap(),
            "\"investigating\""
        );
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        let err = "closed".parse::<ReportStatus>().unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.public_message(), "Invalid status");

        let err = "superuser".parse::<UserRole>().unwrap_err();
        assert_eq!(err.public_message(), "Invalid role");
    }

    #[test]
    fn only_closing_states_count_as_closed() {
        assert!(SosStatus::Resolved.is_closed());
        assert!(SosStatus::FalseAlarm.is_closed());
        assert!(!SosStatus::Active.is_closed());
        assert!(!SosStatus::Responded.is_closed());
    }

    #[test]
    fn pagination_is_clamped() {
        let page = Pagination::new(10_000, -3);
        assert_eq!(page.limit(), Pagination::MAX_LIMIT);
        assert_eq!(page.offset(), 0);
        assert_eq!(Pagination::default().limit(), 50);
    }
}
