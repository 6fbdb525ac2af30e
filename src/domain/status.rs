use std::time::{SystemTime, UNIX_EPOCH};

use super::events::ConnectivityStatus;

/// Coarse health shown by a connectivity indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityHealth {
    Unknown,
    Ok,
    Degraded,
    Unavailable,
}

impl ConnectivityHealth {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Unknown => "CONNECTIVITY_UNKNOWN",
            Self::Ok => "CONNECTIVITY_OK",
            Self::Degraded => "CONNECTIVITY_DEGRADED",
            Self::Unavailable => "CONNECTIVITY_UNAVAILABLE",
        }
    }
}

impl From<ConnectivityStatus> for ConnectivityHealth {
    fn from(status: ConnectivityStatus) -> Self {
        match status {
            ConnectivityStatus::Connected => Self::Ok,
            ConnectivityStatus::Connecting | ConnectivityStatus::Reconnecting { .. } => {
                Self::Degraded
            }
            ConnectivityStatus::GaveUp | ConnectivityStatus::Closed => Self::Unavailable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusError {
    pub code: String,
    #[cfg_attr(not(test), allow(dead_code))]
    pub at_unix_ms: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivitySnapshot {
    pub status: Option<ConnectivityStatus>,
    pub health: ConnectivityHealth,
    /// Successful opens since the transport started.
    pub connections: u64,
    #[cfg_attr(not(test), allow(dead_code))]
    pub updated_at_unix_ms: u128,
    pub last_error: Option<StatusError>,
}

impl Default for ConnectivitySnapshot {
    fn default() -> Self {
        Self {
            status: None,
            health: ConnectivityHealth::Unknown,
            connections: 0,
            updated_at_unix_ms: now_unix_ms(),
            last_error: None,
        }
    }
}

pub fn now_unix_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
