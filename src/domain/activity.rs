use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityUser {
    pub name: String,
}

/// System-generated timeline marker (assignment change, status change, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub activity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ActivityUser>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}
