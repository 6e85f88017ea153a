use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted scalar, e.g. the last viewed story index or the cart snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KvEntry {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}
