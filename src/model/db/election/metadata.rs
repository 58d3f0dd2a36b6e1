use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::election::ElectionState;

/// A view on just the election's top-level metadata.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionMetadata {
    /// Human-readable title.
    pub title: String,
    /// Unique short code used by operators to look the election up.
    pub code: String,
    /// Free-form election type tag, e.g. "Student Council".
    pub election_type: String,
    /// Free-text description. Never used to carry flags.
    pub description: String,
    /// Scheduled start time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_at: DateTime<Utc>,
    /// Scheduled end time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_at: DateTime<Utc>,
    /// Lifecycle state.
    pub state: ElectionState,
    /// Whether results are visible to voters. Only ever true while `Closed`.
    pub results_announced: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}
