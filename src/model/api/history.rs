use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::api::id::ApiId;

/// One line of a voter's history, joined with the election and candidate as
/// they are at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: ApiId,
    pub election_id: ApiId,
    pub election_title: String,
    pub candidate_name: String,
    pub candidate_symbol: Option<String>,
    pub candidate_branch: Option<String>,
    pub candidate_age: Option<u32>,
    pub voted_at: DateTime<Utc>,
}
