use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::election::{is_nota, CandidateId},
    mongodb::Id,
};

/// A single cast vote, as stored in the ledger. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    /// Foreign Key election ID.
    pub election_id: Id,
    /// The voter, as identified by the external identity service.
    pub voter_id: Id,
    /// The chosen candidate, or the NOTA sentinel.
    pub candidate_id: CandidateId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
}

impl Vote {
    /// Create a new vote cast right now.
    pub fn new(election_id: Id, voter_id: Id, candidate_id: CandidateId) -> Self {
        Self {
            id: Id::new(),
            election_id,
            voter_id,
            candidate_id,
            // Millisecond precision, to match what the database round-trips.
            cast_at: mongodb::bson::DateTime::now().to_chrono(),
        }
    }

    pub fn is_nota(&self) -> bool {
        is_nota(&self.candidate_id)
    }
}
