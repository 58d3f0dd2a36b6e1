use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::election::{CandidateId, ElectionState},
    mongodb::Id,
};

use super::metadata::ElectionMetadata;

/// Core election data, as stored in the database.
///
/// Vote counts are not stored here; they live in the candidate totals
/// collection and are only ever touched by the tally.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Election {
    /// Unique ID.
    #[serde(rename = "_id")]
    pub id: Id,
    /// Top-level metadata.
    #[serde(flatten)]
    pub metadata: ElectionMetadata,
    /// Candidates, in ballot order.
    pub candidates: Vec<Candidate>,
}

impl Election {
    /// Create a new election with a fresh ID.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        title: String,
        code: String,
        election_type: String,
        description: String,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        state: ElectionState,
        candidates: Vec<Candidate>,
    ) -> Self {
        Self {
            id: Id::new(),
            metadata: ElectionMetadata {
                title,
                code,
                election_type,
                description,
                start_at,
                end_at,
                state,
                results_announced: false,
                created_at: Utc::now(),
            },
            candidates,
        }
    }

    /// Fail with [`Error::State`] unless the election is accepting votes.
    pub fn require_open(&self) -> Result<()> {
        if self.metadata.state.accepts_votes() {
            Ok(())
        } else {
            Err(Error::State(format!(
                "Election {} is {}, not accepting votes",
                self.id, self.metadata.state
            )))
        }
    }

    /// Get a candidate by ID.
    pub fn candidate(&self, candidate_id: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }
}

/// A single candidate standing in an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique within the election.
    pub id: CandidateId,
    /// Display name.
    pub name: String,
    pub age: u32,
    /// Branch or category the candidate represents.
    pub branch: String,
    /// Reference to the candidate's symbol image, stored elsewhere.
    pub symbol_url: Option<String>,
}
