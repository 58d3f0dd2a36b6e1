use serde::{Deserialize, Serialize};

use crate::model::{common::election::CandidateId, mongodb::Id};

/// The running vote count of one candidate (or the NOTA bucket) in one election.
///
/// There is at most one of these per (election, candidate) pair, enforced by a
/// unique index. It is only ever changed by an atomic increment, or overwritten
/// wholesale by a reconciliation against the vote ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTotals {
    /// Foreign Key election ID.
    pub election_id: Id,
    pub candidate_id: CandidateId,
    pub votes: u64,
}

impl CandidateTotals {
    pub fn new(election_id: Id, candidate_id: CandidateId, votes: u64) -> Self {
        Self {
            election_id,
            candidate_id,
            votes,
        }
    }
}
