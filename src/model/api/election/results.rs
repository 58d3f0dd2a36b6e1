use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::election::{CandidateId, ElectionState},
};

/// Counted results of an election.
///
/// `total_votes` is the size of the ledger, and always equals the candidate
/// votes plus `nota_votes` plus `removed_votes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResults {
    pub election_id: ApiId,
    pub title: String,
    pub status: ElectionState,
    pub results_announced: bool,
    /// Registered candidates in ballot order.
    pub candidates: Vec<CandidateResult>,
    pub nota_votes: u64,
    /// Votes for candidates that have since been removed from the election.
    pub removed_votes: u64,
    pub total_votes: u64,
    pub winner: Standing,
    /// Absent for uncontested elections.
    pub runner: Option<Standing>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResult {
    pub id: CandidateId,
    pub name: String,
    pub branch: String,
    pub symbol_url: Option<String>,
    pub votes: u64,
}

/// A placing in the standings. The "no votes yet" placeholder has no ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub id: Option<CandidateId>,
    pub name: String,
    pub votes: u64,
}

impl Standing {
    pub const NO_VOTES_YET: &'static str = "No Votes Yet";

    /// Placeholder winner for an election nobody has voted for a candidate in.
    pub fn no_votes_yet() -> Self {
        Self {
            id: None,
            name: Self::NO_VOTES_YET.to_string(),
            votes: 0,
        }
    }
}

impl From<&CandidateResult> for Standing {
    fn from(result: &CandidateResult) -> Self {
        Self {
            id: Some(result.id.clone()),
            name: result.name.clone(),
            votes: result.votes,
        }
    }
}
