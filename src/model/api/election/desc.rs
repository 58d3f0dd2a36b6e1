use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::election::{CandidateId, ElectionState},
    db::election::{Candidate, Election},
};

/// An API-friendly election description. Carries no vote counts; those are
/// only reachable through the results endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDescription {
    pub id: ApiId,
    pub title: String,
    pub code: String,
    pub election_type: String,
    pub description: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: ElectionState,
    pub results_announced: bool,
    pub created_at: DateTime<Utc>,
    /// Candidates, in ballot order.
    pub candidates: Vec<CandidateDescription>,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id.into(),
            title: election.metadata.title,
            code: election.metadata.code,
            election_type: election.metadata.election_type,
            description: election.metadata.description,
            start_at: election.metadata.start_at,
            end_at: election.metadata.end_at,
            status: election.metadata.state,
            results_announced: election.metadata.results_announced,
            created_at: election.metadata.created_at,
            candidates: election.candidates.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescription {
    pub id: CandidateId,
    pub name: String,
    pub age: u32,
    pub branch: String,
    pub symbol_url: Option<String>,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id,
            name: candidate.name,
            age: candidate.age,
            branch: candidate.branch,
            symbol_url: candidate.symbol_url,
        }
    }
}

/// A summary of an election, shorter than the full `ElectionDescription`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSummary {
    pub id: ApiId,
    pub title: String,
    pub code: String,
    pub election_type: String,
    pub status: ElectionState,
    pub results_announced: bool,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl From<Election> for ElectionSummary {
    fn from(election: Election) -> Self {
        Self {
            id: election.id.into(),
            title: election.metadata.title,
            code: election.metadata.code,
            election_type: election.metadata.election_type,
            status: election.metadata.state,
            results_announced: election.metadata.results_announced,
            start_at: election.metadata.start_at,
            end_at: election.metadata.end_at,
        }
    }
}
