use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::model::{
    api::election::CandidateSpec,
    common::election::NOTA,
    db::election::{Candidate, Election},
    mongodb::Id,
};
use crate::store::Store;

use super::require_election;

/// Fewest candidates an election can be created with.
pub const MIN_CANDIDATES_AT_CREATION: usize = 2;
/// Fewest candidates an election can be left with by an update.
pub const MIN_CANDIDATES_AFTER_UPDATE: usize = 1;

/// The ordered candidates of each election.
///
/// Candidates carry identity only. Their vote counts live with the tally, so
/// editing or removing a candidate here never touches a count.
pub struct CandidateRegistry {
    store: Store,
}

impl CandidateRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// The candidates of an election, in ballot order.
    pub async fn list_candidates(&self, election_id: Id) -> Result<Vec<Candidate>> {
        Ok(require_election(&self.store, election_id).await?.candidates)
    }

    /// Replace an election's candidate list.
    ///
    /// Drafts with an ID keep it, drafts without one are new candidates, and
    /// existing candidates missing from `drafts` are removed. Votes already
    /// cast for removed candidates stay in the ledger and the tally.
    pub async fn upsert_candidates(
        &self,
        election_id: Id,
        drafts: Vec<CandidateSpec>,
    ) -> Result<Vec<Candidate>> {
        let mut election = require_election(&self.store, election_id).await?;
        self.revise(&mut election, drafts)?;
        if !self.store.replace_election(&election).await? {
            return Err(Error::not_found(format!("Election {election_id}")));
        }
        Ok(election.candidates)
    }

    /// Replace the candidate list of an election in hand, without storing it.
    pub fn revise(&self, election: &mut Election, drafts: Vec<CandidateSpec>) -> Result<()> {
        election.candidates = merge_candidates(drafts)?;
        info!(
            "Election {} now has {} candidates",
            election.id,
            election.candidates.len()
        );
        Ok(())
    }
}

/// Validate the candidates of a new election and assign any missing IDs.
pub fn build_candidates(drafts: Vec<CandidateSpec>) -> Result<Vec<Candidate>> {
    validate(drafts, MIN_CANDIDATES_AT_CREATION)
}

/// Validate a replacement candidate list and assign any missing IDs.
fn merge_candidates(drafts: Vec<CandidateSpec>) -> Result<Vec<Candidate>> {
    validate(drafts, MIN_CANDIDATES_AFTER_UPDATE)
}

fn validate(drafts: Vec<CandidateSpec>, min: usize) -> Result<Vec<Candidate>> {
    if drafts.len() < min {
        return Err(Error::Validation(format!(
            "An election needs at least {min} candidate(s), got {}",
            drafts.len()
        )));
    }

    let mut seen = HashSet::new();
    let mut candidates = Vec::with_capacity(drafts.len());
    for (position, draft) in drafts.into_iter().enumerate() {
        let name = draft.name.trim();
        let branch = draft.branch.trim();
        if name.is_empty() {
            return Err(Error::Validation(format!(
                "Candidate {} has no name",
                position + 1
            )));
        }
        if branch.is_empty() {
            return Err(Error::Validation(format!("Candidate {name} has no branch")));
        }

        let id = match draft.id.as_deref().map(str::trim) {
            Some("") => {
                return Err(Error::Validation(format!("Candidate {name} has a blank ID")));
            }
            Some(id) if id.eq_ignore_ascii_case(NOTA) => {
                return Err(Error::Validation(format!(
                    "Candidate ID \"{id}\" is reserved for None of the Above"
                )));
            }
            Some(id) => id.to_string(),
            None => Id::new().to_string(),
        };
        if !seen.insert(id.clone()) {
            return Err(Error::Validation(format!("Duplicate candidate ID {id}")));
        }

        candidates.push(Candidate {
            id,
            name: name.to_string(),
            age: draft.age,
            branch: branch.to_string(),
            symbol_url: draft.symbol_url.filter(|url| !url.trim().is_empty()),
        });
    }
    Ok(candidates)
}
