use std::collections::HashMap;
use std::time::Duration;

use rand::Rng;
use rocket::{
    request::{FromRequest, Outcome, Request},
    tokio::time::sleep,
    State,
};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::history::HistoryEntry,
    common::election::{is_nota, NOTA_NAME},
    db::{election::Election, vote::Vote},
    mongodb::Id,
};
use crate::store::Store;

use super::require_election;

const UNKNOWN_ELECTION: &str = "Unknown Election";
const UNKNOWN_CANDIDATE: &str = "Unknown / NOTA";

/// Upper bound of the pause before the first retry; later retries wait longer.
const RETRY_BASE_DELAY_MS: u64 = 5;

/// The record of who voted in which election, and for whom.
///
/// Each (election, voter) pair has at most one vote, and recording a vote
/// increments its candidate's total in the same unit of work.
pub struct VoteLedger {
    store: Store,
    retry_limit: u32,
}

impl VoteLedger {
    pub fn new(store: Store, retry_limit: u32) -> Self {
        Self {
            store,
            retry_limit: retry_limit.max(1),
        }
    }

    /// Cast a vote for `candidate_id` (or NOTA) on behalf of `voter_id`.
    ///
    /// The caller must already have verified the voter's identity. The store
    /// checks the election is still active as it writes the vote, so a close
    /// that lands first refuses it.
    pub async fn cast_vote(
        &self,
        election_id: Id,
        voter_id: Id,
        candidate_id: &str,
    ) -> Result<Vote> {
        let election = require_election(&self.store, election_id).await?;
        election.require_open()?;
        let candidate_id = candidate_id.trim();
        if candidate_id.is_empty() {
            return Err(Error::Validation("A candidate must be chosen".to_string()));
        }
        if !is_nota(candidate_id) && election.candidate(candidate_id).is_none() {
            return Err(Error::not_found(format!(
                "Candidate {candidate_id} in election {election_id}"
            )));
        }

        let vote = Vote::new(election_id, voter_id, candidate_id.to_string());
        let mut attempt = 1;
        loop {
            match self.store.record_vote(&vote).await {
                Ok(()) => {
                    info!("Voter {voter_id} voted in election {election_id}");
                    return Ok(vote);
                }
                Err(Error::DuplicateVote { .. }) if attempt > 1 => {
                    // An earlier attempt reported failure but may have committed.
                    return match self.recover(&vote).await? {
                        Some(vote) => Ok(vote),
                        None => Err(Error::DuplicateVote {
                            election_id,
                            voter_id,
                        }),
                    };
                }
                Err(Error::Conflict(reason)) if attempt < self.retry_limit => {
                    debug!(
                        "Vote of {voter_id} in election {election_id} conflicted \
                         (attempt {attempt}/{}): {reason}",
                        self.retry_limit
                    );
                    sleep(retry_delay(attempt)).await;
                    attempt += 1;
                }
                Err(Error::Conflict(reason)) => {
                    if let Some(vote) = self.recover(&vote).await? {
                        return Ok(vote);
                    }
                    warn!(
                        "Giving up on vote of {voter_id} in election {election_id} \
                         after {attempt} attempts: {reason}"
                    );
                    return Err(Error::Conflict(format!(
                        "Vote could not be recorded, please try again: {reason}"
                    )));
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// If the ledger holds exactly the vote we were writing, make sure the
    /// tally agrees with it and hand it back.
    async fn recover(&self, vote: &Vote) -> Result<Option<Vote>> {
        let recorded = self.store.vote(vote.election_id, vote.voter_id).await?;
        match recorded {
            Some(recorded) if recorded.id == vote.id => {
                warn!(
                    "Vote {} was recorded despite a reported failure; recounting election {}",
                    vote.id, vote.election_id
                );
                if let Err(err) = self.store.reconcile_totals(vote.election_id).await {
                    error!(
                        "Recount of election {} failed, tally may lag the ledger: {err}",
                        vote.election_id
                    );
                }
                Ok(Some(recorded))
            }
            _ => Ok(None),
        }
    }

    /// Has this voter voted in this election?
    pub async fn has_voted(&self, election_id: Id, voter_id: Id) -> Result<bool> {
        Ok(self.store.vote(election_id, voter_id).await?.is_some())
    }

    /// Every vote cast by this voter, most recent first, described with the
    /// elections and candidates as they are now.
    pub async fn history(&self, voter_id: Id) -> Result<Vec<HistoryEntry>> {
        let votes = self.store.votes_by_voter(voter_id).await?;
        let mut elections: HashMap<Id, Option<Election>> = HashMap::new();
        let mut history = Vec::with_capacity(votes.len());
        for vote in votes {
            if !elections.contains_key(&vote.election_id) {
                let election = self.store.election(vote.election_id).await?;
                elections.insert(vote.election_id, election);
            }
            let election = elections.get(&vote.election_id).and_then(Option::as_ref);
            history.push(history_entry(vote, election));
        }
        Ok(history)
    }
}

/// A random pause, so that conflicting writers don't collide again in lockstep.
fn retry_delay(attempt: u32) -> Duration {
    let ceiling = RETRY_BASE_DELAY_MS * u64::from(attempt);
    Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
}

fn history_entry(vote: Vote, election: Option<&Election>) -> HistoryEntry {
    let mut entry = HistoryEntry {
        id: vote.id.into(),
        election_id: vote.election_id.into(),
        election_title: UNKNOWN_ELECTION.to_string(),
        candidate_name: UNKNOWN_CANDIDATE.to_string(),
        candidate_symbol: None,
        candidate_branch: None,
        candidate_age: None,
        voted_at: vote.cast_at,
    };
    if let Some(election) = election {
        entry.election_title = election.metadata.title.clone();
        if vote.is_nota() {
            entry.candidate_name = NOTA_NAME.to_string();
        } else if let Some(candidate) = election.candidate(&vote.candidate_id) {
            entry.candidate_name = candidate.name.clone();
            entry.candidate_symbol = candidate.symbol_url.clone();
            entry.candidate_branch = Some(candidate.branch.clone());
            entry.candidate_age = Some(candidate.age);
        }
    }
    entry
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for VoteLedger {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();
        req.guard::<Store>()
            .await
            .map(|store| Self::new(store, config.vote_retry_limit()))
    }
}
