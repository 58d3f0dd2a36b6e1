use std::collections::{HashMap, HashSet};

use rocket::tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::model::{
    common::election::CandidateId,
    db::{election::Election, vote::Vote},
    mongodb::Id,
};

use super::{ElectionStore, LifecycleChange, Totals};

/// A store that keeps everything in process memory.
///
/// A single lock guards all state, so every operation is its own unit of work.
/// Used for local runs and tests; nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    /// In creation order.
    elections: Vec<Election>,
    /// In cast order.
    votes: Vec<Vote>,
    /// (election, voter) pairs that have a vote, i.e. the uniqueness constraint.
    voted: HashSet<(Id, Id)>,
    totals: HashMap<(Id, CandidateId), u64>,
}

impl MemoryState {
    fn election_mut(&mut self, id: Id) -> Option<&mut Election> {
        self.elections.iter_mut().find(|e| e.id == id)
    }

    fn totals_for(&self, election_id: Id) -> Totals {
        self.totals
            .iter()
            .filter(|((id, _), _)| *id == election_id)
            .map(|((_, candidate_id), votes)| (candidate_id.clone(), *votes))
            .collect()
    }
}

#[rocket::async_trait]
impl ElectionStore for MemoryStore {
    async fn insert_election(&self, election: &Election) -> Result<bool> {
        let mut state = self.state.write().await;
        if state
            .elections
            .iter()
            .any(|e| e.metadata.code == election.metadata.code)
        {
            return Ok(false);
        }
        state.elections.push(election.clone());
        Ok(true)
    }

    async fn election(&self, id: Id) -> Result<Option<Election>> {
        let state = self.state.read().await;
        Ok(state.elections.iter().find(|e| e.id == id).cloned())
    }

    async fn election_by_code(&self, code: &str) -> Result<Option<Election>> {
        let state = self.state.read().await;
        Ok(state
            .elections
            .iter()
            .find(|e| e.metadata.code == code)
            .cloned())
    }

    async fn elections(&self) -> Result<Vec<Election>> {
        let state = self.state.read().await;
        let mut elections = state.elections.clone();
        // Stable sort keeps creation order amongst equal timestamps; reverse after.
        elections.sort_by_key(|e| e.metadata.created_at);
        elections.reverse();
        Ok(elections)
    }

    async fn replace_election(&self, election: &Election) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.election_mut(election.id) {
            Some(existing) => {
                *existing = election.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn change_lifecycle(
        &self,
        id: Id,
        change: LifecycleChange,
    ) -> Result<Option<Election>> {
        let mut state = self.state.write().await;
        Ok(state.election_mut(id).map(|election| {
            if let Some(new_state) = change.state {
                election.metadata.state = new_state;
            }
            if let Some(announced) = change.results_announced {
                election.metadata.results_announced = announced;
            }
            election.clone()
        }))
    }

    async fn record_vote(&self, vote: &Vote) -> Result<()> {
        let mut state = self.state.write().await;
        match state.elections.iter().find(|e| e.id == vote.election_id) {
            Some(election) => election.require_open()?,
            None => return Err(Error::not_found(format!("Election {}", vote.election_id))),
        }
        if !state.voted.insert((vote.election_id, vote.voter_id)) {
            return Err(Error::DuplicateVote {
                election_id: vote.election_id,
                voter_id: vote.voter_id,
            });
        }
        state.votes.push(vote.clone());
        *state
            .totals
            .entry((vote.election_id, vote.candidate_id.clone()))
            .or_insert(0) += 1;
        Ok(())
    }

    async fn vote(&self, election_id: Id, voter_id: Id) -> Result<Option<Vote>> {
        let state = self.state.read().await;
        Ok(state
            .votes
            .iter()
            .find(|v| v.election_id == election_id && v.voter_id == voter_id)
            .cloned())
    }

    async fn vote_count(&self, election_id: Id) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .votes
            .iter()
            .filter(|v| v.election_id == election_id)
            .count() as u64)
    }

    async fn votes_by_voter(&self, voter_id: Id) -> Result<Vec<Vote>> {
        let state = self.state.read().await;
        let mut votes = state
            .votes
            .iter()
            .filter(|v| v.voter_id == voter_id)
            .cloned()
            .collect::<Vec<_>>();
        votes.sort_by_key(|v| v.cast_at);
        votes.reverse();
        Ok(votes)
    }

    async fn totals(&self, election_id: Id) -> Result<Totals> {
        let state = self.state.read().await;
        Ok(state.totals_for(election_id))
    }

    async fn reconcile_totals(&self, election_id: Id) -> Result<Totals> {
        let mut state = self.state.write().await;
        let mut recounted = Totals::new();
        for vote in state.votes.iter().filter(|v| v.election_id == election_id) {
            *recounted.entry(vote.candidate_id.clone()).or_insert(0) += 1;
        }
        state.totals.retain(|(id, _), _| *id != election_id);
        for (candidate_id, votes) in recounted.iter() {
            state
                .totals
                .insert((election_id, candidate_id.clone()), *votes);
        }
        Ok(recounted)
    }
}
