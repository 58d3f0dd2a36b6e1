use crate::error::Result;
use crate::model::{
    api::election::{CandidateResult, ElectionResults, Standing},
    common::election::NOTA,
    db::election::Election,
    mongodb::Id,
};
use crate::store::{Store, Totals};

use super::require_election;

/// Per-candidate vote counts.
///
/// Counts are only ever changed by the ledger's unit of work (an atomic
/// increment alongside the vote insert) or by a full recount here.
pub struct TallyAggregator {
    store: Store,
}

impl TallyAggregator {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Current results of an election.
    pub async fn results(&self, election_id: Id) -> Result<ElectionResults> {
        let election = require_election(&self.store, election_id).await?;
        self.results_for(&election).await
    }

    /// Current results of an already loaded election.
    pub async fn results_for(&self, election: &Election) -> Result<ElectionResults> {
        let totals = self.store.totals(election.id).await?;
        let total_votes = self.store.vote_count(election.id).await?;
        Ok(count(election, &totals, total_votes))
    }

    /// Recount an election from the vote ledger, overwriting the running
    /// totals, and return the corrected results.
    pub async fn reconcile(&self, election_id: Id) -> Result<ElectionResults> {
        let election = require_election(&self.store, election_id).await?;
        let before = self.store.totals(election_id).await?;
        let totals = self.store.reconcile_totals(election_id).await?;
        if before != totals {
            warn!("Tally of election {election_id} drifted from the ledger and was recounted");
        } else {
            info!("Tally of election {election_id} matches the ledger");
        }
        let total_votes: u64 = totals.values().sum();
        Ok(count(&election, &totals, total_votes))
    }
}

/// Join the running totals onto the registry and derive the standings.
fn count(election: &Election, totals: &Totals, total_votes: u64) -> ElectionResults {
    let candidates = election
        .candidates
        .iter()
        .map(|candidate| CandidateResult {
            id: candidate.id.clone(),
            name: candidate.name.clone(),
            branch: candidate.branch.clone(),
            symbol_url: candidate.symbol_url.clone(),
            votes: totals.get(&candidate.id).copied().unwrap_or(0),
        })
        .collect::<Vec<_>>();
    let nota_votes = totals.get(NOTA).copied().unwrap_or(0);
    let removed_votes: u64 = totals
        .iter()
        .filter(|(id, _)| id.as_str() != NOTA && election.candidate(id).is_none())
        .map(|(_, votes)| votes)
        .sum();
    let (winner, runner) = standings(&candidates);

    ElectionResults {
        election_id: election.id.into(),
        title: election.metadata.title.clone(),
        status: election.metadata.state,
        results_announced: election.metadata.results_announced,
        candidates,
        nota_votes,
        removed_votes,
        total_votes,
        winner,
        runner,
    }
}

/// Winner and runner-up, from candidates in ballot order.
///
/// Ties are broken by ballot order. With no candidate votes at all the winner
/// is a placeholder, and a runner-up only exists if they received a vote.
pub fn standings(candidates: &[CandidateResult]) -> (Standing, Option<Standing>) {
    let mut ranked = candidates.iter().collect::<Vec<_>>();
    // Stable, so equal counts keep ballot order.
    ranked.sort_by(|a, b| b.votes.cmp(&a.votes));

    let winner = match ranked.first() {
        Some(first) if first.votes > 0 => Standing::from(*first),
        _ => Standing::no_votes_yet(),
    };
    let runner = ranked
        .get(1)
        .filter(|second| second.votes > 0)
        .map(|second| Standing::from(*second));
    (winner, runner)
}
