use crate::error::{Error, Result};
use crate::model::{
    api::election::ElectionResults,
    common::election::ElectionState,
    db::election::Election,
    mongodb::Id,
};
use crate::store::{LifecycleChange, Store};

use super::{require_election, TallyAggregator};

/// Who is asking for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Admins see results at any time.
    Admin,
    /// Everyone else only sees announced results.
    Public,
}

/// Controls the announced marker, and with it who can see results.
pub struct ResultsPublisher {
    store: Store,
}

impl ResultsPublisher {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Close the election, if it isn't already, and announce its results.
    pub async fn announce(&self, election_id: Id) -> Result<Election> {
        let change = LifecycleChange {
            state: Some(ElectionState::Closed),
            results_announced: Some(true),
        };
        let election = self
            .store
            .change_lifecycle(election_id, change)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
        info!("Announced results of election {election_id}");
        Ok(election)
    }

    /// Hide a closed election's results from voters again.
    pub async fn withdraw(&self, election_id: Id) -> Result<Election> {
        let election = require_election(&self.store, election_id).await?;
        if election.metadata.state != ElectionState::Closed {
            return Err(Error::State(format!(
                "Election {election_id} is {}; only closed elections have results to withdraw",
                election.metadata.state
            )));
        }
        let change = LifecycleChange {
            results_announced: Some(false),
            ..Default::default()
        };
        let election = self
            .store
            .change_lifecycle(election_id, change)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
        info!("Withdrew results of election {election_id}");
        Ok(election)
    }

    /// Results of an election, if `audience` may see them.
    pub async fn results(&self, election_id: Id, audience: Audience) -> Result<ElectionResults> {
        let election = require_election(&self.store, election_id).await?;
        check_visible(&election, audience)?;
        TallyAggregator::new(self.store.clone())
            .results_for(&election)
            .await
    }
}

/// The announced marker is the only thing gating voter-visible results.
fn check_visible(election: &Election, audience: Audience) -> Result<()> {
    match audience {
        Audience::Admin => Ok(()),
        Audience::Public if election.metadata.results_announced => Ok(()),
        Audience::Public => Err(Error::Forbidden(format!(
            "Results of election {} have not been announced",
            election.id
        ))),
    }
}
