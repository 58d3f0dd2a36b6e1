//! Durable storage behind the election engine.
//!
//! Every piece of state shared between requests lives behind [`ElectionStore`].
//! The engine components only ever talk to a [`Store`] handle, which Rocket
//! keeps in managed state.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::error::Result;
use crate::model::{
    common::election::{CandidateId, ElectionState},
    db::{election::Election, vote::Vote},
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Per-candidate vote counts of one election, keyed by candidate ID.
/// The NOTA bucket is keyed by [`crate::model::common::election::NOTA`].
pub type Totals = HashMap<CandidateId, u64>;

/// A change to an election's lifecycle fields. `None` leaves a field alone.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleChange {
    pub state: Option<ElectionState>,
    pub results_announced: Option<bool>,
}

#[rocket::async_trait]
pub trait ElectionStore: Send + Sync {
    /// Insert a new election. Returns `false` without inserting if its code is
    /// already in use.
    async fn insert_election(&self, election: &Election) -> Result<bool>;

    async fn election(&self, id: Id) -> Result<Option<Election>>;

    async fn election_by_code(&self, code: &str) -> Result<Option<Election>>;

    /// All elections, most recently created first.
    async fn elections(&self) -> Result<Vec<Election>>;

    /// Overwrite an existing election. Returns `false` if there is no election
    /// with that ID.
    async fn replace_election(&self, election: &Election) -> Result<bool>;

    /// Apply a lifecycle change, returning the updated election if it exists.
    async fn change_lifecycle(&self, id: Id, change: LifecycleChange)
        -> Result<Option<Election>>;

    /// Insert a vote into the ledger and increment its candidate's total, as a
    /// single unit of work: either both happen or neither does.
    ///
    /// The election must exist and be active at the moment the vote is written,
    /// so a close that lands first always wins: the vote then fails with
    /// [`crate::error::Error::State`] (or [`crate::error::Error::NotFound`]).
    ///
    /// Fails with [`crate::error::Error::DuplicateVote`] if the voter already has
    /// a vote in that election, and with [`crate::error::Error::Conflict`] if a
    /// transient failure occurred and the operation may be retried.
    async fn record_vote(&self, vote: &Vote) -> Result<()>;

    /// The ledger entry for this voter in this election, if any.
    async fn vote(&self, election_id: Id, voter_id: Id) -> Result<Option<Vote>>;

    /// How many votes the ledger holds for an election.
    async fn vote_count(&self, election_id: Id) -> Result<u64>;

    /// Every vote ever cast by this voter, most recent first.
    async fn votes_by_voter(&self, voter_id: Id) -> Result<Vec<Vote>>;

    /// The current running totals of an election.
    async fn totals(&self, election_id: Id) -> Result<Totals>;

    /// Recount an election's votes from the ledger and overwrite its running
    /// totals with the result, as a single unit of work.
    async fn reconcile_totals(&self, election_id: Id) -> Result<Totals>;
}

/// A cheaply cloneable handle to the configured store.
#[derive(Clone)]
pub struct Store(Arc<dyn ElectionStore>);

impl Store {
    pub fn new(store: impl ElectionStore + 'static) -> Self {
        Self(Arc::new(store))
    }

    /// A fresh, empty in-memory store.
    pub fn memory() -> Self {
        Self::new(MemoryStore::default())
    }
}

impl Deref for Store {
    type Target = dyn ElectionStore;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Store {
    type Error = ();

    /// Get the store from the managed state.
    ///
    /// Panics iff the [`Store`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        // Unwrap is safe as `Store` is always managed.
        let store = req.guard::<&State<Store>>().await.unwrap();
        request::Outcome::Success(store.inner().clone())
    }
}
