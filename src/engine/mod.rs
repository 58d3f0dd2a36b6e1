//! The election lifecycle and vote tallying engine.
//!
//! Each component is a thin handle over the managed [`Store`], built per
//! request as a request guard:
//!
//! - [`CandidateRegistry`]: the ordered candidates of one election.
//! - [`ElectionStateMachine`]: lifecycle status, gating casting.
//! - [`VoteLedger`]: one vote per (election, voter).
//! - [`TallyAggregator`]: per-candidate counts and standings.
//! - [`ResultsPublisher`]: the announced marker gating voter-visible results.

use rocket::request::{FromRequest, Outcome, Request};

use crate::error::{Error, Result};
use crate::model::{db::election::Election, mongodb::Id};
use crate::store::Store;

mod ledger;
mod lifecycle;
mod publisher;
mod registry;
mod tally;

pub use ledger::VoteLedger;
pub use lifecycle::ElectionStateMachine;
pub use publisher::{Audience, ResultsPublisher};
pub use registry::CandidateRegistry;
pub use tally::TallyAggregator;

/// Load an election, or fail with [`Error::NotFound`].
async fn require_election(store: &Store, election_id: Id) -> Result<Election> {
    store
        .election(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))
}

/// Components that need nothing but the store are request guards via it.
macro_rules! store_guard {
    ($($component:ident),+ $(,)?) => {
        $(
            #[rocket::async_trait]
            impl<'r> FromRequest<'r> for $component {
                type Error = ();

                async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
                    req.guard::<Store>().await.map(Self::new)
                }
            }
        )+
    };
}

store_guard!(
    CandidateRegistry,
    ElectionStateMachine,
    TallyAggregator,
    ResultsPublisher,
);
