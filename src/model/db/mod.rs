//! Types as they are stored in the database.

pub mod candidate_totals;
pub mod election;
pub mod vote;
