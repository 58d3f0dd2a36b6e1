mod base;
mod metadata;

pub use base::{Candidate, Election};
pub use metadata::ElectionMetadata;
