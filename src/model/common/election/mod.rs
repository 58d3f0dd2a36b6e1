mod state;

pub use state::ElectionState;

/// Candidate IDs are strings, unique within their election.
pub type CandidateId = String;

/// The reserved "None of the above" pseudo-candidate.
/// Generated candidate IDs are hex object IDs, so they can never collide with this.
pub const NOTA: &str = "nota";

/// Display name used for NOTA votes.
pub const NOTA_NAME: &str = "NOTA (None of the Above)";

/// Is this the reserved NOTA candidate ID?
pub fn is_nota(candidate_id: &str) -> bool {
    candidate_id == NOTA
}
