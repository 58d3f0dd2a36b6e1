mod desc;
mod results;
mod spec;

pub use desc::{CandidateDescription, ElectionDescription, ElectionSummary};
pub use results::{CandidateResult, ElectionResults, Standing};
pub use spec::{CandidateSpec, ElectionPatch, ElectionSpec};
