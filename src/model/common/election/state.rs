use std::fmt::{Display, Formatter};

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// States in the Election lifecycle.
///
/// Transitions only ever move forwards: `Upcoming` -> `Active` -> `Closed`.
/// Whether results are announced is tracked separately on the election.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionState {
    /// Scheduled but not yet open for voting.
    #[serde(alias = "draft")]
    Upcoming,
    /// Open for voting.
    Active,
    /// Voting has finished. Terminal.
    Closed,
}

impl ElectionState {
    /// Can an election in this state move to `next`?
    /// Staying put is always allowed, so repeated requests are idempotent.
    pub fn can_become(self, next: ElectionState) -> bool {
        next >= self
    }

    /// Are votes accepted in this state?
    pub fn accepts_votes(self) -> bool {
        self == ElectionState::Active
    }
}

impl Display for ElectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Closed => "closed",
        };
        write!(f, "{name}")
    }
}

impl From<ElectionState> for Bson {
    fn from(state: ElectionState) -> Self {
        to_bson(&state).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_monotonic() {
        use ElectionState::*;

        assert!(Upcoming.can_become(Active));
        assert!(Upcoming.can_become(Closed));
        assert!(Active.can_become(Closed));
        assert!(Active.can_become(Active));
        assert!(Closed.can_become(Closed));

        assert!(!Active.can_become(Upcoming));
        assert!(!Closed.can_become(Active));
        assert!(!Closed.can_become(Upcoming));
    }

    #[test]
    fn only_active_accepts_votes() {
        assert!(!ElectionState::Upcoming.accepts_votes());
        assert!(ElectionState::Active.accepts_votes());
        assert!(!ElectionState::Closed.accepts_votes());
    }

    #[test]
    fn draft_is_accepted_as_upcoming() {
        let state: ElectionState = rocket::serde::json::serde_json::from_str("\"draft\"").unwrap();
        assert_eq!(state, ElectionState::Upcoming);
        let state: ElectionState =
            rocket::serde::json::serde_json::from_str("\"closed\"").unwrap();
        assert_eq!(state, ElectionState::Closed);
    }
}
