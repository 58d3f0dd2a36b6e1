use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::common::election::{CandidateId, ElectionState};

/// An election specification, as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSpec {
    pub title: String,
    /// Leave unset to have a code generated.
    #[serde(default)]
    pub code: Option<String>,
    pub election_type: String,
    #[serde(default)]
    pub description: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    /// Initial status; defaults to active.
    #[serde(default)]
    pub status: Option<ElectionState>,
    pub candidates: Vec<CandidateSpec>,
}

/// A candidate as submitted by an admin. Entries without an ID are new.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSpec {
    #[serde(default)]
    pub id: Option<CandidateId>,
    pub name: String,
    pub age: u32,
    pub branch: String,
    #[serde(default)]
    pub symbol_url: Option<String>,
}

/// A partial update to an election. Absent fields are left as they are.
///
/// `candidates`, when present, is the complete new candidate list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub election_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<ElectionState>,
    #[serde(default)]
    pub candidates: Option<Vec<CandidateSpec>>,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use chrono::{Duration, Timelike};

    macro_rules! midnight_today {
        () => {{
            Utc::now()
                .with_hour(0)
                .and_then(|t| t.with_minute(0))
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0))
                .unwrap()
        }};
    }

    impl ElectionSpec {
        pub fn example() -> Self {
            let start_at = midnight_today!();
            Self {
                title: "Student Council President".to_string(),
                code: None,
                election_type: "Student Council".to_string(),
                description: "Annual election".to_string(),
                start_at,
                end_at: start_at + Duration::days(7),
                status: None,
                candidates: vec![
                    CandidateSpec::example1(),
                    CandidateSpec::example2(),
                    CandidateSpec::example3(),
                ],
            }
        }

        pub fn with_status(status: ElectionState) -> Self {
            Self {
                status: Some(status),
                ..Self::example()
            }
        }
    }

    impl CandidateSpec {
        pub fn example1() -> Self {
            Self {
                id: None,
                name: "Chris Riches".to_string(),
                age: 22,
                branch: "Computer Science".to_string(),
                symbol_url: Some("https://assets.example.org/symbols/lamp.png".to_string()),
            }
        }

        pub fn example2() -> Self {
            Self {
                id: None,
                name: "Parry Hotter".to_string(),
                age: 20,
                branch: "Mechanical".to_string(),
                symbol_url: None,
            }
        }

        pub fn example3() -> Self {
            Self {
                id: None,
                name: "Jane Doe".to_string(),
                age: 21,
                branch: "Civil".to_string(),
                symbol_url: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rocket::serde::json::serde_json;

    #[test]
    fn draft_is_accepted_as_upcoming() {
        let json = r#"{
            "title": "Sports Secretary",
            "electionType": "Club",
            "startAt": "2024-03-01T09:00:00Z",
            "endAt": "2024-03-02T17:00:00Z",
            "status": "draft",
            "candidates": [
                {"name": "A", "age": 19, "branch": "EE"},
                {"id": "x1", "name": "B", "age": 20, "branch": "ME", "symbolUrl": "s.png"}
            ]
        }"#;
        let spec: ElectionSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.status, Some(ElectionState::Upcoming));
        assert_eq!(spec.code, None);
        assert_eq!(spec.description, "");
        assert_eq!(spec.candidates[0].id, None);
        assert_eq!(spec.candidates[1].symbol_url.as_deref(), Some("s.png"));
    }

    #[test]
    fn patch_fields_are_all_optional() {
        let patch: ElectionPatch = serde_json::from_str(r#"{"status": "closed"}"#).unwrap();
        assert_eq!(patch.status, Some(ElectionState::Closed));
        assert!(patch.title.is_none());
        assert!(patch.candidates.is_none());
    }
}
