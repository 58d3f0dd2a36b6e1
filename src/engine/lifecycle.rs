use chrono::Utc;
use rand::Rng;

use crate::error::{Error, Result};
use crate::model::{
    api::election::{ElectionPatch, ElectionSpec},
    common::election::ElectionState,
    db::election::Election,
    mongodb::Id,
};
use crate::store::{LifecycleChange, Store};

use super::{registry, require_election, CandidateRegistry};

/// Attempts at finding an unused generated code before giving up.
const CODE_ATTEMPTS: usize = 10;

/// Governs each election's lifecycle: `upcoming` -> `active` -> `closed`.
///
/// Nothing here runs on a timer; an election only changes status when an
/// admin (or an external scheduler acting as one) asks.
pub struct ElectionStateMachine {
    store: Store,
    registry: CandidateRegistry,
}

impl ElectionStateMachine {
    pub fn new(store: Store) -> Self {
        Self {
            registry: CandidateRegistry::new(store.clone()),
            store,
        }
    }

    /// Create and store a new election.
    pub async fn create(&self, spec: ElectionSpec) -> Result<Election> {
        let title = required("title", &spec.title)?;
        let election_type = required("election type", &spec.election_type)?;
        check_window(&spec)?;
        let candidates = registry::build_candidates(spec.candidates)?;
        let state = spec.status.unwrap_or(ElectionState::Active);

        let mut election = Election::new(
            title,
            String::new(),
            election_type,
            spec.description,
            spec.start_at,
            spec.end_at,
            state,
            candidates,
        );

        match spec.code.as_deref().map(str::trim) {
            Some("") | None => {
                // Generated codes can collide; try a few.
                let mut inserted = false;
                for _ in 0..CODE_ATTEMPTS {
                    election.metadata.code = generate_code();
                    if self.store.insert_election(&election).await? {
                        inserted = true;
                        break;
                    }
                    debug!("Generated election code {} taken", election.metadata.code);
                }
                if !inserted {
                    return Err(Error::Conflict(
                        "Could not find an unused election code".to_string(),
                    ));
                }
            }
            Some(code) => {
                election.metadata.code = code.to_string();
                if !self.store.insert_election(&election).await? {
                    return Err(Error::Validation(format!(
                        "Election code {code} is already in use"
                    )));
                }
            }
        }

        info!(
            "Created election {} ({}) as {}",
            election.id, election.metadata.code, election.metadata.state
        );
        Ok(election)
    }

    /// Apply a partial update to an election.
    pub async fn update(&self, election_id: Id, patch: ElectionPatch) -> Result<Election> {
        let mut election = require_election(&self.store, election_id).await?;
        let metadata = &mut election.metadata;

        if let Some(title) = patch.title {
            metadata.title = required("title", &title)?;
        }
        if let Some(election_type) = patch.election_type {
            metadata.election_type = required("election type", &election_type)?;
        }
        if let Some(description) = patch.description {
            metadata.description = description;
        }
        if let Some(start_at) = patch.start_at {
            metadata.start_at = start_at;
        }
        if let Some(end_at) = patch.end_at {
            metadata.end_at = end_at;
        }
        if metadata.end_at <= metadata.start_at {
            return Err(Error::Validation(
                "Election must end after it starts".to_string(),
            ));
        }
        if let Some(status) = patch.status {
            if !metadata.state.can_become(status) {
                return Err(Error::State(format!(
                    "Election {election_id} cannot go from {} back to {status}",
                    metadata.state
                )));
            }
            metadata.state = status;
        }
        if let Some(drafts) = patch.candidates {
            self.registry.revise(&mut election, drafts)?;
        }

        if !self.store.replace_election(&election).await? {
            return Err(Error::not_found(format!("Election {election_id}")));
        }
        info!("Updated election {election_id}");
        Ok(election)
    }

    /// Close an election. Closing a closed election changes nothing.
    pub async fn close(&self, election_id: Id) -> Result<Election> {
        let change = LifecycleChange {
            state: Some(ElectionState::Closed),
            ..Default::default()
        };
        let election = self
            .store
            .change_lifecycle(election_id, change)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
        info!("Closed election {election_id}");
        Ok(election)
    }

    pub async fn get(&self, election_id: Id) -> Result<Election> {
        require_election(&self.store, election_id).await
    }

    pub async fn by_code(&self, code: &str) -> Result<Election> {
        self.store
            .election_by_code(code.trim())
            .await?
            .ok_or_else(|| Error::not_found(format!("Election with code {code}")))
    }

    /// All elections, most recently created first.
    pub async fn list(&self) -> Result<Vec<Election>> {
        self.store.elections().await
    }
}

/// A trimmed, non-blank copy of a required text field.
fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(Error::Validation(format!("Election {field} is required")))
    } else {
        Ok(value.to_string())
    }
}

fn check_window(spec: &ElectionSpec) -> Result<()> {
    if spec.end_at <= spec.start_at {
        Err(Error::Validation(
            "Election must end after it starts".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// A code of the form `ELEC<YYYYMMDD><4 digits>`.
fn generate_code() -> String {
    let suffix: u16 = rand::thread_rng().gen_range(1000..=9999);
    format!("ELEC{}{suffix}", Utc::now().format("%Y%m%d"))
}
