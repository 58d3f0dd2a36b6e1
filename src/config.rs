use std::time::Duration;

use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::store::{MongoStore, Store};
use crate::verification::{HttpVerifier, Verifier};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    verifier_url: String,
    verifier_timeout: u64,
    #[serde(default = "default_vote_retry_limit")]
    vote_retry_limit: u32,
    // secrets
    jwt_secret: String,
}

fn default_vote_retry_limit() -> u32 {
    3
}

impl Config {
    /// Secret key shared with the credential service, used to check JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Where to send identity verification requests.
    pub fn verifier_url(&self) -> &str {
        &self.verifier_url
    }

    /// Upper bound on a single identity verification call.
    pub fn verifier_timeout(&self) -> Duration {
        Duration::from_secs(self.verifier_timeout)
    }

    /// How many times the ledger's unit of work is attempted before giving up.
    pub fn vote_retry_limit(&self) -> u32 {
        self.vote_retry_limit.max(1)
    }
}

#[cfg(test)]
impl Config {
    pub fn example() -> Self {
        Self::example_with_secret("test secret")
    }

    pub fn example_with_secret(secret: &str) -> Self {
        Self {
            verifier_url: "http://localhost:5001/verify".to_string(),
            verifier_timeout: 5,
            vote_retry_limit: default_vote_retry_limit(),
            jwt_secret: secret.to_string(),
        }
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Which store backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum StoreKind {
    Mongodb,
    Memory,
}

/// Configuration for the store.
#[derive(Deserialize)]
struct StoreConfig {
    // non-secrets
    store: StoreKind,
    // secrets
    db_uri: Option<String>,
}

/// A fairing that loads the store config, connects to the database if one is
/// configured, performs any setup necessary, and places a [`Store`] into
/// managed state.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Election store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load store config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let store = match config.store {
            StoreKind::Memory => {
                warn!("Using the in-memory store; nothing will survive a restart");
                Store::memory()
            }
            StoreKind::Mongodb => {
                let Some(db_uri) = config.db_uri else {
                    error!("`db_uri` must be set when `store = \"mongodb\"`");
                    return Err(rocket);
                };
                info!("Loaded database config, connecting...");
                // Construct the connection.
                let client = match MongoClient::with_uri_str(db_uri).await {
                    Ok(client) => client,
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                };
                let db = client.database(&get_database_name());

                // Ensure the required indexes exist.
                let store = match MongoStore::new(client, &db).await {
                    Ok(store) => store,
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                };
                info!("...database connection online!");
                Store::new(store)
            }
        };

        // Manage the state.
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "smartvote".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// A fairing that builds the HTTP identity verifier from the application
/// config and places it into managed state. Must be attached after
/// [`ConfigFairing`].
pub struct VerifierFairing;

#[rocket::async_trait]
impl Fairing for VerifierFairing {
    fn info(&self) -> Info {
        Info {
            name: "Identity verifier",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let Some(config) = rocket.state::<Config>() else {
            error!("Identity verifier needs the application config");
            return Err(rocket);
        };
        let verifier = match HttpVerifier::new(config.verifier_url(), config.verifier_timeout()) {
            Ok(verifier) => verifier,
            Err(e) => {
                error!("Failed to build identity verifier: {e}");
                return Err(rocket);
            }
        };
        info!(
            "Identity verification via {} (timeout {}s)",
            config.verifier_url(),
            config.verifier_timeout().as_secs()
        );

        // Manage the state.
        rocket = rocket.manage(Verifier::new(verifier));
        Ok(rocket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rocket::figment::{providers::Serialized, Figment};
    use rocket::serde::json::json;

    #[test]
    fn retry_limit_defaults_to_three() {
        let figment = Figment::from(Serialized::defaults(json!({
            "verifier_url": "http://verifier/verify",
            "verifier_timeout": 10,
            "jwt_secret": "secret",
        })));
        let config: Config = figment.extract().unwrap();
        assert_eq!(config.vote_retry_limit(), 3);
        assert_eq!(config.verifier_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn store_kind_is_lowercase() {
        let figment = Figment::from(Serialized::defaults(json!({ "store": "memory" })));
        let config: StoreConfig = figment.extract().unwrap();
        assert_eq!(config.store, StoreKind::Memory);
        assert!(config.db_uri.is_none());
    }
}
