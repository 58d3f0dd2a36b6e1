#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

#[cfg(test)]
#[macro_use]
extern crate db_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, StoreFairing, VerifierFairing};
use crate::logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod store;
pub mod verification;

/// Build the server. Configuration, the store and the identity verifier are
/// all set up by fairings when the server ignites.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .attach(VerifierFairing)
        .attach(LoggerFairing)
}

/// Build a server around the given store and verifier, with example config.
#[cfg(test)]
pub(crate) fn rocket_for_store_and_verifier(
    store: store::Store,
    verifier: verification::Verifier,
) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .manage(config::Config::example())
        .manage(store)
        .manage(verifier)
        .attach(LoggerFairing)
}
