use rocket::{serde::json, Route};

use crate::error::{Error, Result};

mod admin;
mod public;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(public::routes());
    routes.extend(voting::routes());
    routes
}

/// Unwrap a JSON request body, reporting malformed input as a validation error.
fn body<T>(data: std::result::Result<json::Json<T>, json::Error<'_>>) -> Result<T> {
    data.map(json::Json::into_inner)
        .map_err(|err| Error::Validation(format!("Malformed request body: {err}")))
}
