//! Client for the external identity verification service.
//!
//! Before a vote is cast, the voter's live camera frames are sent to the
//! liveness/face-match oracle. Only a positive answer lets the vote through;
//! a negative answer, an unreachable service or a timeout all leave the
//! ledger untouched.

use std::sync::Arc;
use std::time::Duration;

use rocket::{
    request::{self, FromRequest, Request},
    State,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Id;

/// The oracle's verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub success: bool,
    /// Why verification failed, if it did.
    #[serde(default, alias = "error")]
    pub reason: Option<String>,
}

#[rocket::async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Check the live frames against the voter's enrolled identity.
    async fn verify_identity(&self, voter_id: Id, live_frames: &[String])
        -> Result<Verification>;
}

/// Verify a voter, turning a negative verdict into an error.
pub async fn require_verified(
    verifier: &Verifier,
    voter_id: Id,
    live_frames: &[String],
) -> Result<()> {
    if live_frames.is_empty() {
        return Err(Error::Validation(
            "At least one live frame is required for identity verification".to_string(),
        ));
    }
    let verification = verifier.verify_identity(voter_id, live_frames).await?;
    if verification.success {
        debug!("Voter {voter_id} passed identity verification");
        Ok(())
    } else {
        let reason = verification
            .reason
            .unwrap_or_else(|| "identity could not be confirmed".to_string());
        info!("Voter {voter_id} failed identity verification: {reason}");
        Err(Error::VerificationFailed(reason))
    }
}

/// Request body sent to the verification service.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerificationRequest<'a> {
    voter_id: String,
    images: &'a [String],
}

/// Talks to the verification service over HTTP.
pub struct HttpVerifier {
    client: reqwest::Client,
    url: String,
}

impl HttpVerifier {
    /// Every request is bounded by `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::VerifierUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[rocket::async_trait]
impl IdentityVerifier for HttpVerifier {
    async fn verify_identity(
        &self,
        voter_id: Id,
        live_frames: &[String],
    ) -> Result<Verification> {
        let request = VerificationRequest {
            voter_id: voter_id.to_string(),
            images: live_frames,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    warn!("Identity verification for voter {voter_id} timed out");
                    Error::VerifierUnavailable("verification timed out".to_string())
                } else {
                    warn!("Identity verification for voter {voter_id} failed: {e}");
                    Error::VerifierUnavailable(e.to_string())
                }
            })?;

        // The service answers rejections with 4xx, but still in the same shape.
        let status = response.status();
        if status.is_server_error() {
            return Err(Error::VerifierUnavailable(format!(
                "verification service returned {status}"
            )));
        }
        response
            .json::<Verification>()
            .await
            .map_err(|e| Error::VerifierUnavailable(format!("malformed verification response: {e}")))
    }
}

/// The configured verifier, as managed state.
#[derive(Clone)]
pub struct Verifier(Arc<dyn IdentityVerifier>);

impl Verifier {
    pub fn new(verifier: impl IdentityVerifier + 'static) -> Self {
        Self(Arc::new(verifier))
    }
}

impl std::ops::Deref for Verifier {
    type Target = dyn IdentityVerifier;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Verifier {
    type Error = ();

    /// Panics iff the [`Verifier`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        // Unwrap is safe as `Verifier` is always managed.
        let verifier = req.guard::<&State<Verifier>>().await.unwrap();
        request::Outcome::Success(verifier.inner().clone())
    }
}

/// A verifier with a fixed answer, for tests.
#[cfg(test)]
pub struct FixedVerifier(pub bool);

#[cfg(test)]
#[rocket::async_trait]
impl IdentityVerifier for FixedVerifier {
    async fn verify_identity(&self, _: Id, _: &[String]) -> Result<Verification> {
        Ok(Verification {
            success: self.0,
            reason: (!self.0).then(|| "Face does not match".to_string()),
        })
    }
}
