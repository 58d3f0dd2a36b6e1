use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{status, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::model::mongodb::Id;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or insufficient input.
    #[error("Validation failed: {0}")]
    Validation(String),
    /// Unknown election, candidate or voter.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The voter already has a vote recorded for this election.
    #[error("Voter {voter_id} has already voted in election {election_id}")]
    DuplicateVote { election_id: Id, voter_id: Id },
    /// The election is not in a state that permits the operation.
    #[error("Invalid election state: {0}")]
    State(String),
    /// A vote could not be recorded after repeated transient failures.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The caller may not see this resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// The identity verifier rejected the voter.
    #[error("Identity verification failed: {0}")]
    VerificationFailed(String),
    /// The identity verifier could not be reached in time.
    #[error("Identity verifier unavailable: {0}")]
    VerifierUnavailable(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// The machine-readable kind reported to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::DuplicateVote { .. } => "duplicate_vote",
            Self::State(_) => "invalid_state",
            Self::Conflict(_) => "conflict",
            Self::Forbidden(_) => "forbidden",
            Self::VerificationFailed(_) => "verification_failed",
            Self::VerifierUnavailable(_) => "verifier_unavailable",
            Self::Db(_) => "internal",
            Self::Jwt(_) => "unauthorized",
        }
    }

    /// The HTTP status this error maps to.
    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) => Status::BadRequest,
            Self::NotFound(_) => Status::NotFound,
            Self::DuplicateVote { .. } => Status::Conflict,
            Self::State(_) => Status::UnprocessableEntity,
            Self::Conflict(_) => Status::ServiceUnavailable,
            Self::Forbidden(_) | Self::VerificationFailed(_) => Status::Forbidden,
            Self::VerifierUnavailable(_) => Status::ServiceUnavailable,
            Self::Db(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
        }
    }
}

/// The JSON body of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.code >= 500 {
            error!("{self}");
        } else {
            debug!("{self}");
        }
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        status::Custom(status, Json(body)).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinguishes_duplicate_vote_from_closed_election() {
        let duplicate = Error::DuplicateVote {
            election_id: Id::new(),
            voter_id: Id::new(),
        };
        let closed = Error::State("Election is closed".to_string());

        assert_ne!(duplicate.kind(), closed.kind());
        assert_eq!(duplicate.status(), Status::Conflict);
        assert_eq!(closed.status(), Status::UnprocessableEntity);
    }

    #[test]
    fn client_errors_are_not_server_errors() {
        let errors = [
            Error::Validation("no candidates".to_string()),
            Error::not_found("Election"),
            Error::Forbidden("results not announced".to_string()),
            Error::VerificationFailed("face mismatch".to_string()),
        ];
        for err in errors {
            assert!(err.status().code < 500, "{err}");
        }
    }
}
