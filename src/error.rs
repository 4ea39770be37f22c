use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of a capacity-calculation error. Callers match on this exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Invalid bracket, seed, splitting factors or request shape
    Configuration,
    /// Unknown run or resource
    NotFound,
    /// Loadflow did not converge and no secure value could be reported
    SolverDivergence,
    /// GLSK capacity exhausted before any secure value was found
    GlskLimitation,
    /// Network is unsecure down to the floor value
    NoSecureValue,
    /// Run stopped by an interrupt request
    Interruption,
    /// Solver unreachable, timed out or returned garbage
    SolverInvocation,
    Internal,
}

impl ErrorKind {
    /// Numeric status attached to errors of this kind (HTTP semantics)
    pub fn status(&self) -> u16 {
        match self {
            ErrorKind::Configuration => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Interruption => 409,
            ErrorKind::SolverDivergence | ErrorKind::GlskLimitation | ErrorKind::NoSecureValue => {
                422
            }
            ErrorKind::Internal => 500,
            ErrorKind::SolverInvocation => 502,
        }
    }
}

/// Single tagged error type for the whole crate.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct CapacityError {
    pub kind: ErrorKind,
    pub status: u16,
    pub message: String,
}

impl CapacityError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: kind.status(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl From<anyhow::Error> for CapacityError {
    fn from(error: anyhow::Error) -> Self {
        CapacityError::internal(format!("{error:#}"))
    }
}

impl From<validator::ValidationErrors> for CapacityError {
    fn from(errors: validator::ValidationErrors) -> Self {
        CapacityError::configuration(errors.to_string())
    }
}
