//! Error taxonomy shared by every public operation.
//!
//! Validation problems are expected during normal use and are reported back to
//! the caller immediately. Every other variant belongs to one pipeline stage and
//! ends that stage without touching the in-memory tables.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::models::EntityKind;
use crate::pipeline::Stage;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Input rejected at the call boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("All fields must be filled in ({field} is empty).")]
    EmptyField {
        entity: EntityKind,
        field: &'static str,
    },
    #[error("The search field cannot be empty.")]
    EmptyPattern,
    #[error("Unknown search criterion `{criterion}` for {entity}.")]
    UnknownCriterion {
        entity: EntityKind,
        criterion: String,
    },
    #[error("Select one or more {entity} to remove.")]
    NothingSelected { entity: EntityKind },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("row {index} is out of range (table has {len} rows)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("malformed document at byte {position}: {detail}")]
    MalformedDocument { position: usize, detail: String },

    #[error("failed to read {}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode document: {detail}")]
    Encoding { detail: String },

    #[error("failed to write {}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to render report {}: {message}", .path.display())]
    ReportRendering { path: PathBuf, message: String },

    #[error("{stage} cannot run because {predecessor} failed")]
    StageOrdering { stage: Stage, predecessor: Stage },

    #[error("{stage} was cancelled because a new load reset the session")]
    StageCancelled { stage: Stage },

    #[error("{stage} gave up after waiting {waited:?} for its predecessor")]
    GateTimeout { stage: Stage, waited: Duration },

    #[error("a load is already in progress")]
    LoadInProgress,

    #[error("{stage} stopped unexpectedly")]
    StageAborted { stage: Stage },
}

impl Error {
    /// True for problems the user can fix by changing their input.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::IndexOutOfRange { .. })
    }
}

/// Extract the most relevant message from a chained collaborator error.
pub(crate) fn surface_error(err: &anyhow::Error) -> String {
    err.chain()
        .last()
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| err.to_string())
}
