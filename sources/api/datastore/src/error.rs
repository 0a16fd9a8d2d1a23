use http::StatusCode;
use snafu::Snafu;
use std::io;
use std::path::PathBuf;

/// Possible errors from revision store operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("No staged revision to commit"))]
    NoStagedRevision,

    #[snafu(display(
        "Staged revision is '{}' but the commit expected '{}'",
        staged,
        expected
    ))]
    RevisionMismatch { expected: String, staged: String },

    #[snafu(display("IO error on '{}': {}", path.display(), source))]
    Io { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to create temporary file in '{}': {}", path.display(), source))]
    CreateTempfile { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to move temporary file to '{}': {}", path.display(), source))]
    Persist {
        path: PathBuf,
        source: tempfile::PersistError,
    },

    #[snafu(display("Error serializing {}: {}", given, source))]
    Serialization {
        given: String,
        source: serde_json::Error,
    },

    #[snafu(display("Revision store integrity violation at {}: {}", path.display(), msg))]
    Corruption { msg: String, path: PathBuf },

    #[snafu(display("Revision store lock poisoned by a panicked request"))]
    StoreLock,

    #[snafu(display(
        "State directory is in use by another process ('{}'): {}",
        path.display(),
        source
    ))]
    LockHeld { path: PathBuf, source: io::Error },
}

impl Error {
    /// Whether this is a conflict the caller can resolve (stage something, wait for another
    /// process, or re-read state and retry), as opposed to a fault in the store itself.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Error::NoStagedRevision | Error::RevisionMismatch { .. } | Error::LockHeld { .. }
        )
    }

    /// The HTTP status a front door should answer with.  The two conflicts get distinct codes so
    /// callers can tell "nothing to commit" from "someone staged after you read".
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NoStagedRevision => StatusCode::CONFLICT,
            Error::RevisionMismatch { .. } => StatusCode::PRECONDITION_FAILED,
            Error::LockHeld { .. } => StatusCode::LOCKED,
            Error::Io { .. }
            | Error::CreateTempfile { .. }
            | Error::Persist { .. }
            | Error::Serialization { .. }
            | Error::Corruption { .. }
            | Error::StoreLock => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
