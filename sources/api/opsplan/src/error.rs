use snafu::Snafu;
use std::io;
use std::path::PathBuf;

use crate::ExecResult;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display(
        "Invalid ops mode '{}', expected 'dry-run' or 'apply'",
        mode
    ))]
    InvalidMode { mode: String },

    #[snafu(display("action not allowed: {}", action))]
    ActionNotAllowed { action: String },

    #[snafu(display("write action has no path: {}", action))]
    EmptyWritePath { action: String },

    #[snafu(display("write path not allowed: {}", path))]
    WritePathNotAllowed { path: String },

    #[snafu(display("Failed to create directory '{}': {}", path.display(), source))]
    CreateDir { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to write '{}': {}", path.display(), source))]
    WriteFile { path: PathBuf, source: io::Error },

    #[snafu(display("Failed to execute '{}': {}", command, source))]
    CommandExecutionFailure { command: String, source: io::Error },

    #[snafu(display("'{}' failed: {}", command, output))]
    FailedCommand { command: String, output: String },

    #[snafu(display("Failed to apply '{}' for {} {}: {}", action, backend, scope, source))]
    ActionFailed {
        backend: String,
        scope: String,
        action: String,
        /// Counts and logs up to and including the failed action.
        partial: ExecResult,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },
}

impl Error {
    /// The partially-applied result, if this error stopped a plan midway.
    pub fn partial_result(&self) -> Option<&ExecResult> {
        match self {
            Error::ActionFailed { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
