use snafu::Snafu;
use std::io;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub(crate) enum Error {
    #[snafu(display("Logger setup error: {}", source))]
    Logger { source: log::SetLoggerError },

    #[snafu(display("Unable to read settings from environment: {}", source))]
    Environment { source: envy::Error },

    #[snafu(display("Unable to read '{}': {}", path.display(), source))]
    ReadInput { path: PathBuf, source: io::Error },

    #[snafu(display("Unable to write '{}': {}", path.display(), source))]
    WriteDocument { path: PathBuf, source: io::Error },

    #[snafu(display("Invalid configuration document '{}': {}", path.display(), source))]
    ParseDocument {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[snafu(display("Unable to load command catalog '{}': {}", path.display(), source))]
    LoadCatalog {
        path: PathBuf,
        source: grammar::Error,
    },

    #[snafu(display("Error serializing to JSON: {}", source))]
    SerializeJson { source: serde_json::Error },

    #[snafu(display("Revision store error ({}): {}", source.status_code(), source))]
    Store { source: datastore::Error },

    #[snafu(display("{}", source))]
    Grammar { source: grammar::Error },

    #[snafu(display("A set command needs a path and a value"))]
    MissingSetValue,

    #[snafu(display("No handler for show command '{}'", command))]
    UnsupportedShow { command: String },

    #[snafu(display("{}", source))]
    OpsMode { source: opsplan::Error },

    #[snafu(display("Committed revision {} but its ops plan failed: {}", revision_id, source))]
    ExecutePlan {
        revision_id: String,
        source: opsplan::Error,
    },

    #[snafu(display(
        "Committed revision {} but its firewall rules failed: {}",
        revision_id,
        source
    ))]
    Nftables {
        revision_id: String,
        source: opsplan::Error,
    },

    #[snafu(display("Revision store has no active revision after commit"))]
    NoActiveRevision,
}

impl Error {
    /// Losing a race, or finding another run holding the store, is worth telling apart from
    /// real failures.
    pub(crate) fn exit_code(&self) -> i32 {
        match self {
            Error::Store { source } if source.is_conflict() => 2,
            _ => 1,
        }
    }
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
