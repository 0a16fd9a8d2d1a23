//! Settings read from `CLAWGRESS_*` environment variables.

use serde::Deserialize;
use snafu::ResultExt;
use std::path::PathBuf;

use crate::error::{self, Result};

const ENV_PREFIX: &str = "CLAWGRESS_";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct Config {
    #[serde(default = "default_state_dir")]
    pub(crate) state_dir: PathBuf,

    /// Parsed late, so a bad value only matters to commands that execute plans.
    #[serde(default = "default_ops_mode")]
    pub(crate) ops_mode: String,

    #[serde(default = "default_nft_apply")]
    pub(crate) nft_apply: bool,

    #[serde(default)]
    pub(crate) command_schema: Option<PathBuf>,
}

fn default_state_dir() -> PathBuf {
    constants::DEFAULT_STATE_DIR.into()
}

fn default_ops_mode() -> String {
    "dry-run".to_string()
}

fn default_nft_apply() -> bool {
    true
}

impl Config {
    pub(crate) fn from_env() -> Result<Self> {
        envy::prefixed(ENV_PREFIX)
            .from_env()
            .context(error::EnvironmentSnafu)
    }

    /// Used by tests to avoid depending on the process environment.
    #[cfg(test)]
    pub(crate) fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX)
            .from_iter(pairs)
            .context(error::EnvironmentSnafu)
    }
}
