use argh::FromArgs;
use datastore::Access;
use snafu::ResultExt;
use std::path::PathBuf;

use super::{open_store, print_json, read_document};
use crate::config::Config;
use crate::error::{self, Result};

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "stage")]
/// Stage a candidate configuration document, replacing anything already staged
pub(crate) struct Stage {
    #[argh(option, default = "String::new()")]
    /// who is staging; recorded in the audit trail
    actor: String,

    #[argh(positional)]
    /// JSON configuration document, or "-" for stdin
    file: PathBuf,
}

impl Stage {
    pub(crate) fn run(self, config: &Config) -> Result<()> {
        let changes = read_document(&self.file)?;
        let store = open_store(config, Access::Write)?;
        let receipt = store
            .stage(&self.actor, changes)
            .context(error::StoreSnafu)?;
        print_json(&receipt)
    }
}
