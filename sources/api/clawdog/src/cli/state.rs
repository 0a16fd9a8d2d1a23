use argh::FromArgs;
use datastore::Access;
use snafu::ResultExt;

use super::{open_store, print_json};
use crate::config::Config;
use crate::error::{self, Result};

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "state")]
/// Show the staged and active revisions and the commit history
pub(crate) struct State {}

impl State {
    pub(crate) fn run(self, config: &Config) -> Result<()> {
        let state = open_store(config, Access::Read)?.state().context(error::StoreSnafu)?;
        print_json(&state)
    }
}
