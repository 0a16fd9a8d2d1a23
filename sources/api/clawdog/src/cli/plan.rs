use argh::FromArgs;
use datastore::Access;
use std::path::PathBuf;

use super::{active_tree, open_store, print_json, read_document};
use crate::config::Config;
use crate::error::Result;

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "plan")]
/// Show the ops plan a configuration document compiles to
pub(crate) struct Plan {
    #[argh(positional)]
    /// JSON configuration document, or "-" for stdin; defaults to the active configuration
    file: Option<PathBuf>,
}

impl Plan {
    pub(crate) fn run(self, config: &Config) -> Result<()> {
        let tree = match &self.file {
            Some(file) => read_document(file)?,
            None => active_tree(&open_store(config, Access::Read)?)?,
        };
        print_json(&opsplan::build_ops_plan(&tree))
    }
}
