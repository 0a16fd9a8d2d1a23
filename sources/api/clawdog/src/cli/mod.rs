mod commit;
mod plan;
mod set;
mod show;
mod stage;
mod state;

pub(crate) use commit::Commit;
pub(crate) use plan::Plan;
pub(crate) use set::Set;
pub(crate) use show::Show;
pub(crate) use stage::Stage;
pub(crate) use state::State;

use datastore::{Access, FilesystemDataStore, RevisionStore};
use grammar::Catalog;
use model::Tree;
use serde::Serialize;
use snafu::ResultExt;
use std::borrow::Cow;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use crate::config::Config;
use crate::error::{self, Result};

/// Opens the revision store under the configured state directory and locks it for the life of
/// the store.  Writers finish any interrupted commit first; readers see the directory as found.
fn open_store(config: &Config, access: Access) -> Result<RevisionStore<FilesystemDataStore>> {
    let datastore =
        FilesystemDataStore::locked(&config.state_dir, access).context(error::StoreSnafu)?;
    match access {
        Access::Write => RevisionStore::open(datastore).context(error::StoreSnafu),
        Access::Read => Ok(RevisionStore::new(datastore)),
    }
}

/// The built-in catalog, unless the configuration names a replacement.
fn load_catalog(config: &Config) -> Result<Cow<'static, Catalog>> {
    match &config.command_schema {
        None => Ok(Cow::Borrowed(Catalog::builtin())),
        Some(path) => {
            let data = fs::read_to_string(path).context(error::ReadInputSnafu { path })?;
            let catalog = Catalog::from_json(&data).context(error::LoadCatalogSnafu { path })?;
            Ok(Cow::Owned(catalog))
        }
    }
}

/// Reads a JSON configuration document from a file, or from stdin if the path is `-`.
fn read_document(path: &Path) -> Result<Tree> {
    let mut data = String::new();
    if path == Path::new("-") {
        io::stdin()
            .read_to_string(&mut data)
            .context(error::ReadInputSnafu { path })?;
    } else {
        data = fs::read_to_string(path).context(error::ReadInputSnafu { path })?;
    }
    serde_json::from_str(&data).context(error::ParseDocumentSnafu { path })
}

/// The active configuration, or an empty tree if nothing has been committed yet.
fn active_tree(store: &RevisionStore<FilesystemDataStore>) -> Result<Tree> {
    Ok(store
        .active()
        .context(error::StoreSnafu)?
        .map(|revision| revision.changes)
        .unwrap_or_default())
}

/// Serializes the input to pretty JSON and prints it.
fn print_json<S: Serialize>(val: &S) -> Result<()> {
    let output = serde_json::to_string_pretty(val).context(error::SerializeJsonSnafu)?;
    println!("{}", output);
    Ok(())
}
