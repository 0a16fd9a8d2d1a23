use argh::FromArgs;
use grammar::Catalog;
use model::{Key, Tree};
use serde::Serialize;
use snafu::{ensure, OptionExt, ResultExt};
use std::fs;
use std::path::{Path, PathBuf};

use super::{load_catalog, print_json, read_document};
use crate::config::Config;
use crate::error::{self, Result};

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "set")]
/// Validate a set command and fold it into a candidate document, creating the document if needed
pub(crate) struct Set {
    #[argh(positional)]
    /// candidate JSON configuration document
    file: PathBuf,

    #[argh(positional)]
    /// command path tokens followed by the value, e.g. "system ntp server 0.pool.ntp.org"
    words: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SetOutcome<'a> {
    path: &'a str,
    document: &'a Path,
}

impl Set {
    pub(crate) fn run(self, config: &Config) -> Result<()> {
        let catalog = load_catalog(config)?;
        let key = set_in_document(&catalog, &self.file, &self.words)?;
        print_json(&SetOutcome {
            path: key.name(),
            document: &self.file,
        })
    }
}

/// Applies one `set` command to the document at `path`.  Nothing is written unless the command
/// validates.
fn set_in_document(catalog: &Catalog, path: &Path, words: &[String]) -> Result<Key> {
    let (value, tokens) = words.split_last().context(error::MissingSetValueSnafu)?;
    ensure!(!tokens.is_empty(), error::MissingSetValueSnafu);

    let mut tree = if path.exists() {
        read_document(path)?
    } else {
        Tree::new()
    };
    let key = grammar::apply_set(catalog, &mut tree, tokens, value).context(error::GrammarSnafu)?;

    let mut data = serde_json::to_string_pretty(&tree).context(error::SerializeJsonSnafu)?;
    data.push('\n');
    fs::write(path, data).context(error::WriteDocumentSnafu { path })?;
    Ok(key)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn words(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn builds_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("candidate.json");
        let catalog = Catalog::builtin();

        for line in &[
            "system host-name gw1",
            "system ntp server a.pool",
            "system ntp server b.pool",
            "interfaces ethernet eth0 address dhcp",
        ] {
            set_in_document(catalog, &path, &words(line)).unwrap();
        }
        let key = set_in_document(
            catalog,
            &path,
            &words("nat source rule 10 translation address masquerade"),
        )
        .unwrap();
        assert_eq!(key.name(), "nat.source.rule.10.translation.address");

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            written,
            json!({
                "system": {"host_name": "gw1", "ntp": {"server": ["a.pool", "b.pool"]}},
                "interfaces": {"ethernet": {"eth0": {"address": "dhcp"}}},
                "nat": {"source": {"rule": {"10": {"translation": {"address": "masquerade"}}}}}
            })
        );
    }

    #[test]
    fn invalid_command_leaves_document_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("candidate.json");
        let catalog = Catalog::builtin();
        set_in_document(catalog, &path, &words("system host-name gw1")).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        assert!(set_in_document(catalog, &path, &words("system bogus x")).is_err());
        assert!(set_in_document(catalog, &path, &words("gw2")).is_err());
        assert!(set_in_document(catalog, &path, &[]).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn missing_document_not_created_on_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("candidate.json");
        assert!(set_in_document(Catalog::builtin(), &path, &words("bogus x")).is_err());
        assert!(!path.exists());
    }
}
