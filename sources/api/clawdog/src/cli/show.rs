use argh::FromArgs;
use datastore::{Access, DataStore, RevisionStore, StateView};
use grammar::{Catalog, Commands};
use model::Tree;
use opsplan::Operation;
use serde::Serialize;
use snafu::ResultExt;

use super::{load_catalog, open_store, print_json};
use crate::config::Config;
use crate::error::{self, Result};

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "show")]
/// Run a show command, e.g. "show commands" or "show configuration"
pub(crate) struct Show {
    #[argh(switch)]
    /// print configuration as set commands rather than JSON
    commands: bool,

    #[argh(positional)]
    /// show command tokens
    words: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ShowOutput {
    Commands(Commands),
    Configuration(Tree),
    Lines(Vec<String>),
    State(StateView),
    Plan(Vec<Operation>),
    Text(String),
}

impl Show {
    pub(crate) fn run(self, config: &Config) -> Result<()> {
        let catalog = load_catalog(config)?;
        let store = open_store(config, Access::Read)?;
        print_json(&show(&catalog, &store, &self.words, self.commands)?)
    }
}

fn show<D: DataStore>(
    catalog: &Catalog,
    store: &RevisionStore<D>,
    words: &[String],
    as_commands: bool,
) -> Result<ShowOutput> {
    let entry = catalog.match_show(words).context(error::GrammarSnafu)?;
    let active = || -> Result<Tree> {
        Ok(store
            .active()
            .context(error::StoreSnafu)?
            .map(|revision| revision.changes)
            .unwrap_or_default())
    };

    let command = entry.tokens.join(" ");
    let output = match (command.as_str(), as_commands) {
        ("commands", _) => ShowOutput::Commands(catalog.commands()),
        ("configuration", false) => ShowOutput::Configuration(active()?),
        ("configuration", true) | ("configuration commands", _) => {
            ShowOutput::Lines(grammar::render_set_commands(&active()?))
        }
        ("state", _) => ShowOutput::State(store.state().context(error::StoreSnafu)?),
        ("ops_plan", _) => ShowOutput::Plan(opsplan::build_ops_plan(&active()?)),
        ("firewall rules", _) => ShowOutput::Text(opsplan::render_rules(&active()?)),
        _ => return error::UnsupportedShowSnafu { command: &command }.fail(),
    };
    Ok(output)
}

#[cfg(test)]
mod test {
    use super::*;
    use datastore::MemoryDataStore;
    use grammar::GrammarEntry;
    use serde_json::json;

    fn words(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    fn committed_store() -> RevisionStore<MemoryDataStore> {
        let store = RevisionStore::open(MemoryDataStore::new()).unwrap();
        let tree = serde_json::from_value(json!({
            "system": {"host_name": "gw1"},
            "interfaces": {"ethernet": {"eth0": {"address": "dhcp", "role": "wan"}}},
            "firewall": {"nftables": {"wan_block": true}}
        }))
        .unwrap();
        store.stage("admin", tree).unwrap();
        store.commit("admin", None).unwrap();
        store
    }

    #[test]
    fn configuration_views() {
        let store = committed_store();
        let catalog = Catalog::builtin();

        match show(catalog, &store, &words("configuration"), false).unwrap() {
            ShowOutput::Configuration(tree) => assert_eq!(
                model::str_at(&tree, &["system", "host_name"]),
                Some("gw1")
            ),
            other => panic!("unexpected output: {:?}", other),
        }

        let expected = vec![
            "set firewall nftables wan_block true",
            "set interfaces ethernet eth0 address dhcp",
            "set interfaces ethernet eth0 role wan",
            "set system host_name gw1",
        ];
        for (line, flag) in &[("configuration", true), ("configuration commands", false)] {
            match show(catalog, &store, &words(line), *flag).unwrap() {
                ShowOutput::Lines(lines) => assert_eq!(lines, expected),
                other => panic!("unexpected output: {:?}", other),
            }
        }
    }

    #[test]
    fn derived_views() {
        let store = committed_store();
        let catalog = Catalog::builtin();

        match show(catalog, &store, &words("firewall rules"), false).unwrap() {
            ShowOutput::Text(rules) => assert!(rules.contains("elements = { \"eth0\" }")),
            other => panic!("unexpected output: {:?}", other),
        }
        match show(catalog, &store, &words("ops-plan"), false).unwrap() {
            ShowOutput::Plan(plan) => assert!(plan.iter().any(|op| op.scope == "firewall")),
            other => panic!("unexpected output: {:?}", other),
        }
        match show(catalog, &store, &words("state"), false).unwrap() {
            ShowOutput::State(state) => assert_eq!(state.history_size, 1),
            other => panic!("unexpected output: {:?}", other),
        }
        match show(catalog, &store, &words("commands"), false).unwrap() {
            ShowOutput::Commands(commands) => assert!(!commands.set.is_empty()),
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[test]
    fn empty_store_shows_empty_configuration() {
        let store = RevisionStore::open(MemoryDataStore::new()).unwrap();
        match show(Catalog::builtin(), &store, &words("configuration"), false).unwrap() {
            ShowOutput::Configuration(tree) => assert!(tree.is_empty()),
            other => panic!("unexpected output: {:?}", other),
        }
    }

    #[test]
    fn unknown_show() {
        let store = RevisionStore::open(MemoryDataStore::new()).unwrap();
        assert!(show(Catalog::builtin(), &store, &words("bogus"), false).is_err());

        // Valid in a custom catalog, but nothing here knows how to show it.
        let catalog = Catalog::new(vec![GrammarEntry {
            kind: grammar::Kind::Show,
            tokens: vec!["interfaces".to_string()],
            value_token: String::new(),
            description: String::new(),
            multi: false,
        }]);
        assert!(matches!(
            show(&catalog, &store, &words("interfaces"), false),
            Err(error::Error::UnsupportedShow { .. })
        ));
    }
}
