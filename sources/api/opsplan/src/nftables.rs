//! Renders and loads the gateway's dynamic nftables rule set.
//!
//! The rule set is always replaced whole: applying deletes the dynamic tables and loads the
//! freshly rendered file.

use constants::{COMPILED_DIR, NFTABLES_RULES_FILE, NFT_BIN, NFT_FILTER_TABLE, NFT_NAT_TABLE};
use datastore::Revision;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use model::{bool_at, map_at, str_at, Tree};
use regex::Regex;
use serde::Serialize;
use snafu::ResultExt;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{error, ActionRunner, Result};

lazy_static! {
    static ref INTERFACE_NAME: Regex = Regex::new(r"^[A-Za-z0-9_.:@-]{1,15}$").unwrap();
    static ref IPV4_SOURCE: Regex =
        Regex::new(r"^\d{1,3}(\.\d{1,3}){3}(/\d{1,2})?$").unwrap();
}

const ALLOWED_TCP_PORTS: &str = "22, 53, 80, 443, 8404";
const ALLOWED_UDP_PORTS: &str = "53";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NftablesApply {
    pub rules_path: PathBuf,
    /// Whether the rules were loaded into the kernel, not just written.
    pub applied: bool,
}

/// Renders the complete rule-set document for a configuration tree.
pub fn render_rules(tree: &Tree) -> String {
    let input = chain_policy(tree, "input", "drop");
    let forward = chain_policy(tree, "forward", "drop");
    let output = chain_policy(tree, "output", "accept");

    let wan_ifaces = if bool_at(tree, &["firewall", "nftables", "wan_block"]) == Some(true) {
        wan_interfaces(tree)
    } else {
        Vec::new()
    };

    let mut lines = vec![
        "#!/usr/sbin/nft -f".to_string(),
        String::new(),
        format!("table inet {} {{", NFT_FILTER_TABLE),
    ];

    if !wan_ifaces.is_empty() {
        let elements: Vec<String> = wan_ifaces.iter().map(|i| format!("\"{}\"", i)).collect();
        lines.push("  set wan_ifaces {".to_string());
        lines.push("    type ifname".to_string());
        lines.push(format!("    elements = {{ {} }}", elements.join(", ")));
        lines.push("  }".to_string());
        lines.push(String::new());
    }

    lines.push("  chain input {".to_string());
    lines.push(format!(
        "    type filter hook input priority 0; policy {};",
        input
    ));
    lines.push("    iif lo accept".to_string());
    lines.push("    ct state established,related accept".to_string());
    if !wan_ifaces.is_empty() {
        lines.push("    iifname @wan_ifaces drop".to_string());
    }
    lines.push(format!("    tcp dport {{ {} }} accept", ALLOWED_TCP_PORTS));
    lines.push(format!("    udp dport {{ {} }} accept", ALLOWED_UDP_PORTS));
    lines.push("  }".to_string());
    lines.push(String::new());

    lines.push("  chain forward {".to_string());
    lines.push(format!(
        "    type filter hook forward priority 0; policy {};",
        forward
    ));
    lines.push("    ct state established,related accept".to_string());
    lines.push("  }".to_string());
    lines.push(String::new());

    lines.push("  chain output {".to_string());
    lines.push(format!(
        "    type filter hook output priority 0; policy {};",
        output
    ));
    lines.push("  }".to_string());
    lines.push("}".to_string());

    let nat_rules = masquerade_rules(tree);
    if !nat_rules.is_empty() {
        lines.push(String::new());
        lines.push(format!("table ip {} {{", NFT_NAT_TABLE));
        lines.push("  chain postrouting {".to_string());
        lines.push("    type nat hook postrouting priority srcnat; policy accept;".to_string());
        lines.extend(nat_rules.into_iter().map(|r| format!("    {}", r)));
        lines.push("  }".to_string());
        lines.push("}".to_string());
    }

    let mut rules = lines.join("\n");
    rules.push('\n');
    rules
}

/// Only `accept` and `drop` are valid chain policies; anything else gets the chain's default.
fn chain_policy(tree: &Tree, chain: &str, fallback: &'static str) -> &'static str {
    let policy = str_at(tree, &["firewall", "nftables", chain, "default_action"])
        .map(str::to_ascii_lowercase);
    match policy.as_deref() {
        Some("accept") => "accept",
        Some("drop") => "drop",
        _ => fallback,
    }
}

/// Sorted names of ethernet interfaces tagged `role=wan`.
fn wan_interfaces(tree: &Tree) -> Vec<String> {
    let ethernet = match map_at(tree, &["interfaces", "ethernet"]) {
        Some(ethernet) => ethernet,
        None => return Vec::new(),
    };

    // BTreeMap iteration is already sorted by name.
    ethernet
        .iter()
        .filter_map(|(name, config)| Some((name, config.as_map()?)))
        .filter(|(_, config)| {
            str_at(config, &["role"]).map_or(false, |role| role.eq_ignore_ascii_case("wan"))
        })
        .filter_map(|(name, _)| {
            if INTERFACE_NAME.is_match(name) {
                Some(name.clone())
            } else {
                warn!("Leaving unsafe interface name '{}' out of the WAN set", name);
                None
            }
        })
        .collect()
}

/// Numeric rule ids first in ascending order, then the rest lexicographically.
fn rule_id_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn masquerade_rules(tree: &Tree) -> Vec<String> {
    let rules = match map_at(tree, &["nat", "source", "rule"]) {
        Some(rules) => rules,
        None => return Vec::new(),
    };

    let mut ids: Vec<&String> = rules.keys().collect();
    ids.sort_by(|a, b| rule_id_order(a, b));

    let mut out = Vec::new();
    for id in ids {
        let rule = match rules.get(id.as_str()).and_then(|r| r.as_map()) {
            Some(rule) => rule,
            None => continue,
        };
        let oif = str_at(rule, &["outbound_interface"]);
        let source = str_at(rule, &["source", "address"]);
        let masquerade = str_at(rule, &["translation", "address"])
            .map_or(false, |t| t.eq_ignore_ascii_case("masquerade"));

        match (oif, source) {
            (Some(oif), Some(source)) if masquerade => {
                if !INTERFACE_NAME.is_match(oif) || !IPV4_SOURCE.is_match(source) {
                    warn!("Skipping NAT rule {} with unsafe interface or source", id);
                    continue;
                }
                out.push(format!("oifname \"{}\" ip saddr {} masquerade", oif, source));
            }
            _ => debug!("NAT rule {} is not a complete masquerade rule, skipping", id),
        }
    }
    out
}

/// Writes the rendered rule set to `<base_dir>/compiled/nftables-active.nft` and, if
/// `execute` is set, replaces the dynamic tables with it.
pub fn apply_nftables<R: ActionRunner>(
    runner: &mut R,
    base_dir: &Path,
    revision: &Revision,
    execute: bool,
) -> Result<NftablesApply> {
    let rules = render_rules(&revision.changes);

    let compiled_dir = base_dir.join(COMPILED_DIR);
    fs::create_dir_all(&compiled_dir).context(error::CreateDirSnafu {
        path: &compiled_dir,
    })?;
    let rules_path = compiled_dir.join(NFTABLES_RULES_FILE);
    fs::write(&rules_path, &rules).context(error::WriteFileSnafu { path: &rules_path })?;
    debug!(
        "Wrote nftables rules for revision {} to {}",
        revision.revision_id,
        rules_path.display()
    );

    let mut result = NftablesApply {
        rules_path,
        applied: false,
    };
    if !execute {
        return Ok(result);
    }

    // The tables may not exist yet.
    for &(family, table) in &[("inet", NFT_FILTER_TABLE), ("ip", NFT_NAT_TABLE)] {
        if let Err(e) = runner.run_command(NFT_BIN, &["delete", "table", family, table]) {
            debug!("Ignoring failure to delete {} table {}: {}", family, table, e);
        }
    }

    let path = result.rules_path.to_string_lossy().into_owned();
    runner.run_command(NFT_BIN, &["-f", &path])?;
    result.applied = true;
    info!(
        "Loaded nftables rules for revision {}",
        revision.revision_id
    );
    Ok(result)
}
