/*!
  This crate contains constants shared across multiple clawgress crates
*/

// Revision store layout, relative to the state directory
pub const DEFAULT_STATE_DIR: &str = "state";
pub const STAGED_FILE: &str = "staged.json";
pub const ACTIVE_FILE: &str = "active.json";
pub const COMMITS_FILE: &str = "commits.jsonl";
pub const AUDIT_FILE: &str = "audit.log";
pub const LOCK_FILE: &str = ".lock";

// Compiled firewall rule set, relative to the state directory
pub const COMPILED_DIR: &str = "compiled";
pub const NFTABLES_RULES_FILE: &str = "nftables-active.nft";

// Tables owned by the dynamic rule set; replaced wholesale on every apply
pub const NFT_FILTER_TABLE: &str = "clawgress_dynamic";
pub const NFT_NAT_TABLE: &str = "clawgress_dynamic_nat";

// Daemons that pick up rendered configuration
pub const CONFIG_DAEMON_UNIT: &str = "clawgress-configd";
pub const POLICY_DAEMON_UNIT: &str = "clawgress-policyd";

/// Path prefixes the ops executor is allowed to write under.  Anything else is refused before
/// the path is touched.
pub const WRITE_ALLOWED_PREFIXES: &[&str] = &[
    "/etc/clawgress/",
    "/etc/systemd/",
    "/run/dhclient/",
    "/run/systemd/",
    "/etc/bind/",
    "/etc/haproxy/",
    "/etc/ssh/",
    "/etc/nftables.d/",
    "/etc/chrony/",
];

// Shared binaries
pub const SYSTEMCTL_BIN: &str = "systemctl";
pub const IP_BIN: &str = "ip";
pub const NFT_BIN: &str = "nft";

// Default actor recorded when a caller doesn't identify itself
pub const UNKNOWN_ACTOR: &str = "unknown";
