//! The ops-plan compiler.

use constants::{CONFIG_DAEMON_UNIT, POLICY_DAEMON_UNIT};
use log::trace;
use model::{bool_at, map_at, str_at, Tree, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One backend's bundle of actions for one scope of configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub backend: String,
    pub scope: String,
    pub actions: Vec<String>,
}

impl Operation {
    fn new<S1, S2>(backend: S1, scope: S2, actions: Vec<String>) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            backend: backend.into(),
            scope: scope.into(),
            actions,
        }
    }
}

type Builder = fn(&Tree) -> Vec<Operation>;

/// Builders run in this order; dedup keeps the first operation for each (backend, scope).
const BUILDERS: &[Builder] = &[
    interface_ops,
    system_ops,
    service_ops,
    firewall_ops,
    policy_ops,
    fallback_ops,
];

/// Compiles a configuration tree into a deduplicated plan sorted by (backend, scope).
pub fn build_ops_plan(tree: &Tree) -> Vec<Operation> {
    let mut seen = HashSet::new();
    let mut plan: Vec<Operation> = BUILDERS
        .iter()
        .flat_map(|build| build(tree))
        .filter(|op| !op.backend.is_empty() && !op.scope.is_empty())
        .filter(|op| seen.insert((op.backend.clone(), op.scope.clone())))
        .collect();
    plan.sort_by(|a, b| (&a.backend, &a.scope).cmp(&(&b.backend, &b.scope)));
    trace!("Compiled {} operations", plan.len());
    plan
}

fn write(path: &str, detail: &str) -> String {
    if detail.is_empty() {
        format!("write {}", path)
    } else {
        format!("write {} ({})", path, detail)
    }
}

fn systemctl(verb: &str, unit: &str) -> String {
    format!("systemctl {} {}", verb, unit)
}

/// A string leaf or a list of string leaves, trimmed, empties dropped.
fn string_list(value: &Value) -> Vec<String> {
    let items: Vec<&Value> = match value {
        Value::List(items) => items.iter().collect(),
        other => vec![other],
    };
    items
        .into_iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_dhcp(value: &Value) -> bool {
    string_list(value)
        .iter()
        .any(|a| a.eq_ignore_ascii_case("dhcp"))
}

/// Numbers render as integers (MTUs are whole bytes); non-empty strings pass through.
fn integer_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .map(|n| n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn non_empty_map<'a>(tree: &'a Tree, segments: &[&str]) -> Option<&'a Tree> {
    map_at(tree, segments).filter(|m| !m.is_empty())
}

fn interface_ops(tree: &Tree) -> Vec<Operation> {
    let ethernet = match map_at(tree, &["interfaces", "ethernet"]) {
        Some(ethernet) => ethernet,
        None => return Vec::new(),
    };

    let mut ops = Vec::new();
    for (ifname, config) in ethernet {
        let config = match config.as_map() {
            Some(config) => config,
            None => continue,
        };
        if !safe_interface_name(ifname) {
            trace!("Skipping interface with unusable name '{}'", ifname);
            continue;
        }
        let address = config.get("address");

        if address.map(is_dhcp).unwrap_or(false) {
            let mut actions = vec![
                write(&format!("/run/dhclient/dhclient_{}.conf", ifname), ""),
                write(
                    &format!(
                        "/run/systemd/system/dhclient@{}.service.d/10-override.conf",
                        ifname
                    ),
                    "",
                ),
                "systemctl daemon-reload".to_string(),
                systemctl("restart", &format!("dhclient@{}.service", ifname)),
            ];
            actions.extend(interface_state_actions(ifname, config));
            ops.push(Operation::new(
                "dhclient+systemd",
                format!("interfaces ethernet {} address dhcp", ifname),
                actions,
            ));
            continue;
        }

        let addresses = address.map(string_list).unwrap_or_default();
        if addresses.is_empty() {
            trace!("Skipping interface {} with no address", ifname);
            continue;
        }
        let mut actions = vec![
            write(
                &format!("/etc/systemd/network/10-{}.network", ifname),
                &format!("Address={}", addresses.join(",")),
            ),
            systemctl("restart", "systemd-networkd"),
        ];
        actions.extend(interface_state_actions(ifname, config));
        ops.push(Operation::new(
            "systemd-networkd",
            format!("interfaces ethernet {}", ifname),
            actions,
        ));
    }
    ops
}

/// Description, MTU, role tag, and admin-down, in that order, for whichever are set.
fn interface_state_actions(ifname: &str, config: &Tree) -> Vec<String> {
    let mut actions = Vec::new();
    if let Some(description) = str_at(config, &["description"]) {
        actions.push(write(
            &format!("/run/systemd/network/10-{}.link", ifname),
            &format!("Description={}", description),
        ));
    }
    if let Some(mtu) = config.get("mtu").and_then(integer_text) {
        actions.push(format!("ip link set dev {} mtu {}", ifname, mtu));
    }
    if let Some(role) = str_at(config, &["role"]) {
        actions.push(write(
            &format!("/etc/clawgress/interface-role.d/{}.role", ifname),
            role,
        ));
    }
    if bool_at(config, &["disable"]) == Some(true) {
        actions.push(format!("ip link set dev {} down", ifname));
    }
    actions
}

fn system_ops(tree: &Tree) -> Vec<Operation> {
    let mut ops = Vec::new();

    // The control daemon owns the host name, so it goes through a rendered file.
    if let Some(host_name) = str_at(tree, &["system", "host_name"]) {
        ops.push(Operation::new(
            "hostnamectl",
            "system host-name",
            vec![
                write("/etc/clawgress/hostname", host_name),
                systemctl("reload-or-restart", CONFIG_DAEMON_UNIT),
            ],
        ));
    }

    let name_servers = model::get(tree, &["system", "name_server"])
        .map(string_list)
        .unwrap_or_default();
    if !name_servers.is_empty() {
        ops.push(Operation::new(
            "systemd-resolved",
            "system name-server",
            vec![
                write(
                    "/etc/systemd/resolved.conf.d/90-clawgress.conf",
                    &format!("DNS={}", name_servers.join(" ")),
                ),
                systemctl("restart", "systemd-resolved"),
            ],
        ));
    }

    let ntp_servers = model::get(tree, &["system", "ntp", "server"])
        .map(string_list)
        .unwrap_or_default();
    if !ntp_servers.is_empty() {
        ops.push(Operation::new(
            "chrony",
            "system ntp server",
            vec![
                write(
                    "/etc/chrony/sources.d/clawgress.sources",
                    &ntp_servers.join(","),
                ),
                systemctl("restart", "chrony"),
            ],
        ));
    }

    ops
}

fn service_ops(tree: &Tree) -> Vec<Operation> {
    let services = match map_at(tree, &["service"]) {
        Some(services) => services,
        None => return Vec::new(),
    };

    let mut ops = Vec::new();
    for (name, config) in services {
        if config.as_map().map(|m| m.is_empty()).unwrap_or(true) {
            continue;
        }
        match name.as_str() {
            "dns" => {
                if non_empty_map(tree, &["service", "dns", "forwarding"]).is_none() {
                    continue;
                }
                let forwarders = model::get(tree, &["service", "dns", "forwarding", "name_server"])
                    .map(string_list)
                    .unwrap_or_default();
                let detail = if forwarders.is_empty() {
                    String::new()
                } else {
                    format!("forwarders={}", forwarders.join(","))
                };
                ops.push(Operation::new(
                    "bind9",
                    "service dns forwarding",
                    vec![
                        write("/etc/bind/named.conf.options", &detail),
                        systemctl("restart", "bind9"),
                    ],
                ));
            }
            "haproxy" => ops.push(Operation::new(
                "haproxy",
                "service haproxy",
                vec![
                    write("/etc/haproxy/haproxy.cfg", ""),
                    systemctl("restart", "haproxy"),
                ],
            )),
            "ssh" => ops.push(Operation::new(
                "openssh-server",
                "service ssh",
                vec![
                    write("/etc/ssh/sshd_config.d/90-clawgress.conf", ""),
                    systemctl("restart", "ssh"),
                ],
            )),
            other => {
                if !safe_file_name(other) {
                    trace!("Skipping service with unusable name '{}'", other);
                    continue;
                }
                let unit = other.replace('_', "-");
                ops.push(Operation::new(
                    "systemd-unit",
                    format!("service {}", unit),
                    vec![
                        write(&format!("/etc/clawgress/services/{}.json", other), ""),
                        systemctl("reload-or-restart", &unit),
                    ],
                ));
            }
        }
    }
    ops
}

fn nft_actions(path: &str) -> Vec<String> {
    vec![
        write(path, ""),
        format!("nft -c -f {}", path),
        format!("nft -f {}", path),
    ]
}

fn firewall_ops(tree: &Tree) -> Vec<Operation> {
    let mut ops = Vec::new();
    if non_empty_map(tree, &["firewall"]).is_some() {
        ops.push(Operation::new(
            "nftables",
            "firewall",
            nft_actions("/etc/nftables.d/40-clawgress-firewall.nft"),
        ));
    }
    if non_empty_map(tree, &["nat"]).is_some() {
        ops.push(Operation::new(
            "nftables",
            "nat",
            nft_actions("/etc/nftables.d/50-clawgress-nat.nft"),
        ));
    }
    ops
}

fn policy_ops(tree: &Tree) -> Vec<Operation> {
    match non_empty_map(tree, &["policy"]) {
        Some(_) => vec![Operation::new(
            POLICY_DAEMON_UNIT,
            "policy",
            vec![
                write("/etc/clawgress/policy/policy.json", ""),
                systemctl("reload-or-restart", POLICY_DAEMON_UNIT),
            ],
        )],
        None => Vec::new(),
    }
}

/// Every non-empty top-level section gets a rendered copy and a control-daemon reload, whether
/// or not a specialized builder also handled it.
fn fallback_ops(tree: &Tree) -> Vec<Operation> {
    tree.iter()
        .filter(|(_, value)| !value.is_empty())
        .filter(|(section, _)| safe_file_name(section))
        .map(|(section, _)| {
            Operation::new(
                "control-daemon",
                section.as_str(),
                vec![
                    write(&format!("/etc/clawgress/rendered/{}.json", section), ""),
                    systemctl("reload-or-restart", CONFIG_DAEMON_UNIT),
                ],
            )
        })
        .collect()
}

/// Configuration keys that end up in file and unit names must stay plain.
fn safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Interface names land in paths, unit names, and `ip` arguments; VLAN dots are fine.
fn safe_interface_name(name: &str) -> bool {
    name != "."
        && name != ".."
        && !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn tree(json: serde_json::Value) -> Tree {
        serde_json::from_value(json).unwrap()
    }

    fn find<'a>(plan: &'a [Operation], backend: &str, scope: &str) -> Option<&'a Operation> {
        plan.iter().find(|op| op.backend == backend && op.scope == scope)
    }

    fn full_tree() -> Tree {
        tree(json!({
            "system": {
                "host_name": "gw1",
                "name_server": ["1.1.1.1", "9.9.9.9"],
                "ntp": {"server": ["0.pool.ntp.org", "1.pool.ntp.org"]}
            },
            "interfaces": {"ethernet": {
                "eth0": {"address": "dhcp", "role": "wan"},
                "eth1": {"address": ["192.168.1.1/24", "192.168.2.1/24"], "mtu": 9000, "description": "lan side"},
                "eth2": {"mtu": 1500},
                "eth3": "not a map"
            }},
            "service": {
                "dns": {"forwarding": {"name_server": ["1.1.1.1"]}},
                "haproxy": {"frontend": {"web": {"port": 443}}},
                "ssh": {"port": 22},
                "node_exporter": {"port": 9100},
                "empty": {}
            },
            "firewall": {"nftables": {"input": {"default_action": "drop"}}},
            "nat": {"source": {"rule": {"10": {"translation": {"address": "masquerade"}}}}},
            "policy": {"egress": {"default_action": "deny"}},
            "custom": {"anything": true}
        }))
    }

    #[test]
    fn deterministic() {
        let t = full_tree();
        let first = build_ops_plan(&t);
        let second = build_ops_plan(&t);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn sorted_and_unique() {
        let plan = build_ops_plan(&full_tree());
        let keys: Vec<_> = plan.iter().map(|op| (&op.backend, &op.scope)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn dhcp_interface() {
        let plan = build_ops_plan(&tree(json!({
            "interfaces": {"ethernet": {"eth0": {"address": "dhcp"}}}
        })));
        let op = find(&plan, "dhclient+systemd", "interfaces ethernet eth0 address dhcp").unwrap();
        assert!(op.actions.len() >= 4);
        assert!(op.actions.contains(&"systemctl daemon-reload".to_string()));
        assert!(op
            .actions
            .contains(&"systemctl restart dhclient@eth0.service".to_string()));
        assert!(find(&plan, "systemd-networkd", "interfaces ethernet eth0").is_none());
    }

    #[test]
    fn unusable_interface_names() {
        let plan = build_ops_plan(&tree(json!({
            "interfaces": {"ethernet": {
                "../etc": {"address": "dhcp"},
                "eth0 up": {"address": "10.0.0.1/24"},
                "eth0.100": {"address": "10.0.100.1/24"}
            }}
        })));
        let scopes: Vec<&str> = plan
            .iter()
            .filter(|op| op.backend != "control-daemon")
            .map(|op| op.scope.as_str())
            .collect();
        assert_eq!(scopes, vec!["interfaces ethernet eth0.100"]);
    }

    #[test]
    fn dhcp_in_address_list() {
        let plan = build_ops_plan(&tree(json!({
            "interfaces": {"ethernet": {"eth0": {"address": ["10.0.0.1/24", "DHCP"]}}}
        })));
        assert!(find(&plan, "dhclient+systemd", "interfaces ethernet eth0 address dhcp").is_some());
    }

    #[test]
    fn static_interface() {
        let plan = build_ops_plan(&tree(json!({
            "interfaces": {"ethernet": {"eth0": {"address": "192.168.1.1/24"}}}
        })));
        let op = find(&plan, "systemd-networkd", "interfaces ethernet eth0").unwrap();
        assert_eq!(
            op.actions,
            vec![
                "write /etc/systemd/network/10-eth0.network (Address=192.168.1.1/24)",
                "systemctl restart systemd-networkd",
            ]
        );
        assert!(plan.iter().all(|op| op.backend != "dhclient+systemd"));
        assert!(plan
            .iter()
            .flat_map(|op| &op.actions)
            .all(|a| !a.contains("dhclient")));
    }

    #[test]
    fn interface_state_actions_in_order() {
        let plan = build_ops_plan(&full_tree());
        let op = find(&plan, "systemd-networkd", "interfaces ethernet eth1").unwrap();
        assert_eq!(
            op.actions,
            vec![
                "write /etc/systemd/network/10-eth1.network (Address=192.168.1.1/24,192.168.2.1/24)",
                "systemctl restart systemd-networkd",
                "write /run/systemd/network/10-eth1.link (Description=lan side)",
                "ip link set dev eth1 mtu 9000",
            ]
        );

        let op = find(&plan, "dhclient+systemd", "interfaces ethernet eth0 address dhcp").unwrap();
        assert_eq!(
            op.actions.last().map(String::as_str),
            Some("write /etc/clawgress/interface-role.d/eth0.role (wan)")
        );
    }

    #[test]
    fn interfaces_without_address_skipped() {
        let plan = build_ops_plan(&full_tree());
        assert!(plan.iter().all(|op| !op.scope.contains("eth2")));
        assert!(plan.iter().all(|op| !op.scope.contains("eth3")));
    }

    #[test]
    fn disabled_interface() {
        let plan = build_ops_plan(&tree(json!({
            "interfaces": {"ethernet": {"eth5": {"address": "10.1.0.1/16", "mtu": "1400", "disable": true}}}
        })));
        let op = find(&plan, "systemd-networkd", "interfaces ethernet eth5").unwrap();
        assert_eq!(
            &op.actions[2..],
            &["ip link set dev eth5 mtu 1400", "ip link set dev eth5 down"]
        );
    }

    #[test]
    fn system_services_and_filters() {
        let plan = build_ops_plan(&full_tree());
        assert!(find(&plan, "hostnamectl", "system host-name").is_some());
        let resolved = find(&plan, "systemd-resolved", "system name-server").unwrap();
        assert_eq!(
            resolved.actions[0],
            "write /etc/systemd/resolved.conf.d/90-clawgress.conf (DNS=1.1.1.1 9.9.9.9)"
        );
        let chrony = find(&plan, "chrony", "system ntp server").unwrap();
        assert_eq!(
            chrony.actions[0],
            "write /etc/chrony/sources.d/clawgress.sources (0.pool.ntp.org,1.pool.ntp.org)"
        );
        assert!(find(&plan, "bind9", "service dns forwarding").is_some());
        assert!(find(&plan, "haproxy", "service haproxy").is_some());
        assert!(find(&plan, "openssh-server", "service ssh").is_some());
        let unit = find(&plan, "systemd-unit", "service node-exporter").unwrap();
        assert_eq!(unit.actions[1], "systemctl reload-or-restart node-exporter");
        assert!(plan.iter().all(|op| op.scope != "service empty"));

        let firewall = find(&plan, "nftables", "firewall").unwrap();
        assert_eq!(
            firewall.actions,
            vec![
                "write /etc/nftables.d/40-clawgress-firewall.nft",
                "nft -c -f /etc/nftables.d/40-clawgress-firewall.nft",
                "nft -f /etc/nftables.d/40-clawgress-firewall.nft",
            ]
        );
        assert!(find(&plan, "nftables", "nat").is_some());
        assert!(find(&plan, "clawgress-policyd", "policy").is_some());
    }

    #[test]
    fn fallback_covers_every_section() {
        let t = full_tree();
        let plan = build_ops_plan(&t);
        for section in t.keys() {
            let op = find(&plan, "control-daemon", section)
                .unwrap_or_else(|| panic!("no fallback for {}", section));
            assert_eq!(
                op.actions[0],
                format!("write /etc/clawgress/rendered/{}.json", section)
            );
        }
    }

    #[test]
    fn fallback_skips_empty_and_unsafe_sections() {
        let plan = build_ops_plan(&tree(json!({
            "empty": {},
            "blank": "",
            "../escape": {"x": 1},
            "flag": true
        })));
        let scopes: Vec<_> = plan.iter().map(|op| op.scope.as_str()).collect();
        assert_eq!(scopes, vec!["flag"]);
    }

    #[test]
    fn unrecognized_shapes_are_ignored() {
        let plan = build_ops_plan(&tree(json!({
            "interfaces": "eth0",
            "system": {"host_name": 7, "ntp": {"server": [1, 2]}},
            "service": ["ssh"]
        })));
        let backends: HashSet<_> = plan.iter().map(|op| op.backend.as_str()).collect();
        assert_eq!(backends, ["control-daemon"].iter().copied().collect());
    }

    #[test]
    fn empty_tree() {
        assert!(build_ops_plan(&Tree::new()).is_empty());
    }
}
