//! The command grammar shipped with the appliance, in registration order.

use crate::{GrammarEntry, Kind};

struct Builtin {
    kind: Kind,
    tokens: &'static [&'static str],
    value_token: &'static str,
    multi: bool,
    description: &'static str,
}

const fn set(
    tokens: &'static [&'static str],
    value_token: &'static str,
    description: &'static str,
) -> Builtin {
    Builtin {
        kind: Kind::Set,
        tokens,
        value_token,
        multi: false,
        description,
    }
}

/// A `set` whose value appends to a list.
const fn set_multi(
    tokens: &'static [&'static str],
    value_token: &'static str,
    description: &'static str,
) -> Builtin {
    Builtin {
        kind: Kind::Set,
        tokens,
        value_token,
        multi: true,
        description,
    }
}

const fn show(tokens: &'static [&'static str], description: &'static str) -> Builtin {
    Builtin {
        kind: Kind::Show,
        tokens,
        value_token: "",
        multi: false,
        description,
    }
}

#[rustfmt::skip]
static BUILTIN: &[Builtin] = &[
    // system
    set(&["system", "host-name"], "<name>", "Appliance host name"),
    set(&["system", "domain-name"], "<fqdn>", "Appliance DNS domain"),
    set_multi(&["system", "name-server"], "<ip>", "Upstream DNS resolver used by the appliance itself"),
    set_multi(&["system", "ntp", "server"], "<server>", "NTP time source"),
    set(&["system", "time-zone"], "<name>", "Local time zone, e.g. UTC"),
    set(&["system", "login", "user", "<name>", "full-name"], "<name>", "Display name of a local operator account"),
    set(&["system", "syslog", "host", "<ip>", "facility"], "<all|kern|daemon|auth>", "Forward syslog facility to a remote host"),

    // interfaces
    set(&["interfaces", "ethernet", "<ifname>", "address"], "dhcp", "Obtain an address with DHCP"),
    set_multi(&["interfaces", "ethernet", "<ifname>", "address"], "<cidr>", "Static address with prefix length"),
    set(&["interfaces", "ethernet", "<ifname>", "description"], "<text>", "Free-form interface description"),
    set(&["interfaces", "ethernet", "<ifname>", "mtu"], "<mtu>", "Interface MTU in bytes"),
    set(&["interfaces", "ethernet", "<ifname>", "role"], "<wan|lan|mgmt>", "Interface role used by firewall policy"),
    set(&["interfaces", "ethernet", "<ifname>", "disable"], "<true|false>", "Administratively disable the interface"),
    set_multi(&["interfaces", "ethernet", "<ifname>", "vif", "<id>", "address"], "<cidr>", "Static address on a VLAN sub-interface"),

    // firewall
    set(&["firewall", "nftables", "<input|forward|output>", "default-action"], "<accept|drop>", "Chain default policy"),
    set(&["firewall", "nftables", "wan-block"], "<true|false>", "Drop all inbound traffic arriving on WAN interfaces"),
    set(&["firewall", "nftables", "input", "rule", "<id>", "action"], "<accept|drop|reject>", "Input rule verdict"),
    set(&["firewall", "nftables", "input", "rule", "<id>", "protocol"], "<tcp|udp|icmp>", "Input rule protocol match"),
    set(&["firewall", "nftables", "input", "rule", "<id>", "destination", "port"], "<port>", "Input rule destination port"),
    set_multi(&["firewall", "group", "address-group", "<name>", "address"], "<ip>", "Member of a named address group"),

    // nat
    set(&["nat", "source", "rule", "<id>", "outbound-interface"], "<ifname>", "Egress interface for source NAT"),
    set(&["nat", "source", "rule", "<id>", "source", "address"], "<cidr>", "Source prefix to translate"),
    set(&["nat", "source", "rule", "<id>", "translation", "address"], "masquerade", "Masquerade behind the egress interface address"),
    set(&["nat", "source", "rule", "<id>", "translation", "address"], "<ip>", "Translate to a fixed address"),
    set(&["nat", "destination", "rule", "<id>", "inbound-interface"], "<ifname>", "Ingress interface for destination NAT"),
    set(&["nat", "destination", "rule", "<id>", "destination", "port"], "<port>", "Destination port to forward"),
    set(&["nat", "destination", "rule", "<id>", "translation", "address"], "<ip>", "Internal address to forward to"),
    set(&["nat", "destination", "rule", "<id>", "translation", "port"], "<port>", "Internal port to forward to"),

    // services
    set_multi(&["service", "dns", "forwarding", "listen-address"], "<ip>", "Address the DNS forwarder listens on"),
    set_multi(&["service", "dns", "forwarding", "name-server"], "<ip>", "Upstream resolver for forwarded queries"),
    set_multi(&["service", "dns", "forwarding", "allow-from"], "<cidr>", "Client prefix allowed to query the forwarder"),
    set(&["service", "dns", "forwarding", "cache-size"], "<id>", "Forwarder cache size in entries"),
    set(&["service", "haproxy", "frontend", "<name>", "bind"], "<ip>", "Frontend listen address"),
    set(&["service", "haproxy", "frontend", "<name>", "port"], "<port>", "Frontend listen port"),
    set(&["service", "haproxy", "frontend", "<name>", "backend"], "<name>", "Backend pool receiving frontend traffic"),
    set(&["service", "haproxy", "backend", "<name>", "balance"], "<roundrobin|leastconn|source>", "Backend balancing algorithm"),
    set(&["service", "haproxy", "backend", "<name>", "server", "<name>", "address"], "<ip>", "Backend server address"),
    set(&["service", "haproxy", "backend", "<name>", "server", "<name>", "port"], "<port>", "Backend server port"),
    set(&["service", "ssh", "port"], "<port>", "SSH listen port"),
    set_multi(&["service", "ssh", "listen-address"], "<ip>", "SSH listen address"),
    set(&["service", "ssh", "disable-password-authentication"], "<true|false>", "Require public key authentication"),
    set_multi(&["service", "lldp", "interface"], "<ifname>", "Interface on which to run LLDP"),

    // egress policy
    set(&["policy", "egress", "default-action"], "<allow|deny>", "Verdict for egress traffic no rule matches"),
    set_multi(&["policy", "egress", "allow", "domain"], "<fqdn>", "Domain egress traffic may reach"),
    set_multi(&["policy", "egress", "deny", "domain"], "<fqdn>", "Domain egress traffic may not reach"),
    set_multi(&["policy", "egress", "allow", "cidr"], "<cidr>", "Prefix egress traffic may reach"),
    set(&["policy", "egress", "rate-limit", "<name>", "requests-per-minute"], "<id>", "Per-client request budget"),
    set(&["policy", "egress", "log"], "<true|false>", "Log egress policy decisions"),

    show(&["commands"], "List every accepted command"),
    show(&["configuration"], "Active configuration as JSON"),
    show(&["configuration", "commands"], "Active configuration as set commands"),
    show(&["state"], "Staged and active revisions and commit history"),
    show(&["ops-plan"], "Operations the active configuration compiles to"),
    show(&["firewall", "rules"], "Rendered nftables rule set for the active configuration"),
];

/// The builtin table as owned entries, in registration order.
pub(crate) fn entries() -> Vec<GrammarEntry> {
    BUILTIN
        .iter()
        .map(|b| GrammarEntry {
            kind: b.kind,
            tokens: b.tokens.iter().map(|t| t.to_string()).collect(),
            value_token: b.value_token.to_string(),
            description: b.description.to_string(),
            multi: b.multi,
        })
        .collect()
}
