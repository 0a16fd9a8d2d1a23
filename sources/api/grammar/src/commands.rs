//! The human-facing view of the catalog: patterns, backends, and worked examples.

use serde::Serialize;

use crate::pattern::Token;
use crate::{Catalog, GrammarEntry, Kind};

/// One catalog entry as shown to operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    pub kind: Kind,
    pub pattern: String,
    pub description: String,
    pub backend: &'static str,
    pub example: String,
}

/// The whole catalog, partitioned by kind, each part in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Commands {
    pub set: Vec<Command>,
    pub show: Vec<Command>,
}

impl Catalog {
    pub fn commands(&self) -> Commands {
        let mut commands = Commands::default();
        for entry in self.entries() {
            let command = Command {
                kind: entry.kind,
                pattern: entry.pattern(),
                description: entry.description.clone(),
                backend: entry.backend(),
                example: entry.example(),
            };
            match entry.kind {
                Kind::Set => commands.set.push(command),
                Kind::Show => commands.show.push(command),
            }
        }
        commands
    }
}

impl GrammarEntry {
    /// Tokens and value token, space separated.
    pub fn pattern(&self) -> String {
        let mut parts: Vec<&str> = self.tokens.iter().map(String::as_str).collect();
        if !self.value_token.is_empty() {
            parts.push(&self.value_token);
        }
        parts.join(" ")
    }

    /// A concrete token sequence this entry accepts.
    pub fn sample_tokens(&self) -> Vec<String> {
        self.tokens.iter().map(|t| sample_token(t)).collect()
    }

    /// A concrete value this entry accepts.
    pub fn sample_value(&self) -> String {
        sample_value(&self.value_token)
    }

    /// A complete example command line.
    pub fn example(&self) -> String {
        let verb = match self.kind {
            Kind::Set => "set",
            Kind::Show => "show",
        };
        let mut parts = vec![verb.to_string()];
        parts.extend(self.sample_tokens());
        if self.kind == Kind::Set {
            parts.push(self.sample_value());
        }
        parts.join(" ")
    }

    /// The daemon or subsystem that ends up consuming values written by this entry.
    pub fn backend(&self) -> &'static str {
        let starts_with = |prefix: &[&str]| {
            self.tokens.len() >= prefix.len()
                && self.tokens.iter().zip(prefix).all(|(t, p)| t == p)
        };

        if starts_with(&["interfaces", "ethernet"])
            && self.tokens.last().map(String::as_str) == Some("address")
            && self.value_token == "dhcp"
        {
            "dhclient+systemd"
        } else if starts_with(&["firewall"]) || starts_with(&["nat"]) {
            "nftables"
        } else if starts_with(&["service", "dns"]) {
            "bind9"
        } else if starts_with(&["service", "haproxy"]) {
            "haproxy"
        } else if starts_with(&["service", "ssh"]) {
            "openssh-server"
        } else if starts_with(&["system", "ntp"]) {
            "chrony"
        } else if starts_with(&["system", "name_server"]) {
            "systemd-resolved"
        } else if starts_with(&["system", "host_name"]) {
            "hostnamectl"
        } else if starts_with(&["policy"]) {
            "clawgress-policyd"
        } else if starts_with(&["interfaces"]) {
            "systemd-networkd"
        } else {
            "control-daemon"
        }
    }
}

fn sample_token(pattern: &str) -> String {
    match Token::parse(pattern) {
        Token::Literal(literal) => literal.to_string(),
        Token::Choice(alternatives) => first(&alternatives),
        Token::Typed("ifname") => "eth0".to_string(),
        Token::Typed("id") => "100".to_string(),
        Token::Typed("name") => "edge".to_string(),
        Token::Typed("ip") | Token::Typed("ipv4") => "10.0.0.1".to_string(),
        Token::Typed("server") => "0.pool.ntp.org".to_string(),
        Token::Typed(_) => "value".to_string(),
    }
}

fn sample_value(value_token: &str) -> String {
    match Token::parse(value_token) {
        Token::Literal("") => "value".to_string(),
        Token::Literal(literal) => literal.to_string(),
        Token::Choice(alternatives) => first(&alternatives),
        Token::Typed("port") | Token::Typed("id") => "100".to_string(),
        Token::Typed("mtu") => "1500".to_string(),
        Token::Typed("cidr") => "10.0.0.0/24".to_string(),
        Token::Typed("ip") | Token::Typed("ipv4") => "10.0.0.1".to_string(),
        Token::Typed("ipv6") => "2001:db8::1".to_string(),
        Token::Typed("fqdn") => "api.example.com".to_string(),
        Token::Typed("ifname") => "eth0".to_string(),
        Token::Typed("server") => "0.pool.ntp.org".to_string(),
        Token::Typed(_) => "value".to_string(),
    }
}

fn first(alternatives: &[&str]) -> String {
    alternatives.first().copied().unwrap_or("value").to_string()
}
