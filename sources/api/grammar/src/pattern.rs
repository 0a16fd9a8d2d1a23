//! Token-level matching rules shared by every grammar entry.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NUMERIC: Regex = Regex::new(r"^[0-9]+$").unwrap();
    static ref CIDR: Regex = Regex::new(r"^[0-9a-fA-F:.]+/[0-9]{1,3}$").unwrap();
    static ref IP_ADDRESS: Regex = Regex::new(r"^[0-9a-fA-F:.]+$").unwrap();
}

/// A pattern token, classified.
#[derive(Debug, PartialEq)]
pub(crate) enum Token<'a> {
    Literal(&'a str),
    /// `<name>`; the type name without brackets.
    Typed(&'a str),
    /// `<a|b>`, or a bare `a|b`.
    Choice(Vec<&'a str>),
}

impl<'a> Token<'a> {
    pub(crate) fn parse(pattern: &'a str) -> Self {
        let inner = pattern
            .strip_prefix('<')
            .and_then(|p| p.strip_suffix('>'));
        match inner {
            Some(inner) if inner.contains('|') => Token::Choice(inner.split('|').collect()),
            Some(inner) => Token::Typed(inner),
            None if pattern.contains('|') => Token::Choice(pattern.split('|').collect()),
            None => Token::Literal(pattern),
        }
    }

    /// Rank of this token as a value constraint; higher is more specific.
    pub(crate) fn value_rank(&self) -> u8 {
        match self {
            Token::Literal("") => 0,
            Token::Literal(_) => 3,
            Token::Choice(_) => 2,
            Token::Typed(t) if constrained_type(t) => 1,
            Token::Typed(_) => 0,
        }
    }
}

fn constrained_type(type_name: &str) -> bool {
    matches!(
        type_name,
        "id" | "port" | "cidr" | "ip" | "ipv4" | "ipv6"
    )
}

/// Canonical form of a path token: trimmed, with `-` folded into `_`.
pub(crate) fn normalize_token(token: &str) -> String {
    token.trim().replace('-', "_")
}

/// Matches one normalized candidate token against one normalized pattern token.
pub(crate) fn match_path_token(pattern: &str, candidate: &str) -> bool {
    match Token::parse(pattern) {
        Token::Literal(literal) => literal == candidate,
        Token::Typed(_) => !candidate.is_empty(),
        Token::Choice(alternatives) => alternatives.iter().any(|a| *a == candidate),
    }
}

/// Same-arity, position-by-position match of a normalized token sequence.
pub(crate) fn match_path<S1, S2>(patterns: &[S1], candidates: &[S2]) -> bool
where
    S1: AsRef<str>,
    S2: AsRef<str>,
{
    patterns.len() == candidates.len()
        && patterns
            .iter()
            .zip(candidates)
            .all(|(p, c)| match_path_token(p.as_ref(), c.as_ref()))
}

/// Checks a raw value against an entry's value token.  Values aren't normalized beyond
/// trimming, and an empty value never matches.
pub(crate) fn match_value(value_token: &str, raw: &str) -> bool {
    let value = raw.trim();
    if value.is_empty() {
        return false;
    }
    if value_token.is_empty() {
        return true;
    }

    match Token::parse(value_token) {
        Token::Literal(literal) => literal == value,
        Token::Choice(alternatives) => alternatives.iter().any(|a| *a == value),
        Token::Typed("id") | Token::Typed("port") => NUMERIC.is_match(value),
        Token::Typed("cidr") => CIDR.is_match(value),
        Token::Typed("ip") | Token::Typed("ipv4") | Token::Typed("ipv6") => {
            IP_ADDRESS.is_match(value)
        }
        Token::Typed(_) => true,
    }
}
