use lazy_static::lazy_static;
use log::trace;
use model::Key;
use serde::{Deserialize, Serialize};
use snafu::{ensure, OptionExt, ResultExt};
use std::cmp::Reverse;

use crate::builtin;
use crate::pattern::{match_path, match_value, normalize_token, Token};
use crate::{error, Result};

lazy_static! {
    static ref BUILTIN: Catalog = Catalog::new(builtin::entries());
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Set,
    Show,
}

/// One accepted command shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarEntry {
    pub kind: Kind,
    pub tokens: Vec<String>,
    /// Constraint on the value; empty means any non-empty value (and, for `show`, no value).
    #[serde(default)]
    pub value_token: String,
    #[serde(default)]
    pub description: String,
    /// Whether the value appends to a collection instead of overwriting a scalar.
    #[serde(default)]
    pub multi: bool,
}

impl GrammarEntry {
    fn specificity(&self) -> (usize, u8) {
        let literals = self
            .tokens
            .iter()
            .filter(|t| matches!(Token::parse(t), Token::Literal(_)))
            .count();
        (literals, Token::parse(&self.value_token).value_rank())
    }
}

/// The result of a successful `set` validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSet {
    /// Canonical configuration path, built from the normalized tokens.
    pub path: Key,
    pub multi: bool,
}

/// An immutable, ordered table of grammar entries.  See the crate docs for the order.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<GrammarEntry>,
}

impl Catalog {
    /// Builds a catalog from entries given in registration order.  Path tokens are normalized
    /// here, once, so matching only has to normalize the candidate side.
    pub fn new(mut entries: Vec<GrammarEntry>) -> Self {
        for entry in entries.iter_mut() {
            entry.tokens = entry.tokens.iter().map(|t| normalize_token(t)).collect();
            entry.value_token = entry.value_token.trim().to_string();
        }
        // Stable sort, so registration order breaks ties.
        entries.sort_by_key(|e| (e.kind, Reverse(e.specificity())));
        trace!("Built command catalog with {} entries", entries.len());
        Self { entries }
    }

    /// The catalog compiled into this crate, built once per process.
    pub fn builtin() -> &'static Catalog {
        &BUILTIN
    }

    /// Loads a catalog from a JSON array of entries.
    pub fn from_json(data: &str) -> Result<Self> {
        let entries: Vec<GrammarEntry> =
            serde_json::from_str(data).context(error::CatalogParseSnafu)?;
        for (index, entry) in entries.iter().enumerate() {
            ensure!(
                !entry.tokens.is_empty(),
                error::InvalidEntrySnafu {
                    index,
                    msg: "no tokens",
                }
            );
            ensure!(
                entry.tokens.iter().all(|t| !t.trim().is_empty()),
                error::InvalidEntrySnafu {
                    index,
                    msg: "empty token",
                }
            );
        }
        Ok(Self::new(entries))
    }

    /// All entries, in catalog order.
    pub fn entries(&self) -> &[GrammarEntry] {
        &self.entries
    }

    pub fn entries_of(&self, kind: Kind) -> impl Iterator<Item = &GrammarEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    /// Validates a `set` command and returns the canonical path it writes.
    pub fn validate_set_tokens<S: AsRef<str>>(
        &self,
        tokens: &[S],
        value: &str,
    ) -> Result<ValidatedSet> {
        let normalized: Vec<String> = tokens.iter().map(|t| normalize_token(t.as_ref())).collect();
        let entry = self
            .entries_of(Kind::Set)
            .find(|e| match_path(&e.tokens, &normalized) && match_value(&e.value_token, value))
            .context(error::UnknownCommandSnafu)?;

        let path = Key::from_segments(&normalized)
            .ok()
            .context(error::UnknownCommandSnafu)?;
        Ok(ValidatedSet {
            path,
            multi: entry.multi,
        })
    }

    /// Whether a dotted configuration path is something a `set` command can write.
    pub fn match_set(&self, path: &str) -> bool {
        self.set_entries_for(path).next().is_some()
    }

    /// Whether any `set` entry for this path has append semantics.
    pub fn is_multi_path(&self, path: &str) -> bool {
        self.set_entries_for(path).any(|e| e.multi)
    }

    fn set_entries_for<'a>(&'a self, path: &str) -> impl Iterator<Item = &'a GrammarEntry> {
        let segments: Vec<String> = Key::new(path)
            .map(|key| key.segments().iter().map(|s| normalize_token(s)).collect())
            .unwrap_or_default();
        self.entries_of(Kind::Set)
            .filter(move |e| !segments.is_empty() && match_path(&e.tokens, &segments))
    }

    /// Finds the `show` entry for the given tokens.
    pub fn match_show<S: AsRef<str>>(&self, tokens: &[S]) -> Result<&GrammarEntry> {
        let normalized: Vec<String> = tokens.iter().map(|t| normalize_token(t.as_ref())).collect();
        self.entries_of(Kind::Show)
            .find(|e| match_path(&e.tokens, &normalized))
            .context(error::UnknownCommandSnafu)
    }
}
