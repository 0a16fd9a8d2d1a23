use log::trace;
use serde::{Serialize, Serializer};
use snafu::ensure;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::{error, Result};

pub const KEY_SEPARATOR: char = '.';
// String refs are more convenient for some Rust functions
pub const KEY_SEPARATOR_STR: &str = ".";

/// Configuration paths end up in file names and unit names, so we hold them to the usual
/// filename limit.
const MAX_KEY_NAME_LENGTH: usize = 255;

/// A Key is a path into the configuration tree.  Names are dotted strings ("system.ntp.server")
/// with each dot descending one map level.
///
/// Segments that need to include dots can be quoted, for example the key
/// interfaces.ethernet."eth0.100".mtu has four segments: "interfaces", "ethernet", "eth0.100",
/// and "mtu".
#[derive(Clone, Debug)]
pub struct Key {
    name: String,
    segments: Vec<String>,
}

impl Key {
    /// Returns a list of the segments that make up the key name.
    ///
    /// Examples:
    /// * a.b.c -> ["a", "b", "c"]
    /// * "a.b".c -> ["a.b", "c"]
    pub fn segments(&self) -> &Vec<String> {
        &self.segments
    }

    /// Returns the name of the key, with segments quoted where needed.
    pub fn name(&self) -> &String {
        &self.name
    }

    /// Creates a Key from the given dotted name, respecting quoted segments.  Prefer
    /// `Key::from_segments` when you already have the individual segments.
    pub fn new<S: AsRef<str>>(name: S) -> Result<Self> {
        let segments = Self::parse_name_segments(&name)?;

        Self::check_key(&name, &segments)?;

        Ok(Self {
            name: name.as_ref().to_string(),
            segments,
        })
    }

    /// Creates a Key from the given name segments.
    ///
    /// For example, passing &["a", "b.c", "d"] will create a key named: a."b.c".d
    pub fn from_segments<S>(segments: &[S]) -> Result<Self>
    where
        S: AsRef<str>,
    {
        let name = Self::encode_name_segments(segments)?;

        Self::check_key(&name, segments)?;

        Ok(Self {
            name,
            segments: segments.iter().map(|s| s.as_ref().into()).collect(),
        })
    }

    fn check_key<S1, S2>(name: S1, segments: &[S2]) -> Result<()>
    where
        S1: AsRef<str>,
        S2: AsRef<str>,
    {
        let name = name.as_ref();

        ensure!(
            name.len() <= MAX_KEY_NAME_LENGTH,
            error::KeyTooLongSnafu {
                name,
                max: MAX_KEY_NAME_LENGTH,
            }
        );
        ensure!(
            !segments.is_empty(),
            error::InvalidKeySnafu {
                name,
                msg: "keys must have at least one segment",
            }
        );
        ensure!(
            segments.iter().all(|s| !s.as_ref().is_empty()),
            error::InvalidKeySnafu {
                name,
                msg: "empty key segment",
            }
        );

        Ok(())
    }

    /// Determines whether a character is acceptable within a segment of a key name.  This is
    /// separate from quoting; if a character isn't valid, it isn't valid quoted, either.
    fn valid_character(c: char) -> bool {
        matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | '/' | ':')
    }

    /// Splits a key name into segments on KEY_SEPARATOR, keeping quoted dots.
    fn parse_name_segments<S: AsRef<str>>(name: S) -> Result<Vec<String>> {
        let name = name.as_ref();

        ensure!(
            !name.is_empty(),
            error::InvalidKeySnafu {
                name,
                msg: "cannot be empty",
            }
        );

        let mut segments = Vec::new();
        let mut segment = String::new();
        let mut in_quotes = false;

        for c in name.chars() {
            if c == '"' {
                in_quotes = !in_quotes;
            } else if c == KEY_SEPARATOR {
                if in_quotes {
                    segment.push(c);
                } else {
                    ensure!(
                        !segment.is_empty(),
                        error::InvalidKeySnafu {
                            name,
                            msg: "empty key segment",
                        }
                    );
                    segments.push(segment);
                    segment = String::new();
                }
            } else if Self::valid_character(c) {
                segment.push(c);
            } else {
                return error::InvalidKeySnafu {
                    name,
                    msg: format!("invalid character in key: '{}'", c),
                }
                .fail();
            }
        }

        ensure!(
            !in_quotes,
            error::InvalidKeySnafu {
                name,
                msg: "unbalanced quotes",
            }
        );
        ensure!(
            !segment.is_empty(),
            error::InvalidKeySnafu {
                name,
                msg: "ends with separator",
            }
        );
        segments.push(segment);

        trace!("Parsed key name '{}' to segments {:?}", name, segments);
        Ok(segments)
    }

    /// Joins segments into a key name, quoting any segment that contains the separator.
    fn encode_name_segments<S: AsRef<str>>(segments: &[S]) -> Result<String> {
        let segments: Vec<_> = segments.iter().map(|s| s.as_ref()).collect();
        let mut outputs = Vec::new();

        for segment in segments.iter() {
            for chr in segment.chars() {
                ensure!(
                    chr == KEY_SEPARATOR || Self::valid_character(chr),
                    error::InvalidKeySnafu {
                        // Give an understandable key name in the error, even if it's invalid
                        name: segments.join("."),
                        msg: format!("Segment '{}' contains invalid character '{}'", segment, chr),
                    }
                );
            }

            if segment.contains(KEY_SEPARATOR) {
                outputs.push(format!("\"{}\"", segment));
            } else {
                outputs.push(segment.to_string());
            }
        }

        let name = outputs.join(KEY_SEPARATOR_STR);
        trace!("Encoded key '{}' from segments {:?}", name, segments);
        Ok(name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Serialize for Key {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.name)
    }
}

// The segments are our source of truth.
impl PartialEq for Key {
    fn eq(&self, other: &Key) -> bool {
        self.segments == other.segments
    }
}
impl Eq for Key {}
impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}
