use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fmt;

use crate::{error, Error, Key, Result};

/// A configuration document: top-level section names mapped to their subtrees.  The map is
/// ordered so that every walk of the tree is deterministic.
pub type Tree = BTreeMap<String, Value>;

/// One node of the configuration tree.
///
/// Serialized as plain JSON.  JSON `null` has no counterpart and is rejected on the way in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<Value>),
    Map(Tree),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Tree> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Empty strings, lists, and maps count as empty; numbers and booleans never do.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::String(s) => s.is_empty(),
            Value::List(l) => l.is_empty(),
            Value::Map(m) => m.is_empty(),
            Value::Bool(_) | Value::Number(_) => false,
        }
    }

    /// Walks down through nested maps following the given segments.
    pub fn get<S: AsRef<str>>(&self, segments: &[S]) -> Option<&Value> {
        segments
            .iter()
            .try_fold(self, |node, segment| node.as_map()?.get(segment.as_ref()))
    }

    fn from_json(value: serde_json::Value, location: &str) -> Result<Self> {
        Ok(match value {
            serde_json::Value::Null => return error::NullValueSnafu { location }.fail(),
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::List(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| Self::from_json(item, &format!("{}[{}]", location, i)))
                    .collect::<Result<_>>()?,
            ),
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| {
                        let here = if location.is_empty() {
                            k.clone()
                        } else {
                            format!("{}.{}", location, k)
                        };
                        Self::from_json(v, &here).map(|v| (k, v))
                    })
                    .collect::<Result<_>>()?,
            ),
        })
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = Error;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        Self::from_json(value, "")
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) => serde_json::Value::Number(n),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Map(map) => {
                serde_json::Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<Tree> for Value {
    fn from(map: Tree) -> Self {
        Value::Map(map)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Leaves print the way an operator would type them; nested structures print as compact JSON.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::List(_) | Value::Map(_) => {
                let json: serde_json::Value = self.clone().into();
                write!(f, "{}", json)
            }
        }
    }
}

/// Looks up a nested value in a tree.
pub fn get<'a, S: AsRef<str>>(tree: &'a Tree, segments: &[S]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    tree.get(first.as_ref())?.get(rest)
}

/// Looks up a nested map; anything that isn't a map reads as absent.
pub fn map_at<'a, S: AsRef<str>>(tree: &'a Tree, segments: &[S]) -> Option<&'a Tree> {
    get(tree, segments)?.as_map()
}

/// Looks up a trimmed, non-empty string leaf.
pub fn str_at<'a, S: AsRef<str>>(tree: &'a Tree, segments: &[S]) -> Option<&'a str> {
    let s = get(tree, segments)?.as_str()?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

pub fn bool_at<S: AsRef<str>>(tree: &Tree, segments: &[S]) -> Option<bool> {
    get(tree, segments)?.as_bool()
}

/// Writes `value` at `key`, creating intermediate maps as needed.  Intermediate nodes that
/// aren't maps are replaced.
///
/// With `append`, the leaf is treated as a collection: an existing list gets the value pushed
/// onto it, an existing scalar becomes the first item of a new list, and a missing leaf
/// becomes a one-item list.
pub fn set_path(tree: &mut Tree, key: &Key, value: Value, append: bool) {
    let segments = key.segments();
    // Keys always have at least one segment.
    let (leaf, parents) = match segments.split_last() {
        Some(split) => split,
        None => return,
    };

    let mut node = tree;
    for segment in parents {
        let child = node
            .entry(segment.clone())
            .or_insert_with(|| Value::Map(Tree::new()));
        if !matches!(child, Value::Map(_)) {
            *child = Value::Map(Tree::new());
        }
        node = match child {
            Value::Map(m) => m,
            _ => return,
        };
    }

    if !append {
        node.insert(leaf.clone(), value);
        return;
    }

    match node.remove(leaf) {
        Some(Value::List(mut items)) => {
            items.push(value);
            node.insert(leaf.clone(), Value::List(items));
        }
        Some(existing) => {
            node.insert(leaf.clone(), Value::List(vec![existing, value]));
        }
        None => {
            node.insert(leaf.clone(), Value::List(vec![value]));
        }
    }
}
