//! Going between command lines and configuration trees.

use model::{set_path, Key, Tree, Value};

use crate::{Catalog, Result};

/// Renders a configuration tree as the `set` commands that would rebuild it, sorted.  Each
/// list item gets its own line.
pub fn render_set_commands(tree: &Tree) -> Vec<String> {
    let mut lines = Vec::new();
    let mut path = Vec::new();
    walk(tree, &mut path, &mut lines);
    lines.sort();
    lines
}

fn walk<'a>(tree: &'a Tree, path: &mut Vec<&'a str>, lines: &mut Vec<String>) {
    for (key, value) in tree {
        path.push(key);
        match value {
            Value::Map(child) => walk(child, path, lines),
            Value::List(items) => {
                for item in items {
                    lines.push(format!("set {} {}", path.join(" "), item));
                }
            }
            leaf => lines.push(format!("set {} {}", path.join(" "), leaf)),
        }
        path.pop();
    }
}

/// Interprets a raw command-line value: lowercase on/off words become booleans, then integers,
/// floats, and JSON documents are recognized, and anything else stays a string.
pub fn parse_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed {
        "enable" | "enabled" | "on" | "true" => return Value::Bool(true),
        "disable" | "disabled" | "off" | "false" => return Value::Bool(false),
        _ => {}
    }

    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            return value;
        }
    }
    Value::String(trimmed.to_string())
}

/// Validates a `set` command and folds it into `tree`, appending for collection paths.
/// Returns the path written.
pub fn apply_set<S: AsRef<str>>(
    catalog: &Catalog,
    tree: &mut Tree,
    tokens: &[S],
    raw_value: &str,
) -> Result<Key> {
    let set = catalog.validate_set_tokens(tokens, raw_value)?;
    set_path(tree, &set.path, parse_value(raw_value), set.multi);
    Ok(set.path)
}
