/*!
# Configuration model

The gateway's desired state is a single configuration tree: nested maps keyed by lowercase,
underscore-separated names, with string, boolean, number, and list leaves.
There is deliberately no schema here; the command grammar is the only thing that constrains what
operators can write, and the ops-plan builders quietly ignore shapes they don't recognize.

[`Value`] is the tagged tree node and [`Tree`] a top-level map of them.
[`Key`] is a dotted path into a tree, with quoting for segments that contain dots, e.g.
`system.ntp.server` or `interfaces.ethernet."eth0.100".mtu`.
*/

pub mod error;
mod key;
mod value;

pub use error::{Error, Result};
pub use key::{Key, KEY_SEPARATOR, KEY_SEPARATOR_STR};
pub use value::{bool_at, get, map_at, set_path, str_at, Tree, Value};
