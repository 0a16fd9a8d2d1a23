/*!
# Introduction

The command grammar describes every configuration command an operator can type, as
`set <tokens...> <value>` or `show <tokens...>`.  Each grammar entry is a token pattern
(literals plus placeholders) and, for `set`, a constraint on the value.

Placeholders come in two flavors:
* typed, like `<ifname>`, `<id>`, `<cidr>`, `<ip>`, `<fqdn>`, `<port>`; in a path position they
  match any non-empty token, and in the value position some of them restrict the value's shape
  (`id`/`port` are decimal digits, `cidr` is `address/prefix`, `ip` is hex digits, dots,
  and colons; anything else is free-form)
* enumerated, like `<accept|drop>`, which match only one of the listed alternatives

Path tokens are trimmed and have `-` normalized to `_` before comparison, so `host-name` and
`host_name` are the same token, and the canonical configuration path uses the `_` form.

# Catalog order

When more than one entry could match, the first one in catalog order wins.  That order is
fixed when a [`Catalog`] is built: `set` entries come before `show` entries, then more specific
entries come before less specific ones (more literal path tokens first, then by value
constraint: literal, enumerated, typed, free-form), and ties keep registration order.

# Usage

[`Catalog::builtin`] returns the process-wide catalog compiled into this crate; alternate
catalogs can be loaded from a JSON document with [`Catalog::from_json`].

```
let catalog = grammar::Catalog::builtin();
let set = catalog
    .validate_set_tokens(&["system", "ntp", "server"], "0.pool.ntp.org")
    .unwrap();
assert_eq!(set.path.name(), "system.ntp.server");
assert!(set.multi);
assert!(catalog.match_set("system.ntp.server"));
```
*/

mod builtin;
mod catalog;
mod commands;
pub mod error;
mod pattern;
mod render;

pub use catalog::{Catalog, GrammarEntry, Kind, ValidatedSet};
pub use commands::{Command, Commands};
pub use error::{Error, Result};
pub use render::{apply_set, parse_value, render_set_commands};
