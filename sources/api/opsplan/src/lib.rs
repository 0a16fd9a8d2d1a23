/*!
# Introduction

opsplan turns a committed configuration tree into the concrete steps that make the host match
it, and carries those steps out.

* [`build_ops_plan`] compiles a tree into an ordered list of [`Operation`]s, each a backend's
  bundle of action strings for one scope of configuration.  It is a pure function: the same
  tree always gives the same plan, in the same order.
* [`execute_ops_plan`] runs a plan in dry-run mode (log only) or apply mode (perform each
  action in order, stopping at the first failure).
* [`render_rules`] and [`apply_nftables`] produce and load the gateway's nftables rule set.

# Actions

Action strings are deliberately small and readable, since plans are logged and diffed:
* `write <path> [detail]` writes a managed marker file; `<path>` must fall under one of the
  allowed prefixes in `constants::WRITE_ALLOWED_PREFIXES`, which is checked before any I/O.
* `systemctl ...`, `ip ...`, and `nft ...` run the named tool with the remaining words as
  arguments.

Anything else is refused.
All side effects go through an [`ActionRunner`], so callers (and tests) control what actually
touches the host.

# Compilation is best-effort

Builders skip configuration they don't understand instead of failing the plan.
Validation is the command grammar's job; by the time a tree is committed, an odd leaf costs a
missing action, not a missing plan.
*/

pub mod error;
mod exec;
mod nftables;
mod plan;

pub use error::{Error, Result};
pub use exec::{
    execute_ops_plan, normalize_ops_mode, ActionRunner, ExecResult, OpsMode, SystemRunner,
};
pub use nftables::{apply_nftables, render_rules, NftablesApply};
pub use plan::{build_ops_plan, Operation};
