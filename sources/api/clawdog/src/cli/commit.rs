use argh::FromArgs;
use datastore::{Access, CommitRecord};
use log::info;
use opsplan::{
    apply_nftables, build_ops_plan, execute_ops_plan, normalize_ops_mode, ExecResult,
    NftablesApply, OpsMode, SystemRunner,
};
use serde::Serialize;
use snafu::{OptionExt, ResultExt};

use super::{open_store, print_json};
use crate::config::Config;
use crate::error::{self, Result};

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "commit")]
/// Commit the staged revision, then carry it out on the host
pub(crate) struct Commit {
    #[argh(option, default = "String::new()")]
    /// who is committing; recorded in the audit trail
    actor: String,

    #[argh(option)]
    /// only commit if this is still the staged revision
    expected_revision: Option<String>,

    #[argh(option)]
    /// either "dry-run" or "apply" (default: $CLAWGRESS_OPS_MODE, or "dry-run")
    ops_mode: Option<String>,

    #[argh(switch)]
    /// write the firewall rule set without loading it
    no_nft_apply: bool,
}

#[derive(Debug, Serialize)]
struct CommitOutcome<'a> {
    commit: &'a CommitRecord,
    ops: &'a ExecResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    nftables: Option<&'a NftablesApply>,
}

impl Commit {
    pub(crate) fn run(self, config: &Config) -> Result<()> {
        // Check the mode up front; a typo shouldn't leave a commit with nothing carried out.
        let mode = normalize_ops_mode(self.ops_mode.as_deref().unwrap_or(&config.ops_mode))
            .context(error::OpsModeSnafu)?;
        let nft_apply = config.nft_apply && !self.no_nft_apply;

        let store = open_store(config, Access::Write)?;
        let record = store
            .commit(&self.actor, self.expected_revision.as_deref())
            .context(error::StoreSnafu)?;
        let active = store
            .active()
            .context(error::StoreSnafu)?
            .context(error::NoActiveRevisionSnafu)?;

        let plan = build_ops_plan(&active.changes);
        info!(
            "Running {} operations for revision {} in {} mode",
            plan.len(),
            active.revision_id,
            mode
        );

        // From here on the commit stands whatever happens; failures are reported, not undone.
        let mut runner = SystemRunner::new();
        let ops = match execute_ops_plan(&plan, mode, &mut runner) {
            Ok(ops) => ops,
            Err(e) => {
                if let Some(partial) = e.partial_result() {
                    print_json(&CommitOutcome {
                        commit: &record,
                        ops: partial,
                        nftables: None,
                    })?;
                }
                return Err(e).context(error::ExecutePlanSnafu {
                    revision_id: &active.revision_id,
                });
            }
        };

        let execute = nft_apply && mode == OpsMode::Apply;
        if nft_apply && !execute {
            info!("Writing firewall rules without loading them in {} mode", mode);
        }
        let nftables = apply_nftables(&mut runner, &config.state_dir, &active, execute).context(
            error::NftablesSnafu {
                revision_id: &active.revision_id,
            },
        )?;

        print_json(&CommitOutcome {
            commit: &record,
            ops: &ops,
            nftables: Some(&nftables),
        })
    }
}
