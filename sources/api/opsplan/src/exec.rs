//! The ops-plan executor.

use chrono::{SecondsFormat, Utc};
use constants::{IP_BIN, NFT_BIN, SYSTEMCTL_BIN, WRITE_ALLOWED_PREFIXES};
use log::{debug, error, info, trace};
use serde::{Deserialize, Serialize};
use snafu::{ensure, OptionExt, ResultExt};
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use crate::{error, Operation, Result};

const MANAGED_HEADER: &str = "# managed by clawgress ops executor";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpsMode {
    /// Log every action, perform none.
    DryRun,
    /// Perform actions in order until the first failure.
    Apply,
}

impl FromStr for OpsMode {
    type Err = error::Error;

    /// Case-insensitive; an empty string, `dryrun`, and `dry-run` all mean dry-run.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "dryrun" | "dry-run" => Ok(OpsMode::DryRun),
            "apply" => Ok(OpsMode::Apply),
            _ => error::InvalidModeSnafu { mode: s }.fail(),
        }
    }
}

impl fmt::Display for OpsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpsMode::DryRun => write!(f, "dry-run"),
            OpsMode::Apply => write!(f, "apply"),
        }
    }
}

pub fn normalize_ops_mode(mode: &str) -> Result<OpsMode> {
    mode.parse()
}

/// What happened when a plan ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecResult {
    pub mode: OpsMode,
    pub applied: usize,
    pub failed: usize,
    /// One line per action attempted (or, in dry-run, described).
    pub logs: Vec<String>,
}

/// The side effects an action can have on the host.
pub trait ActionRunner {
    /// Replace the file at an absolute path with the given contents, creating parent
    /// directories.
    fn write_file(&mut self, path: &Path, contents: &str) -> Result<()>;
    /// Run a program to completion; a nonzero exit is an error.
    fn run_command(&mut self, program: &str, args: &[&str]) -> Result<()>;
}

/// Runs actions against the real host.  Writes land under `root`, which is `/` except in
/// tests and staging environments.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    root: PathBuf,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::with_root("/")
    }

    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().into(),
        }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRunner for SystemRunner {
    fn write_file(&mut self, path: &Path, contents: &str) -> Result<()> {
        let target = self.root.join(path.strip_prefix("/").unwrap_or(path));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).context(error::CreateDirSnafu { path: parent })?;
        }
        fs::write(&target, contents).context(error::WriteFileSnafu { path: &target })
    }

    fn run_command(&mut self, program: &str, args: &[&str]) -> Result<()> {
        let command = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        debug!("Running '{}'", command);

        let result = Command::new(program)
            .args(args)
            .output()
            .context(error::CommandExecutionFailureSnafu { command: &command })?;

        let mut output = String::from_utf8_lossy(&result.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&result.stderr));
        ensure!(
            result.status.success(),
            error::FailedCommandSnafu {
                command: &command,
                output: output.trim(),
            }
        );
        trace!("'{}' output: {}", command, output);
        Ok(())
    }
}

/// Runs every action of every operation in plan order.
///
/// In dry-run mode nothing touches the runner.  In apply mode the first failing action stops
/// the plan; the returned `ActionFailed` error carries the partial result, including the log
/// line for the failure.  Nothing already applied is undone.
pub fn execute_ops_plan<R: ActionRunner>(
    plan: &[Operation],
    mode: OpsMode,
    runner: &mut R,
) -> Result<ExecResult> {
    let mut result = ExecResult {
        mode,
        applied: 0,
        failed: 0,
        logs: Vec::new(),
    };

    for op in plan {
        for action in &op.actions {
            let line = format!("{} {}: {}", op.backend, op.scope, action);
            if mode == OpsMode::DryRun {
                result.logs.push(format!("DRYRUN {}", line));
                continue;
            }

            match run_action(action, runner) {
                Ok(()) => {
                    result.applied += 1;
                    result.logs.push(format!("APPLIED {}", line));
                }
                Err(e) => {
                    result.failed += 1;
                    result.logs.push(format!("ERROR {} :: {}", line, e));
                    error!("Stopping plan after failed action: {} :: {}", line, e);
                    return Err(e).context(error::ActionFailedSnafu {
                        backend: &op.backend,
                        scope: &op.scope,
                        action,
                        partial: result,
                    });
                }
            }
        }
    }

    info!(
        "Ran plan in {} mode: {} applied, {} actions total",
        mode,
        result.applied,
        result.logs.len()
    );
    Ok(result)
}

fn run_action<R: ActionRunner>(action: &str, runner: &mut R) -> Result<()> {
    let action = action.trim();
    let mut words = action.split_whitespace();
    let verb = match words.next() {
        Some(verb) => verb,
        None => return Ok(()),
    };

    match verb {
        "write" => {
            let rest = action[verb.len()..].trim();
            let (path, detail) = rest
                .split_once(char::is_whitespace)
                .map(|(path, detail)| (path, detail.trim()))
                .unwrap_or((rest, ""));
            ensure!(!path.is_empty(), error::EmptyWritePathSnafu { action });
            check_write_path(path)?;
            runner.write_file(Path::new(path), &managed_contents(detail))
        }
        SYSTEMCTL_BIN | IP_BIN | NFT_BIN => {
            let args: Vec<&str> = words.collect();
            runner.run_command(verb, &args)
        }
        _ => error::ActionNotAllowedSnafu { action }.fail(),
    }
}

/// A write target must be absolute, free of `..`, and under an allowed prefix.
fn check_write_path(path: &str) -> Result<()> {
    let candidate = Path::new(path);
    let plain = candidate.is_absolute()
        && candidate
            .components()
            .all(|c| matches!(c, Component::RootDir | Component::Normal(_)));
    WRITE_ALLOWED_PREFIXES
        .iter()
        .find(|prefix| plain && path.starts_with(*prefix))
        .map(|_| ())
        .context(error::WritePathNotAllowedSnafu { path })
}

fn managed_contents(detail: &str) -> String {
    let mut contents = format!(
        "{}\n# {}\n",
        MANAGED_HEADER,
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    // Details carry operator text; every line of it stays a comment.
    for line in detail.lines() {
        let line: String = line
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        contents.push_str(&format!("# {}\n", line));
    }
    contents
}

/// Records what would have happened, and fails on request.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingRunner {
    pub(crate) writes: Vec<(PathBuf, String)>,
    pub(crate) commands: Vec<String>,
    /// Commands starting with this fail.
    pub(crate) fail_on: Option<String>,
}

#[cfg(test)]
impl ActionRunner for RecordingRunner {
    fn write_file(&mut self, path: &Path, contents: &str) -> Result<()> {
        self.writes.push((path.into(), contents.to_string()));
        Ok(())
    }

    fn run_command(&mut self, program: &str, args: &[&str]) -> Result<()> {
        let command = format!("{} {}", program, args.join(" "));
        self.commands.push(command.clone());
        match &self.fail_on {
            Some(prefix) if command.starts_with(prefix.as_str()) => error::FailedCommandSnafu {
                command,
                output: "simulated failure",
            }
            .fail(),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::build_ops_plan;
    use crate::Error;
    use serde_json::json;
    use tempfile::TempDir;

    fn op(actions: &[&str]) -> Operation {
        Operation {
            backend: "test".to_string(),
            scope: "scope".to_string(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn modes() {
        for dry in &["", "dryrun", "dry-run", " DRY-RUN ", "DryRun"] {
            assert_eq!(normalize_ops_mode(dry).unwrap(), OpsMode::DryRun);
        }
        assert_eq!(normalize_ops_mode("Apply").unwrap(), OpsMode::Apply);
        assert!(matches!(
            normalize_ops_mode("yolo"),
            Err(Error::InvalidMode { .. })
        ));
    }

    #[test]
    fn dry_run_never_mutates() {
        let tree = serde_json::from_value(json!({
            "interfaces": {"ethernet": {"eth0": {"address": "dhcp", "mtu": 1500}}},
            "firewall": {"nftables": {"wan_block": true}},
            "policy": {"egress": {"default_action": "deny"}}
        }))
        .unwrap();
        let plan = build_ops_plan(&tree);
        let total: usize = plan.iter().map(|op| op.actions.len()).sum();

        let mut runner = RecordingRunner::default();
        let result = execute_ops_plan(&plan, OpsMode::DryRun, &mut runner).unwrap();
        assert!(runner.writes.is_empty());
        assert!(runner.commands.is_empty());
        assert_eq!(result.logs.len(), total);
        assert!(result.logs.iter().all(|l| l.starts_with("DRYRUN ")));
        assert_eq!(result.applied, 0);
        assert_eq!(result.failed, 0);
    }

    #[test]
    fn apply_runs_in_order() {
        let plan = vec![
            op(&["write /etc/clawgress/a.json (x=1)", "systemctl restart a"]),
            op(&["ip link set dev eth0 mtu 1500", "nft -f /etc/nftables.d/x.nft"]),
        ];
        let mut runner = RecordingRunner::default();
        let result = execute_ops_plan(&plan, OpsMode::Apply, &mut runner).unwrap();
        assert_eq!(result.applied, 4);
        assert_eq!(result.failed, 0);
        assert_eq!(
            runner.commands,
            vec![
                "systemctl restart a",
                "ip link set dev eth0 mtu 1500",
                "nft -f /etc/nftables.d/x.nft",
            ]
        );
        let (path, contents) = &runner.writes[0];
        assert_eq!(path, &PathBuf::from("/etc/clawgress/a.json"));
        assert!(contents.starts_with(MANAGED_HEADER));
        assert!(contents.ends_with("# (x=1)\n"));
        assert_eq!(
            result.logs[0],
            "APPLIED test scope: write /etc/clawgress/a.json (x=1)"
        );
    }

    #[test]
    fn partial_failure_stops() {
        let plan = vec![
            op(&["systemctl restart broken", "systemctl restart fine"]),
            op(&["systemctl restart later"]),
        ];
        let mut runner = RecordingRunner {
            fail_on: Some("systemctl restart broken".to_string()),
            ..Default::default()
        };
        let err = execute_ops_plan(&plan, OpsMode::Apply, &mut runner).unwrap_err();
        let partial = err.partial_result().unwrap();
        assert_eq!(partial.applied, 0);
        assert_eq!(partial.failed, 1);
        assert_eq!(partial.logs.len(), 1);
        assert!(partial.logs[0].starts_with("ERROR test scope: systemctl restart broken :: "));
        assert_eq!(runner.commands, vec!["systemctl restart broken"]);
    }

    #[test]
    fn failure_after_success_keeps_counts() {
        let plan = vec![op(&["ip link set dev eth0 up", "nft -f /x", "ip link set dev eth1 up"])];
        let mut runner = RecordingRunner {
            fail_on: Some("nft".to_string()),
            ..Default::default()
        };
        let err = execute_ops_plan(&plan, OpsMode::Apply, &mut runner).unwrap_err();
        let partial = err.partial_result().unwrap();
        assert_eq!((partial.applied, partial.failed), (1, 1));
        assert_eq!(runner.commands.len(), 2);
    }

    #[test]
    fn write_allow_list() {
        let mut runner = RecordingRunner::default();
        let plan = vec![op(&["write /etc/clawgress/policy/policy.json (v1)"])];
        execute_ops_plan(&plan, OpsMode::Apply, &mut runner).unwrap();
        assert_eq!(runner.writes.len(), 1);

        for bad in &[
            "write /tmp/x",
            "write /etc/clawgress/../shadow",
            "write etc/clawgress/x",
            "write /etc/clawgressx/y",
        ] {
            let mut runner = RecordingRunner::default();
            let err = execute_ops_plan(&[op(&[*bad])], OpsMode::Apply, &mut runner).unwrap_err();
            match err {
                Error::ActionFailed { source, .. } => {
                    assert!(matches!(*source, Error::WritePathNotAllowed { .. }), "{}", bad)
                }
                other => panic!("unexpected error: {}", other),
            }
            assert!(runner.writes.is_empty());
        }
    }

    #[test]
    fn rejected_actions() {
        for (action, expected) in &[
            ("hostnamectl set-hostname gw1", "action not allowed"),
            ("rm -rf /", "action not allowed"),
            ("write", "write action has no path"),
        ] {
            let mut runner = RecordingRunner::default();
            let err = execute_ops_plan(&[op(&[*action])], OpsMode::Apply, &mut runner).unwrap_err();
            assert!(err.to_string().contains(expected), "{}", err);
            assert!(runner.commands.is_empty());
        }
    }

    #[test]
    fn empty_action_is_noop() {
        let mut runner = RecordingRunner::default();
        let result = execute_ops_plan(&[op(&["  "])], OpsMode::Apply, &mut runner).unwrap();
        assert_eq!(result.applied, 1);
        assert!(runner.commands.is_empty() && runner.writes.is_empty());
    }

    #[test]
    fn multiline_details_stay_comments() {
        let tree = serde_json::from_value(json!({
            "interfaces": {"ethernet": {"eth0": {
                "address": "dhcp",
                "description": "lan\n[Match]\r\nName=*\u{b}x"
            }}}
        }))
        .unwrap();
        let plan = build_ops_plan(&tree);
        let mut runner = RecordingRunner::default();
        execute_ops_plan(&plan, OpsMode::Apply, &mut runner).unwrap();

        let (_, link) = runner
            .writes
            .iter()
            .find(|(path, _)| path == Path::new("/run/systemd/network/10-eth0.link"))
            .unwrap();
        assert!(link.lines().all(|l| l.starts_with('#')), "{}", link);
        assert!(link.contains("# [Match]\n"));
        assert!(link.contains("# Name=* x)\n"));
    }

    #[test]
    fn system_runner_writes_under_root() {
        let root = TempDir::new().unwrap();
        let mut runner = SystemRunner::with_root(root.path());
        let plan = vec![op(&["write /etc/clawgress/policy/policy.json (v1)", "write /tmp/x"])];
        let err = execute_ops_plan(&plan, OpsMode::Apply, &mut runner).unwrap_err();
        assert_eq!(err.partial_result().unwrap().applied, 1);

        let written =
            fs::read_to_string(root.path().join("etc/clawgress/policy/policy.json")).unwrap();
        assert!(written.starts_with(MANAGED_HEADER));
        assert!(!root.path().join("tmp").exists());
    }
}
