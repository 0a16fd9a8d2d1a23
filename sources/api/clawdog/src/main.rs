/*!
# Introduction

clawdog is the operator's command-line front door to a clawgress gateway's configuration.

It stages candidate configuration documents, commits them, and carries committed configuration
out to the host:
* `stage`: stage a JSON candidate document
* `commit`: promote the staged revision to active, then run its ops plan and write the
  firewall rule set
* `state`: show the staged and active revisions and the commit history
* `plan`: show the ops plan a document (or the active configuration) compiles to
* `set`: validate a `set` command and fold it into a candidate document on disk
* `show`: run one of the grammar's `show` commands

Every subcommand prints its result as JSON on stdout; logs go to stderr.

Settings come from the environment first (`CLAWGRESS_STATE_DIR`, `CLAWGRESS_OPS_MODE`,
`CLAWGRESS_NFT_APPLY`, `CLAWGRESS_COMMAND_SCHEMA`) and can be overridden with flags.

A commit that loses an optimistic-concurrency race exits with status 2, so scripts can re-read
state and retry; every other failure exits with status 1.
*/

#![deny(rust_2018_idioms)]

use argh::FromArgs;
use simplelog::{ColorChoice, Config as LogConfig, LevelFilter, TermLogger, TerminalMode};
use snafu::ResultExt;
use std::path::PathBuf;
use std::process;

use crate::error::Result;

mod cli;
mod config;
pub(crate) mod error;

/// Stages, commits, and inspects clawgress gateway configuration.
#[derive(FromArgs, Debug)]
struct Args {
    #[argh(option, default = "LevelFilter::Info")]
    /// filter level for log messages
    log_level: LevelFilter,

    #[argh(option)]
    /// directory holding the revision store (default: $CLAWGRESS_STATE_DIR, or "state")
    state_dir: Option<PathBuf>,

    #[argh(option)]
    /// JSON command catalog to use instead of the built-in one
    command_schema: Option<PathBuf>,

    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
enum Commands {
    Stage(cli::Stage),
    Commit(cli::Commit),
    State(cli::State),
    Plan(cli::Plan),
    Set(cli::Set),
    Show(cli::Show),
}

fn run() -> Result<()> {
    let args: Args = argh::from_env();

    TermLogger::init(
        args.log_level,
        LogConfig::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .context(error::LoggerSnafu)?;

    let mut config = config::Config::from_env()?;
    if let Some(state_dir) = args.state_dir {
        config.state_dir = state_dir;
    }
    if let Some(command_schema) = args.command_schema {
        config.command_schema = Some(command_schema);
    }
    log::debug!("Using configuration {:?}", config);

    match args.command {
        Commands::Stage(stage) => stage.run(&config),
        Commands::Commit(commit) => commit.run(&config),
        Commands::State(state) => state.run(&config),
        Commands::Plan(plan) => plan.run(&config),
        Commands::Set(set) => set.run(&config),
        Commands::Show(show) => show.run(&config),
    }
}

// Returning a Result from main makes it print a Debug representation of the error, but with Snafu
// we have nice Display representations of the error, so we wrap "main" (run) and print any error.
// https://github.com/shepmaster/snafu/issues/110
fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e);
        process::exit(e.exit_code());
    }
}
