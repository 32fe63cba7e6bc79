mod config;
mod locator;
mod orchestrator;
mod outcome;
mod report;
mod signal;
mod validator;

use std::collections::BTreeSet;
use std::io::IsTerminal;
use std::path::PathBuf;

use clap::Parser;

use crate::config::{CliOverrides, FileConfig, KillConfig};
use crate::locator::{MatchSpec, UserScope};
use crate::orchestrator::Orchestrator;
use crate::outcome::{exit_for_all_skipped, RunExit};
use crate::report::{Confirmation, Style};
use crate::signal::NixSignals;

/// Terminate processes by name pattern or explicit PID, escalating
/// through a staged signal sequence with safety rails: self/parent
/// exclusion, critical-process protection, and permission checks.
#[derive(Parser, Debug)]
#[command(name = "reaper", version, about)]
pub struct Cli {
    /// Name pattern (substring of name or command line; see --exact)
    #[arg(value_name = "PATTERN")]
    pattern: Option<String>,

    /// Explicit target PID (repeatable); takes precedence over PATTERN
    #[arg(long = "pid", value_name = "PID")]
    pids: Vec<u32>,

    /// Process name must equal PATTERN exactly
    #[arg(short, long)]
    exact: bool,

    /// Only match processes owned by USER
    #[arg(short, long, value_name = "USER", conflicts_with = "all_users")]
    user: Option<String>,

    /// Match processes of all users (default: current user only)
    #[arg(short, long)]
    all_users: bool,

    /// Override critical-process protection and permission skips
    #[arg(short, long)]
    force: bool,

    /// Extended escalation sequence plus bounded final KILL retries
    #[arg(short = 'N', long)]
    nuclear: bool,

    /// Overall deadline in seconds (default: 30)
    #[arg(short, long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Seconds to wait between escalation steps (default: 2)
    #[arg(short, long, value_name = "SECS")]
    wait: Option<u64>,

    /// Show what would be signaled without sending anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long = "yes")]
    yes: bool,

    /// Print the outcome as a JSON object
    #[arg(long)]
    json: bool,

    /// Defaults file (a missing file is fine)
    #[arg(short, long, default_value = "reaper.toml")]
    config: PathBuf,

    /// Extra logging (locator choice, per-step delivery results)
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Errors only
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();

    let exit = run(cli);
    std::process::exit(exit.code());
}

fn run(cli: Cli) -> RunExit {
    // Display settings are fixed here, once; nothing downstream reads
    // terminal state.
    let style = Style::new(std::io::stdout().is_terminal() && !cli.json);

    let file = match FileConfig::load(&cli.config) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("{err}");
            return RunExit::InvalidConfig;
        }
    };
    let kill_config = KillConfig::merge(
        &file,
        &CliOverrides {
            force: cli.force,
            nuclear: cli.nuclear,
            timeout: cli.timeout,
            wait: cli.wait,
            dry_run: cli.dry_run,
            auto_confirm: cli.yes,
        },
    );

    // Checked before any process query happens.
    let Some(spec) = build_spec(&cli) else {
        eprintln!("either a PATTERN or at least one --pid is required");
        return RunExit::InvalidConfig;
    };

    let self_pid = std::process::id();
    let parent_pid = nix::unistd::getppid().as_raw() as u32;
    let exclude = [self_pid, parent_pid];

    let candidates = match locator::select() {
        Some(locator) => {
            tracing::debug!(backend = locator.name(), "locating candidates");
            match locator.locate(&spec, &exclude) {
                Ok(candidates) => candidates,
                Err(err) => {
                    // Locator trouble is non-fatal: fold into "nothing found".
                    tracing::warn!(%err, "process lookup failed");
                    Vec::new()
                }
            }
        }
        None => Vec::new(),
    };
    if candidates.is_empty() {
        println!("No processes found.");
        return RunExit::NoMatches;
    }

    let signals = NixSignals;
    let (validated, skipped) =
        validator::validate(&candidates, &kill_config, &signals, self_pid, parent_pid);

    if validated.is_empty() {
        for (pid, reason) in &skipped {
            println!("{}", style.yellow(&format!("Skipped {pid}: {reason}")));
        }
        println!("No processes to signal.");
        return exit_for_all_skipped(&skipped);
    }

    report::print_table(&validated);

    if !kill_config.auto_confirm && !kill_config.dry_run {
        if report::confirm(validated.len()) == Confirmation::Cancelled {
            println!("Aborted — nothing was signaled.");
            return RunExit::Success;
        }
    }

    let targets: BTreeSet<u32> = validated.iter().map(|r| r.pid).collect();
    tracing::info!(
        targets = targets.len(),
        nuclear = kill_config.nuclear,
        dry_run = kill_config.dry_run,
        "starting escalation"
    );
    let outcome = Orchestrator::new(&kill_config, &signals).run(&targets, skipped);

    if cli.json {
        report::print_json(&outcome);
    } else {
        report::print_summary(&outcome, &style);
    }
    outcome.exit()
}

fn build_spec(cli: &Cli) -> Option<MatchSpec> {
    if !cli.pids.is_empty() {
        return Some(MatchSpec::Pids(cli.pids.iter().copied().collect()));
    }
    let pattern = cli.pattern.clone()?;
    let scope = if cli.all_users {
        UserScope::All
    } else if let Some(user) = &cli.user {
        UserScope::Named(user.clone())
    } else {
        UserScope::Current
    };
    Some(MatchSpec::Pattern {
        pattern,
        exact: cli.exact,
        scope,
    })
}
