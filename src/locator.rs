/// Process location: resolve a match specification into candidate records.
///
/// Two interchangeable backends behind the `Locator` trait, selected once
/// at startup: a native `sysinfo` snapshot and a `ps`-parsing fallback.
/// Both are read-only; candidates always exclude the tool's own PID and
/// its parent.
use std::collections::BTreeSet;
use std::process::Command;

use sysinfo::{System, Users};

/// Which process owners a pattern may match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserScope {
    /// Only processes owned by the invoking user (the default).
    Current,
    /// Any owner.
    All,
    /// Only processes owned by the named user.
    Named(String),
}

/// What to terminate: explicit PIDs, or a pattern with scoping rules.
#[derive(Debug, Clone)]
pub enum MatchSpec {
    Pids(BTreeSet<u32>),
    Pattern {
        pattern: String,
        exact: bool,
        scope: UserScope,
    },
}

/// Immutable snapshot of one process, taken at query time. Never cached
/// across escalation steps — liveness is always re-probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub owner: Option<String>,
    /// Unix epoch seconds; 0 when unknown.
    pub start_time: u64,
    pub command_line: String,
}

impl ProcessRecord {
    /// Placeholder for an explicitly requested PID that was not found in
    /// the snapshot. The validator will tag it "gone".
    pub fn unknown(pid: u32) -> Self {
        Self {
            pid,
            name: String::new(),
            owner: None,
            start_time: 0,
            command_line: String::new(),
        }
    }
}

/// Locator failure. Unavailability is non-fatal: the caller folds it into
/// "no processes found".
#[derive(Debug)]
pub enum LocatorError {
    Unavailable,
    Query { detail: String },
}

impl std::fmt::Display for LocatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocatorError::Unavailable => write!(f, "no process introspection available"),
            LocatorError::Query { detail } => write!(f, "process query failed: {detail}"),
        }
    }
}

impl std::error::Error for LocatorError {}

/// A source of process candidates.
pub trait Locator {
    /// Resolve `spec` into candidate records, excluding the PIDs in
    /// `exclude` (self and parent).
    fn locate(&self, spec: &MatchSpec, exclude: &[u32]) -> Result<Vec<ProcessRecord>, LocatorError>;

    fn name(&self) -> &'static str;
}

/// Pure matching predicate shared by both backends.
///
/// Exact mode compares the process name; substring mode searches both the
/// command line and the name. The scope check runs on top of either mode.
pub fn matches(
    record: &ProcessRecord,
    pattern: &str,
    exact: bool,
    scope: &UserScope,
    current_user: Option<&str>,
) -> bool {
    let name_hit = if exact {
        record.name == pattern
    } else {
        record.command_line.contains(pattern) || record.name.contains(pattern)
    };
    if !name_hit {
        return false;
    }
    match scope {
        UserScope::All => true,
        UserScope::Current => match (record.owner.as_deref(), current_user) {
            (Some(owner), Some(me)) => owner == me,
            _ => false,
        },
        UserScope::Named(user) => record.owner.as_deref() == Some(user.as_str()),
    }
}

/// Shared filtering over a full snapshot.
fn filter_candidates(
    snapshot: Vec<ProcessRecord>,
    spec: &MatchSpec,
    exclude: &[u32],
    current_user: Option<&str>,
) -> Vec<ProcessRecord> {
    match spec {
        MatchSpec::Pids(pids) => {
            let mut out = Vec::new();
            for &pid in pids {
                if exclude.contains(&pid) {
                    continue;
                }
                match snapshot.iter().find(|r| r.pid == pid) {
                    Some(record) => out.push(record.clone()),
                    None => out.push(ProcessRecord::unknown(pid)),
                }
            }
            out
        }
        MatchSpec::Pattern {
            pattern,
            exact,
            scope,
        } => snapshot
            .into_iter()
            .filter(|r| !exclude.contains(&r.pid))
            .filter(|r| matches(r, pattern, *exact, scope, current_user))
            .collect(),
    }
}

/// Native backend: one `sysinfo` refresh per locate call.
pub struct SysinfoLocator;

impl SysinfoLocator {
    fn snapshot() -> (Vec<ProcessRecord>, Option<String>) {
        let mut sys = System::new_all();
        sys.refresh_processes();
        // sysinfo 0.30 keeps the user list separate from the process table
        let users = Users::new_with_refreshed_list();

        let current_user = sysinfo::get_current_pid()
            .ok()
            .and_then(|pid| sys.process(pid))
            .and_then(|p| p.user_id())
            .and_then(|uid| users.get_user_by_id(uid))
            .map(|u| u.name().to_string())
            .or_else(|| std::env::var("USER").ok());

        let records = sys
            .processes()
            .iter()
            .map(|(pid, process)| {
                let owner = process
                    .user_id()
                    .and_then(|uid| users.get_user_by_id(uid))
                    .map(|u| u.name().to_string());
                ProcessRecord {
                    pid: pid.as_u32(),
                    name: process.name().to_string(),
                    owner,
                    start_time: process.start_time(),
                    command_line: process.cmd().join(" "),
                }
            })
            .collect();
        (records, current_user)
    }
}

impl Locator for SysinfoLocator {
    fn locate(&self, spec: &MatchSpec, exclude: &[u32]) -> Result<Vec<ProcessRecord>, LocatorError> {
        let (snapshot, current_user) = Self::snapshot();
        if snapshot.is_empty() {
            return Err(LocatorError::Unavailable);
        }
        Ok(filter_candidates(
            snapshot,
            spec,
            exclude,
            current_user.as_deref(),
        ))
    }

    fn name(&self) -> &'static str {
        "sysinfo"
    }
}

/// Fallback backend: shell out to `ps` and parse its output.
pub struct PsLocator;

impl PsLocator {
    pub fn available() -> bool {
        Command::new("ps")
            .args(["-e", "-o", "pid="])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn snapshot() -> Result<Vec<ProcessRecord>, LocatorError> {
        let output = Command::new("ps")
            .args(["-e", "-o", "pid=,user=,etimes=,comm=,args="])
            .output()
            .map_err(|e| LocatorError::Query {
                detail: format!("failed to run ps: {e}"),
            })?;
        if !output.status.success() {
            return Err(LocatorError::Query {
                detail: format!("ps exited with {}", output.status),
            });
        }
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text.lines().filter_map(|l| parse_ps_line(l, now)).collect())
    }
}

impl Locator for PsLocator {
    fn locate(&self, spec: &MatchSpec, exclude: &[u32]) -> Result<Vec<ProcessRecord>, LocatorError> {
        let snapshot = Self::snapshot()?;
        let current_user = std::env::var("USER").ok();
        Ok(filter_candidates(
            snapshot,
            spec,
            exclude,
            current_user.as_deref(),
        ))
    }

    fn name(&self) -> &'static str {
        "ps"
    }
}

/// Parse one `ps -o pid=,user=,etimes=,comm=,args=` line.
///
/// The first four fields are whitespace-delimited; everything after the
/// fourth is the command line. A `comm` containing spaces would mis-split,
/// which is an accepted limitation of the fallback path.
fn parse_ps_line(line: &str, now_epoch: u64) -> Option<ProcessRecord> {
    let mut parts = line.split_whitespace();
    let pid: u32 = parts.next()?.parse().ok()?;
    let user = parts.next()?.to_string();
    let etimes: u64 = parts.next()?.parse().ok()?;
    let comm = parts.next()?.to_string();
    let rest: Vec<&str> = parts.collect();
    let command_line = if rest.is_empty() {
        comm.clone()
    } else {
        rest.join(" ")
    };
    Some(ProcessRecord {
        pid,
        // ps reports comm as a path on some platforms; keep the basename
        name: comm.rsplit('/').next().unwrap_or(&comm).to_string(),
        owner: Some(user),
        start_time: now_epoch.saturating_sub(etimes),
        command_line,
    })
}

/// Pick a backend once at startup. Native snapshotting wins; `ps` is only
/// probed when the native path sees nothing at all.
pub fn select() -> Option<Box<dyn Locator>> {
    let (snapshot, _) = SysinfoLocator::snapshot();
    if !snapshot.is_empty() {
        return Some(Box::new(SysinfoLocator));
    }
    if PsLocator::available() {
        return Some(Box::new(PsLocator));
    }
    tracing::warn!("no process introspection available");
    None
}
