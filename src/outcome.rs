/// Shared result types: skip reasons, terminal classification, the
/// termination outcome handed to the reporter, and the exit-code taxonomy.
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Why a candidate PID was dropped during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// The process no longer exists.
    Gone,
    /// Existence/ownership could not be determined and --force was not set.
    PermissionDenied,
    /// Protected process name and --force was not set.
    CriticalSkipped,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Gone => write!(f, "gone"),
            SkipReason::PermissionDenied => write!(f, "permission-denied"),
            SkipReason::CriticalSkipped => write!(f, "critical-skipped"),
        }
    }
}

/// Terminal classification of an escalation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Every target died.
    Success,
    /// Some targets died, some survived.
    Partial,
    /// Nothing responded — remaining equals the original target set.
    Failed,
}

/// One recorded step of a dry run: the signal that would have been sent
/// and the PIDs it would have gone to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub signal: String,
    pub pids: BTreeSet<u32>,
}

/// The single outcome produced when the orchestrator loop terminates.
///
/// `terminated ∪ remaining ∪ skipped` covers every candidate PID (minus
/// self/parent) — no PID vanishes from reporting.
#[derive(Debug, Clone, Serialize)]
pub struct TerminationOutcome {
    pub terminated: BTreeSet<u32>,
    pub remaining: BTreeSet<u32>,
    pub skipped: BTreeMap<u32, SkipReason>,
    /// Last delivery failure per surviving PID (permission/OS errors).
    pub failures: BTreeMap<u32, String>,
    /// Signals that would have been sent (dry run only).
    pub planned: Vec<PlannedStep>,
    pub classification: Classification,
    pub dry_run: bool,
    /// The overall deadline cut the sequence short.
    pub timed_out: bool,
}

/// Exit-code taxonomy — the contract with the invoking process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// All targets terminated, or cancelled before any signal was sent.
    Success,
    /// Neither pattern nor explicit PIDs supplied, or a bad config file.
    InvalidConfig,
    /// Locator or validator produced an empty set.
    NoMatches,
    /// Nothing responded to any signal.
    KillFailed,
    /// Some targets survived the full sequence.
    PartialKill,
    /// Every candidate was dropped specifically for permission reasons.
    PermissionDenied,
}

impl RunExit {
    pub fn code(self) -> i32 {
        match self {
            RunExit::Success => 0,
            RunExit::InvalidConfig => 1,
            RunExit::NoMatches => 2,
            RunExit::KillFailed => 3,
            RunExit::PartialKill => 4,
            RunExit::PermissionDenied => 5,
        }
    }
}

impl TerminationOutcome {
    /// Map the terminal classification to an exit code. Dry runs always
    /// succeed — nothing was signaled, so nothing can have failed.
    pub fn exit(&self) -> RunExit {
        if self.dry_run {
            return RunExit::Success;
        }
        match self.classification {
            Classification::Success => RunExit::Success,
            Classification::Partial => RunExit::PartialKill,
            Classification::Failed => RunExit::KillFailed,
        }
    }
}

/// Exit code for a run where validation dropped every candidate: exit 5
/// only when every skip was a permission skip, otherwise exit 2.
pub fn exit_for_all_skipped(skipped: &BTreeMap<u32, SkipReason>) -> RunExit {
    if !skipped.is_empty()
        && skipped
            .values()
            .all(|r| *r == SkipReason::PermissionDenied)
    {
        RunExit::PermissionDenied
    } else {
        RunExit::NoMatches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(
        terminated: &[u32],
        remaining: &[u32],
        classification: Classification,
        dry_run: bool,
    ) -> TerminationOutcome {
        TerminationOutcome {
            terminated: terminated.iter().copied().collect(),
            remaining: remaining.iter().copied().collect(),
            skipped: BTreeMap::new(),
            failures: BTreeMap::new(),
            planned: Vec::new(),
            classification,
            dry_run,
            timed_out: false,
        }
    }

    #[test]
    fn test_exit_codes_match_taxonomy() {
        assert_eq!(RunExit::Success.code(), 0);
        assert_eq!(RunExit::InvalidConfig.code(), 1);
        assert_eq!(RunExit::NoMatches.code(), 2);
        assert_eq!(RunExit::KillFailed.code(), 3);
        assert_eq!(RunExit::PartialKill.code(), 4);
        assert_eq!(RunExit::PermissionDenied.code(), 5);
    }

    #[test]
    fn test_success_classification_exits_zero() {
        let o = outcome(&[100], &[], Classification::Success, false);
        assert_eq!(o.exit(), RunExit::Success);
    }

    #[test]
    fn test_partial_classification_exits_four() {
        let o = outcome(&[200], &[100], Classification::Partial, false);
        assert_eq!(o.exit(), RunExit::PartialKill);
    }

    #[test]
    fn test_failed_classification_exits_three() {
        let o = outcome(&[], &[100, 200], Classification::Failed, false);
        assert_eq!(o.exit(), RunExit::KillFailed);
    }

    #[test]
    fn test_dry_run_always_exits_zero() {
        let o = outcome(&[], &[100, 200], Classification::Failed, true);
        assert_eq!(o.exit(), RunExit::Success);
    }

    #[test]
    fn test_all_skipped_permission_denied_exits_five() {
        let mut skipped = BTreeMap::new();
        skipped.insert(100, SkipReason::PermissionDenied);
        skipped.insert(200, SkipReason::PermissionDenied);
        assert_eq!(exit_for_all_skipped(&skipped), RunExit::PermissionDenied);
    }

    #[test]
    fn test_mixed_skip_reasons_exit_two() {
        let mut skipped = BTreeMap::new();
        skipped.insert(100, SkipReason::PermissionDenied);
        skipped.insert(200, SkipReason::Gone);
        assert_eq!(exit_for_all_skipped(&skipped), RunExit::NoMatches);
    }

    #[test]
    fn test_critical_only_skips_exit_two() {
        // Scenario: pattern matched only a critical process without --force.
        let mut skipped = BTreeMap::new();
        skipped.insert(1, SkipReason::CriticalSkipped);
        assert_eq!(exit_for_all_skipped(&skipped), RunExit::NoMatches);
    }

    #[test]
    fn test_empty_skip_map_exits_two() {
        assert_eq!(exit_for_all_skipped(&BTreeMap::new()), RunExit::NoMatches);
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::Gone.to_string(), "gone");
        assert_eq!(SkipReason::PermissionDenied.to_string(), "permission-denied");
        assert_eq!(SkipReason::CriticalSkipped.to_string(), "critical-skipped");
    }

    #[test]
    fn test_outcome_serializes_to_json() {
        let mut o = outcome(&[100], &[200], Classification::Partial, false);
        o.skipped.insert(300, SkipReason::Gone);
        let json = serde_json::to_string(&o).unwrap();
        assert!(json.contains("\"classification\":\"partial\""));
        assert!(json.contains("\"300\":\"gone\""));
    }
}
