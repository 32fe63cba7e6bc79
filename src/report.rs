/// Outcome reporting: the pre-signal process table, the confirmation
/// prompt, the human-readable summary, and the optional JSON form.
///
/// Color is decided once at startup and passed in as a `Style`; nothing
/// here reads terminal state on its own.
use chrono::Utc;
use dialoguer::Confirm;

use crate::locator::ProcessRecord;
use crate::outcome::{Classification, TerminationOutcome};

const RED: &str = "\x1b[0;31m";
const GREEN: &str = "\x1b[0;32m";
const YELLOW: &str = "\x1b[0;33m";
const NC: &str = "\x1b[0m";

const CMD_WIDTH: usize = 72;

/// Display settings computed once at startup.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    color: bool,
}

impl Style {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// No-color style for tests and non-terminal output.
    #[allow(dead_code)]
    pub fn plain() -> Self {
        Self { color: false }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("{code}{text}{NC}")
        } else {
            text.to_string()
        }
    }

    pub fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    pub fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    pub fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }
}

/// Format seconds-since-start as `HH:MM:SS`, with a day prefix past 24h.
/// Unknown start times render as "-".
pub fn format_elapsed(start_epoch: u64, now_epoch: i64) -> String {
    if start_epoch == 0 || start_epoch as i64 > now_epoch {
        return "-".to_string();
    }
    let total = now_epoch as u64 - start_epoch;
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    if days > 0 {
        format!("{days}d {hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let cut: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

/// Render the pre-signal table of candidate targets.
pub fn render_table(records: &[ProcessRecord], now_epoch: i64) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>8}  {:<12}  {:>12}  {}\n",
        "PID", "USER", "ELAPSED", "COMMAND"
    ));
    for record in records {
        let command = if record.command_line.is_empty() {
            record.name.as_str()
        } else {
            record.command_line.as_str()
        };
        out.push_str(&format!(
            "{:>8}  {:<12}  {:>12}  {}\n",
            record.pid,
            record.owner.as_deref().unwrap_or("?"),
            format_elapsed(record.start_time, now_epoch),
            truncate(command, CMD_WIDTH),
        ));
    }
    out
}

pub fn print_table(records: &[ProcessRecord]) {
    print!("{}", render_table(records, Utc::now().timestamp()));
}

/// Answer from the confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Proceed,
    /// Declined, or interrupted (Ctrl-C/EOF) — either way a clean,
    /// zero-signal abort.
    Cancelled,
}

/// Prompt before the first real signal goes out. Must run between
/// validation and the orchestrator entering the signaling loop.
pub fn confirm(target_count: usize) -> Confirmation {
    let prompt = format!(
        "Send signals to {target_count} process{}?",
        if target_count == 1 { "" } else { "es" }
    );
    match Confirm::new().with_prompt(prompt).default(false).interact() {
        Ok(true) => Confirmation::Proceed,
        Ok(false) => {
            tracing::info!("confirmation declined");
            Confirmation::Cancelled
        }
        Err(err) => {
            // Interrupt at the prompt is a clean abort, not a failure.
            tracing::info!(%err, "confirmation interrupted");
            Confirmation::Cancelled
        }
    }
}

fn join_pids(pids: impl IntoIterator<Item = u32>) -> String {
    pids.into_iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the human-readable summary. Survivors are always listed with a
/// reason — a partial result never reads like a clean success.
pub fn render_summary(outcome: &TerminationOutcome, style: &Style) -> String {
    let mut out = String::new();

    if outcome.dry_run {
        out.push_str(&style.yellow("Dry run — no signals were sent.\n"));
        for step in &outcome.planned {
            out.push_str(&format!(
                "  would send {} to {}\n",
                step.signal,
                join_pids(step.pids.iter().copied())
            ));
        }
        return out;
    }

    if !outcome.terminated.is_empty() {
        out.push_str(&style.green(&format!(
            "Terminated {}: {}\n",
            outcome.terminated.len(),
            join_pids(outcome.terminated.iter().copied())
        )));
    }
    for (pid, reason) in &outcome.skipped {
        out.push_str(&style.yellow(&format!("Skipped {pid}: {reason}\n")));
    }
    for pid in &outcome.remaining {
        let note = outcome
            .failures
            .get(pid)
            .map(|f| format!(" ({f})"))
            .unwrap_or_default();
        out.push_str(&style.red(&format!("Survived {pid}{note}\n")));
    }

    let verdict = match outcome.classification {
        Classification::Success => style.green("All targets terminated."),
        Classification::Partial => style.red("Partial kill — some targets survived."),
        Classification::Failed => style.red("Kill failed — no target responded."),
    };
    out.push_str(&verdict);
    out.push('\n');
    if outcome.timed_out {
        out.push_str(&style.yellow("Escalation stopped at the timeout.\n"));
    }
    out
}

pub fn print_summary(outcome: &TerminationOutcome, style: &Style) {
    print!("{}", render_summary(outcome, style));
}

pub fn print_json(outcome: &TerminationOutcome) {
    match serde_json::to_string_pretty(outcome) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to serialize outcome: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::{PlannedStep, SkipReason};
    use std::collections::{BTreeMap, BTreeSet};

    fn record(pid: u32, name: &str, owner: &str, start: u64, cmd: &str) -> ProcessRecord {
        ProcessRecord {
            pid,
            name: name.to_string(),
            owner: Some(owner.to_string()),
            start_time: start,
            command_line: cmd.to_string(),
        }
    }

    fn base_outcome() -> TerminationOutcome {
        TerminationOutcome {
            terminated: BTreeSet::new(),
            remaining: BTreeSet::new(),
            skipped: BTreeMap::new(),
            failures: BTreeMap::new(),
            planned: Vec::new(),
            classification: Classification::Success,
            dry_run: false,
            timed_out: false,
        }
    }

    #[test]
    fn test_format_elapsed_under_a_day() {
        assert_eq!(format_elapsed(1_000, 1_000 + 3_725), "01:02:05");
    }

    #[test]
    fn test_format_elapsed_multi_day() {
        let two_days = 2 * 86_400 + 3_600 + 60 + 1;
        assert_eq!(format_elapsed(500, 500 + two_days), "2d 01:01:01");
    }

    #[test]
    fn test_format_elapsed_unknown_start() {
        assert_eq!(format_elapsed(0, 1_000), "-");
        // A start time in the future is nonsense — render unknown.
        assert_eq!(format_elapsed(2_000, 1_000), "-");
    }

    #[test]
    fn test_render_table_contains_fields() {
        let records = vec![
            record(1234, "worker", "alice", 900, "worker --serve"),
            record(99, "other", "bob", 0, ""),
        ];
        let table = render_table(&records, 1_000);
        assert!(table.contains("PID"));
        assert!(table.contains("1234"));
        assert!(table.contains("alice"));
        assert!(table.contains("worker --serve"));
        // Empty command line falls back to the name; unknown start is "-".
        assert!(table.contains("other"));
        assert!(table.contains('-'));
    }

    #[test]
    fn test_render_table_truncates_long_commands() {
        let long = "x".repeat(200);
        let records = vec![record(1, "x", "u", 0, &long)];
        let table = render_table(&records, 0);
        let row = table.lines().nth(1).unwrap();
        assert!(row.chars().count() < 120);
        assert!(row.contains('…'));
    }

    #[test]
    fn test_summary_lists_survivors_with_reason() {
        let mut outcome = base_outcome();
        outcome.terminated.insert(200);
        outcome.remaining.insert(100);
        outcome
            .failures
            .insert(100, "permission denied".to_string());
        outcome.classification = Classification::Partial;
        let text = render_summary(&outcome, &Style::plain());
        assert!(text.contains("Terminated 1: 200"));
        assert!(text.contains("Survived 100 (permission denied)"));
        assert!(text.contains("Partial kill"));
    }

    #[test]
    fn test_summary_shows_skip_reasons() {
        let mut outcome = base_outcome();
        outcome.skipped.insert(300, SkipReason::CriticalSkipped);
        let text = render_summary(&outcome, &Style::plain());
        assert!(text.contains("Skipped 300: critical-skipped"));
        assert!(text.contains("All targets terminated."));
    }

    #[test]
    fn test_summary_dry_run_prints_plan() {
        let mut outcome = base_outcome();
        outcome.dry_run = true;
        outcome.planned.push(PlannedStep {
            signal: "SIGTERM".to_string(),
            pids: [100, 200].into_iter().collect(),
        });
        let text = render_summary(&outcome, &Style::plain());
        assert!(text.contains("Dry run"));
        assert!(text.contains("would send SIGTERM to 100, 200"));
    }

    #[test]
    fn test_summary_notes_timeout() {
        let mut outcome = base_outcome();
        outcome.remaining.insert(100);
        outcome.classification = Classification::Failed;
        outcome.timed_out = true;
        let text = render_summary(&outcome, &Style::plain());
        assert!(text.contains("timeout"));
    }

    #[test]
    fn test_style_plain_has_no_escape_codes() {
        let text = Style::plain().red("hello");
        assert_eq!(text, "hello");
        let colored = Style::new(true).red("hello");
        assert!(colored.starts_with("\x1b["));
        assert!(colored.ends_with(NC));
    }
}
