/// The signal-escalation state machine.
///
/// `Pending → Signaling(step) → Reevaluating(step) → {Signaling(step+1) |
/// FinalRetry(round) | Done}`. Each step delivers one signal of the
/// sequence to everything still remaining, waits, then rebuilds the
/// remaining set from fresh liveness probes. A timeout aborts the
/// sequence early; nuclear mode appends a bounded KILL retry phase.
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use nix::sys::signal::Signal;

use crate::config::KillConfig;
use crate::outcome::{Classification, PlannedStep, SkipReason, TerminationOutcome};
use crate::signal::{sequence, DeliveryError, Liveness, Signals, Step};

const FINAL_RETRY_ROUNDS: u32 = 3;

/// Tagged state of the escalation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationState {
    Pending,
    Signaling { step: usize },
    Reevaluating { step: usize },
    FinalRetry { round: u32 },
    Done(Classification),
}

/// Drives one escalation run against a validated target set.
pub struct Orchestrator<'a, S: Signals> {
    config: &'a KillConfig,
    signals: &'a S,
    sleep: fn(Duration),
}

impl<'a, S: Signals> Orchestrator<'a, S> {
    pub fn new(config: &'a KillConfig, signals: &'a S) -> Self {
        Self {
            config,
            signals,
            sleep: std::thread::sleep,
        }
    }

    /// Replace the blocking sleep. Tests pass a no-op.
    #[cfg(test)]
    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    /// Run the full protocol. The skip map from validation is folded into
    /// the outcome so every candidate PID stays accounted for.
    pub fn run(
        &self,
        targets: &BTreeSet<u32>,
        skipped: BTreeMap<u32, SkipReason>,
    ) -> TerminationOutcome {
        let mut run = Run {
            config: self.config,
            signals: self.signals,
            sleep: self.sleep,
            seq: sequence(self.config.nuclear),
            original: targets.clone(),
            remaining: targets.clone(),
            failures: BTreeMap::new(),
            planned: Vec::new(),
            timed_out: false,
            started: Instant::now(),
        };

        let mut state = EscalationState::Pending;
        loop {
            state = run.advance(state);
            if let EscalationState::Done(classification) = state {
                return TerminationOutcome {
                    terminated: run.original.difference(&run.remaining).copied().collect(),
                    remaining: run.remaining,
                    skipped,
                    failures: run.failures,
                    planned: run.planned,
                    classification,
                    dry_run: run.config.dry_run,
                    timed_out: run.timed_out,
                };
            }
        }
    }
}

struct Run<'a, S: Signals> {
    config: &'a KillConfig,
    signals: &'a S,
    sleep: fn(Duration),
    seq: Vec<Step>,
    original: BTreeSet<u32>,
    remaining: BTreeSet<u32>,
    failures: BTreeMap<u32, String>,
    planned: Vec<PlannedStep>,
    timed_out: bool,
    started: Instant,
}

impl<S: Signals> Run<'_, S> {
    /// One transition of the state machine.
    fn advance(&mut self, state: EscalationState) -> EscalationState {
        match state {
            EscalationState::Pending => {
                if self.remaining.is_empty() {
                    // Nothing to do: no sleep, no signal.
                    EscalationState::Done(Classification::Success)
                } else {
                    EscalationState::Signaling { step: 0 }
                }
            }

            EscalationState::Signaling { step } => {
                self.signal_step(self.seq[step]);
                EscalationState::Reevaluating { step }
            }

            EscalationState::Reevaluating { step } => {
                let sig = self.seq[step];
                self.wait_after(sig, self.config.wait_time_seconds);
                self.rebuild_remaining();

                if self.remaining.is_empty() {
                    return EscalationState::Done(Classification::Success);
                }
                if self.deadline_reached() {
                    tracing::warn!(
                        remaining = self.remaining.len(),
                        "timeout reached, aborting escalation"
                    );
                    self.timed_out = true;
                    return EscalationState::Done(self.classify());
                }
                if step + 1 < self.seq.len() {
                    EscalationState::Signaling { step: step + 1 }
                } else if self.config.nuclear {
                    EscalationState::FinalRetry { round: 1 }
                } else {
                    EscalationState::Done(self.classify())
                }
            }

            EscalationState::FinalRetry { round } => {
                if round > FINAL_RETRY_ROUNDS {
                    return EscalationState::Done(self.classify());
                }
                tracing::info!(round, remaining = self.remaining.len(), "final KILL retry");
                self.signal_step(Some(Signal::SIGKILL));
                // Halved wait for this phase only, floored at 1s; the
                // configured value is untouched for any later reporting.
                let wait = (self.config.wait_time_seconds / 2).max(1);
                self.wait_after(Some(Signal::SIGKILL), wait);
                self.rebuild_remaining();

                if self.remaining.is_empty() {
                    EscalationState::Done(Classification::Success)
                } else if self.deadline_reached() {
                    self.timed_out = true;
                    EscalationState::Done(self.classify())
                } else {
                    EscalationState::FinalRetry { round: round + 1 }
                }
            }

            EscalationState::Done(_) => state,
        }
    }

    /// Deliver one step of the sequence to every remaining PID. A `None`
    /// step is the liveness-only check and sends nothing. Dry runs record
    /// the plan instead of touching the OS.
    fn signal_step(&mut self, sig: Step) {
        let Some(sig) = sig else {
            return;
        };

        if self.config.dry_run {
            tracing::info!(signal = sig.as_str(), pids = ?self.remaining, "dry run: would signal");
            self.planned.push(PlannedStep {
                signal: sig.as_str().to_string(),
                pids: self.remaining.clone(),
            });
            return;
        }

        for &pid in &self.remaining {
            match self.signals.send(pid, sig) {
                Ok(()) => {
                    tracing::debug!(pid, signal = sig.as_str(), "signal delivered");
                }
                Err(DeliveryError::Vanished) => {
                    // Already gone — the rebuild will drop it.
                    tracing::debug!(pid, "vanished before delivery");
                }
                Err(err) => {
                    tracing::warn!(pid, signal = sig.as_str(), %err, "delivery failed");
                    self.failures.insert(pid, err.to_string());
                }
            }
        }
    }

    /// Blocking wait between delivery and the liveness re-query. Skipped
    /// for the probe step, for a zero wait, and in dry runs.
    fn wait_after(&self, sig: Step, wait_secs: u64) {
        if sig.is_none() || wait_secs == 0 || self.config.dry_run {
            return;
        }
        (self.sleep)(Duration::from_secs(wait_secs));
    }

    /// Fresh liveness snapshot: keep only PIDs that still exist. A denied
    /// probe means the process exists, so it stays. In dry runs remaining
    /// is left untouched — nothing we did can have changed it.
    fn rebuild_remaining(&mut self) {
        if self.config.dry_run {
            return;
        }
        self.remaining = self
            .remaining
            .iter()
            .copied()
            .filter(|&pid| self.signals.probe(pid) != Liveness::Gone)
            .collect();
    }

    fn deadline_reached(&self) -> bool {
        self.started.elapsed() >= Duration::from_secs(self.config.timeout_seconds)
    }

    fn classify(&self) -> Classification {
        if self.remaining.is_empty() {
            Classification::Success
        } else if self.remaining == self.original {
            Classification::Failed
        } else {
            Classification::Partial
        }
    }
}
