/// Candidate validation: the safety rules between "it matched" and
/// "we will signal it".
///
/// Per-PID decision order:
/// 1. self/parent PID — dropped silently (never part of any target set)
/// 2. gone — the process no longer exists
/// 3. permission — probe denied; kept only under --force
/// 4. critical name — protected unless --force, with the shell exemption
/// 5. otherwise validated
use std::collections::BTreeMap;

use crate::config::KillConfig;
use crate::locator::ProcessRecord;
use crate::outcome::SkipReason;
use crate::signal::{Liveness, Signals};

/// Names assumed necessary for system/session stability. Shells appear
/// here but are exempted below unless they are the invoking lineage.
const PROTECTED: &[&str] = &[
    "init", "systemd", "launchd", // service managers
    "sshd",   // remote login
    "sh", "bash", "zsh", "fish", "dash", // shells
    "reaper", // ourselves
    "sudo", "su", "doas", // privilege escalation
];

const SHELLS: &[&str] = &["sh", "bash", "zsh", "fish", "dash"];

fn is_shell(name: &str) -> bool {
    SHELLS.contains(&name)
}

/// Critical-name check with the inherited shell exemption: a shell is not
/// critical purely by name when its PID is neither self nor parent, so
/// unrelated shells stay killable and the invoking lineage is protected
/// by the self/parent rule instead.
pub fn is_critical(
    name: &str,
    pid: u32,
    self_pid: u32,
    parent_pid: u32,
    extra: &[String],
) -> bool {
    let listed = PROTECTED.contains(&name) || extra.iter().any(|e| e == name);
    if !listed {
        return false;
    }
    if is_shell(name) && pid != self_pid && pid != parent_pid {
        return false;
    }
    true
}

/// Filter candidates into `(validated_targets, skip_map)`.
///
/// Self/parent drops produce no skip entry — the accounting invariant is
/// defined relative to the candidate set minus self/parent. Everything
/// else that is dropped gets a reason.
pub fn validate(
    candidates: &[ProcessRecord],
    config: &KillConfig,
    signals: &dyn Signals,
    self_pid: u32,
    parent_pid: u32,
) -> (Vec<ProcessRecord>, BTreeMap<u32, SkipReason>) {
    let mut validated = Vec::new();
    let mut skipped = BTreeMap::new();

    for record in candidates {
        let pid = record.pid;
        if pid == self_pid || pid == parent_pid {
            tracing::debug!(pid, "dropping self/parent pid");
            continue;
        }

        match signals.probe(pid) {
            Liveness::Gone => {
                tracing::debug!(pid, "candidate already gone");
                skipped.insert(pid, SkipReason::Gone);
                continue;
            }
            Liveness::Denied if !config.force => {
                tracing::debug!(pid, "candidate not probeable, skipping without --force");
                skipped.insert(pid, SkipReason::PermissionDenied);
                continue;
            }
            Liveness::Denied | Liveness::Alive => {}
        }

        if !config.force
            && is_critical(
                &record.name,
                pid,
                self_pid,
                parent_pid,
                &config.extra_protected,
            )
        {
            tracing::warn!(pid, name = %record.name, "critical process protected");
            skipped.insert(pid, SkipReason::CriticalSkipped);
            continue;
        }

        validated.push(record.clone());
    }

    (validated, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::fake::FakeSignals;

    const SELF: u32 = 10;
    const PARENT: u32 = 11;

    fn record(pid: u32, name: &str) -> ProcessRecord {
        ProcessRecord {
            pid,
            name: name.to_string(),
            owner: Some("alice".to_string()),
            start_time: 1_700_000_000,
            command_line: name.to_string(),
        }
    }

    fn validate_with(
        candidates: &[ProcessRecord],
        config: &KillConfig,
        fake: &FakeSignals,
    ) -> (Vec<ProcessRecord>, BTreeMap<u32, SkipReason>) {
        validate(candidates, config, fake, SELF, PARENT)
    }

    #[test]
    fn test_self_and_parent_never_validated() {
        let fake = FakeSignals::new();
        fake.spawn(SELF);
        fake.spawn(PARENT);
        fake.spawn(100);
        let candidates = vec![record(SELF, "reaper"), record(PARENT, "bash"), record(100, "worker")];
        let (validated, skipped) = validate_with(&candidates, &KillConfig::default(), &fake);
        let pids: Vec<u32> = validated.iter().map(|r| r.pid).collect();
        assert_eq!(pids, vec![100]);
        // Self/parent drops carry no skip entry.
        assert!(skipped.is_empty());
    }

    #[test]
    fn test_gone_process_tagged() {
        let fake = FakeSignals::new();
        // 100 never spawned — probe says gone.
        let candidates = vec![record(100, "worker")];
        let (validated, skipped) = validate_with(&candidates, &KillConfig::default(), &fake);
        assert!(validated.is_empty());
        assert_eq!(skipped.get(&100), Some(&SkipReason::Gone));
    }

    #[test]
    fn test_permission_denied_dropped_without_force() {
        let fake = FakeSignals::new();
        fake.spawn_denied(100);
        let candidates = vec![record(100, "worker")];
        let (validated, skipped) = validate_with(&candidates, &KillConfig::default(), &fake);
        assert!(validated.is_empty());
        assert_eq!(skipped.get(&100), Some(&SkipReason::PermissionDenied));
    }

    #[test]
    fn test_permission_denied_kept_with_force() {
        let fake = FakeSignals::new();
        fake.spawn_denied(100);
        let candidates = vec![record(100, "worker")];
        let config = KillConfig {
            force: true,
            ..KillConfig::default()
        };
        let (validated, skipped) = validate_with(&candidates, &config, &fake);
        assert_eq!(validated.len(), 1);
        assert!(skipped.is_empty());
    }

    #[test]
    fn test_critical_process_skipped_without_force() {
        let fake = FakeSignals::new();
        fake.spawn(100);
        let candidates = vec![record(100, "systemd")];
        let (validated, skipped) = validate_with(&candidates, &KillConfig::default(), &fake);
        assert!(validated.is_empty());
        assert_eq!(skipped.get(&100), Some(&SkipReason::CriticalSkipped));
    }

    #[test]
    fn test_critical_process_kept_with_force() {
        let fake = FakeSignals::new();
        fake.spawn(100);
        let candidates = vec![record(100, "sshd")];
        let config = KillConfig {
            force: true,
            ..KillConfig::default()
        };
        let (validated, _) = validate_with(&candidates, &config, &fake);
        assert_eq!(validated.len(), 1);
    }

    #[test]
    fn test_unrelated_shell_is_killable() {
        // A bash that is neither self nor parent is not protected by name.
        let fake = FakeSignals::new();
        fake.spawn(100);
        let candidates = vec![record(100, "bash")];
        let (validated, skipped) = validate_with(&candidates, &KillConfig::default(), &fake);
        assert_eq!(validated.len(), 1);
        assert!(skipped.is_empty());
    }

    #[test]
    fn test_is_critical_shell_exemption_boundaries() {
        // Shell with self/parent pid stays critical; any other pid does not.
        assert!(is_critical("bash", SELF, SELF, PARENT, &[]));
        assert!(is_critical("bash", PARENT, SELF, PARENT, &[]));
        assert!(!is_critical("bash", 999, SELF, PARENT, &[]));
        // Non-shell protected names are critical at any pid.
        assert!(is_critical("systemd", 999, SELF, PARENT, &[]));
        assert!(!is_critical("worker", 999, SELF, PARENT, &[]));
    }

    #[test]
    fn test_extra_protected_names_from_config() {
        let fake = FakeSignals::new();
        fake.spawn(100);
        let candidates = vec![record(100, "postgres")];
        let config = KillConfig {
            extra_protected: vec!["postgres".to_string()],
            ..KillConfig::default()
        };
        let (validated, skipped) = validate_with(&candidates, &config, &fake);
        assert!(validated.is_empty());
        assert_eq!(skipped.get(&100), Some(&SkipReason::CriticalSkipped));
    }

    #[test]
    fn test_accounting_covers_every_candidate() {
        let fake = FakeSignals::new();
        fake.spawn(100);
        fake.spawn_denied(200);
        fake.spawn(300);
        // 400 gone
        let candidates = vec![
            record(100, "worker"),
            record(200, "worker"),
            record(300, "systemd"),
            record(400, "worker"),
            record(SELF, "reaper"),
        ];
        let (validated, skipped) = validate_with(&candidates, &KillConfig::default(), &fake);
        let validated_pids: Vec<u32> = validated.iter().map(|r| r.pid).collect();
        assert_eq!(validated_pids, vec![100]);
        assert_eq!(skipped.len(), 3);
        assert_eq!(skipped.get(&200), Some(&SkipReason::PermissionDenied));
        assert_eq!(skipped.get(&300), Some(&SkipReason::CriticalSkipped));
        assert_eq!(skipped.get(&400), Some(&SkipReason::Gone));
        // candidates minus self/parent == validated + skipped
        assert_eq!(validated.len() + skipped.len(), candidates.len() - 1);
    }
}
