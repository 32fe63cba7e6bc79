/// Signal delivery and liveness probing.
///
/// The orchestrator and validator talk to the OS through the `Signals`
/// trait so the escalation logic can run against a fake in tests.
/// The real implementation is a thin wrapper over `nix::sys::signal::kill`;
/// a null signal (`kill(pid, None)`) is the liveness probe.
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

/// Escalation step: `None` is the liveness-only check (no signal sent),
/// used to drop PIDs that exited between validation and orchestration.
pub type Step = Option<Signal>;

/// Signal sequence for the run. The STOP/CONT pair in the nuclear
/// sequence pauses then resumes a process so pending signal handlers can
/// reinitialize before later signals arrive.
pub fn sequence(nuclear: bool) -> Vec<Step> {
    if nuclear {
        vec![
            None,
            Some(Signal::SIGSTOP),
            Some(Signal::SIGCONT),
            Some(Signal::SIGHUP),
            Some(Signal::SIGINT),
            Some(Signal::SIGTERM),
            Some(Signal::SIGQUIT),
            Some(Signal::SIGABRT),
            Some(Signal::SIGKILL),
        ]
    } else {
        vec![None, Some(Signal::SIGTERM), Some(Signal::SIGKILL)]
    }
}

/// Result of a liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Gone,
    /// The process exists but we may not signal it (EPERM).
    Denied,
}

/// A signal delivery failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The process disappeared before delivery (ESRCH) — benign.
    Vanished,
    /// We are not allowed to signal this process (EPERM).
    Denied,
    /// Any other OS error.
    Os(Errno),
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::Vanished => write!(f, "process vanished before delivery"),
            DeliveryError::Denied => write!(f, "permission denied"),
            DeliveryError::Os(errno) => write!(f, "signal delivery failed: {errno}"),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Access to signal delivery and liveness probing for a PID.
pub trait Signals {
    /// Deliver `sig` to `pid`.
    fn send(&self, pid: u32, sig: Signal) -> Result<(), DeliveryError>;

    /// Fresh liveness check — never cached by implementations.
    fn probe(&self, pid: u32) -> Liveness;
}

/// Real POSIX delivery via `nix`.
pub struct NixSignals;

impl Signals for NixSignals {
    fn send(&self, pid: u32, sig: Signal) -> Result<(), DeliveryError> {
        match kill(Pid::from_raw(pid as i32), sig) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => Err(DeliveryError::Vanished),
            Err(Errno::EPERM) => Err(DeliveryError::Denied),
            Err(errno) => Err(DeliveryError::Os(errno)),
        }
    }

    fn probe(&self, pid: u32) -> Liveness {
        match kill(Pid::from_raw(pid as i32), None) {
            Ok(()) => Liveness::Alive,
            Err(Errno::EPERM) => Liveness::Denied,
            Err(_) => Liveness::Gone,
        }
    }
}
