//! SPDX-License-Identifier: MIT OR AGPL-3.0-or-later
//! Component C: deliver a signal to the payload by resolving its pid from
//! the pidfile and sending the OS signal directly.

use std::path::PathBuf;
use std::sync::Arc;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::capabilities::PidGetter;
use crate::error::SignalError;

/// The only two signal kinds the supervisor is allowed to ask for.
/// Mapping any future kind would require widening this enum (see
/// DESIGN.md's resolution of the corresponding open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Terminate,
    Kill,
}

impl SignalKind {
    fn os_signal(self) -> Signal {
        match self {
            SignalKind::Terminate => Signal::SIGTERM,
            SignalKind::Kill => Signal::SIGKILL,
        }
    }
}

/// Delivers signals to a payload process by re-reading its pid from the
/// pidfile on every call — the payload may not have existed yet when the
/// handle was constructed.
#[derive(Clone)]
pub struct Signaller {
    pidfile_path: PathBuf,
    pid_getter: Arc<dyn PidGetter>,
}

impl Signaller {
    pub fn new(pidfile_path: PathBuf, pid_getter: Arc<dyn PidGetter>) -> Self {
        Self {
            pidfile_path,
            pid_getter,
        }
    }

    /// Best-effort: a successful return means the signal was sent, not
    /// that the process observed it.
    pub fn signal(&self, kind: SignalKind) -> Result<(), SignalError> {
        let pid = self
            .pid_getter
            .pid(&self.pidfile_path)
            .map_err(|e| SignalError::FetchingPid(e.to_string()))?;

        match signal::kill(Pid::from_raw(pid), kind.os_signal()) {
            Ok(()) => Ok(()),
            Err(nix::Error::ESRCH) => Err(SignalError::FindingProcess(nix::Error::ESRCH)),
            Err(source) => Err(SignalError::Send(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    struct FixedPid(i32);
    impl PidGetter for FixedPid {
        fn pid(&self, _pidfile_path: &Path) -> std::io::Result<i32> {
            Ok(self.0)
        }
    }

    struct FailingPid;
    impl PidGetter for FailingPid {
        fn pid(&self, _pidfile_path: &Path) -> std::io::Result<i32> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no pidfile"))
        }
    }

    #[test]
    fn signal_terminate_maps_to_sigterm_on_current_process() {
        // Signal ourselves with SIGTERM's harmless cousin isn't possible
        // without a handler; instead assert kill() is reached and a
        // nonexistent pid surfaces FindingProcess, exercising the mapping
        // without touching a live process.
        let signaller = Signaller::new(PathBuf::from("/nonexistent"), Arc::new(FixedPid(i32::MAX - 1)));
        let err = signaller.signal(SignalKind::Terminate).unwrap_err();
        assert!(matches!(err, SignalError::FindingProcess(_)));
    }

    #[test]
    fn signal_kill_maps_to_sigkill_mapping_path() {
        let signaller = Signaller::new(PathBuf::from("/nonexistent"), Arc::new(FixedPid(i32::MAX - 1)));
        let err = signaller.signal(SignalKind::Kill).unwrap_err();
        assert!(matches!(err, SignalError::FindingProcess(_)));
    }

    #[test]
    fn signal_surfaces_pid_fetch_failure() {
        let signaller = Signaller::new(PathBuf::from("/nonexistent"), Arc::new(FailingPid));
        let err = signaller.signal(SignalKind::Terminate).unwrap_err();
        assert!(matches!(err, SignalError::FetchingPid(_)));
    }
}
