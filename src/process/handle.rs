//! SPDX-License-Identifier: MIT OR AGPL-3.0-or-later
//! The process handle and its state machine: `Preparing → Launching →
//! Running → Exited → Cleaned`.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::CleanupError;
use crate::process::exit::ExitResolver;
use crate::process::signaller::{SignalKind, Signaller};
use crate::winsz::{WindowSize, WinszReceiver, WinszSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Preparing,
    Launching,
    Running,
    Exited,
    Cleaned,
}

/// The caller-facing object representing one `exec`'d process. Not
/// `Clone`: it owns the background winsz-forwarder task's sender and is
/// the sole caller expected to invoke `wait()`, so cleanup runs exactly
/// once by construction rather than by caller discipline.
pub struct ProcessHandle {
    id: String,
    root: PathBuf,
    exit: ExitResolver,
    signaller: Signaller,
    winsz_tx: WinszSender,
    state: Arc<Mutex<ProcessState>>,
}

impl ProcessHandle {
    pub(crate) fn new(
        id: String,
        root: PathBuf,
        exit: ExitResolver,
        signaller: Signaller,
        winsz_path: PathBuf,
        initial_state: ProcessState,
    ) -> Self {
        let (winsz_tx, winsz_rx) = crate::winsz::channel();
        spawn_winsz_forwarder(winsz_path, winsz_rx);

        Self {
            id,
            root,
            exit,
            signaller,
            winsz_tx,
            state: Arc::new(Mutex::new(initial_state)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) async fn set_state(&self, state: ProcessState) {
        *self.state.lock().await = state;
    }

    pub async fn state(&self) -> ProcessState {
        *self.state.lock().await
    }

    /// Awaits the payload's exit status, then removes the process
    /// directory exactly once. A cleanup failure overrides a zero exit
    /// status into code 1, matching the error-handling design.
    pub async fn wait(&self) -> (i32, Option<String>) {
        let status = self.exit.recv().await;
        self.set_state(ProcessState::Exited).await;

        let cleanup = tokio::fs::remove_dir_all(&self.root).await;
        self.set_state(ProcessState::Cleaned).await;

        match cleanup {
            Ok(()) => (status.code, status.error),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => (status.code, status.error),
            Err(source) => (
                1,
                Some(
                    CleanupError::RemoveDir {
                        path: self.root.clone(),
                        source,
                    }
                    .to_string(),
                ),
            ),
        }
    }

    /// A no-op if `size` is `None`; otherwise enqueues the resize for the
    /// background forwarder to write to the `winsz` FIFO. Never blocks.
    pub fn set_tty(&self, size: Option<WindowSize>) {
        if let Some(size) = size {
            self.winsz_tx.publish(size);
        }
    }

    pub fn signal(&self, kind: SignalKind) -> Result<(), crate::error::SignalError> {
        self.signaller.signal(kind)
    }
}

fn spawn_winsz_forwarder(path: PathBuf, mut rx: WinszReceiver) {
    tokio::spawn(async move {
        while let Some(size) = rx.recv().await {
            let path = path.clone();
            let _ = tokio::task::spawn_blocking(move || write_winsz(&path, size)).await;
        }
    });
}

fn write_winsz(path: &std::path::Path, size: WindowSize) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)?;
    let bytes = serde_json::to_vec(&size).map_err(std::io::Error::other)?;
    file.write_all(&bytes)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::PidGetter;
    use crate::process::io_proxy::OutboundGate;
    use nix::sys::stat::Mode;
    use nix::unistd::mkfifo;
    use std::path::Path;

    struct FixedPid(i32);
    impl PidGetter for FixedPid {
        fn pid(&self, _pidfile_path: &Path) -> std::io::Result<i32> {
            Ok(self.0)
        }
    }

    fn make_handle(dir: &std::path::Path) -> ProcessHandle {
        let exit_path = dir.join("exit");
        mkfifo(&exit_path, Mode::from_bits_truncate(0o600)).unwrap();
        let winsz_path = dir.join("winsz");
        mkfifo(&winsz_path, Mode::from_bits_truncate(0o600)).unwrap();

        let exitcode_path = dir.join("exitcode");
        std::fs::write(&exitcode_path, "0").unwrap();

        let gate = OutboundGate::new();
        let exit = ExitResolver::spawn(exit_path.clone(), exitcode_path, gate);
        let signaller = Signaller::new(dir.join("pidfile"), Arc::new(FixedPid(1)));

        ProcessHandle::new(
            "abc".to_string(),
            dir.to_path_buf(),
            exit,
            signaller,
            winsz_path,
            ProcessState::Running,
        )
    }

    #[tokio::test]
    async fn wait_removes_process_directory_and_transitions_to_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let handle = make_handle(dir.path());

        let mut writer = std::fs::OpenOptions::new()
            .write(true)
            .open(dir.path().join("exit"))
            .unwrap();
        use std::io::Write;
        writer.write_all(&[0]).unwrap();
        drop(writer);

        let (code, err) = handle.wait().await;
        assert_eq!(code, 0);
        assert!(err.is_none());
        assert!(!dir.path().exists());
        assert_eq!(handle.state().await, ProcessState::Cleaned);
    }

    #[tokio::test]
    async fn set_tty_noop_with_no_size_does_not_touch_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let handle = make_handle(dir.path());
        handle.set_tty(None);

        // Nothing should ever attempt to open winsz for writing; confirm
        // no garbage got written by reading the FIFO non-blockingly.
        let reader = crate::process::fifo::open_nonblocking(&dir.path().join("winsz"));
        assert!(reader.is_ok());

        // drain the exit fifo so the background resolver task finishes
        let mut writer = std::fs::OpenOptions::new()
            .write(true)
            .open(dir.path().join("exit"))
            .unwrap();
        use std::io::Write;
        writer.write_all(&[0]).unwrap();
    }
}
