//! SPDX-License-Identifier: MIT OR AGPL-3.0-or-later
//! Component G: reconstruct a process handle from an existing
//! per-process directory and wire up I/O, without performing any
//! handshake (the shim is already past that point).

use std::path::PathBuf;
use std::sync::Arc;

use crate::capabilities::PidGetter;
use crate::error::RunshimError;
use crate::process::{ClientIo, ExitResolver, OutboundGate, ProcessDirectory, ProcessHandle, ProcessState, Signaller};

pub struct AttachRequest {
    pub process_id: String,
    pub processes_path: PathBuf,
    pub client_io: ClientIo,
}

pub struct Attacher {
    pid_getter: Arc<dyn PidGetter>,
}

impl Attacher {
    pub fn new(pid_getter: Arc<dyn PidGetter>) -> Self {
        Self { pid_getter }
    }

    pub async fn attach(&self, req: AttachRequest) -> Result<ProcessHandle, RunshimError> {
        let process_path = req.processes_path.join(&req.process_id);
        let directory = ProcessDirectory::new(req.process_id.clone(), process_path.clone());

        let stdin = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&directory.stdin)
            .map_err(|source| crate::error::IoWiringError::Open {
                path: directory.stdin.clone(),
                source,
            })?;
        let stdout = crate::process::fifo::open_nonblocking(&directory.stdout)?;
        let stderr = crate::process::fifo::open_nonblocking(&directory.stderr)?;

        let gate = OutboundGate::new();
        crate::process::io_proxy::stream_data(
            &gate,
            req.client_io,
            tokio::fs::File::from_std(stdin),
            tokio::fs::File::from_std(stdout),
            tokio::fs::File::from_std(stderr),
        );

        let exit = ExitResolver::spawn(directory.exit.clone(), directory.exitcode.clone(), gate);
        let signaller = Signaller::new(directory.pidfile.clone(), self.pid_getter.clone());
        let winsz_path = directory.winsz.clone();

        Ok(ProcessHandle::new(
            req.process_id,
            process_path,
            exit,
            signaller,
            winsz_path,
            ProcessState::Running,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::FilePidGetter;
    use nix::sys::stat::Mode;
    use nix::unistd::mkfifo;

    #[tokio::test]
    async fn attach_wires_existing_fifos_without_spawning_a_shim() {
        let root = tempfile::tempdir().unwrap();
        let process_dir = root.path().join("abc");
        std::fs::create_dir_all(&process_dir).unwrap();

        for name in ["stdin", "stdout", "stderr", "winsz", "exit"] {
            mkfifo(&process_dir.join(name), Mode::from_bits_truncate(0o600)).unwrap();
        }
        std::fs::write(process_dir.join("exitcode"), "0").unwrap();

        let attacher = Attacher::new(Arc::new(FilePidGetter));
        let handle = attacher
            .attach(AttachRequest {
                process_id: "abc".to_string(),
                processes_path: root.path().to_path_buf(),
                client_io: ClientIo::none(),
            })
            .await
            .unwrap();

        let mut writer = std::fs::OpenOptions::new()
            .write(true)
            .open(process_dir.join("exit"))
            .unwrap();
        use std::io::Write;
        writer.write_all(&[0]).unwrap();
        drop(writer);

        let (code, err) = handle.wait().await;
        assert_eq!(code, 0);
        assert!(err.is_none());
        assert!(!process_dir.exists());
    }
}
