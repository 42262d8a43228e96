//! SPDX-License-Identifier: MIT OR AGPL-3.0-or-later
//! Component F: build the shim command, plumb the three extra fds,
//! hand off the prepared spec, and await both handshakes before
//! returning a `ProcessHandle`.

use std::fs::File;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::bundle::BundleSpec;
use crate::capabilities::{CommandRunner, Logger, PidGetter, UidGenerator};
use crate::error::{AllocationError, HandshakeError, IoWiringError, RunshimError, SpawnError};
use crate::log_forwarder::forward_logs;
use crate::process::{ClientIo, ExitResolver, OutboundGate, ProcessDirectory, ProcessHandle, ProcessState, Signaller};

/// Everything the caller supplies for one `Run` call. `process_id` of
/// `None` asks the launcher to generate one via `UidGenerator`.
pub struct RunRequest {
    pub process_id: Option<String>,
    pub bundle_path: PathBuf,
    pub processes_path: PathBuf,
    pub handle_name: String,
    pub host_uid: u32,
    pub host_gid: u32,
    /// The JSON-encoded `process` block of the OCI runtime config, fed to
    /// the shim on stdin.
    pub process_spec: serde_json::Value,
    pub tty: bool,
    pub client_io: ClientIo,
}

pub struct Launcher {
    shim_path: PathBuf,
    runtime_path: PathBuf,
    id_generator: Arc<dyn UidGenerator>,
    pid_getter: Arc<dyn PidGetter>,
    command_runner: Arc<dyn CommandRunner>,
    logger: Arc<dyn Logger>,
}

impl Launcher {
    pub fn new(
        shim_path: PathBuf,
        runtime_path: PathBuf,
        id_generator: Arc<dyn UidGenerator>,
        pid_getter: Arc<dyn PidGetter>,
        command_runner: Arc<dyn CommandRunner>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            shim_path,
            runtime_path,
            id_generator,
            pid_getter,
            command_runner,
            logger,
        }
    }

    pub async fn run(&self, req: RunRequest) -> Result<ProcessHandle, RunshimError> {
        let logger = self.logger.session("execrunner");
        logger.info("start");

        let process_id = req.process_id.unwrap_or_else(|| self.id_generator.generate());
        let process_path = req.processes_path.join(&process_id);

        crate::process::directory::ensure_absent(&process_path, &process_id)?;
        std::fs::create_dir_all(&process_path).map_err(|source| AllocationError::CreateDir {
            path: process_path.clone(),
            source,
        })?;

        let directory = ProcessDirectory::new(process_id.clone(), process_path.clone());
        directory.mkfifos(req.host_uid, req.host_gid)?;

        // fd3 = launch-status, fd4 = log, fd5 = sync, in that order.
        let (exit_status_r, exit_status_w) = make_pipe()?;
        let (log_r, log_w) = make_pipe()?;
        let (sync_r, sync_w) = make_pipe()?;

        let log_path = req
            .bundle_path
            .join(format!("dadoo.{process_id}.log"));
        let log_file = std::fs::File::create(&log_path).map_err(|source| SpawnError::LogFile {
            path: log_path.clone(),
            source,
        })?;

        let mut args: Vec<String> = Vec::new();
        if req.tty {
            args.push("-tty".to_string());
        }
        args.push("exec".to_string());
        args.push(self.runtime_path.display().to_string());
        args.push(process_path.display().to_string());
        args.push(req.handle_name.clone());

        let encoded_spec =
            serde_json::to_vec(&req.process_spec).expect("process spec is statically JSON-encodable");

        let extra_fds = [exit_status_w.as_raw_fd(), log_w.as_raw_fd(), sync_w.as_raw_fd()];
        let mut std_cmd = std::process::Command::new(&self.shim_path);
        std_cmd.args(&args);
        std_cmd.stdin(std::process::Stdio::piped());
        std_cmd.stdout(
            log_file
                .try_clone()
                .map_err(|source| SpawnError::LogFile {
                    path: log_path.clone(),
                    source,
                })?,
        );
        std_cmd.stderr(log_file);

        // SAFETY: runs after fork, before exec, in the child only; dup2
        // is async-signal-safe and the source fds are valid until exec.
        unsafe {
            std_cmd.pre_exec(move || dup_onto(&extra_fds));
        }

        let tokio_cmd: Command = std_cmd.into();
        let mut child = self
            .command_runner
            .start(tokio_cmd)
            .await
            .map_err(|source| SpawnError::Spawn {
                path: self.shim_path.clone(),
                source,
            })?;

        // Feed the encoded process spec on stdin, then close it so the
        // shim sees EOF.
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(&encoded_spec).await;
        }

        let command_runner = self.command_runner.clone();
        let wait_logger = logger.clone();
        tokio::spawn(async move {
            let _ = command_runner.wait(&mut child).await;
            match std::fs::read(&log_path) {
                Ok(bytes) if !bytes.is_empty() => {
                    forward_logs(&bytes, wait_logger.as_ref());
                }
                Ok(_) => {}
                Err(e) => wait_logger.error("reading-dadoo-log-file", &e),
            }
            let _ = std::fs::remove_file(&log_path);
        });

        // Relinquish our copies of the writer ends now that the shim
        // holds its own; their EOFs must propagate when the shim exits.
        drop(exit_status_w);
        drop(log_w);
        drop(sync_w);

        let (stdin_fifo, stdout_fifo, stderr_fifo) = open_process_fifos(&directory)?;

        // Block (off-thread) until the shim confirms it has opened its
        // own ends of all five FIFOs; opening ours any earlier could
        // deadlock against the shim's blocking opens.
        read_one_byte(sync_r)
            .await
            .map_err(HandshakeError::Sync)?;

        let gate = OutboundGate::new();
        crate::process::io_proxy::stream_data(&gate, req.client_io, stdin_fifo, stdout_fifo, stderr_fifo);

        let mut exit_status_r = tokio::fs::File::from_std(exit_status_r);
        let mut status_byte = [0u8; 1];
        let bytes_read = exit_status_r
            .read(&mut status_byte)
            .await
            .map_err(HandshakeError::LaunchStatusUnreadable)?;

        if bytes_read == 0 || status_byte[0] != 0 {
            let log_bytes = read_remaining(log_r).await;
            let last_msg = forward_logs(&log_bytes, logger.as_ref()).unwrap_or_default();
            return Err(HandshakeError::LaunchFailed {
                status: status_byte[0],
                message: last_msg,
            }
            .into());
        }

        // Successful launch: still forward whatever was logged.
        let log_bytes = read_remaining(log_r).await;
        forward_logs(&log_bytes, logger.as_ref());

        let exit = ExitResolver::spawn(directory.exit.clone(), directory.exitcode.clone(), gate);
        let signaller = Signaller::new(directory.pidfile.clone(), self.pid_getter.clone());
        let winsz_path = directory.winsz.clone();

        let process_handle = ProcessHandle::new(
            process_id,
            process_path,
            exit,
            signaller,
            winsz_path,
            ProcessState::Running,
        );

        logger.info("done");
        Ok(process_handle)
    }
}

fn dup_onto(fds: &[RawFd; 3]) -> std::io::Result<()> {
    for (i, fd) in fds.iter().enumerate() {
        let target = 3 + i as RawFd;
        if *fd != target {
            nix::unistd::dup2(*fd, target).map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
        }
    }
    Ok(())
}

fn make_pipe() -> Result<(File, File), AllocationError> {
    let (read_end, write_end) = nix::unistd::pipe().map_err(|source| AllocationError::Pipe(std::io::Error::from_raw_os_error(source as i32)))?;
    Ok((File::from(read_end), File::from(write_end)))
}

/// Opens stdin read-write (the launcher proxies both directions) and
/// stdout/stderr via the non-blocking opener, returning async handles.
fn open_process_fifos(
    directory: &ProcessDirectory,
) -> Result<(tokio::fs::File, tokio::fs::File, tokio::fs::File), IoWiringError> {
    let stdin = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(&directory.stdin)
        .map_err(|source| IoWiringError::Open {
            path: directory.stdin.clone(),
            source,
        })?;
    let stdout = crate::process::fifo::open_nonblocking(&directory.stdout)?;
    let stderr = crate::process::fifo::open_nonblocking(&directory.stderr)?;

    Ok((
        tokio::fs::File::from_std(stdin),
        tokio::fs::File::from_std(stdout),
        tokio::fs::File::from_std(stderr),
    ))
}

async fn read_one_byte(file: File) -> std::io::Result<()> {
    let mut file = tokio::fs::File::from_std(file);
    let mut buf = [0u8; 1];
    let n = file.read(&mut buf).await?;
    if n == 0 {
        return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "no sync byte"));
    }
    Ok(())
}

async fn read_remaining(file: File) -> Vec<u8> {
    let mut file = tokio::fs::File::from_std(file);
    let mut buf = Vec::new();
    let _ = file.read_to_end(&mut buf).await;
    buf
}
