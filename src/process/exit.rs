//! SPDX-License-Identifier: MIT OR AGPL-3.0-or-later
//! Component E: await exit-FIFO EOF, wait for outbound drain, parse the
//! `exitcode` file, and deliver a single status to any number of
//! waiters.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;

use crate::error::ExitError;
use crate::process::fifo;
use crate::process::io_proxy::OutboundGate;

#[derive(Debug, Clone)]
pub struct ProcessStatus {
    pub code: i32,
    pub error: Option<String>,
}

/// Resolves the payload's exit status exactly once in the background and
/// broadcasts it to every `recv()` caller thereafter (a `watch` channel
/// is a natural fit: single producer, many idempotent readers of the
/// latest — and only — value).
pub struct ExitResolver {
    rx: watch::Receiver<Option<ProcessStatus>>,
}

impl ExitResolver {
    /// Spawns the background resolution task and returns a handle to its
    /// eventual, idempotently-readable result.
    pub fn spawn(exit_path: PathBuf, exitcode_path: PathBuf, gate: Arc<OutboundGate>) -> Self {
        let (tx, rx) = watch::channel(None);
        tokio::spawn(async move {
            let status = resolve(exit_path, exitcode_path, gate).await;
            let _ = tx.send(Some(status));
        });
        Self { rx }
    }

    pub async fn recv(&self) -> ProcessStatus {
        let mut rx = self.rx.clone();
        loop {
            if let Some(status) = rx.borrow().clone() {
                return status;
            }
            if rx.changed().await.is_err() {
                return ProcessStatus {
                    code: 1,
                    error: Some("exit resolver terminated without a result".to_string()),
                };
            }
        }
    }
}

async fn resolve(exit_path: PathBuf, exitcode_path: PathBuf, gate: Arc<OutboundGate>) -> ProcessStatus {
    let open_result = {
        let exit_path = exit_path.clone();
        tokio::task::spawn_blocking(move || fifo::open_nonblocking(&exit_path)).await
    };

    let mut exit_fifo = match open_result {
        Ok(Ok(file)) => File::from_std(file),
        Ok(Err(source)) => {
            return ProcessStatus {
                code: 1,
                error: Some(ExitError::OpenExitFifo(std::io::Error::other(source)).to_string()),
            }
        }
        Err(join_err) => {
            return ProcessStatus {
                code: 1,
                error: Some(ExitError::OpenExitFifo(std::io::Error::other(join_err)).to_string()),
            }
        }
    };

    // Blocks (off the reactor thread via the File's internal blocking
    // pool) until the shim closes its writing end — the payload exited.
    let mut one_byte = [0u8; 1];
    let _ = exit_fifo.read(&mut one_byte).await;
    drop(exit_fifo);

    gate.wait().await;

    if !exitcode_path.exists() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "exitcode file missing");
        return ProcessStatus {
            code: 1,
            error: Some(ExitError::MissingExitcode(source).to_string()),
        };
    }

    let contents = match tokio::fs::read_to_string(&exitcode_path).await {
        Ok(contents) => contents,
        Err(source) => {
            return ProcessStatus {
                code: 1,
                error: Some(ExitError::MissingExitcode(source).to_string()),
            }
        }
    };

    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return ProcessStatus {
            code: 1,
            error: Some(ExitError::EmptyExitcode.to_string()),
        };
    }

    match trimmed.parse::<i32>() {
        Ok(code) => ProcessStatus { code, error: None },
        Err(source) => ProcessStatus {
            code: 1,
            error: Some(ExitError::UnparseableExitcode(source).to_string()),
        },
    }
}
