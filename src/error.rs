//! SPDX-License-Identifier: MIT OR AGPL-3.0-or-later
//! Error types for the exec core.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while allocating a process's on-disk directory and pipes.
#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("process ID '{0}' already in use")]
    AlreadyInUse(String),
    #[error("failed to create process directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create pipe: {0}")]
    Pipe(#[source] std::io::Error),
    #[error("failed to create fifo {path}: {source}")]
    Mkfifo {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },
    #[error("failed to chown fifo {path}: {source}")]
    Chown {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },
}

/// Failure to start the shim process.
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("failed to spawn shim {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open shim log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures during the fd3/fd5 synchronous handshake with the shim.
#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("failed to read sync byte: {0}")]
    Sync(#[source] std::io::Error),
    #[error("failed to read launch-status byte: {0}")]
    LaunchStatusUnreadable(#[source] std::io::Error),
    #[error("runc exec: exit status {status}: {message}")]
    LaunchFailed { status: u8, message: String },
}

/// Failures opening or wiring the per-process FIFOs.
#[derive(Error, Debug)]
pub enum IoWiringError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures resolving the payload's exit status.
#[derive(Error, Debug)]
pub enum ExitError {
    #[error("could not find the exitcode file for the process: {0}")]
    MissingExitcode(#[source] std::io::Error),
    #[error("the exitcode file is empty")]
    EmptyExitcode,
    #[error("failed to parse exit code: {0}")]
    UnparseableExitcode(#[source] std::num::ParseIntError),
    #[error("failed to open exit fifo: {0}")]
    OpenExitFifo(#[source] std::io::Error),
}

/// Failures delivering a signal to the payload.
#[derive(Error, Debug)]
pub enum SignalError {
    #[error("fetching-pid: {0}")]
    FetchingPid(String),
    #[error("finding-process: {0}")]
    FindingProcess(#[source] nix::Error),
    #[error("sending signal: {0}")]
    Send(#[source] nix::Error),
}

/// Failure removing a process directory during `Wait` cleanup.
#[derive(Error, Debug)]
pub enum CleanupError {
    #[error("failed to remove process directory {path}: {source}")]
    RemoveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures materializing a bundle directory.
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("oci spec error: {0}")]
    OciSpec(String),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level error returned by `Launcher::run` and `Attacher::attach`.
/// One variant per component error kind those two entry points actually
/// produce; `BundleError` is returned directly by `bundle::materialize`,
/// which is a standalone step run before `Run` rather than part of it.
#[derive(Error, Debug)]
pub enum RunshimError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    #[error(transparent)]
    IoWiring(#[from] IoWiringError),
}
