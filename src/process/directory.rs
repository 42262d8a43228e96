//! SPDX-License-Identifier: MIT OR AGPL-3.0-or-later
//! Component B: the per-process directory layout — one FIFO per stream
//! plus the `exitcode`/`pidfile` status files.

use std::path::{Path, PathBuf};

use nix::sys::stat::Mode;
use nix::unistd::{chown, mkfifo, Gid, Uid};

use crate::error::AllocationError;

/// Mode bits every FIFO in the layout is created with.
pub const FIFO_MODE: Mode = Mode::from_bits_truncate(0o600);

/// Owns the paths of one `exec`'d process's on-disk control surface.
/// Valid whether the directory was just created by the `Launcher` or is
/// being reconstructed by the `Attacher` for an already-running process.
#[derive(Debug, Clone)]
pub struct ProcessDirectory {
    pub id: String,
    pub root: PathBuf,
    pub stdin: PathBuf,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
    pub winsz: PathBuf,
    pub exit: PathBuf,
    pub exitcode: PathBuf,
    pub pidfile: PathBuf,
}

impl ProcessDirectory {
    pub fn new(id: impl Into<String>, root: PathBuf) -> Self {
        Self {
            stdin: root.join("stdin"),
            stdout: root.join("stdout"),
            stderr: root.join("stderr"),
            winsz: root.join("winsz"),
            exit: root.join("exit"),
            exitcode: root.join("exitcode"),
            pidfile: root.join("pidfile"),
            id: id.into(),
            root,
        }
    }

    /// Creates `stdin,stdout,stderr,winsz,exit` as FIFOs, chowned to the
    /// host uid/gid the payload will run as. `exit` must exist before the
    /// shim is spawned so it can open its writing end without racing.
    pub fn mkfifos(&self, host_uid: u32, host_gid: u32) -> Result<(), AllocationError> {
        let uid = Uid::from_raw(host_uid);
        let gid = Gid::from_raw(host_gid);

        for path in [&self.stdin, &self.stdout, &self.stderr, &self.winsz, &self.exit] {
            mkfifo(path.as_path(), FIFO_MODE).map_err(|source| AllocationError::Mkfifo {
                path: path.clone(),
                source,
            })?;
            chown(path.as_path(), Some(uid), Some(gid)).map_err(|source| AllocationError::Chown {
                path: path.clone(),
                source,
            })?;
        }

        Ok(())
    }
}

/// Returns an error if `root` already exists, matching the invariant that
/// a `processID` maps to at most one live directory.
pub fn ensure_absent(root: &Path, process_id: &str) -> Result<(), AllocationError> {
    if root.exists() {
        return Err(AllocationError::AlreadyInUse(process_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::{FileTypeExt, PermissionsExt};

    #[test]
    fn mkfifos_creates_all_five_pipes_with_expected_mode() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ProcessDirectory::new("abc", dir.path().to_path_buf());
        layout.mkfifos(0, 0).unwrap();

        for path in [&layout.stdin, &layout.stdout, &layout.stderr, &layout.winsz, &layout.exit] {
            let meta = std::fs::metadata(path).unwrap();
            assert!(meta.file_type().is_fifo());
            assert_eq!(meta.permissions().mode() & 0o777, 0o600);
        }
    }

    #[test]
    fn ensure_absent_rejects_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("abc");
        std::fs::create_dir(&existing).unwrap();

        let err = ensure_absent(&existing, "abc").unwrap_err();
        assert!(matches!(err, AllocationError::AlreadyInUse(id) if id == "abc"));
    }

    #[test]
    fn ensure_absent_allows_fresh_path() {
        let dir = tempfile::tempdir().unwrap();
        let fresh = dir.path().join("abc");
        assert!(ensure_absent(&fresh, "abc").is_ok());
    }
}
