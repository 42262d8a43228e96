//! SPDX-License-Identifier: MIT OR AGPL-3.0-or-later
//! Component A: open a named pipe read-only without blocking on a writer.

use std::fs::File;
use std::os::fd::FromRawFd;
use std::path::Path;

use nix::fcntl::{fcntl, open, FcntlArg, OFlag};
use nix::sys::stat::Mode;

use crate::error::IoWiringError;

/// Opens `path` read-only without waiting for a writer to appear, then
/// clears `O_NONBLOCK` on the resulting descriptor so later reads block
/// normally. A plain blocking `open(O_RDONLY)` on a FIFO suspends until a
/// writer shows up, which would deadlock the launcher: it must hold
/// reader fds on every FIFO before handshaking with the shim.
pub fn open_nonblocking(path: &Path) -> Result<File, IoWiringError> {
    let to_err = |source: nix::Error| IoWiringError::Open {
        path: path.to_path_buf(),
        source: std::io::Error::from_raw_os_error(source as i32),
    };

    let fd = open(path, OFlag::O_RDONLY | OFlag::O_NONBLOCK, Mode::empty()).map_err(to_err)?;

    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(to_err)?;
    let mut flags = OFlag::from_bits_truncate(flags);
    flags.remove(OFlag::O_NONBLOCK);
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(to_err)?;

    // SAFETY: `fd` was just returned by `open` above and is owned by us.
    Ok(unsafe { File::from_raw_fd(fd) })
}
