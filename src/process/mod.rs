//! SPDX-License-Identifier: MIT OR AGPL-3.0-or-later
//! The per-process control surface: components A–E of the spec plus the
//! handle/state machine that ties them together.

pub mod directory;
pub mod exit;
pub mod fifo;
pub mod handle;
pub mod io_proxy;
pub mod signaller;

pub use directory::ProcessDirectory;
pub use exit::{ExitResolver, ProcessStatus};
pub use handle::{ProcessHandle, ProcessState};
pub use io_proxy::{ClientIo, OutboundGate};
pub use signaller::{SignalKind, Signaller};
