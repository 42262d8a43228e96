//! SPDX-License-Identifier: MIT OR AGPL-3.0-or-later
//! `vordr-runshim` — the container process execution core.
//!
//! Given a prepared OCI-style bundle and an already-running container,
//! this crate launches an additional process inside it, proxies its
//! standard streams and terminal control to a remote client, delivers
//! signals, and surfaces its exit status — surviving the calling
//! supervisor restarting via [`attacher::Attacher`].
//!
//! The three-process pipeline (supervisor → shim → runtime binary →
//! payload) and its fd3/fd4/fd5 handshake are implemented by
//! [`launcher::Launcher`]; [`process`] owns the on-disk per-process
//! control surface that makes reattachment possible.

pub mod attacher;
pub mod bundle;
pub mod capabilities;
pub mod error;
pub mod launcher;
pub mod log_forwarder;
pub mod process;
pub mod winsz;

pub use attacher::{AttachRequest, Attacher};
pub use bundle::{materialize as materialize_bundle, BundleSpec};
pub use error::RunshimError;
pub use launcher::{Launcher, RunRequest};
pub use process::{ClientIo, ProcessHandle, ProcessState, SignalKind};
pub use winsz::WindowSize;
