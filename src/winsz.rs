//! SPDX-License-Identifier: MIT OR AGPL-3.0-or-later
//! Bounded, drop-on-full window-size channel and its JSON wire record.
//!
//! `SetTTY` must never block the caller on a slow or absent reader on the
//! other end of the `winsz` FIFO, so resize requests are funneled through
//! a small buffered channel; a background task drains it and performs the
//! actual non-blocking FIFO write.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Matches the original implementation's buffered `winszCh`.
pub const WINSZ_CHANNEL_CAPACITY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub columns: u16,
    pub rows: u16,
}

#[derive(Clone)]
pub struct WinszSender(mpsc::Sender<WindowSize>);

pub struct WinszReceiver(mpsc::Receiver<WindowSize>);

pub fn channel() -> (WinszSender, WinszReceiver) {
    let (tx, rx) = mpsc::channel(WINSZ_CHANNEL_CAPACITY);
    (WinszSender(tx), WinszReceiver(rx))
}

impl WinszSender {
    /// Never blocks the caller; silently drops the update if the channel
    /// is full, since only the latest size matters.
    pub fn publish(&self, size: WindowSize) {
        let _ = self.0.try_send(size);
    }
}

impl WinszReceiver {
    pub async fn recv(&mut self) -> Option<WindowSize> {
        self.0.recv().await
    }
}
