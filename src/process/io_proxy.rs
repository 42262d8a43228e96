//! SPDX-License-Identifier: MIT OR AGPL-3.0-or-later
//! Component D: wire client-side reader/writers to the FIFOs, tracking
//! outbound copy completion so the Exit Resolver can wait for drain.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Notify;

/// A pending-output counter plus a condition: the Exit Resolver awaits
/// `wait()` returning, which happens once every registered outbound copy
/// has completed. Increment before spawning a copy task; decrement in
/// the copy task's terminal step. Never increment after the resolver has
/// started waiting.
#[derive(Default)]
pub struct OutboundGate {
    pending: AtomicUsize,
    notify: Notify,
}

impl OutboundGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    pub fn complete(&self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub async fn wait(&self) {
        loop {
            if self.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            let notified = self.notify.notified();
            if self.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// The client-side ends of the three proxied streams. `None` means the
/// caller supplied no stream for that direction.
pub struct ClientIo {
    pub stdin: Option<Box<dyn AsyncRead + Unpin + Send>>,
    pub stdout: Option<Box<dyn AsyncWrite + Unpin + Send>>,
    pub stderr: Option<Box<dyn AsyncWrite + Unpin + Send>>,
}

impl ClientIo {
    pub fn none() -> Self {
        Self {
            stdin: None,
            stdout: None,
            stderr: None,
        }
    }
}

/// Wires `client`'s streams to the process's `stdin`/`stdout`/`stderr`
/// FIFOs. If a client stream is absent, the corresponding fd is simply
/// dropped (closed), forwarding EOF to whichever side is listening.
pub fn stream_data(gate: &Arc<OutboundGate>, client: ClientIo, stdin: File, stdout: File, stderr: File) {
    stream_input(client.stdin, stdin);
    stream_output(gate.clone(), client.stdout, stdout);
    stream_output(gate.clone(), client.stderr, stderr);
}

fn stream_input(reader: Option<Box<dyn AsyncRead + Unpin + Send>>, fifo: File) {
    match reader {
        None => drop(fifo),
        Some(mut reader) => {
            tokio::spawn(async move {
                let mut fifo = fifo;
                let _ = tokio::io::copy(&mut reader, &mut fifo).await;
            });
        }
    }
}

fn stream_output(gate: Arc<OutboundGate>, writer: Option<Box<dyn AsyncWrite + Unpin + Send>>, fifo: File) {
    match writer {
        None => drop(fifo),
        Some(mut writer) => {
            gate.register();
            tokio::spawn(async move {
                let mut fifo = fifo;
                let _ = tokio::io::copy(&mut fifo, &mut writer).await;
                gate.complete();
            });
        }
    }
}
