//! SPDX-License-Identifier: MIT OR AGPL-3.0-or-later
//! Injected-capability traits consumed by the launcher/attacher, plus
//! default implementations suitable for production use and swappable in
//! tests.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::{Child, Command};

/// Reads a process's host PID from its pidfile.
pub trait PidGetter: Send + Sync {
    fn pid(&self, pidfile_path: &Path) -> std::io::Result<i32>;
}

/// Reads the decimal ASCII pid written by the runtime binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilePidGetter;

impl PidGetter for FilePidGetter {
    fn pid(&self, pidfile_path: &Path) -> std::io::Result<i32> {
        let contents = std::fs::read_to_string(pidfile_path)?;
        contents
            .trim()
            .parse::<i32>()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// Starts and reaps the shim process. Injected so tests can substitute a
/// fake runner without actually forking.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn start(&self, cmd: Command) -> std::io::Result<Child>;
    async fn wait(&self, child: &mut Child) -> std::io::Result<std::process::ExitStatus>;
}

/// Default `CommandRunner` backed by `tokio::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn start(&self, mut cmd: Command) -> std::io::Result<Child> {
        cmd.spawn()
    }

    async fn wait(&self, child: &mut Child) -> std::io::Result<std::process::ExitStatus> {
        child.wait().await
    }
}

/// Generates opaque unique process IDs when the caller doesn't supply one.
pub trait UidGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Default `UidGenerator` backed by the `uuid` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct Uuidv4Generator;

impl UidGenerator for Uuidv4Generator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Structured logger interface consumed from the supervisor. Mirrors the
/// `lager.Logger` surface the original implementation was built against:
/// `Info`, `Debug(tag, fields)`, `Error(tag, err)`, `Session(name)`.
pub trait Logger: Send + Sync {
    fn info(&self, msg: &str);
    fn debug(&self, tag: &str, fields: &[(&str, &str)]);
    fn error(&self, tag: &str, err: &(dyn std::error::Error + 'static));
    /// Returns a child logger scoped under `name`, the way a `lager`
    /// session nests tags for the lifetime of one call.
    fn session(&self, name: &str) -> Arc<dyn Logger>;
}

/// Default `Logger` backed by `tracing`.
#[derive(Clone, Default)]
pub struct TracingLogger {
    session: String,
}

impl TracingLogger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl fmt::Debug for TracingLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracingLogger")
            .field("session", &self.session)
            .finish()
    }
}

impl Logger for TracingLogger {
    fn info(&self, msg: &str) {
        tracing::info!(session = %self.session, "{}", msg);
    }

    fn debug(&self, tag: &str, fields: &[(&str, &str)]) {
        let joined = fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::debug!(session = %self.session, tag, "{}", joined);
    }

    fn error(&self, tag: &str, err: &(dyn std::error::Error + 'static)) {
        tracing::error!(session = %self.session, tag, error = %err);
    }

    fn session(&self, name: &str) -> Arc<dyn Logger> {
        let session = if self.session.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.session, name)
        };
        Arc::new(TracingLogger { session })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_pid_getter_parses_decimal_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pidfile");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, "4242").unwrap();

        assert_eq!(FilePidGetter.pid(&path).unwrap(), 4242);
    }

    #[test]
    fn file_pid_getter_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pidfile");
        std::fs::write(&path, "not-a-pid").unwrap();

        assert!(FilePidGetter.pid(&path).is_err());
    }

    #[test]
    fn uuidv4_generator_produces_distinct_ids() {
        let gen = Uuidv4Generator;
        assert_ne!(gen.generate(), gen.generate());
    }

    #[test]
    fn tracing_logger_session_nests() {
        let root = TracingLogger::new();
        let child = root.session("execrunner");
        let grandchild = child.session("launch");
        // Exercise the trait surface; nesting itself is opaque to callers.
        grandchild.info("hello");
    }
}
