//! External credential backend invocation.
//!
//! The backend is a privileged script invoked as `<tool> <action>
//! <identity>` in a fixed working directory. Every invocation is classified
//! three ways: `Success`, `Failure`, or `Indeterminate`. The third outcome
//! exists because a timed-out or killed process has an unknown remote
//! effect; treating it as failure could leave an orphaned, unrevoked
//! credential in the backend with no catalog record claiming it.
//!
//! This module never touches the catalog.

use crate::constants;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use zeroize::Zeroizing;

/// What the orchestrator asks the backend to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Revoke,
    Status,
}

impl Action {
    pub fn token(self) -> &'static str {
        match self {
            Action::Create => constants::ACTION_CREATE,
            Action::Revoke => constants::ACTION_REVOKE,
            Action::Status => constants::ACTION_STATUS,
        }
    }
}

/// Classified result of one backend invocation.
pub enum Outcome {
    /// Exit status 0. Payload is the credential material (create) or
    /// confirmation output (revoke); may be empty.
    Success(Zeroizing<Vec<u8>>),
    /// Designated failure: non-zero exit with a parseable status, or the
    /// tool could not be started at all.
    Failure(String),
    /// Timeout or death by signal. The backend's actual state is unknown.
    Indeterminate,
}

// Material never reaches debug output; only its size does.
impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success(payload) => write!(f, "Success({} bytes)", payload.len()),
            Outcome::Failure(diag) => write!(f, "Failure({:?})", diag),
            Outcome::Indeterminate => write!(f, "Indeterminate"),
        }
    }
}

/// Result of the reconciliation existence probe (`status` action).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Exists,
    Absent,
    Unknown,
}

/// Seam between the orchestrator and the external tool. Implemented by
/// `ScriptBackend` in production and by fakes in orchestrator tests.
pub trait Backend {
    /// Create the credential material for `identity`.
    fn provision(&self, identity: &str) -> Outcome;
    /// Revoke the credential behind `identity`.
    fn revoke(&self, identity: &str) -> Outcome;
    /// Ask whether `identity` currently exists in the backend.
    fn probe(&self, identity: &str) -> Probe;
}

/// Production backend: runs the configured script with a bounded wait.
#[derive(Debug, Clone)]
pub struct ScriptBackend {
    tool: PathBuf,
    workdir: PathBuf,
    material_dir: PathBuf,
    timeout: Duration,
}

/// Raw process result before outcome classification.
enum RunResult {
    Exited { code: i32, stdout: Vec<u8>, stderr: Vec<u8> },
    Signaled,
    TimedOut,
    SpawnFailed(std::io::Error),
}

impl ScriptBackend {
    pub fn new(
        tool: PathBuf,
        workdir: PathBuf,
        material_dir: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            tool,
            workdir,
            material_dir,
            timeout,
        }
    }

    fn run(&self, action: Action, identity: &str) -> RunResult {
        let mut cmd = Command::new(&self.tool);
        cmd.arg(action.token())
            .arg(identity)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => return RunResult::SpawnFailed(err),
        };

        // Collect output on a helper thread so the bounded wait below never
        // blocks on a full pipe. On timeout the receiver is dropped and the
        // detached child may keep running; only the local wait is cancelled.
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(child.wait_with_output());
        });

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(output)) => match output.status.code() {
                Some(code) => RunResult::Exited {
                    code,
                    stdout: output.stdout,
                    stderr: output.stderr,
                },
                None => RunResult::Signaled,
            },
            // Local wait failed without a parseable status
            Ok(Err(_)) => RunResult::Signaled,
            Err(mpsc::RecvTimeoutError::Timeout) => RunResult::TimedOut,
            Err(mpsc::RecvTimeoutError::Disconnected) => RunResult::Signaled,
        }
    }

    fn classify(&self, action: Action, identity: &str, result: RunResult) -> Outcome {
        match result {
            RunResult::Exited { code: 0, stdout, .. } => {
                let payload = if action == Action::Create && stdout.is_empty() {
                    match self.read_material_file(identity) {
                        Ok(material) => material,
                        Err(err) => {
                            return Outcome::Failure(format!(
                                "backend exited 0 but produced no material: {}",
                                err
                            ))
                        }
                    }
                } else {
                    Zeroizing::new(stdout)
                };
                Outcome::Success(payload)
            }
            RunResult::Exited { code, stdout, stderr } => {
                Outcome::Failure(diagnostic(code, &stdout, &stderr))
            }
            RunResult::Signaled | RunResult::TimedOut => Outcome::Indeterminate,
            RunResult::SpawnFailed(err) => {
                Outcome::Failure(format!("cannot run {}: {}", self.tool.display(), err))
            }
        }
    }

    /// Locate and read the material file the backend derives from the
    /// identity (`<material_dir>/<identity>.*`), polled once after exit.
    fn read_material_file(&self, identity: &str) -> Result<Zeroizing<Vec<u8>>> {
        let path = find_material_file(&self.material_dir, identity)?
            .with_context(|| {
                format!(
                    "no material file for '{}' under {}",
                    identity,
                    self.material_dir.display()
                )
            })?;
        let data = fs::read(&path)
            .with_context(|| format!("read material file {}", path.display()))?;
        Ok(Zeroizing::new(data))
    }
}

impl Backend for ScriptBackend {
    fn provision(&self, identity: &str) -> Outcome {
        let result = self.run(Action::Create, identity);
        self.classify(Action::Create, identity, result)
    }

    fn revoke(&self, identity: &str) -> Outcome {
        let result = self.run(Action::Revoke, identity);
        self.classify(Action::Revoke, identity, result)
    }

    fn probe(&self, identity: &str) -> Probe {
        // Contract: exit 0 = exists, exit 1 = absent, anything else (other
        // codes, timeout, signal, unrunnable tool) leaves the question open.
        match self.run(Action::Status, identity) {
            RunResult::Exited { code: 0, .. } => Probe::Exists,
            RunResult::Exited { code: 1, .. } => Probe::Absent,
            _ => Probe::Unknown,
        }
    }
}

/// First file matching `<material_dir>/<identity>.*`.
pub fn find_material_file(material_dir: &Path, identity: &str) -> Result<Option<PathBuf>> {
    let pattern = format!(
        "{}/{}.*",
        material_dir.display(),
        glob::Pattern::escape(identity)
    );
    let mut matches: Vec<PathBuf> = glob::glob(&pattern)
        .with_context(|| format!("bad material glob {}", pattern))?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    matches.sort();
    Ok(matches.into_iter().next())
}

fn diagnostic(code: i32, stdout: &[u8], stderr: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stdout = String::from_utf8_lossy(stdout);
    let detail = if !stderr.trim().is_empty() {
        stderr.trim().to_string()
    } else {
        stdout.trim().to_string()
    };
    if detail.is_empty() {
        format!("exit status {}", code)
    } else {
        format!("exit status {}: {}", code, detail)
    }
}
