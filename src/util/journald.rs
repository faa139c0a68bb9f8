//! Optional journald forwarding via systemd-cat.
//!
//! Best-effort: a missing systemd-cat or a failed spawn must never break a
//! provisioning operation.

use std::io::Write;
use std::process::{Command, Stdio};

/// Syslog priority levels accepted by `systemd-cat -p`.
#[derive(Debug, Clone, Copy)]
pub enum Priority {
    Info,
    Warning,
    Err,
}

impl Priority {
    fn as_str(self) -> &'static str {
        match self {
            Priority::Info => "info",
            Priority::Warning => "warning",
            Priority::Err => "err",
        }
    }
}

pub fn systemd_cat_available() -> bool {
    Command::new("systemd-cat")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Forward a single log line to journald using `systemd-cat`.
pub fn forward_line(tag: &str, priority: Priority, line: &str) {
    if !systemd_cat_available() {
        return;
    }

    let mut child = match Command::new("systemd-cat")
        .arg("-t")
        .arg(tag)
        .arg("-p")
        .arg(priority.as_str())
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(c) => c,
        Err(_) => return,
    };

    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(line.as_bytes());
        let _ = stdin.write_all(b"\n");
    }

    let _ = child.wait();
}
