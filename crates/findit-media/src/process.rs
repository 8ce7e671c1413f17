//! Bounded subprocess execution for external media tools
//!
//! Every external tool call goes through [`run_tool`]: stdin closed, output
//! captured, a hard wall-clock timeout, and `kill_on_drop` so that cancelling
//! the calling task terminates the child.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::{MediaError, Result};

/// Default per-invocation timeout for media tools
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(300);

/// Captured output of a finished tool invocation
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Check that a tool is reachable, either as an absolute path or on PATH
pub fn resolve_tool(tool: &str) -> Result<std::path::PathBuf> {
    if Path::new(tool).is_absolute() {
        let path = Path::new(tool);
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(MediaError::ToolNotFound(tool.to_string()));
    }
    which::which(tool).map_err(|_| MediaError::ToolNotFound(tool.to_string()))
}

/// Run an external tool to completion, enforcing `timeout`
///
/// A non-zero exit is an error carrying the stderr tail. Expect-failure
/// callers (probes) should map the error themselves.
pub async fn run_tool(tool: &str, args: &[String], timeout: Duration) -> Result<ToolOutput> {
    let program = resolve_tool(tool)?;
    debug!(tool, ?args, "spawning media tool");

    let child = Command::new(&program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(MediaError::ToolTimedOut {
                tool: tool.to_string(),
                seconds: timeout.as_secs(),
            });
        }
    };

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        return Err(MediaError::ToolFailed {
            tool: tool.to_string(),
            status: output.status.code().unwrap_or(-1),
            stderr: tail(&stderr, 2048),
        });
    }

    Ok(ToolOutput {
        stdout: output.stdout,
        stderr,
    })
}

/// Run a tool where a non-zero exit is still useful (ffmpeg writes analysis
/// output to stderr and can exit non-zero on `-f null` pipelines)
pub async fn run_tool_capture(tool: &str, args: &[String], timeout: Duration) -> Result<ToolOutput> {
    match run_tool(tool, args, timeout).await {
        Ok(out) => Ok(out),
        Err(MediaError::ToolFailed { stderr, .. }) => Ok(ToolOutput {
            stdout: Vec::new(),
            stderr,
        }),
        Err(e) => Err(e),
    }
}

fn tail(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let start = s.len() - max;
    // Respect char boundaries
    let start = (start..s.len()).find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    s[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_missing_tool() {
        let err = resolve_tool("definitely-not-a-real-tool-xyz").unwrap_err();
        assert!(matches!(err, MediaError::ToolNotFound(_)));
    }

    #[test]
    fn test_tail_short_string() {
        assert_eq!(tail("abc", 10), "abc");
    }

    #[test]
    fn test_tail_truncates() {
        let long = "x".repeat(5000);
        assert_eq!(tail(&long, 100).len(), 100);
    }

    #[tokio::test]
    async fn test_run_tool_missing_binary() {
        let err = run_tool("definitely-not-a-real-tool-xyz", &[], DEFAULT_TOOL_TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::ToolNotFound(_)));
    }
}
