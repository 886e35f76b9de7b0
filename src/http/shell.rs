//! Host command execution
//!
//! Commands run through `sh -c` with stderr redirected into stdout, so the
//! client sees both streams in the order they were written. Failures never
//! escape as errors: the exit code or spawn error is rendered into the text
//! returned to the client.

use std::process::{Output, Stdio};

use tokio::process::Command;

/// Run `command` and wait for it
///
/// Returns the trimmed combined output on success. On a non-zero exit the
/// text starts with `Command failed with exit code: N`.
pub async fn exec(command: &str) -> String {
    tracing::info!(command = %command, "Executing shell command");

    // One pipe for both streams
    let script = format!("exec 2>&1\n{}", command);
    let output = Command::new("sh")
        .arg("-c")
        .arg(script)
        .stderr(Stdio::null())
        .output()
        .await;
    render(output)
}

/// Run `command` in the background, discarding the result
pub fn spawn_background(command: String) {
    tokio::spawn(async move {
        let result = exec(&command).await;
        tracing::debug!(command = %command, result = %result, "Background command finished");
    });
}

/// Run a whitespace-separated program line without a shell and return its
/// trimmed stdout
pub async fn run_program(command_line: &str) -> String {
    let mut parts = command_line.split_whitespace();
    let Some(program) = parts.next() else {
        return String::new();
    };

    match Command::new(program).args(parts).output().await {
        Ok(output) => String::from_utf8_lossy(&output.stdout).trim().to_string(),
        Err(e) => {
            tracing::warn!(command = %command_line, error = %e, "Failed to run program");
            format!("IO error executing command: {}", e)
        }
    }
}

fn render(output: std::io::Result<Output>) -> String {
    let output = match output {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to spawn shell");
            return format!("IO error executing command: {}", e);
        }
    };

    let combined = String::from_utf8_lossy(&output.stdout);
    let combined = combined.trim();

    if output.status.success() {
        return combined.to_string();
    }

    // Killed by a signal has no exit code
    let code = output.status.code().unwrap_or(-1);
    tracing::debug!(exit_code = code, "Shell command failed");
    if combined.is_empty() {
        format!("Command failed with exit code: {}", code)
    } else {
        format!("Command failed with exit code: {}\n{}", code, combined)
    }
}
