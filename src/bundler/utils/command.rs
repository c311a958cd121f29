//! Running external tools.

use crate::bundler::error::{Error, Result};
use std::ffi::OsStr;

/// Captured output of a successful tool run.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Raw standard output, for machine readable formats.
    pub stdout_bytes: Vec<u8>,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

/// Runs `program` with `args` and waits for it.
///
/// A non-zero exit becomes [`Error::CommandFailed`] carrying the exit code
/// and both output streams. Failing to spawn the program at all is reported
/// the same way with no exit code.
pub async fn run<I, S>(program: &str, args: I) -> Result<CommandOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    log::debug!(
        "Running {program} {}",
        args.iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );

    let output = tokio::process::Command::new(program)
        .args(&args)
        .stdin(std::process::Stdio::null())
        .output()
        .await
        .map_err(|e| Error::CommandFailed {
            command: program.to_string(),
            code: None,
            stdout: String::new(),
            stderr: format!("failed to execute {program}: {e}"),
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        log::debug!("{program} failed ({:?}): {}", output.status.code(), stderr.trim());
        return Err(Error::CommandFailed {
            command: program.to_string(),
            code: output.status.code(),
            stdout,
            stderr,
        });
    }

    Ok(CommandOutput {
        stdout,
        stdout_bytes: output.stdout,
        stderr,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout() {
        let out = run("sh", ["-c", "printf hello"]).await.unwrap();
        assert_eq!(out.stdout, "hello");
        assert_eq!(out.stdout_bytes, b"hello");
    }

    #[tokio::test]
    async fn non_zero_exit_keeps_code_and_stderr() {
        let err = run("sh", ["-c", "echo 'Resource busy' >&2; exit 16"])
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(16));
        assert_eq!(err.stderr().map(str::trim), Some("Resource busy"));
        assert_eq!(err.to_string(), "Error running `sh`! Exit code was 16");
    }

    #[tokio::test]
    async fn missing_program_has_no_exit_code() {
        let err = run("definitely-not-a-real-tool-4711", Vec::<String>::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { code: None, .. }));
    }
}
