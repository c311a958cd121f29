//! Error types for disk image bundling.
//!
//! [`Error`] is the single error type flowing through the step pipeline. Step
//! bodies return it, cleanup actions return it, and the pipeline reports the
//! first one it sees as the terminal failure.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while building a disk image.
#[derive(Error, Debug)]
pub enum Error {
    /// Generic error with a message.
    #[error("{0}")]
    GenericError(String),

    /// IO error.
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    /// IO error annotated with the operation and the path involved.
    #[error("{context} ({}): {source}", path.display())]
    Fs {
        /// What was being attempted.
        context: String,
        /// Path the operation touched.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// JSON specification could not be parsed.
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// Background image could not be decoded.
    #[error("{0}")]
    Image(#[from] image::ImageError),

    /// `hdiutil -plist` output could not be parsed.
    #[error("{0}")]
    Plist(#[from] plist::Error),

    /// Invalid regular expression.
    #[error("{0}")]
    Regex(#[from] regex::Error),

    /// Directory walk failed.
    #[error("{0}")]
    WalkDir(#[from] walkdir::Error),

    /// An external tool exited unsuccessfully.
    #[error("Error running `{command}`! Exit code was {}", code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    CommandFailed {
        /// Program name.
        command: String,
        /// Exit code, absent when killed by a signal.
        code: Option<i32>,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The JSON specification is incomplete or inconsistent.
    #[error("{0}")]
    Validation(String),

    /// The run was cancelled from outside the pipeline.
    #[error("Aborted: {0}")]
    Aborted(String),

    /// Outcome of a finished pipeline, shared with every observer.
    #[error(transparent)]
    Shared(Arc<Error>),
}

impl Error {
    /// Exit code of a failed external tool, if this is one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Error::CommandFailed { code, .. } => *code,
            Error::Shared(inner) => inner.exit_code(),
            _ => None,
        }
    }

    /// Standard error of a failed external tool, if this is one.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Error::CommandFailed { stderr, .. } => Some(stderr),
            Error::Shared(inner) => inner.stderr(),
            _ => None,
        }
    }
}

/// Attaches the operation and path to IO failures.
pub trait ErrorExt<T> {
    /// Wraps an IO error into [`Error::Fs`].
    fn fs_context(self, context: &str, path: &Path) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &str, path: &Path) -> Result<T> {
        self.map_err(|source| Error::Fs {
            context: context.to_string(),
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Adds a human readable message to failures and missing values.
pub trait Context<T> {
    /// Replaces the failure with `msg`, keeping the original as a suffix.
    fn context<C: Display>(self, msg: C) -> Result<T>;

    /// Lazily built variant of [`Context::context`].
    fn with_context<C: Display, F: FnOnce() -> C>(self, f: F) -> Result<T>;
}

impl<T, E: Display> Context<T> for std::result::Result<T, E> {
    fn context<C: Display>(self, msg: C) -> Result<T> {
        self.map_err(|e| Error::GenericError(format!("{msg}: {e}")))
    }

    fn with_context<C: Display, F: FnOnce() -> C>(self, f: F) -> Result<T> {
        self.map_err(|e| Error::GenericError(format!("{}: {e}", f())))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C: Display>(self, msg: C) -> Result<T> {
        self.ok_or_else(|| Error::GenericError(msg.to_string()))
    }

    fn with_context<C: Display, F: FnOnce() -> C>(self, f: F) -> Result<T> {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

/// Returns early with a [`Error::GenericError`] built from a format string.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::bundler::Error::GenericError(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failure_message_matches_tool_output() {
        let err = Error::CommandFailed {
            command: "hdiutil".into(),
            code: Some(16),
            stdout: String::new(),
            stderr: "hdiutil: detach failed - Resource busy".into(),
        };
        assert_eq!(err.to_string(), "Error running `hdiutil`! Exit code was 16");
        assert_eq!(err.exit_code(), Some(16));
        assert!(err.stderr().is_some_and(|s| s.contains("Resource busy")));
    }

    #[test]
    fn option_context_becomes_generic_error() {
        let missing: Option<u32> = None;
        let err = missing.context("mount point missing").unwrap_err();
        assert!(matches!(err, Error::GenericError(ref m) if m == "mount point missing"));
    }

    #[test]
    fn fs_context_keeps_path() {
        let res: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = res.fs_context("reading icon", Path::new("/tmp/Icon.icns")).unwrap_err();
        assert!(err.to_string().contains("/tmp/Icon.icns"));
    }

    fn bails(flag: bool) -> Result<u8> {
        if flag {
            crate::bail!("bad flag {}", 1);
        }
        Ok(0)
    }

    #[test]
    fn bail_macro_returns_generic_error() {
        assert_eq!(bails(false).unwrap(), 0);
        assert_eq!(bails(true).unwrap_err().to_string(), "bad flag 1");
    }
}
