//! Error types for the command line tool.
//!
//! This module defines the top-level error type with actionable messages and
//! recovery suggestions.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, BundlerError>;

/// Main error type for all CLI operations
#[derive(Error, Debug)]
pub enum BundlerError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bundler errors
    #[error("{0}")]
    Bundler(#[from] crate::bundler::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },
}

impl BundlerError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        use crate::bundler::Error;

        let BundlerError::Bundler(err) = self else {
            return vec!["Run with --help for usage".to_string()];
        };
        let err = match err {
            Error::Shared(inner) => inner.as_ref(),
            other => other,
        };

        match err {
            Error::GenericError(msg) if msg == "Target already exists" => vec![
                "Remove the existing image or choose another output path".to_string(),
            ],
            Error::Json(_) => vec!["Check that the specification is valid JSON".to_string()],
            Error::Validation(_) => vec![
                "Add the missing fields to the JSON specification".to_string(),
                "Titles are limited to 27 characters".to_string(),
            ],
            Error::Image(_) => vec!["Use a PNG, JPEG or TIFF background image".to_string()],
            Error::CommandFailed { command, stderr, .. } => {
                let mut suggestions = Vec::new();
                if !stderr.trim().is_empty() {
                    suggestions.push(format!("{command} said: {}", stderr.trim()));
                }
                if command == "hdiutil" {
                    suggestions.push(
                        "Make sure no Finder window or other process is using a mounted image"
                            .to_string(),
                    );
                }
                if command == "osascript" {
                    suggestions.push(
                        "Allow your terminal to control Finder in System Settings > Privacy & Security > Automation"
                            .to_string(),
                    );
                }
                suggestions
            }
            Error::Aborted(_) => Vec::new(),
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn suggestions_see_through_shared_errors() {
        let err = BundlerError::from(crate::bundler::Error::Shared(Arc::new(
            crate::bundler::Error::Validation("`title` missing from JSON Specification".into()),
        )));
        assert_eq!(err.to_string(), "`title` missing from JSON Specification");
        assert_eq!(err.recovery_suggestions().len(), 2);
    }

    #[test]
    fn tool_failures_quote_stderr() {
        let err = BundlerError::from(crate::bundler::Error::CommandFailed {
            command: "hdiutil".into(),
            code: Some(1),
            stdout: String::new(),
            stderr: "hdiutil: create failed - No space left on device\n".into(),
        });
        let suggestions = err.recovery_suggestions();
        assert_eq!(
            suggestions[0],
            "hdiutil said: hdiutil: create failed - No space left on device"
        );
    }
}
