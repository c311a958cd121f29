//! macOS disk image builder library
//!
//! Builds `.dmg` disk images with a custom Finder window (background, icon
//! positions, volume icon) from a JSON specification. The build runs as a
//! [`bundler::pipeline`] of steps whose acquired resources (temporary image,
//! mounted volume) are released by cleanups even when a step fails.
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod bundler;
pub mod cli;
pub mod error;

// Re-export commonly used types
pub use error::{BundlerError, CliError, Result};
