//! Command line argument parsing and validation.
//!
//! This module provides CLI argument parsing using clap, with validation of
//! the input and output file extensions.

use clap::Parser;
use std::path::{Path, PathBuf};

/// Build a macOS disk image from a JSON specification
#[derive(Parser, Debug)]
#[command(
    name = "kodegen_bundler_dmg",
    version,
    about = "Build a macOS disk image (.dmg) from a JSON specification",
    long_about = "Builds a macOS disk image (.dmg) with a custom window layout from a JSON specification.

Paths inside the specification are resolved relative to the specification file.

Usage:
  kodegen_bundler_dmg appdmg.json TestApp.dmg
  kodegen_bundler_dmg --quiet assets/appdmg.json target/TestApp.dmg

Exit code 0 = image guaranteed to exist at the output path."
)]
pub struct Args {
    /// Path to the JSON specification
    #[arg(value_name = "JSON_PATH")]
    pub json_path: PathBuf,

    /// Path of the disk image to create
    #[arg(value_name = "DMG_PATH")]
    pub dmg_path: PathBuf,

    /// Show error details and recovery suggestions
    #[arg(short, long)]
    pub verbose: bool,

    /// Print nothing but errors
    #[arg(long, conflicts_with = "verbose")]
    pub quiet: bool,
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if !has_extension(&self.json_path, "json") {
            return Err("Input must have the .json file extension".to_string());
        }
        if !has_extension(&self.dmg_path, "dmg") {
            return Err("Output must have the .dmg file extension".to_string());
        }
        Ok(())
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for colored terminal output
    output: super::OutputManager,
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(args.verbose, args.quiet),
        }
    }
}

impl RuntimeConfig {
    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }
}
