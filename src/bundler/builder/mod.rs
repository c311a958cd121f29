//! Bundle orchestration and coordination.
//!
//! This module provides the main [`Bundler`] orchestrator that runs the disk
//! image pipeline and describes the finished image.
//!
//! # Overview
//!
//! The bundler:
//! 1. Takes [`DmgOptions`](crate::bundler::DmgOptions)
//! 2. Starts the build pipeline, forwarding progress to the caller
//! 3. Waits for the outcome
//! 4. Calculates size and checksum
//! 5. Returns a [`BundledArtifact`]
//!
//! # Module Organization
//!
//! - [`checksum`] - SHA256 checksum calculation for artifacts
//! - [`orchestrator`] - Main [`Bundler`] struct
//! - [`tool_detection`] - External tool availability checking

pub mod checksum;
mod orchestrator;
pub mod tool_detection;

pub use orchestrator::Bundler;

use std::path::PathBuf;

/// A disk image produced by [`Bundler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundledArtifact {
    /// Path of the image.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Hex-encoded SHA-256 of the image.
    pub checksum: String,
}
