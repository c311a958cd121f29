//! Main bundler orchestration and coordination.
//!
//! This module provides the [`Bundler`] orchestrator that starts the disk
//! image pipeline, waits for it and describes the finished artifact.

use super::{BundledArtifact, checksum::calculate_sha256};
use crate::bundler::{
    DmgOptions, Error, Result,
    error::ErrorExt,
    pipeline::{PipelineHandle, ProgressEvent},
    platform::macos::dmg,
};

/// Main bundler orchestrator.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_dmg::bundler::{Bundler, DmgOptionsBuilder};
///
/// # async fn example() -> kodegen_bundler_dmg::bundler::Result<()> {
/// let options = DmgOptionsBuilder::new()
///     .source("appdmg.json")
///     .target("TestApp.dmg")
///     .build()?;
///
/// let artifact = Bundler::new(options)
///     .bundle(|event| eprintln!("{event}"))
///     .await?;
/// println!("Created: {:?} ({} bytes)", artifact.path, artifact.size);
/// println!("SHA256: {}", artifact.checksum);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Bundler {
    options: DmgOptions,
}

impl Bundler {
    /// Creates a new bundler with the given options.
    pub fn new(options: DmgOptions) -> Self {
        Self { options }
    }

    /// Returns the options of this bundler.
    pub fn options(&self) -> &DmgOptions {
        &self.options
    }

    /// Starts the build without waiting for it.
    ///
    /// Use the handle to abort, then pass it to [`complete`](Self::complete).
    pub fn start<F>(&self, on_progress: F) -> Result<PipelineHandle>
    where
        F: FnMut(&ProgressEvent) + Send + 'static,
    {
        dmg::bundle_project(self.options.clone(), on_progress)
    }

    /// Waits for a started build and describes the image it produced.
    pub async fn complete(&self, handle: &PipelineHandle) -> Result<BundledArtifact> {
        handle.outcome().await.map_err(Error::Shared)?;

        let path = self.options.target().to_path_buf();
        let size = tokio::fs::metadata(&path)
            .await
            .fs_context("reading artifact metadata", &path)?
            .len();
        let checksum = calculate_sha256(&path).await?;

        log::info!("Created {} ({size} bytes)", path.display());
        Ok(BundledArtifact {
            path,
            size,
            checksum,
        })
    }

    /// Builds the image, reporting progress to `on_progress`.
    pub async fn bundle<F>(&self, on_progress: F) -> Result<BundledArtifact>
    where
        F: FnMut(&ProgressEvent) + Send + 'static,
    {
        let handle = self.start(on_progress)?;
        self.complete(&handle).await
    }
}
