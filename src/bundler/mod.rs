//! Disk image bundling.
//!
//! - [`pipeline`] - step pipeline with a cleanup stack, progress and abort
//! - [`settings`] - JSON specification and build options
//! - [`platform`] - the macOS image build steps
//! - [`builder`] - orchestration, checksums and tool detection

pub mod builder;
pub mod error;
pub mod pipeline;
pub mod platform;
pub mod settings;
pub mod utils;

pub use builder::{BundledArtifact, Bundler};
pub use error::{Error, Result};
pub use settings::{DmgLayout, DmgOptions, DmgOptionsBuilder, DmgSpecification};
