//! Core options struct and implementations.

use super::DmgSpecification;
use std::path::{Path, PathBuf};

/// Where the JSON specification comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum SpecificationSource {
    /// Read and parse this file during the run.
    File(PathBuf),
    /// Already parsed, supplied by a library caller.
    Inline(DmgSpecification),
}

/// Options of one disk image build.
///
/// Constructed via [`DmgOptionsBuilder`](super::DmgOptionsBuilder).
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_dmg::bundler::DmgOptionsBuilder;
///
/// # fn example() -> kodegen_bundler_dmg::bundler::Result<()> {
/// let options = DmgOptionsBuilder::new()
///     .source("assets/appdmg.json")
///     .target("target/TestApp.dmg")
///     .build()?;
/// assert!(options.basepath().ends_with("assets"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DmgOptions {
    /// Output path of the final image.
    target: PathBuf,

    /// Specification input.
    input: SpecificationSource,

    /// Directory relative specification paths resolve against.
    basepath: PathBuf,
}

impl DmgOptions {
    pub(super) fn new(target: PathBuf, input: SpecificationSource, basepath: PathBuf) -> Self {
        Self {
            target,
            input,
            basepath,
        }
    }

    /// Returns the output path.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Returns the specification input.
    pub fn input(&self) -> &SpecificationSource {
        &self.input
    }

    /// Returns the base directory for relative paths.
    pub fn basepath(&self) -> &Path {
        &self.basepath
    }

    /// Resolves a specification path against the base directory.
    ///
    /// Absolute paths are returned unchanged.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.basepath.join(path)
    }
}
