//! Builder for constructing DmgOptions.

use super::{DmgOptions, DmgSpecification, SpecificationSource};
use std::path::{Path, PathBuf};

/// Builder for constructing [`DmgOptions`].
///
/// Exactly one of [`source`](Self::source) and
/// [`specification`](Self::specification) must be given.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_dmg::bundler::{DmgOptionsBuilder, DmgSpecification};
///
/// # fn example() -> kodegen_bundler_dmg::bundler::Result<()> {
/// let options = DmgOptionsBuilder::new()
///     .specification(DmgSpecification {
///         title: Some("TestApp".into()),
///         contents: Some(vec![]),
///         ..Default::default()
///     })
///     .basepath("assets")
///     .target("TestApp.dmg")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct DmgOptionsBuilder {
    target: Option<PathBuf>,
    source: Option<PathBuf>,
    specification: Option<DmgSpecification>,
    basepath: Option<PathBuf>,
}

impl DmgOptionsBuilder {
    /// Creates a new options builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the output path of the image.
    ///
    /// # Required
    ///
    /// This field is required for building.
    pub fn target<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.target = Some(path.as_ref().to_path_buf());
        self
    }

    /// Reads the specification from a JSON file during the run.
    pub fn source<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source = Some(path.as_ref().to_path_buf());
        self
    }

    /// Uses an already parsed specification.
    pub fn specification(mut self, specification: DmgSpecification) -> Self {
        self.specification = Some(specification);
        self
    }

    /// Sets the directory relative paths resolve against.
    ///
    /// Default: the source file's directory, or the current directory for an
    /// inline specification.
    pub fn basepath<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.basepath = Some(path.as_ref().to_path_buf());
        self
    }

    /// Builds the options.
    ///
    /// # Errors
    ///
    /// Returns an error if `target` is missing, or if neither or both of
    /// `source` and `specification` are set.
    pub fn build(self) -> crate::bundler::Result<DmgOptions> {
        use crate::bundler::error::Context;

        let target = self.target.context("target is required")?;
        let input = match (self.source, self.specification) {
            (Some(source), None) => SpecificationSource::File(source),
            (None, Some(specification)) => SpecificationSource::Inline(specification),
            (None, None) => crate::bail!("either source or specification is required"),
            (Some(_), Some(_)) => crate::bail!("source and specification are mutually exclusive"),
        };

        let basepath = match (self.basepath, &input) {
            (Some(basepath), _) => basepath,
            (None, SpecificationSource::File(source)) => source
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            (None, SpecificationSource::Inline(_)) => std::env::current_dir()?,
        };

        Ok(DmgOptions::new(target, input, basepath))
    }
}
