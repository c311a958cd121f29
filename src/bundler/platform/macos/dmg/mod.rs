//! macOS disk image builder.
//!
//! Turns a [`DmgOptions`] into a pipeline of build steps over a shared
//! [`DmgBuildContext`]: read and validate the specification, create and
//! mount a read-write image, fill and lay it out, then detach, convert and
//! optionally sign it. The temporary image and its mount are released by
//! cleanups whether the build succeeds or not.
//!
//! # Architecture
//!
//! This module is organized into logical submodules:
//! - `hdiutil` - image create/attach/detach/convert
//! - `customization` - background, volume icon and Finder layout
//! - `steps` - the individual pipeline steps

mod customization;
mod hdiutil;
mod steps;

use crate::bail;
use crate::bundler::{
    builder::tool_detection::{self, HAS_HDIUTIL},
    error::{Context, Result},
    pipeline::{Pipeline, PipelineHandle, ProgressEvent},
    settings::{DmgLayout, DmgOptions, DmgSpecification, SpecificationSource},
};
use std::path::{Path, PathBuf};

pub use customization::{escape_applescript_string, finder_script, retina_path};
pub use hdiutil::parse_mount_point;
pub use steps::{UNLINK_TEMPORARY_IMAGE, UNMOUNT_TEMPORARY_IMAGE};

/// State shared by the build steps of one image.
#[derive(Debug)]
pub struct DmgBuildContext {
    options: DmgOptions,
    specification_bytes: Option<Vec<u8>>,
    specification: Option<DmgSpecification>,
    layout: Option<DmgLayout>,
    megabytes: u64,
    temporary_image: Option<PathBuf>,
    mount_point: Option<PathBuf>,
    background_name: Option<String>,
    background_size: Option<(u32, u32)>,
}

impl DmgBuildContext {
    /// Fresh context. An inline specification skips reading and parsing.
    pub fn new(options: DmgOptions) -> Self {
        let specification = match options.input() {
            SpecificationSource::Inline(specification) => Some(specification.clone()),
            SpecificationSource::File(_) => None,
        };
        Self {
            options,
            specification_bytes: None,
            specification,
            layout: None,
            megabytes: 0,
            temporary_image: None,
            mount_point: None,
            background_name: None,
            background_size: None,
        }
    }

    /// Options of this build.
    pub fn options(&self) -> &DmgOptions {
        &self.options
    }

    fn layout(&self) -> Result<&DmgLayout> {
        self.layout
            .as_ref()
            .context("JSON Specification has not been validated")
    }

    fn temporary_image(&self) -> Result<&Path> {
        self.temporary_image
            .as_deref()
            .context("Temporary image has not been created")
    }

    fn mount_point(&self) -> Result<&Path> {
        self.mount_point
            .as_deref()
            .context("Temporary image is not mounted")
    }
}

/// Declares every build step for `options`, in run order.
pub fn build_pipeline(options: &DmgOptions) -> Pipeline<DmgBuildContext> {
    let mut pipeline = Pipeline::new();

    pipeline.add_step("Looking for target", |ctx, ctl| {
        Box::pin(steps::looking_for_target(ctx, ctl))
    });
    if let SpecificationSource::File(_) = options.input() {
        pipeline.add_step("Reading JSON Specification", |ctx, ctl| {
            Box::pin(steps::reading_specification(ctx, ctl))
        });
        pipeline.add_step("Parsing JSON Specification", |ctx, ctl| {
            Box::pin(steps::parsing_specification(ctx, ctl))
        });
    }
    pipeline.add_step("Validating JSON Specification", |ctx, ctl| {
        Box::pin(steps::validating_specification(ctx, ctl))
    });
    pipeline.add_step("Looking for files", |ctx, ctl| {
        Box::pin(steps::looking_for_files(ctx, ctl))
    });
    pipeline.add_step("Calculating size of image", |ctx, ctl| {
        Box::pin(steps::calculating_size(ctx, ctl))
    });
    pipeline.add_step("Creating temporary image", |ctx, ctl| {
        Box::pin(steps::creating_temporary_image(ctx, ctl))
    });
    pipeline.add_step("Mounting temporary image", |ctx, ctl| {
        Box::pin(steps::mounting_temporary_image(ctx, ctl))
    });
    pipeline.add_step("Making hidden background folder", |ctx, ctl| {
        Box::pin(steps::making_background_folder(ctx, ctl))
    });
    pipeline.add_step("Copying background", |ctx, ctl| {
        Box::pin(steps::copying_background(ctx, ctl))
    });
    pipeline.add_step("Reading background dimensions", |ctx, ctl| {
        Box::pin(steps::reading_background_dimensions(ctx, ctl))
    });
    pipeline.add_step("Copying icon", |ctx, ctl| {
        Box::pin(steps::copying_icon(ctx, ctl))
    });
    pipeline.add_step("Setting icon", |ctx, ctl| {
        Box::pin(steps::setting_icon(ctx, ctl))
    });
    pipeline.add_step("Creating links", |ctx, ctl| {
        Box::pin(steps::creating_links(ctx, ctl))
    });
    pipeline.add_step("Copying files", |ctx, ctl| {
        Box::pin(steps::copying_files(ctx, ctl))
    });
    pipeline.add_step("Making all the visuals", |ctx, ctl| {
        Box::pin(steps::making_visuals(ctx, ctl))
    });
    pipeline.add_step("Blessing image", |ctx, ctl| {
        Box::pin(steps::blessing_image(ctx, ctl))
    });
    pipeline.add_step("Unmounting temporary image", |ctx, ctl| {
        Box::pin(steps::unmounting_temporary_image(ctx, ctl))
    });
    pipeline.add_step("Finalizing image", |ctx, ctl| {
        Box::pin(steps::finalizing_image(ctx, ctl))
    });
    pipeline.add_step("Signing image", |ctx, ctl| {
        Box::pin(steps::signing_image(ctx, ctl))
    });

    // "Removing temporary image" runs after the last step.
    pipeline.expect_additional(1);
    pipeline
}

/// Starts building the image described by `options`.
///
/// `on_progress` sees every step begin and end as it happens. The returned
/// handle streams the same events, can abort the build, and yields its
/// outcome.
///
/// # Errors
///
/// Fails before any step runs when the host is not macOS or `hdiutil` is
/// missing.
pub fn bundle_project<F>(options: DmgOptions, on_progress: F) -> Result<PipelineHandle>
where
    F: FnMut(&ProgressEvent) + Send + 'static,
{
    if !cfg!(target_os = "macos") {
        bail!("Platform not supported: {}", std::env::consts::OS);
    }
    tool_detection::require(*HAS_HDIUTIL, "hdiutil")?;

    log::info!("Creating {}", options.target().display());
    let mut pipeline = build_pipeline(&options);
    pipeline.on_progress(on_progress);
    Ok(pipeline.run(DmgBuildContext::new(options)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::settings::DmgOptionsBuilder;

    #[test]
    fn file_source_reads_and_parses_first() {
        let options = DmgOptionsBuilder::new()
            .source("/work/appdmg.json")
            .target("/work/out.dmg")
            .build()
            .unwrap();
        let pipeline = build_pipeline(&options);

        let titles: Vec<_> = pipeline.step_titles().collect();
        assert_eq!(titles.len(), 20);
        assert_eq!(
            &titles[..4],
            [
                "Looking for target",
                "Reading JSON Specification",
                "Parsing JSON Specification",
                "Validating JSON Specification"
            ]
        );
        assert_eq!(titles[17], "Unmounting temporary image");
        assert_eq!(titles[19], "Signing image");
        assert_eq!(pipeline.state().total_steps, 21);
    }

    #[test]
    fn inline_specification_skips_reading() {
        let options = DmgOptionsBuilder::new()
            .specification(DmgSpecification::default())
            .target("/work/out.dmg")
            .build()
            .unwrap();
        let pipeline = build_pipeline(&options);

        assert_eq!(pipeline.state().total_steps, 19);
        assert!(!pipeline.step_titles().any(|t| t.contains("Reading JSON")));

        let ctx = DmgBuildContext::new(options);
        assert!(ctx.specification.is_some());
        assert!(ctx.layout().is_err());
    }

    #[cfg(not(target_os = "macos"))]
    #[tokio::test]
    async fn refuses_other_hosts() {
        let options = DmgOptionsBuilder::new()
            .specification(DmgSpecification::default())
            .target("out.dmg")
            .build()
            .unwrap();
        let err = bundle_project(options, |_| {}).unwrap_err();
        assert!(err.to_string().starts_with("Platform not supported"));
    }

    /// Runs the steps up to the first one needing hdiutil, on any host.
    #[tokio::test]
    async fn validation_failure_stops_before_touching_the_disk() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("appdmg.json");
        std::fs::write(&source, r#"{ "contents": [] }"#).unwrap();
        let options = DmgOptionsBuilder::new()
            .source(&source)
            .target(dir.path().join("out.dmg"))
            .build()
            .unwrap();

        let mut handle = build_pipeline(&options).run(DmgBuildContext::new(options));
        let mut lines = Vec::new();
        while let Some(event) = handle.next_event().await {
            lines.push(event.to_string());
        }

        let err = handle.outcome().await.unwrap_err();
        assert_eq!(err.to_string(), "`title` missing from JSON Specification");
        assert_eq!(lines[6], "[ 4/21] Validating JSON Specification...");
        assert_eq!(lines[7], "[FAIL]");
        assert_eq!(lines.len(), 9);
        assert!(!dir.path().join("out.dmg").exists());
    }

    #[tokio::test]
    async fn missing_specification_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("missing.json");
        let options = DmgOptionsBuilder::new()
            .source(&source)
            .target(dir.path().join("out.dmg"))
            .build()
            .unwrap();

        let handle = build_pipeline(&options).run(DmgBuildContext::new(options));
        let err = handle.outcome().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("JSON Specification not found at: {}", source.display())
        );
    }

    #[tokio::test]
    async fn existing_target_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.dmg");
        std::fs::write(&target, b"").unwrap();
        let options = DmgOptionsBuilder::new()
            .specification(DmgSpecification::default())
            .target(&target)
            .build()
            .unwrap();

        let handle = build_pipeline(&options).run(DmgBuildContext::new(options));
        assert_eq!(
            handle.outcome().await.unwrap_err().to_string(),
            "Target already exists"
        );
    }

    #[tokio::test]
    async fn missing_content_file_is_reported_with_resolved_path() {
        let dir = tempfile::tempdir().unwrap();
        let spec = DmgSpecification::from_json_slice(
            br#"{ "title": "T", "contents": [ { "x": 1, "y": 2, "type": "file", "path": "Nope.app" } ] }"#,
        )
        .unwrap();
        let options = DmgOptionsBuilder::new()
            .specification(spec)
            .basepath(dir.path())
            .target(dir.path().join("out.dmg"))
            .build()
            .unwrap();

        let handle = build_pipeline(&options).run(DmgBuildContext::new(options));
        let err = handle.outcome().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "\"Nope.app\" not found at: {}",
                dir.path().join("Nope.app").display()
            )
        );
    }
}
