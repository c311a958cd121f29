//! The individual build steps.
//!
//! Each step reads what earlier steps left in [`DmgBuildContext`] and
//! records what later steps need. Steps that acquire something on the host
//! (the temporary image, the mount) register the cleanup releasing it.

use super::{DmgBuildContext, customization, hdiutil};
use crate::bail;
use crate::bundler::{
    builder::tool_detection::HAS_BLESS,
    error::{Context, Result},
    pipeline::{Completion, StepControl},
    platform::macos::sign,
    settings::{ContentKind, DmgSpecification, SpecificationSource},
    utils::{command, fs},
};
use std::ffi::OsStr;
use std::io;
use std::path::Path;

type Control = StepControl<DmgBuildContext>;

/// Cleanup removing the temporary image file.
pub const UNLINK_TEMPORARY_IMAGE: &str = "unlink-temporary-image";

/// Cleanup detaching the temporary image.
pub const UNMOUNT_TEMPORARY_IMAGE: &str = "unmount-temporary-image";

pub(super) async fn looking_for_target(ctx: &mut DmgBuildContext, _: &mut Control) -> Result<Completion> {
    if tokio::fs::try_exists(ctx.options.target()).await? {
        bail!("Target already exists");
    }
    Ok(Completion::Done)
}

pub(super) async fn reading_specification(ctx: &mut DmgBuildContext, _: &mut Control) -> Result<Completion> {
    let SpecificationSource::File(source) = ctx.options.input() else {
        return Ok(Completion::Skipped);
    };

    match tokio::fs::read(source).await {
        Ok(bytes) => {
            ctx.specification_bytes = Some(bytes);
            Ok(Completion::Done)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            bail!("JSON Specification not found at: {}", source.display())
        }
        Err(e) => Err(e.into()),
    }
}

pub(super) async fn parsing_specification(ctx: &mut DmgBuildContext, _: &mut Control) -> Result<Completion> {
    let bytes = ctx
        .specification_bytes
        .take()
        .context("JSON Specification has not been read")?;
    ctx.specification = Some(DmgSpecification::from_json_slice(&bytes)?);
    Ok(Completion::Done)
}

pub(super) async fn validating_specification(ctx: &mut DmgBuildContext, _: &mut Control) -> Result<Completion> {
    let specification = ctx
        .specification
        .take()
        .context("JSON Specification has not been parsed")?;
    ctx.layout = Some(specification.validate()?);
    Ok(Completion::Done)
}

pub(super) async fn looking_for_files(ctx: &mut DmgBuildContext, _: &mut Control) -> Result<Completion> {
    let layout = ctx.layout()?;
    for entry in layout.entries(ContentKind::File) {
        let resolved = ctx.options.resolve_path(&entry.path);
        if !tokio::fs::try_exists(&resolved).await? {
            bail!("\"{}\" not found at: {}", entry.path, resolved.display());
        }
    }
    Ok(Completion::Done)
}

pub(super) async fn calculating_size(ctx: &mut DmgBuildContext, _: &mut Control) -> Result<Completion> {
    let mut megabytes = 0;
    for entry in ctx.layout()?.entries(ContentKind::File) {
        megabytes += fs::disk_usage_mb(&ctx.options.resolve_path(&entry.path)).await?;
    }

    // Headroom for filesystem overhead; the final image is compacted.
    ctx.megabytes = (megabytes * 3).div_ceil(2) + 32;
    log::debug!("Temporary image size: {}m", ctx.megabytes);
    Ok(Completion::Done)
}

pub(super) async fn creating_temporary_image(ctx: &mut DmgBuildContext, ctl: &mut Control) -> Result<Completion> {
    let layout = ctx.layout()?;
    let image = hdiutil::create(&layout.title, ctx.megabytes, layout.filesystem).await?;

    let path = image.clone();
    ctl.add_cleanup_step(UNLINK_TEMPORARY_IMAGE, "Removing temporary image", move |_| async move {
        fs::remove_file(&path).await
    });

    ctx.temporary_image = Some(image);
    Ok(Completion::Done)
}

pub(super) async fn mounting_temporary_image(ctx: &mut DmgBuildContext, ctl: &mut Control) -> Result<Completion> {
    let image = ctx.temporary_image()?;
    let mount_point = hdiutil::attach(image).await?;

    let path = mount_point.clone();
    ctl.add_cleanup_step(UNMOUNT_TEMPORARY_IMAGE, "Unmounting temporary image", move |_| async move {
        hdiutil::detach(&path).await
    });

    ctx.mount_point = Some(mount_point);
    Ok(Completion::Done)
}

pub(super) async fn making_background_folder(ctx: &mut DmgBuildContext, _: &mut Control) -> Result<Completion> {
    let dir = ctx.mount_point()?.join(customization::BACKGROUND_DIR);
    fs::create_dir(&dir).await?;
    Ok(Completion::Done)
}

pub(super) async fn copying_background(ctx: &mut DmgBuildContext, _: &mut Control) -> Result<Completion> {
    let Some(background) = &ctx.layout()?.background else {
        return Ok(Completion::Skipped);
    };
    let source = ctx.options.resolve_path(background);
    let dir = ctx.mount_point()?.join(customization::BACKGROUND_DIR);

    ctx.background_name = Some(customization::copy_background(&source, &dir).await?);
    Ok(Completion::Done)
}

pub(super) async fn reading_background_dimensions(ctx: &mut DmgBuildContext, _: &mut Control) -> Result<Completion> {
    let Some(background) = &ctx.layout()?.background else {
        return Ok(Completion::Skipped);
    };
    let source = ctx.options.resolve_path(background);

    ctx.background_size = Some(customization::background_dimensions(&source).await?);
    Ok(Completion::Done)
}

pub(super) async fn copying_icon(ctx: &mut DmgBuildContext, _: &mut Control) -> Result<Completion> {
    let Some(icon) = &ctx.layout()?.icon else {
        return Ok(Completion::Skipped);
    };
    let target = ctx.mount_point()?.join(".VolumeIcon.icns");

    fs::copy_file(&ctx.options.resolve_path(icon), &target).await?;
    Ok(Completion::Done)
}

pub(super) async fn setting_icon(ctx: &mut DmgBuildContext, _: &mut Control) -> Result<Completion> {
    if ctx.layout()?.icon.is_none() {
        return Ok(Completion::Skipped);
    }
    customization::set_custom_icon_flag(ctx.mount_point()?).await?;
    Ok(Completion::Done)
}

pub(super) async fn creating_links(ctx: &mut DmgBuildContext, _: &mut Control) -> Result<Completion> {
    let mount_point = ctx.mount_point()?;
    let mut links = ctx.layout()?.entries(ContentKind::Link).peekable();
    if links.peek().is_none() {
        return Ok(Completion::Skipped);
    }

    for entry in links {
        fs::symlink(Path::new(&entry.path), &mount_point.join(&entry.name)).await?;
    }
    Ok(Completion::Done)
}

pub(super) async fn copying_files(ctx: &mut DmgBuildContext, _: &mut Control) -> Result<Completion> {
    let mount_point = ctx.mount_point()?;
    let mut files = ctx.layout()?.entries(ContentKind::File).peekable();
    if files.peek().is_none() {
        return Ok(Completion::Skipped);
    }

    for entry in files {
        let source = ctx.options.resolve_path(&entry.path);
        let target = mount_point.join(&entry.name);
        command::run(
            "cp",
            [OsStr::new("-R"), source.as_os_str(), target.as_os_str()],
        )
        .await?;
    }
    Ok(Completion::Done)
}

pub(super) async fn making_visuals(ctx: &mut DmgBuildContext, _: &mut Control) -> Result<Completion> {
    let mount_point = ctx.mount_point()?;
    let disk_name = mount_point
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("Invalid mount point: {}", mount_point.display()))?;

    let script = customization::finder_script(
        &disk_name,
        ctx.layout()?,
        ctx.background_name.as_deref(),
        ctx.background_size,
    );
    customization::apply_finder_layout(&script).await?;
    Ok(Completion::Done)
}

pub(super) async fn blessing_image(ctx: &mut DmgBuildContext, _: &mut Control) -> Result<Completion> {
    // bless --folder is rejected on Apple silicon.
    if cfg!(target_arch = "aarch64") || !*HAS_BLESS {
        return Ok(Completion::Skipped);
    }
    command::run(
        "bless",
        [OsStr::new("--folder"), ctx.mount_point()?.as_os_str()],
    )
    .await?;
    Ok(Completion::Done)
}

pub(super) async fn unmounting_temporary_image(_: &mut DmgBuildContext, ctl: &mut Control) -> Result<Completion> {
    ctl.run_cleanup(UNMOUNT_TEMPORARY_IMAGE).await?;
    Ok(Completion::Done)
}

pub(super) async fn finalizing_image(ctx: &mut DmgBuildContext, _: &mut Control) -> Result<Completion> {
    let format = ctx.layout()?.format;
    hdiutil::convert(ctx.temporary_image()?, ctx.options.target(), format).await?;
    Ok(Completion::Done)
}

pub(super) async fn signing_image(ctx: &mut DmgBuildContext, _: &mut Control) -> Result<Completion> {
    let Some(settings) = &ctx.layout()?.code_sign else {
        return Ok(Completion::Skipped);
    };
    sign::sign_image(ctx.options.target(), settings).await?;
    Ok(Completion::Done)
}
