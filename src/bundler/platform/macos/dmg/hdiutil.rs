//! Image lifecycle through hdiutil.
//!
//! A build creates a read-write temporary image, attaches it, fills it,
//! detaches it and converts it into the final format:
//! `create` → `attach` → (customize) → `detach` → `convert`.

use crate::bundler::{
    error::{Context, Error, Result},
    settings::{Filesystem, ImageFormat},
    utils::{command, fs},
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// hdiutil's exit code when the volume is still in use.
const EXIT_BUSY: i32 = 16;

/// Pause before retrying a busy detach.
const DETACH_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Creates an empty read-write image of `megabytes` at a fresh temporary path.
///
/// The image is removed again if hdiutil fails. On success the caller owns
/// the file and must remove it.
pub async fn create(volname: &str, megabytes: u64, filesystem: Filesystem) -> Result<PathBuf> {
    let outname = tempfile::Builder::new()
        .prefix("kodegen-dmg-")
        .suffix(".dmg")
        .tempfile()?
        .into_temp_path()
        .keep()
        .map_err(|e| Error::IoError(e.error))?;

    let size = format!("{megabytes}m");
    let result = command::run(
        "hdiutil",
        [
            OsStr::new("create"),
            outname.as_os_str(),
            OsStr::new("-ov"),
            OsStr::new("-fs"),
            OsStr::new(filesystem.as_str()),
            OsStr::new("-size"),
            OsStr::new(&size),
            OsStr::new("-volname"),
            OsStr::new(volname),
        ],
    )
    .await;

    if let Err(err) = result {
        fs::remove_file(&outname).await.ok();
        return Err(err);
    }

    log::debug!("Created temporary image {}", outname.display());
    Ok(outname)
}

/// Attaches `image` without showing it in Finder and returns its mount point.
pub async fn attach(image: &Path) -> Result<PathBuf> {
    let output = command::run(
        "hdiutil",
        [
            OsStr::new("attach"),
            image.as_os_str(),
            OsStr::new("-nobrowse"),
            OsStr::new("-noverify"),
            OsStr::new("-noautoopen"),
            OsStr::new("-plist"),
        ],
    )
    .await?;

    let mount_point = parse_mount_point(&output.stdout_bytes)?;
    log::debug!("Mounted {} at {}", image.display(), mount_point.display());
    Ok(mount_point)
}

/// Extracts the first mount point from `hdiutil attach -plist` output.
pub fn parse_mount_point(plist_bytes: &[u8]) -> Result<PathBuf> {
    let value = plist::Value::from_reader(std::io::Cursor::new(plist_bytes))?;

    value
        .as_dictionary()
        .and_then(|root| root.get("system-entities"))
        .and_then(plist::Value::as_array)
        .into_iter()
        .flatten()
        .find_map(|entity| entity.as_dictionary()?.get("mount-point")?.as_string())
        .map(PathBuf::from)
        .context("Failed to mount image")
}

fn is_busy(err: &Error) -> bool {
    err.exit_code() == Some(EXIT_BUSY) && err.stderr().is_some_and(|s| s.contains("Resource busy"))
}

/// Detaches the volume at `mount_point`.
///
/// Finder or Spotlight may still hold the volume right after it was
/// written to, so one busy failure is retried after a short pause.
pub async fn detach(mount_point: &Path) -> Result<()> {
    let args = [OsStr::new("detach"), mount_point.as_os_str()];

    match command::run("hdiutil", args).await {
        Err(err) if is_busy(&err) => {
            log::warn!(
                "{} is busy, retrying detach in {}s",
                mount_point.display(),
                DETACH_RETRY_DELAY.as_secs()
            );
            tokio::time::sleep(DETACH_RETRY_DELAY).await;
            command::run("hdiutil", args).await.map(drop)
        }
        other => other.map(drop),
    }
}

/// Converts `source` into `target` with the requested format.
///
/// A partially written target is removed when hdiutil fails.
pub async fn convert(source: &Path, target: &Path, format: ImageFormat) -> Result<()> {
    let mut args = vec![
        OsStr::new("convert"),
        source.as_os_str(),
        OsStr::new("-format"),
        OsStr::new(format.as_str()),
    ];
    if format == ImageFormat::Udzo {
        args.extend([OsStr::new("-imagekey"), OsStr::new("zlib-level=9")]);
    }
    args.extend([OsStr::new("-o"), target.as_os_str()]);

    if let Err(err) = command::run("hdiutil", args).await {
        fs::remove_file(target).await.ok();
        return Err(err);
    }

    log::info!("Converted image to {} at {}", format.as_str(), target.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATTACH_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>system-entities</key>
    <array>
        <dict>
            <key>content-hint</key>
            <string>GUID_partition_scheme</string>
            <key>dev-entry</key>
            <string>/dev/disk4</string>
        </dict>
        <dict>
            <key>content-hint</key>
            <string>Apple_HFS</string>
            <key>dev-entry</key>
            <string>/dev/disk4s1</string>
            <key>mount-point</key>
            <string>/Volumes/Test Title</string>
        </dict>
    </array>
</dict>
</plist>"#;

    #[test]
    fn finds_mount_point_among_entities() {
        let mount = parse_mount_point(ATTACH_PLIST.as_bytes()).unwrap();
        assert_eq!(mount, PathBuf::from("/Volumes/Test Title"));
    }

    #[test]
    fn missing_mount_point_fails_to_mount() {
        let plist = ATTACH_PLIST.replace("mount-point", "volume-kind");
        let err = parse_mount_point(plist.as_bytes()).unwrap_err();
        assert_eq!(err.to_string(), "Failed to mount image");
    }

    #[test]
    fn garbage_output_is_rejected() {
        assert!(parse_mount_point(b"hdiutil: attach failed").is_err());
    }

    #[test]
    fn only_exit_16_with_busy_message_is_retried() {
        let failure = |code, stderr: &str| Error::CommandFailed {
            command: "hdiutil".into(),
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        };
        assert!(is_busy(&failure(16, "hdiutil: couldn't unmount - Resource busy")));
        assert!(!is_busy(&failure(16, "no such file")));
        assert!(!is_busy(&failure(1, "Resource busy")));
    }
}
