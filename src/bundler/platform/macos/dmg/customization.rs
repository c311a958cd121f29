//! Image appearance: background, volume icon and Finder window layout.
//!
//! The Finder layout is applied by driving Finder over AppleScript while the
//! temporary image is mounted. Finder persists it in the volume's
//! `.DS_Store`, which survives conversion to the final format.

use crate::bundler::{
    builder::tool_detection::{self, HAS_OSASCRIPT, HAS_SETFILE, HAS_TIFFUTIL},
    error::{Error, Result},
    settings::DmgLayout,
    utils::{command, fs},
};
use regex::Regex;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Folder on the volume holding the background picture.
pub const BACKGROUND_DIR: &str = ".background";

/// Window origin when the specification gives none.
const DEFAULT_WINDOW_POSITION: (i32, i32) = (100, 100);

/// Window size without explicit size or background picture.
const DEFAULT_WINDOW_SIZE: (u32, u32) = (640, 480);

/// Path of the `@2x` variant of a background picture.
///
/// `images/bg.png` becomes `images/bg@2x.png`. Paths without a lowercase
/// extension have no retina variant.
pub fn retina_path(background: &Path) -> Result<Option<PathBuf>> {
    let pattern = Regex::new(r"\.([a-z]+)$")?;
    let original = background.to_string_lossy();
    if !pattern.is_match(&original) {
        return Ok(None);
    }
    Ok(Some(PathBuf::from(
        pattern.replace(&original, "@2x.$1").into_owned(),
    )))
}

/// Copies the background picture into `background_dir`.
///
/// When a retina variant sits next to it, both are merged into one
/// multi-resolution TIFF. Returns the file name inside `background_dir`.
pub async fn copy_background(source: &Path, background_dir: &Path) -> Result<String> {
    let file_name = |path: &Path| {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::GenericError(format!("Invalid background path: {}", path.display())))
    };

    if let Some(retina) = retina_path(source)? {
        if tokio::fs::try_exists(&retina).await? {
            if *HAS_TIFFUTIL {
                let stem = source
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let output_name = format!("{stem}.tiff");
                let output = background_dir.join(&output_name);

                command::run(
                    "tiffutil",
                    [
                        OsStr::new("-cathidpicheck"),
                        source.as_os_str(),
                        retina.as_os_str(),
                        OsStr::new("-out"),
                        output.as_os_str(),
                    ],
                )
                .await?;
                log::debug!("Merged retina background into {}", output.display());
                return Ok(output_name);
            }
            log::warn!(
                "Found {} but tiffutil is unavailable, using the standard resolution background only",
                retina.display()
            );
        }
    }

    let name = file_name(source)?;
    fs::copy_file(source, &background_dir.join(&name)).await?;
    Ok(name)
}

/// Pixel dimensions of an image file.
pub async fn background_dimensions(path: &Path) -> Result<(u32, u32)> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || image::image_dimensions(&path).map_err(Error::from))
        .await
        .map_err(|e| Error::GenericError(format!("Image decoding task panicked: {e}")))?
}

/// Marks the volume root as having a custom icon (`.VolumeIcon.icns`).
pub async fn set_custom_icon_flag(mount_point: &Path) -> Result<()> {
    tool_detection::require(*HAS_SETFILE, "SetFile")?;
    command::run(
        "SetFile",
        [OsStr::new("-a"), OsStr::new("C"), mount_point.as_os_str()],
    )
    .await
    .map(drop)
}

/// Escape special characters for AppleScript string literals
///
/// Escapes backslashes and double quotes so names with special characters
/// neither break the script nor inject into it.
///
/// # Examples
/// ```
/// # fn escape_applescript_string(s: &str) -> String {
/// #     s.replace('\\', r"\\").replace('"', r#"\""#)
/// # }
/// assert_eq!(escape_applescript_string("My\"App"), "My\\\"App");
/// assert_eq!(escape_applescript_string("Path\\File"), "Path\\\\File");
/// ```
pub fn escape_applescript_string(s: &str) -> String {
    s.replace('\\', r"\\").replace('"', r#"\""#)
}

/// Builds the Finder script laying out the window of disk `disk_name`.
///
/// `background` is the file name inside [`BACKGROUND_DIR`]. The window takes
/// its size from the layout, else from `background_size`, else a default.
pub fn finder_script(
    disk_name: &str,
    layout: &DmgLayout,
    background: Option<&str>,
    background_size: Option<(u32, u32)>,
) -> String {
    let (x, y) = layout
        .window
        .position
        .map_or(DEFAULT_WINDOW_POSITION, |p| (p.x, p.y));
    let (width, height) = layout
        .window
        .size
        .map(|s| (s.width, s.height))
        .or(background_size)
        .unwrap_or(DEFAULT_WINDOW_SIZE);

    let mut appearance = Vec::new();
    if let Some(name) = background {
        appearance.push(format!(
            r#"set background picture of viewOptions to file "{BACKGROUND_DIR}:{}""#,
            escape_applescript_string(name)
        ));
    } else if let Some(color) = layout.background_color {
        appearance.push(format!(
            "set background color of viewOptions to {{{}, {}, {}}}",
            color.red, color.green, color.blue
        ));
    }
    appearance.extend(layout.contents.iter().map(|item| {
        format!(
            r#"set position of item "{}" of container window to {{{}, {}}}"#,
            escape_applescript_string(&item.name),
            item.x,
            item.y
        )
    }));
    let appearance = appearance.join("\n");

    format!(
        r#"
        tell application "Finder"
            tell disk "{disk}"
                open
                set current view of container window to icon view
                set toolbar visible of container window to false
                set statusbar visible of container window to false
                set bounds of container window to {{{x}, {y}, {right}, {bottom}}}
                set viewOptions to icon view options of container window
                set arrangement of viewOptions to not arranged
                set icon size of viewOptions to {icon_size}
                {appearance}
                close
                open
                update without registering applications
                delay 2
            end tell
        end tell
        "#,
        disk = escape_applescript_string(disk_name),
        right = i64::from(x) + i64::from(width),
        bottom = i64::from(y) + i64::from(height),
        icon_size = layout.icon_size,
    )
}

/// Runs a Finder script through `osascript`.
pub async fn apply_finder_layout(script: &str) -> Result<()> {
    tool_detection::require(*HAS_OSASCRIPT, "osascript")?;
    log::debug!("Running AppleScript to lay out the window...");
    command::run("osascript", [OsStr::new("-e"), OsStr::new(script)])
        .await
        .map(drop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::settings::{
        ContentItem, ContentKind, DEFAULT_ICON_SIZE, Filesystem, ImageFormat, Rgb16,
        WindowSettings, WindowSize,
    };

    fn layout() -> DmgLayout {
        DmgLayout {
            title: "Test Title".into(),
            icon: None,
            background: None,
            background_color: None,
            icon_size: DEFAULT_ICON_SIZE,
            window: WindowSettings::default(),
            format: ImageFormat::Udzo,
            filesystem: Filesystem::HfsPlus,
            contents: vec![
                ContentItem {
                    x: 448,
                    y: 344,
                    kind: ContentKind::Link,
                    path: "/Applications".into(),
                    name: "Applications".into(),
                },
                ContentItem {
                    x: 192,
                    y: 344,
                    kind: ContentKind::File,
                    path: "TestApp.app".into(),
                    name: "Test \"App\".app".into(),
                },
            ],
            code_sign: None,
        }
    }

    #[test]
    fn retina_variant_sits_next_to_original() {
        assert_eq!(
            retina_path(Path::new("/assets/TestBkg.png")).unwrap(),
            Some(PathBuf::from("/assets/TestBkg@2x.png"))
        );
        assert_eq!(retina_path(Path::new("/assets/TestBkg.PNG")).unwrap(), None);
        assert_eq!(retina_path(Path::new("/assets/background")).unwrap(), None);
    }

    #[tokio::test]
    async fn plain_background_is_copied_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("TestBkg.png");
        std::fs::write(&source, b"png").unwrap();
        let target = dir.path().join(BACKGROUND_DIR);

        let name = copy_background(&source, &target).await.unwrap();
        assert_eq!(name, "TestBkg.png");
        assert!(target.join("TestBkg.png").is_file());
    }

    #[tokio::test]
    async fn reads_png_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.png");
        image::RgbImage::new(7, 3).save(&path).unwrap();
        assert_eq!(background_dimensions(&path).await.unwrap(), (7, 3));
    }

    #[tokio::test]
    async fn undecodable_background_is_an_image_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.png");
        std::fs::write(&path, b"not a png").unwrap();
        assert!(matches!(
            background_dimensions(&path).await,
            Err(Error::Image(_))
        ));
    }

    #[test]
    fn window_follows_background_size() {
        let script = finder_script("Test Title", &layout(), Some("TestBkg.tiff"), Some((640, 400)));
        assert!(script.contains(r#"tell disk "Test Title""#));
        assert!(script.contains("set bounds of container window to {100, 100, 740, 500}"));
        assert!(script.contains(r#"set background picture of viewOptions to file ".background:TestBkg.tiff""#));
        assert!(script.contains("set icon size of viewOptions to 80"));
        assert!(script.contains(r#"set position of item "Applications" of container window to {448, 344}"#));
        assert!(script.contains(r#"item "Test \"App\".app""#));
    }

    #[test]
    fn explicit_window_and_color() {
        let mut layout = layout();
        layout.window.size = Some(WindowSize { width: 500, height: 300 });
        layout.background_color = Some(Rgb16 { red: 65535, green: 0, blue: 0 });

        let script = finder_script("Vol", &layout, None, None);
        assert!(script.contains("{100, 100, 600, 400}"));
        assert!(script.contains("set background color of viewOptions to {65535, 0, 0}"));
        assert!(!script.contains("background picture"));
    }

    #[test]
    fn default_window_without_background() {
        let script = finder_script("Vol", &layout(), None, None);
        assert!(script.contains("{100, 100, 740, 580}"));
    }

    #[test]
    fn each_icon_position_is_its_own_statement() {
        let script = finder_script("Vol", &layout(), None, None);
        let positions = script
            .lines()
            .filter(|line| line.trim_start().starts_with("set position of item"))
            .count();
        assert_eq!(positions, 2);
    }
}
