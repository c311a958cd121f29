//! JSON specification of a disk image and its validation.
//!
//! [`DmgSpecification`] mirrors the JSON file as written, with every field
//! optional. [`DmgSpecification::validate`] reports all problems at once and
//! produces a [`DmgLayout`] whose fields are guaranteed present.

use crate::bundler::{Error, Result};
use serde::{Deserialize, Serialize};

/// Longest volume name hdiutil accepts for HFS+ volumes.
pub const MAX_TITLE_LENGTH: usize = 27;

/// Icon size used when the specification leaves it out.
pub const DEFAULT_ICON_SIZE: u32 = 80;

/// Disk image format of the final image (`hdiutil convert -format`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    /// Read/write.
    #[serde(rename = "UDRW")]
    Udrw,
    /// Read-only.
    #[serde(rename = "UDRO")]
    Udro,
    /// ADC-compressed.
    #[serde(rename = "UDCO")]
    Udco,
    /// zlib-compressed.
    #[default]
    #[serde(rename = "UDZO")]
    Udzo,
    /// LZFSE-compressed.
    #[serde(rename = "ULFO")]
    Ulfo,
    /// LZMA-compressed.
    #[serde(rename = "ULMO")]
    Ulmo,
    /// bzip2-compressed.
    #[serde(rename = "UDBZ")]
    Udbz,
}

impl ImageFormat {
    /// Name passed to hdiutil.
    pub fn as_str(self) -> &'static str {
        match self {
            ImageFormat::Udrw => "UDRW",
            ImageFormat::Udro => "UDRO",
            ImageFormat::Udco => "UDCO",
            ImageFormat::Udzo => "UDZO",
            ImageFormat::Ulfo => "ULFO",
            ImageFormat::Ulmo => "ULMO",
            ImageFormat::Udbz => "UDBZ",
        }
    }
}

/// Filesystem of the temporary image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filesystem {
    /// Mac OS Extended.
    #[default]
    #[serde(rename = "HFS+")]
    HfsPlus,
    /// Apple File System.
    #[serde(rename = "APFS")]
    Apfs,
}

impl Filesystem {
    /// Name passed to `hdiutil create -fs`.
    pub fn as_str(self) -> &'static str {
        match self {
            Filesystem::HfsPlus => "HFS+",
            Filesystem::Apfs => "APFS",
        }
    }
}

/// What a content entry places in the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Copy a file or bundle into the image.
    File,
    /// Create a symbolic link, typically to `/Applications`.
    Link,
    /// Only position an item that already exists on the volume.
    Position,
}

/// One entry of `contents` as written.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentEntry {
    /// Horizontal icon position.
    pub x: Option<i32>,
    /// Vertical icon position.
    pub y: Option<i32>,
    /// Entry type.
    #[serde(rename = "type")]
    pub kind: Option<ContentKind>,
    /// Source path, or link target for links.
    pub path: Option<String>,
    /// Name on the volume. Defaults to the last component of `path`.
    pub name: Option<String>,
}

/// Point in screen coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPosition {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
}

/// Window dimensions in points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

/// Finder window placement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSettings {
    /// Top-left corner. Default: (100, 100).
    pub position: Option<WindowPosition>,
    /// Size. Default: background image size, else 640x480.
    pub size: Option<WindowSize>,
}

/// Code signing of the final image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CodeSignSettings {
    /// Identity passed to `codesign --sign`.
    pub signing_identity: String,
    /// Optional `--identifier`.
    #[serde(default)]
    pub identifier: Option<String>,
}

/// Disk image specification as read from JSON.
///
/// ```json
/// {
///   "title": "Test Title",
///   "icon": "TestIcon.icns",
///   "background": "TestBkg.png",
///   "contents": [
///     { "x": 448, "y": 344, "type": "link", "path": "/Applications" },
///     { "x": 192, "y": 344, "type": "file", "path": "TestApp.app" }
///   ]
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DmgSpecification {
    /// Volume name.
    pub title: Option<String>,
    /// Volume icon (`.icns`).
    pub icon: Option<String>,
    /// Window background image. A sibling `name@2x.ext` adds a retina variant.
    pub background: Option<String>,
    /// Window background color as `#rgb` or `#rrggbb`.
    pub background_color: Option<String>,
    /// Icon size in points.
    pub icon_size: Option<u32>,
    /// Window placement.
    pub window: Option<WindowSettings>,
    /// Final image format.
    pub format: Option<ImageFormat>,
    /// Filesystem of the image.
    pub filesystem: Option<Filesystem>,
    /// Items in the window.
    pub contents: Option<Vec<ContentEntry>>,
    /// Signing of the final image.
    pub code_sign: Option<CodeSignSettings>,
}

/// 16-bit-per-channel color as AppleScript expects it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb16 {
    /// Red.
    pub red: u16,
    /// Green.
    pub green: u16,
    /// Blue.
    pub blue: u16,
}

impl Rgb16 {
    /// Parses `#rgb` or `#rrggbb`.
    pub fn parse_hex(value: &str) -> Option<Self> {
        let hex = value.strip_prefix('#')?;
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|c| u16::from(c) * 257);
        match hex.len() {
            3 => {
                let mut digits = hex.chars().map(|c| c.to_string().repeat(2));
                Some(Self {
                    red: channel(&digits.next()?)?,
                    green: channel(&digits.next()?)?,
                    blue: channel(&digits.next()?)?,
                })
            }
            6 if hex.is_ascii() => Some(Self {
                red: channel(&hex[0..2])?,
                green: channel(&hex[2..4])?,
                blue: channel(&hex[4..6])?,
            }),
            _ => None,
        }
    }
}

/// A validated content entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentItem {
    /// Horizontal icon position.
    pub x: i32,
    /// Vertical icon position.
    pub y: i32,
    /// Entry type.
    pub kind: ContentKind,
    /// Source path, or link target.
    pub path: String,
    /// Name on the volume.
    pub name: String,
}

/// A specification that passed validation.
#[derive(Clone, Debug, PartialEq)]
pub struct DmgLayout {
    /// Volume name.
    pub title: String,
    /// Volume icon.
    pub icon: Option<String>,
    /// Background image.
    pub background: Option<String>,
    /// Background color.
    pub background_color: Option<Rgb16>,
    /// Icon size.
    pub icon_size: u32,
    /// Window placement.
    pub window: WindowSettings,
    /// Final image format.
    pub format: ImageFormat,
    /// Filesystem.
    pub filesystem: Filesystem,
    /// Items in the window.
    pub contents: Vec<ContentItem>,
    /// Signing.
    pub code_sign: Option<CodeSignSettings>,
}

impl DmgLayout {
    /// Entries of one kind, in specification order.
    pub fn entries(&self, kind: ContentKind) -> impl Iterator<Item = &ContentItem> {
        self.contents.iter().filter(move |item| item.kind == kind)
    }
}

/// Last path component, used as the default name on the volume.
pub fn display_name(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

impl DmgSpecification {
    /// Parses a specification, converting the legacy shape when present.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        if value.get("icons").is_some() {
            log::debug!("Converting legacy JSON specification");
            let legacy: super::legacy::LegacySpecification = serde_json::from_value(value)?;
            Ok(legacy.into())
        } else {
            Ok(serde_json::from_value(value)?)
        }
    }

    /// Checks required fields and consistency, reporting every problem.
    pub fn validate(self) -> Result<DmgLayout> {
        let mut missing = Vec::new();
        let mut invalid = Vec::new();

        let title = self.title.filter(|t| !t.is_empty());
        match &title {
            None => missing.push("title".to_string()),
            Some(t) if t.chars().count() > MAX_TITLE_LENGTH => invalid.push(format!(
                "`title` must be at most {MAX_TITLE_LENGTH} characters"
            )),
            Some(_) => {}
        }

        if self.background.is_some() && self.background_color.is_some() {
            invalid.push("`background` and `background-color` are mutually exclusive".to_string());
        }
        let background_color = match &self.background_color {
            Some(color) => {
                let parsed = Rgb16::parse_hex(color);
                if parsed.is_none() {
                    invalid.push(format!("`background-color` is not a hex color: {color}"));
                }
                parsed
            }
            None => None,
        };

        if self.icon_size == Some(0) {
            invalid.push("`icon-size` must be positive".to_string());
        }

        let mut contents = Vec::new();
        match self.contents {
            None => missing.push("contents".to_string()),
            Some(entries) => {
                for (i, entry) in entries.into_iter().enumerate() {
                    let mut check = |present: bool, key: &str| {
                        if !present {
                            missing.push(format!("contents.{i}.{key}"));
                        }
                        present
                    };
                    let complete = [
                        check(entry.x.is_some(), "x"),
                        check(entry.y.is_some(), "y"),
                        check(entry.kind.is_some(), "type"),
                        check(entry.path.is_some(), "path"),
                    ]
                    .iter()
                    .all(|&ok| ok);

                    if let (true, Some(x), Some(y), Some(kind), Some(path)) =
                        (complete, entry.x, entry.y, entry.kind, entry.path)
                    {
                        let name = entry.name.unwrap_or_else(|| display_name(&path));
                        contents.push(ContentItem { x, y, kind, path, name });
                    }
                }
            }
        }

        if !missing.is_empty() {
            return Err(Error::Validation(format!(
                "`{}` missing from JSON Specification",
                missing.join("`,`")
            )));
        }
        if !invalid.is_empty() {
            return Err(Error::Validation(invalid.join("; ")));
        }

        Ok(DmgLayout {
            title: title.unwrap_or_default(),
            icon: self.icon,
            background: self.background,
            background_color,
            icon_size: self.icon_size.unwrap_or(DEFAULT_ICON_SIZE),
            window: self.window.unwrap_or_default(),
            format: self.format.unwrap_or_default(),
            filesystem: self.filesystem.unwrap_or_default(),
            contents,
            code_sign: self.code_sign,
        })
    }
}
