//! External tool detection and availability checking.
//!
//! Image building shells out to macOS developer tools. Each lookup is done
//! once per process and cached.

use crate::bundler::{Error, Result};
use std::sync::LazyLock;

/// `hdiutil` creates, mounts and converts images. Required.
pub static HAS_HDIUTIL: LazyLock<bool> = LazyLock::new(|| is_available("hdiutil"));

/// `codesign` signs the final image.
pub static HAS_CODESIGN: LazyLock<bool> = LazyLock::new(|| is_available("codesign"));

/// `SetFile` marks the volume as having a custom icon.
pub static HAS_SETFILE: LazyLock<bool> = LazyLock::new(|| is_available("SetFile"));

/// `tiffutil` merges retina background pairs.
pub static HAS_TIFFUTIL: LazyLock<bool> = LazyLock::new(|| is_available("tiffutil"));

/// `bless` sets the folder Finder opens on mount.
pub static HAS_BLESS: LazyLock<bool> = LazyLock::new(|| is_available("bless"));

/// `osascript` drives Finder to lay out the window.
pub static HAS_OSASCRIPT: LazyLock<bool> = LazyLock::new(|| is_available("osascript"));

fn is_available(tool: &str) -> bool {
    match which::which(tool) {
        Ok(path) => {
            log::debug!("Found {tool} at: {}", path.display());
            true
        }
        Err(e) => {
            log::debug!("{tool} not found in PATH: {e}");
            false
        }
    }
}

/// Fails with an install hint when `tool` is missing.
pub fn require(available: bool, tool: &str) -> Result<()> {
    if available {
        return Ok(());
    }
    Err(Error::GenericError(format!(
        "`{tool}` not found in PATH. Install the Xcode command line tools with `xcode-select --install`"
    )))
}
