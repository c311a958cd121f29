//! Code signing of finished images.

use crate::bundler::{
    builder::tool_detection::{self, HAS_CODESIGN},
    error::Result,
    settings::CodeSignSettings,
    utils::command,
};
use std::ffi::OsStr;
use std::path::Path;

/// Arguments passed to `codesign` for `image`.
fn codesign_args<'a>(image: &'a Path, settings: &'a CodeSignSettings) -> Vec<&'a OsStr> {
    let mut args = vec![
        OsStr::new("--verbose"),
        OsStr::new("--sign"),
        OsStr::new(&settings.signing_identity),
    ];
    if let Some(identifier) = &settings.identifier {
        args.extend([OsStr::new("--identifier"), OsStr::new(identifier)]);
    }
    args.push(image.as_os_str());
    args
}

/// Signs `image` with the configured identity.
///
/// An identity of `-` produces an ad-hoc signature.
pub async fn sign_image(image: &Path, settings: &CodeSignSettings) -> Result<()> {
    tool_detection::require(*HAS_CODESIGN, "codesign")?;
    log::info!(
        "Signing {} with identity {}",
        image.display(),
        settings.signing_identity
    );
    command::run("codesign", codesign_args(image, settings))
        .await
        .map(drop)
}
