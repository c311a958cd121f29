//! Command line interface for the disk image builder.
//!
//! Parses arguments, runs the build with a line of progress per step and
//! reports the finished image or the failure.

mod args;
mod output;

pub use args::{Args, RuntimeConfig};
pub use output::OutputManager;

use crate::bundler::{Bundler, DmgOptionsBuilder, Error};
use crate::error::{BundlerError, CliError, Result};

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    let config = RuntimeConfig::from(&args);
    let output = *config.output();

    let options = DmgOptionsBuilder::new()
        .source(&args.json_path)
        .target(&args.dmg_path)
        .build()?;
    let bundler = Bundler::new(options);

    let handle = bundler.start(move |event| {
        if let Err(e) = output.progress(event) {
            log::debug!("Failed to print progress: {e}");
        }
    })?;

    // Ctrl-C fails the build at the next step boundary so mounted images
    // still get detached.
    let suspender = handle.suspender();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            suspender.abort(Error::Aborted("interrupted".into()));
        }
    });
    let result = bundler.complete(&handle).await;
    interrupt.abort();

    match result {
        Ok(artifact) => {
            output.success("Your image is ready:")?;
            output.indent(&artifact.path.display().to_string())?;
            output.verbose(&format!("  {} bytes", artifact.size))?;
            output.indent(&format!("SHA-256: {}", artifact.checksum))?;
            Ok(0)
        }
        Err(err) => {
            report(&output, &BundlerError::from(err))?;
            Ok(1)
        }
    }
}

/// Prints a build failure, with suggestions in verbose mode.
fn report(output: &OutputManager, err: &BundlerError) -> std::io::Result<()> {
    output.error(&err.to_string())?;
    if output.is_verbose() {
        for suggestion in err.recovery_suggestions() {
            output.indent(&suggestion)?;
        }
    }
    Ok(())
}
