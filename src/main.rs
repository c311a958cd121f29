//! Kodegen Bundler DMG - build macOS disk images from a JSON specification.
//!
//! Exit code 0 guarantees the image exists at the output path.

use kodegen_bundler_dmg::cli;
use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    // Run CLI and get exit code
    let exit_code = match cli::run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    process::exit(exit_code);
}
