//! Helpers shared by the build steps.

pub mod command;
pub mod fs;
