//! macOS disk images.

pub mod dmg;
pub mod sign;
