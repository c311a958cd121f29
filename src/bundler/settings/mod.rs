//! Configuration structures for disk image builds.
//!
//! [`DmgSpecification`] describes the image (title, window, contents) and is
//! usually read from JSON. [`DmgOptions`] says where that specification comes
//! from and where the image goes, and is built with [`DmgOptionsBuilder`].

mod builder;
mod core;
mod legacy;
mod specification;

pub use builder::DmgOptionsBuilder;
pub use core::{DmgOptions, SpecificationSource};
pub use legacy::{LegacyIcons, LegacySpecification};
pub use specification::{
    CodeSignSettings, ContentEntry, ContentItem, ContentKind, DEFAULT_ICON_SIZE, DmgLayout,
    DmgSpecification, Filesystem, ImageFormat, MAX_TITLE_LENGTH, Rgb16, WindowPosition,
    WindowSettings, WindowSize, display_name,
};
