pub mod asset;
pub mod bbox;
pub mod format;
pub mod image_stack;
pub mod metadata;
pub mod params;
pub mod probe;
pub mod procedural;
pub mod range;
pub mod raw;
pub mod scene;
pub mod source;
pub mod transfer;
