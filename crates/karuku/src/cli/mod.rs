//! Command implementations.

pub mod config;
pub mod exif_plan;
pub mod formats;
pub mod resize;
