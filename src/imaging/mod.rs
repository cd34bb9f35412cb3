//! Image processing in pure Rust, with no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` (format sniffed from content) |
//! | **Resize → PNG** | Lanczos3 + `PngEncoder` |
//! | **Flatten** | integer alpha composite onto a [`Color`] |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
mod color;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::scaled_dimensions;
pub use color::{Color, ParseColorError};
pub use operations::{create_icon, get_dimensions, plan_icon};
pub use params::IconParams;
pub use rust_backend::RustBackend;
