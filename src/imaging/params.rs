//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides what files to create) and the [`backend`](super::backend)
//! (which does the actual pixel work), so a mock backend can stand in for
//! tests without changing operation logic.

use super::color::Color;
use std::path::PathBuf;

/// Parameters for one icon file: resize, optionally flatten, write PNG.
#[derive(Debug, Clone, PartialEq)]
pub struct IconParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Opaque background to flatten transparency onto.
    pub background: Option<Color>,
}
