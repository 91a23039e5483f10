#![cfg(target_os = "macos")]

pub use super::unix::*;

/// Prepended to a short library name.
pub const LIB_PREFIX: &str = "lib";
/// Appended to a short library name.
pub const LIB_SUFFIX: &str = ".dylib";
