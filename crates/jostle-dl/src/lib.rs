//! A wrapper around the platform dynamic loader for Jostle.
//!
//! [`Library`] owns a handle returned by `dlopen(3)` and closes it on
//! drop. Symbols resolved through [`Library::symbol`] and
//! [`Library::get`] are only valid while the [`Library`] is alive.
//!
//! # Operating System Support
//!
//! - Linux
//! - MacOS

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![deny(
    clippy::alloc_instead_of_core,
    clippy::expect_used,
    clippy::implicit_saturating_sub,
    clippy::indexing_slicing,
    clippy::missing_panics_doc,
    clippy::ptr_as_ptr,
    clippy::string_slice,
    clippy::transmute_ptr_to_ptr,
    clippy::undocumented_unsafe_blocks,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    missing_docs
)]

mod api;
mod error;
mod sys;

pub use api::*;
pub use error::Error;
