//! Project manifest (`fer.ret`) and lockfile handling for the Fer toolchain.
//!
//! This crate is deliberately independent of [`fer_core`]'s analysis
//! pipeline: it only needs to know how to classify an import path as local,
//! builtin, or remote, and it reuses [`fer_core::import`] for that.

pub mod lockfile;
pub mod manifest;

pub use lockfile::{Lockfile, LockEntry, LockfileError};
pub use manifest::{Manifest, ManifestError, Value};
