//! Versioned bundle manifests.
//!
//! A [`Manifest`] is an immutable snapshot of every bundle known at one
//! resource version: per-bundle hash/size/checksum/tags, the asset path to
//! bundle map, and the bundle dependency graph. Sessions hold manifests
//! behind `Arc` and swap them wholesale; nothing mutates one after `build`.

mod types;
mod wire;

#[cfg(test)]
mod tests;

pub use types::{BundleRecord, Manifest, ManifestBuilder, ManifestError};
pub use wire::{from_json, load_from_path, save_to_path, to_json};
