//! Single-file key-value storage engine backing the artifact cache.
//!
//! A store lives at `<location>/<flavor>.kv`. Writes are buffered in memory
//! and made durable by [`KeyValueStore::commit`], which replaces the previous
//! image with an atomic rename. A reader therefore always observes one
//! complete generation, even when several processes commit concurrently or a
//! writer dies mid-commit.

#![warn(missing_docs)]

pub mod error;
pub mod image;
mod registry;
pub mod store;

pub use error::KvStoreError;
pub use image::StoreImage;
pub use store::{is_valid_flavor, KeyValueStore, StoreConfig};
