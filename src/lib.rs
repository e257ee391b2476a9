//! A chunked, compressed, n-dimensional array storage engine for the
//! [Zarr V3](https://zarr.dev) storage format.
//!
//! Arrays are persisted as a collection of independently compressed chunks
//! addressed by their grid coordinates, organised into a hierarchy of
//! [groups](crate::group::Group) and [arrays](crate::array::Array) backed by
//! any abstract key-value [store](crate::storage).
//! The Zarr V2 flavour of array and group metadata is read and written for
//! interoperability with existing hierarchies.
//!
//! ## Features
//! All features are enabled by default.
//!  - Codecs: `blosc`, `crc32c`, `gzip`, `sharding`, `transpose`, `zstd`.
//!
//! ## Concurrency
//! The crate is async-native: every store operation and every array or group
//! operation that touches the store is `async`.
//! Operations spanning multiple chunks dispatch the per-chunk work
//! concurrently, bounded by
//! [`Config::chunk_concurrent_limit`](crate::config::Config).
//! Synchronous callers can use the `_blocking` variants of array and group
//! methods, which drive the futures on a process-wide event loop (see
//! [`bridge`]).

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]

pub mod array;
pub mod bridge;
pub mod byte_range;
pub mod config;
pub mod group;
pub mod indexer;
pub mod metadata;
pub mod node;
pub mod selection;
pub mod storage;

/// The Zarr storage specification version implemented natively.
pub const ZARR_FORMAT: usize = 3;
