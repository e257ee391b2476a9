//! Global configuration options.

use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Global configuration options for the `gridstore` crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// ## Validate Checksums
/// > default: [`true`]
///
/// If enabled, checksum codecs (e.g. `crc32c`) validate that decoded data matches stored checksums.
/// Checksum codecs may skip validation when partial decoding regardless of this option.
///
/// ## Chunk Concurrent Limit
/// > default: `0` (unbounded)
///
/// Bounds the number of in-flight chunk operations for array operations involving multiple chunks.
/// A limit of zero leaves concurrency unconstrained within a single operation.
///
/// ## Erase Empty Chunks
/// > default: [`false`]
///
/// If enabled, writing a chunk whose elements all equal the fill value erases the chunk key
/// instead of storing encoded fill values.
/// A missing chunk and a stored all-fill-value chunk are indistinguishable on read.
#[derive(Debug)]
pub struct Config {
    validate_checksums: bool,
    chunk_concurrent_limit: usize,
    erase_empty_chunks: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            validate_checksums: true,
            chunk_concurrent_limit: 0,
            erase_empty_chunks: false,
        }
    }
}

impl Config {
    /// Get the [validate checksums](#validate-checksums) configuration.
    #[must_use]
    pub fn validate_checksums(&self) -> bool {
        self.validate_checksums
    }

    /// Set the [validate checksums](#validate-checksums) configuration.
    pub fn set_validate_checksums(&mut self, validate_checksums: bool) {
        self.validate_checksums = validate_checksums;
    }

    /// Get the [chunk concurrent limit](#chunk-concurrent-limit) configuration.
    #[must_use]
    pub fn chunk_concurrent_limit(&self) -> usize {
        self.chunk_concurrent_limit
    }

    /// Set the [chunk concurrent limit](#chunk-concurrent-limit) configuration.
    pub fn set_chunk_concurrent_limit(&mut self, chunk_concurrent_limit: usize) {
        self.chunk_concurrent_limit = chunk_concurrent_limit;
    }

    /// Get the [erase empty chunks](#erase-empty-chunks) configuration.
    #[must_use]
    pub fn erase_empty_chunks(&self) -> bool {
        self.erase_empty_chunks
    }

    /// Set the [erase empty chunks](#erase-empty-chunks) configuration.
    pub fn set_erase_empty_chunks(&mut self, erase_empty_chunks: bool) {
        self.erase_empty_chunks = erase_empty_chunks;
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global configuration.
///
/// # Panics
/// Panics if the underlying lock has been poisoned.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .read()
        .unwrap()
}

/// Returns a mutable reference to the global configuration.
///
/// # Panics
/// Panics if the underlying lock has been poisoned.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .write()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_chunk_concurrent_limit() {
        assert_eq!(global_config().chunk_concurrent_limit(), 0);
        global_config_mut().set_chunk_concurrent_limit(8);
        assert_eq!(global_config().chunk_concurrent_limit(), 8);
        global_config_mut().set_chunk_concurrent_limit(0);
    }
}
