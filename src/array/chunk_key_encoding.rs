//! Chunk key encodings.
//!
//! A chunk key encoding maps chunk grid coordinates to a store key suffix.
//! The `default` encoding produces `c/0/1` style keys and the `v2` encoding
//! produces `0.1` style keys; both have a configurable separator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    metadata::Metadata,
    storage::StoreKey,
};

/// The separator between the dimensions of a chunk key.
#[derive(Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Debug)]
pub enum ChunkKeySeparator {
    /// The `/` separator.
    #[serde(rename = "/")]
    Slash,
    /// The `.` separator.
    #[serde(rename = ".")]
    Dot,
}

impl std::fmt::Display for ChunkKeySeparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slash => write!(f, "/"),
            Self::Dot => write!(f, "."),
        }
    }
}

/// An unsupported chunk key encoding error.
#[derive(Debug, Error)]
#[error("chunk key encoding {0} is not supported, configuration {1:?}")]
pub struct UnsupportedChunkKeyEncodingError(String, Option<crate::metadata::MetadataConfiguration>);

#[derive(Serialize, Deserialize, Debug)]
struct SeparatorConfiguration {
    separator: ChunkKeySeparator,
}

/// A chunk key encoding.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ChunkKeyEncoding {
    /// The `default` encoding: `c` followed by the separator-joined chunk coordinates.
    ///
    /// A 0-dimensional chunk grid uses the key `c`.
    Default {
        /// The separator between dimensions.
        separator: ChunkKeySeparator,
    },
    /// The `v2` encoding: the separator-joined chunk coordinates.
    ///
    /// A 0-dimensional chunk grid uses the key `0`.
    V2 {
        /// The separator between dimensions.
        separator: ChunkKeySeparator,
    },
}

impl Default for ChunkKeyEncoding {
    fn default() -> Self {
        Self::Default {
            separator: ChunkKeySeparator::Slash,
        }
    }
}

impl ChunkKeyEncoding {
    /// Create a chunk key encoding from metadata.
    ///
    /// # Errors
    ///
    /// Returns an [`UnsupportedChunkKeyEncodingError`] if the metadata does
    /// not name a known chunk key encoding with a valid configuration.
    pub fn from_metadata(metadata: &Metadata) -> Result<Self, UnsupportedChunkKeyEncodingError> {
        let err = || {
            UnsupportedChunkKeyEncodingError(
                metadata.name().to_string(),
                metadata.configuration().cloned(),
            )
        };
        match metadata.name() {
            "default" => {
                if metadata.configuration_is_none_or_empty() {
                    Ok(Self::default())
                } else {
                    let configuration: SeparatorConfiguration =
                        metadata.to_configuration().map_err(|_| err())?;
                    Ok(Self::Default {
                        separator: configuration.separator,
                    })
                }
            }
            "v2" => {
                if metadata.configuration_is_none_or_empty() {
                    Ok(Self::V2 {
                        separator: ChunkKeySeparator::Dot,
                    })
                } else {
                    let configuration: SeparatorConfiguration =
                        metadata.to_configuration().map_err(|_| err())?;
                    Ok(Self::V2 {
                        separator: configuration.separator,
                    })
                }
            }
            _ => Err(err()),
        }
    }

    /// The metadata of the chunk key encoding.
    ///
    /// # Panics
    ///
    /// Panics if the configuration fails to serialise, which is not expected.
    #[must_use]
    pub fn metadata(&self) -> Metadata {
        let (name, separator) = match self {
            Self::Default { separator } => ("default", separator),
            Self::V2 { separator } => ("v2", separator),
        };
        Metadata::new_with_serializable_configuration(
            name,
            &SeparatorConfiguration {
                separator: *separator,
            },
        )
        .unwrap()
    }

    /// Encode chunk grid coordinates into a store key suffix.
    #[must_use]
    pub fn encode(&self, chunk_indices: &[u64]) -> StoreKey {
        let key = match self {
            Self::Default { separator } => {
                let mut key = "c".to_string();
                for index in chunk_indices {
                    key.push_str(&separator.to_string());
                    key.push_str(&index.to_string());
                }
                key
            }
            Self::V2 { separator } => {
                if chunk_indices.is_empty() {
                    "0".to_string()
                } else {
                    chunk_indices
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<String>>()
                        .join(&separator.to_string())
                }
            }
        };
        unsafe { StoreKey::new_unchecked(key) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_slash() {
        let encoding = ChunkKeyEncoding::default();
        assert_eq!(encoding.encode(&[1, 23, 45]).as_str(), "c/1/23/45");
        assert_eq!(encoding.encode(&[]).as_str(), "c");
    }

    #[test]
    fn default_dot() {
        let encoding = ChunkKeyEncoding::Default {
            separator: ChunkKeySeparator::Dot,
        };
        assert_eq!(encoding.encode(&[1, 23]).as_str(), "c.1.23");
    }

    #[test]
    fn v2_dot() {
        let encoding = ChunkKeyEncoding::V2 {
            separator: ChunkKeySeparator::Dot,
        };
        assert_eq!(encoding.encode(&[1, 23]).as_str(), "1.23");
        assert_eq!(encoding.encode(&[]).as_str(), "0");
    }

    #[test]
    fn from_metadata_roundtrip() {
        let metadata: Metadata =
            serde_json::from_str(r#"{"name":"default","configuration":{"separator":"/"}}"#)
                .unwrap();
        let encoding = ChunkKeyEncoding::from_metadata(&metadata).unwrap();
        assert_eq!(encoding, ChunkKeyEncoding::default());
        assert_eq!(
            ChunkKeyEncoding::from_metadata(&encoding.metadata()).unwrap(),
            encoding
        );
        assert!(ChunkKeyEncoding::from_metadata(&Metadata::new("unknown")).is_err());
    }
}
