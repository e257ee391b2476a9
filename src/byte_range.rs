//! Byte ranges.
//!
//! A [`ByteRange`] identifies a contiguous region of a byte sequence whose
//! total length may be unknown to the requester: everything, an interval, or
//! a suffix.
//! Stores use byte ranges for partial reads of chunk data, most notably when
//! reading a shard index without retrieving the whole shard.

use thiserror::Error;

/// A byte offset.
pub type ByteOffset = u64;

/// A byte length.
pub type ByteLength = u64;

/// A byte range.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ByteRange {
    /// All bytes.
    All,
    /// A byte interval with an offset and a length.
    Interval(ByteOffset, ByteLength),
    /// A length of bytes from the end.
    Suffix(ByteLength),
}

impl ByteRange {
    /// Return the inclusive start of the byte range. `size` is the length of the entire byte sequence.
    #[must_use]
    pub const fn start(&self, size: u64) -> u64 {
        match self {
            Self::All => 0,
            Self::Interval(start, _) => *start,
            Self::Suffix(length) => size.saturating_sub(*length),
        }
    }

    /// Return the exclusive end of the byte range. `size` is the length of the entire byte sequence.
    #[must_use]
    pub const fn end(&self, size: u64) -> u64 {
        match self {
            Self::All | Self::Suffix(_) => size,
            Self::Interval(start, length) => *start + *length,
        }
    }

    /// Return the length of the byte range. `size` is the length of the entire byte sequence.
    #[must_use]
    pub const fn length(&self, size: u64) -> u64 {
        match self {
            Self::All => size,
            Self::Interval(_, length) | Self::Suffix(length) => *length,
        }
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, ".."),
            Self::Interval(start, length) => write!(f, "{start}..{}", start + length),
            Self::Suffix(length) => write!(f, "-{length}.."),
        }
    }
}

/// An invalid byte range error.
#[derive(Copy, Clone, Debug, Error)]
#[error("invalid byte range {0}")]
pub struct InvalidByteRangeError(ByteRange);

fn validate_byte_ranges(byte_ranges: &[ByteRange], bytes_len: u64) -> Result<(), InvalidByteRangeError> {
    for byte_range in byte_ranges {
        let valid = match byte_range {
            ByteRange::All => true,
            ByteRange::Interval(offset, length) => offset + length <= bytes_len,
            ByteRange::Suffix(length) => *length <= bytes_len,
        };
        if !valid {
            return Err(InvalidByteRangeError(*byte_range));
        }
    }
    Ok(())
}

/// Extract byte ranges from `bytes`.
///
/// # Errors
///
/// Returns [`InvalidByteRangeError`] if any byte range exceeds the length of `bytes`.
pub fn extract_byte_ranges(
    bytes: &[u8],
    byte_ranges: &[ByteRange],
) -> Result<Vec<Vec<u8>>, InvalidByteRangeError> {
    validate_byte_ranges(byte_ranges, bytes.len() as u64)?;
    Ok(byte_ranges
        .iter()
        .map(|byte_range| {
            let start = usize::try_from(byte_range.start(bytes.len() as u64)).unwrap_or(usize::MAX);
            let end = usize::try_from(byte_range.end(bytes.len() as u64)).unwrap_or(usize::MAX);
            bytes[start..end].to_vec()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_range_bounds() {
        assert_eq!(ByteRange::All.start(10), 0);
        assert_eq!(ByteRange::All.end(10), 10);
        assert_eq!(ByteRange::Interval(2, 3).start(10), 2);
        assert_eq!(ByteRange::Interval(2, 3).end(10), 5);
        assert_eq!(ByteRange::Suffix(4).start(10), 6);
        assert_eq!(ByteRange::Suffix(4).end(10), 10);
        assert_eq!(ByteRange::Suffix(4).length(10), 4);
    }

    #[test]
    fn extract() {
        let bytes: Vec<u8> = (0..10).collect();
        let extracted = extract_byte_ranges(
            &bytes,
            &[
                ByteRange::All,
                ByteRange::Interval(1, 2),
                ByteRange::Suffix(3),
            ],
        )
        .unwrap();
        assert_eq!(extracted[0], bytes);
        assert_eq!(extracted[1], vec![1, 2]);
        assert_eq!(extracted[2], vec![7, 8, 9]);
    }

    #[test]
    fn extract_invalid() {
        let bytes: Vec<u8> = (0..10).collect();
        assert!(extract_byte_ranges(&bytes, &[ByteRange::Interval(8, 3)]).is_err());
        assert!(extract_byte_ranges(&bytes, &[ByteRange::Suffix(11)]).is_err());
    }
}
