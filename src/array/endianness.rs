use derive_more::Display;
use serde::{Deserialize, Serialize};

/// The endianness of multi-byte elements in serialised chunk bytes.
#[derive(Serialize, Deserialize, Copy, Clone, Eq, PartialEq, Debug, Display)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    /// Least significant byte first.
    #[display("little")]
    Little,
    /// Most significant byte first.
    #[display("big")]
    Big,
}

/// The endianness of the machine this crate is compiled for.
pub const NATIVE_ENDIAN: Endianness = if cfg!(target_endian = "big") {
    Endianness::Big
} else {
    Endianness::Little
};

impl Endianness {
    /// Returns true if the endianness matches the native endianness.
    #[must_use]
    pub fn is_native(self) -> bool {
        self == NATIVE_ENDIAN
    }
}
