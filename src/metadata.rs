//! Metadata structures and serialisation.
//!
//! The [`Metadata`] structure represents the `{"name": …, "configuration":
//! {…}}` envelope used throughout Zarr V3 array metadata for data types,
//! chunk key encodings, and codecs.
//! [`ArrayMetadata`] and [`GroupMetadata`] are version-tagged documents
//! covering the [V3](v3) flavour (the native format) and the legacy
//! [V2](v2) flavour read and written for interoperability.
//!
//! Unknown top-level fields in array and group metadata are captured in
//! [`AdditionalFields`] and survive a parse/serialise round trip.

pub mod v2;
pub mod v3;

pub use v2::{ArrayMetadataV2, GroupMetadataV2};
pub use v3::{ArrayMetadataV3, GroupMetadataV3};

use derive_more::From;
use serde::{de::DeserializeOwned, ser::SerializeMap, Deserialize, Serialize};
use thiserror::Error;

/// An ND index to an element in an array.
pub type ArrayIndices = Vec<u64>;

/// The shape of an array.
pub type ArrayShape = Vec<u64>;

/// Configuration metadata: a JSON object.
pub type MetadataConfiguration = serde_json::Map<String, serde_json::Value>;

/// Metadata with a name and optional configuration.
///
/// Deserialises from a JSON string or a name/configuration map:
/// ```json
/// "bytes"
/// ```
/// or
/// ```json
/// { "name": "bytes", "configuration": { "endian": "little" } }
/// ```
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Metadata {
    name: String,
    configuration: Option<MetadataConfiguration>,
}

impl core::fmt::Display for Metadata {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(configuration) = &self.configuration {
            write!(f, "{} {configuration:?}", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

impl serde::Serialize for Metadata {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        if let Some(configuration) = &self.configuration {
            let mut s = s.serialize_map(Some(2))?;
            s.serialize_entry("name", &self.name)?;
            s.serialize_entry("configuration", configuration)?;
            s.end()
        } else {
            s.serialize_str(self.name.as_str())
        }
    }
}

impl<'de> serde::Deserialize<'de> for Metadata {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct MetadataNameConfiguration {
            name: String,
            #[serde(default)]
            configuration: Option<MetadataConfiguration>,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum MetadataIntermediate {
            Name(String),
            NameConfiguration(MetadataNameConfiguration),
        }

        let metadata = MetadataIntermediate::deserialize(d)?;
        match metadata {
            MetadataIntermediate::Name(name) => Ok(Self {
                name,
                configuration: None,
            }),
            MetadataIntermediate::NameConfiguration(metadata) => Ok(Self {
                name: metadata.name,
                configuration: metadata.configuration,
            }),
        }
    }
}

impl Metadata {
    /// Create metadata from `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            configuration: None,
        }
    }

    /// Create metadata from `name` and `configuration`.
    #[must_use]
    pub fn new_with_configuration(name: &str, configuration: MetadataConfiguration) -> Self {
        Self {
            name: name.into(),
            configuration: Some(configuration),
        }
    }

    /// Convert a serialisable configuration to [`Metadata`].
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if `configuration` does not serialise to a JSON object.
    pub fn new_with_serializable_configuration<TConfiguration: serde::Serialize>(
        name: &str,
        configuration: &TConfiguration,
    ) -> Result<Self, serde_json::Error> {
        let configuration = serde_json::to_value(configuration)?;
        if let serde_json::Value::Object(configuration) = configuration {
            Ok(Self::new_with_configuration(name, configuration))
        } else {
            Err(serde::ser::Error::custom(
                "the configuration is not a JSON object",
            ))
        }
    }

    /// Try to convert the configuration of [`Metadata`] to `TConfiguration`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationInvalidError`] if the metadata cannot be converted.
    pub fn to_configuration<TConfiguration: DeserializeOwned>(
        &self,
    ) -> Result<TConfiguration, ConfigurationInvalidError> {
        let configuration = self.configuration.clone().unwrap_or_default();
        serde_json::from_value(serde_json::Value::Object(configuration))
            .map_err(|_| ConfigurationInvalidError::new(&self.name, self.configuration.clone()))
    }

    /// Returns the metadata name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the metadata configuration.
    #[must_use]
    pub const fn configuration(&self) -> Option<&MetadataConfiguration> {
        self.configuration.as_ref()
    }

    /// Returns true if the configuration is none or an empty object.
    #[must_use]
    pub fn configuration_is_none_or_empty(&self) -> bool {
        self.configuration
            .as_ref()
            .map_or(true, serde_json::Map::is_empty)
    }
}

impl TryFrom<&str> for Metadata {
    type Error = serde_json::Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        serde_json::from_str(s)
    }
}

/// An invalid configuration error.
#[derive(Debug, Error, From)]
#[error("{name} is unsupported, configuration: {configuration:?}")]
pub struct ConfigurationInvalidError {
    name: String,
    configuration: Option<MetadataConfiguration>,
}

impl ConfigurationInvalidError {
    /// Create a new invalid configuration error.
    #[must_use]
    pub fn new(name: &str, configuration: Option<MetadataConfiguration>) -> Self {
        Self {
            name: name.to_string(),
            configuration,
        }
    }

    /// Return the name of the invalid configuration.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Additional fields in array or group metadata.
///
/// Additional fields are preserved on a parse/serialise round trip for
/// forward compatibility.
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Default, From)]
pub struct AdditionalFields(serde_json::Map<String, serde_json::Value>);

impl AdditionalFields {
    /// Return the underlying map.
    #[must_use]
    pub const fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }

    /// Returns true if there are no additional fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Array metadata, either of the native V3 flavour or the legacy V2 flavour.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(untagged)]
pub enum ArrayMetadata {
    /// Zarr V3.
    V3(ArrayMetadataV3),
    /// Zarr V2.
    V2(ArrayMetadataV2),
}

impl ArrayMetadata {
    /// Serialise to a pretty JSON string.
    ///
    /// # Panics
    ///
    /// Panics if serialisation fails, which is not expected for valid metadata.
    #[must_use]
    pub fn to_string_pretty(&self) -> String {
        serde_json::to_string_pretty(self).expect("array metadata is serialisable")
    }
}

/// Group metadata, either of the native V3 flavour or the legacy V2 flavour.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(untagged)]
pub enum GroupMetadata {
    /// Zarr V3.
    V3(GroupMetadataV3),
    /// Zarr V2.
    V2(GroupMetadataV2),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_name_only() {
        let metadata: Metadata = serde_json::from_str(r#""bytes""#).unwrap();
        assert_eq!(metadata.name(), "bytes");
        assert!(metadata.configuration_is_none_or_empty());
        assert_eq!(serde_json::to_string(&metadata).unwrap(), r#""bytes""#);
    }

    #[test]
    fn metadata_with_configuration() {
        let metadata: Metadata =
            serde_json::from_str(r#"{"name":"gzip","configuration":{"level":5}}"#).unwrap();
        assert_eq!(metadata.name(), "gzip");
        assert!(metadata.configuration().is_some());
        let roundtrip = serde_json::to_string(&metadata).unwrap();
        assert_eq!(
            serde_json::from_str::<Metadata>(&roundtrip).unwrap(),
            metadata
        );
    }
}
