//! How values are turned into the bytes stored in a cache entry and back.
//! The bytes are written as is: no header, no magic number.

use std::error::Error;

use serde::Serialize;
use serde::de::DeserializeOwned;

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to encode value as {format}")]
    Encode {
        format: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("Failed to decode {format} data")]
    Decode {
        format: &'static str,
        #[source]
        source: BoxError,
    },
}

impl CodecError {
    pub fn encode(format: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Encode {
            format,
            source: source.into(),
        }
    }

    pub fn decode(format: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Decode {
            format,
            source: source.into(),
        }
    }
}

pub trait Codec {
    /// Short name of the format, used in error messages
    fn name(&self) -> &'static str;

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// The default codec. Structs are encoded as maps so adding a field to a cached type
/// gives a decode error instead of silently shifting values.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MessagePack;

impl Codec for MessagePack {
    fn name(&self) -> &'static str {
        "MessagePack"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        rmp_serde::to_vec_named(value).map_err(|e| CodecError::encode(self.name(), e))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        rmp_serde::from_slice(bytes).map_err(|e| CodecError::decode(self.name(), e))
    }
}

/// Useful when the cached files need to be inspected by hand
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Json {
    pub pretty: bool,
}

impl Json {
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Codec for Json {
    fn name(&self) -> &'static str {
        "JSON"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        let res = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        res.map_err(|e| CodecError::encode(self.name(), e))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::decode(self.name(), e))
    }
}
