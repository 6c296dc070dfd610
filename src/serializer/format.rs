//! Body formats for encoded messages.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::SerializationError;

/// How a message body is encoded inside a wire frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Human-readable JSON, interoperable with non-Rust consumers.
    #[default]
    Json,
    /// Compact binary encoding.
    Bitcode,
}

impl Format {
    pub fn encode<T: Serialize + ?Sized>(
        self,
        message_type: &str,
        value: &T,
    ) -> Result<Vec<u8>, SerializationError> {
        let result = match self {
            Format::Json => serde_json::to_vec(value).map_err(|e| e.to_string()),
            Format::Bitcode => bitcode::serialize(value).map_err(|e| e.to_string()),
        };
        result.map_err(|reason| SerializationError::Encode {
            message_type: message_type.to_string(),
            reason,
        })
    }

    pub fn decode<T: DeserializeOwned>(
        self,
        message_type: &str,
        bytes: &[u8],
    ) -> Result<T, SerializationError> {
        let result = match self {
            Format::Json => serde_json::from_slice(bytes).map_err(|e| e.to_string()),
            Format::Bitcode => bitcode::deserialize(bytes).map_err(|e| e.to_string()),
        };
        result.map_err(|reason| SerializationError::Decode {
            message_type: message_type.to_string(),
            reason,
        })
    }
}
