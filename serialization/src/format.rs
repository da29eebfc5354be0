//! Encoding text archive documents to bytes and back.
//!
//! JSON is always available. RON is behind the `ron` feature.

use crate::error::ArchiveError;
use crate::node::Node;

/// Supported text document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    /// Compact JSON.
    #[default]
    Json,
    /// Indented JSON.
    JsonPretty,
    /// RON (Rusty Object Notation).
    #[cfg(feature = "ron")]
    Ron,
}

/// Encode a text archive document.
pub fn encode(document: &Node, format: TextFormat) -> Result<Vec<u8>, ArchiveError> {
    match format {
        TextFormat::Json => {
            serde_json::to_vec(document).map_err(|e| ArchiveError::Format(e.to_string()))
        }
        TextFormat::JsonPretty => {
            serde_json::to_vec_pretty(document).map_err(|e| ArchiveError::Format(e.to_string()))
        }
        #[cfg(feature = "ron")]
        TextFormat::Ron => ron::ser::to_string_pretty(document, ron::ser::PrettyConfig::default())
            .map(String::into_bytes)
            .map_err(|e| ArchiveError::Format(e.to_string())),
    }
}

/// Decode a text archive document.
pub fn decode(bytes: &[u8], format: TextFormat) -> Result<Node, ArchiveError> {
    match format {
        TextFormat::Json | TextFormat::JsonPretty => {
            serde_json::from_slice(bytes).map_err(|e| ArchiveError::Format(e.to_string()))
        }
        #[cfg(feature = "ron")]
        TextFormat::Ron => {
            let s = std::str::from_utf8(bytes).map_err(|e| ArchiveError::Format(e.to_string()))?;
            ron::from_str(s).map_err(|e| ArchiveError::Format(e.to_string()))
        }
    }
}
