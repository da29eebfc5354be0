//! Error types for archive reading and writing.

use std::fmt;

/// Errors that abort an entire serialization or deserialization call.
///
/// Unresolved class ids and unresolved external references are not errors:
/// the former is reported through
/// [`DeserializeOptions`](crate::DeserializeOptions) and leaves a `None`
/// slot, the latter becomes a [`DependRecord`](crate::DependRecord).
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveError {
    /// An internal writer/reader invariant was violated.
    StructuralAssertion(String),
    /// A read touched bytes past the valid length of the buffer.
    OutOfBounds { offset: usize, len: usize },
    /// The archive does not support this operation.
    Unimplemented(&'static str),
    /// A binary inline object has an unknown class, so its extent is unknown.
    UnresolvedInlineType { type_id: String },
    /// A tag byte did not match any known [`SerializeTag`](crate::SerializeTag).
    InvalidTag { tag: i8, offset: usize },
    /// A stored string was not valid UTF-8.
    InvalidUtf8 { offset: usize },
    /// An object id or string/uuid table index points nowhere.
    InvalidReference { id: i64 },
    /// A text node had a different shape than the reader expected.
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: String,
    },
    /// An object was entered again while its serialize call was running.
    /// `type_id` is `None` when the class was not known at the lock site.
    ObjectBusy { type_id: Option<String> },
    /// Text archives cannot store NaN or infinite numbers.
    NonFiniteNumber { field: String },
    /// Text document encoding/decoding error (JSON/RON).
    Format(String),
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StructuralAssertion(msg) => write!(f, "structural assertion failed: {msg}"),
            Self::OutOfBounds { offset, len } => {
                write!(f, "offset {offset} is outside the bounds of the buffer ({len})")
            }
            Self::Unimplemented(op) => write!(f, "operation '{op}' is not implemented"),
            Self::UnresolvedInlineType { type_id } => {
                write!(f, "cannot skip inline object of unresolved class '{type_id}'")
            }
            Self::InvalidTag { tag, offset } => {
                write!(f, "invalid tag {tag} at offset {offset}")
            }
            Self::InvalidUtf8 { offset } => write!(f, "invalid UTF-8 string at offset {offset}"),
            Self::InvalidReference { id } => write!(f, "invalid reference {id}"),
            Self::TypeMismatch {
                field,
                expected,
                found,
            } => write!(
                f,
                "type mismatch for field '{field}': expected {expected}, found {found}"
            ),
            Self::ObjectBusy { type_id: Some(type_id) } => {
                write!(f, "object of class '{type_id}' re-entered during serialization")
            }
            Self::ObjectBusy { type_id: None } => {
                write!(f, "object re-entered during serialization")
            }
            Self::NonFiniteNumber { field } => {
                write!(f, "field '{field}' holds a non-finite number, text archives cannot store it")
            }
            Self::Format(msg) => write!(f, "format error: {msg}"),
        }
    }
}

impl std::error::Error for ArchiveError {}
