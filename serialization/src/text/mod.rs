//! JSON-shaped archive format.
//!
//! A document is either a single root map (when the graph has no
//! referenced objects besides the root) or a list of slots with the root
//! in slot 0:
//!
//! ```json
//! [
//!   { "__type__": "Holder", "a": { "__id__": 1 }, "b": { "__id__": 1 } },
//!   { "__type__": "Shared", "value": 7 }
//! ]
//! ```
//!
//! Inline objects are embedded as `{"__type__": ..., fields...}`. Inline
//! objects that declared a uuid become
//! `{"__uuid__": ..., "__expectedType__": ...}` markers.
//!
//! NaN and infinite floats have no JSON form; writing one fails with
//! [`ArchiveError::NonFiniteNumber`](crate::ArchiveError::NonFiniteNumber).

mod input;
mod output;

pub use input::TextInputArchive;
pub use output::TextOutputArchive;
