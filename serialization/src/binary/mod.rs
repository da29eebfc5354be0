//! Compact little-endian archive format.
//!
//! ```text
//! [uuid table]   u32 count, count x string
//! [string table] u32 count, count x string
//! [root node]    u32 __type__ index, fields...
//! [object nodes] same shape as the root, first-write order
//! ```
//!
//! Strings are `u32` length + UTF-8 + `\0` inside the tables and `u32`
//! table indices everywhere else. An object slot starts with an
//! [`ObjectKindFlag`](crate::ObjectKindFlag) byte:
//!
//! - null: flag `NULL`, `i32 -1`
//! - reference: flag `0`, `i32` absolute offset of the target node
//! - inline: flag `INLINE`, `i32` uuid advance (`-1` for none),
//!   `u32 __type__` index, fields, and a trailing `u32` uuid index when the
//!   advance is set

mod input;
mod node;
mod output;

pub use input::BinaryInputArchive;
pub use node::SerializeNode;
pub use output::BinaryOutputArchive;
