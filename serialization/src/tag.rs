//! Self-describing value kinds shared by both archive formats.

use bitflags::bitflags;

use crate::error::ArchiveError;

/// Tag byte written before every dynamically-typed binary value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum SerializeTag {
    Null = 0,
    Number = 1,
    Boolean = 2,
    String = 3,
    SerializableObject = 4,
    Map = 5,
    Array = 6,
    Undefined = 7,
}

impl SerializeTag {
    /// Decode a tag byte read at `offset`.
    pub fn from_byte(tag: i8, offset: usize) -> Result<Self, ArchiveError> {
        Ok(match tag {
            0 => Self::Null,
            1 => Self::Number,
            2 => Self::Boolean,
            3 => Self::String,
            4 => Self::SerializableObject,
            5 => Self::Map,
            6 => Self::Array,
            7 => Self::Undefined,
            _ => return Err(ArchiveError::InvalidTag { tag, offset }),
        })
    }
}

bitflags! {
    /// Leading byte of every binary object slot.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObjectKindFlag: u8 {
        const NULL = 1 << 0;
        const INLINE = 1 << 1;
    }
}
