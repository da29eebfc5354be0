//! A byte segment with a moving cursor.
//!
//! The writer builds one [`SerializeNode`] per table and per referenced
//! object and concatenates them in `dump`. The reader wraps the whole
//! buffer in a single node and moves its cursor around.

use crate::buffer::SerializeData;
use crate::error::ArchiveError;

/// One segment of a binary archive.
#[derive(Debug)]
pub struct SerializeNode {
    /// Label used in logs: a class id or a table name.
    pub name: String,
    pub data: SerializeData,
    /// Cursor: next write position for writers, next read position for readers.
    pub offset: usize,
    /// Absolute position of this segment in the final buffer, set by `dump`.
    pub offset_in_binary: usize,
}

macro_rules! push_pop {
    ($($push:ident, $pop:ident, $set:ident, $get:ident, $ty:ty;)*) => {
        $(
            pub fn $push(&mut self, value: $ty) {
                self.data.$set(self.offset, value);
                self.offset += std::mem::size_of::<$ty>();
            }

            pub fn $pop(&mut self) -> Result<$ty, ArchiveError> {
                let value = self.data.$get(self.offset)?;
                self.offset += std::mem::size_of::<$ty>();
                Ok(value)
            }
        )*
    };
}

impl SerializeNode {
    /// An empty segment for writing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: SerializeData::new(),
            offset: 0,
            offset_in_binary: 0,
        }
    }

    /// A segment over existing bytes for reading, cursor at 0.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data: SerializeData::from_bytes(bytes),
            offset: 0,
            offset_in_binary: 0,
        }
    }

    pub fn byte_length(&self) -> usize {
        self.data.byte_length()
    }

    push_pop! {
        push_int8, pop_int8, set_int8, get_int8, i8;
        push_uint8, pop_uint8, set_uint8, get_uint8, u8;
        push_int16, pop_int16, set_int16, get_int16, i16;
        push_uint16, pop_uint16, set_uint16, get_uint16, u16;
        push_int32, pop_int32, set_int32, get_int32, i32;
        push_uint32, pop_uint32, set_uint32, get_uint32, u32;
        push_float32, pop_float32, set_float32, get_float32, f32;
        push_float64, pop_float64, set_float64, get_float64, f64;
    }

    pub fn push_boolean(&mut self, value: bool) {
        self.push_uint8(u8::from(value));
    }

    pub fn pop_boolean(&mut self) -> Result<bool, ArchiveError> {
        Ok(self.pop_uint8()? != 0)
    }

    /// Append a length-prefixed, null-terminated string.
    pub fn push_string(&mut self, value: &str) {
        self.offset += self.data.set_string(self.offset, value);
    }

    pub fn pop_string(&mut self) -> Result<String, ArchiveError> {
        let (value, size) = self.data.get_string(self.offset)?;
        self.offset += size;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_pop_moves_cursor() {
        let mut node = SerializeNode::new("test");
        node.push_int8(-3);
        node.push_uint32(7);
        node.push_string("ab");
        node.push_boolean(true);
        assert_eq!(node.offset, 1 + 4 + 7 + 1);
        assert_eq!(node.offset, node.byte_length());

        let mut reader = SerializeNode::from_bytes("read", node.data.into_bytes());
        assert_eq!(reader.pop_int8().unwrap(), -3);
        assert_eq!(reader.pop_uint32().unwrap(), 7);
        assert_eq!(reader.pop_string().unwrap(), "ab");
        assert!(reader.pop_boolean().unwrap());
        assert!(reader.pop_uint8().is_err());
    }
}
