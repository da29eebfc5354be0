//! The archive interface serializable objects talk to.

use crate::error::ArchiveError;
use crate::serializable::ObjectHandle;
use crate::variant::{PlainMap, Variant};

/// A reader or writer that [`Serializable`](crate::Serializable) objects
/// drive field by field.
///
/// Every method is symmetric. Writers read `data` and record it under
/// `name`; readers overwrite `data` with the decoded value. The binary
/// format is positional and ignores `name`, so objects must issue the same
/// calls in the same order in both directions.
pub trait Archive {
    fn is_reading(&self) -> bool;

    fn is_writing(&self) -> bool {
        !self.is_reading()
    }

    /// Whether the writer produces data for a shipped build.
    fn is_exporting(&self) -> bool {
        false
    }

    fn is_binary(&self) -> bool;

    /// Whether the fields currently being processed belong to the document root.
    fn is_root(&self) -> bool;

    fn boolean(&mut self, data: &mut bool, name: &str) -> Result<(), ArchiveError>;
    fn int8(&mut self, data: &mut i8, name: &str) -> Result<(), ArchiveError>;
    fn int16(&mut self, data: &mut i16, name: &str) -> Result<(), ArchiveError>;
    fn int32(&mut self, data: &mut i32, name: &str) -> Result<(), ArchiveError>;
    fn uint8(&mut self, data: &mut u8, name: &str) -> Result<(), ArchiveError>;
    fn uint16(&mut self, data: &mut u16, name: &str) -> Result<(), ArchiveError>;
    fn uint32(&mut self, data: &mut u32, name: &str) -> Result<(), ArchiveError>;
    fn float32(&mut self, data: &mut f32, name: &str) -> Result<(), ArchiveError>;
    fn float64(&mut self, data: &mut f64, name: &str) -> Result<(), ArchiveError>;
    fn str(&mut self, data: &mut String, name: &str) -> Result<(), ArchiveError>;

    /// Declare an external-asset identifier for the enclosing inline object.
    ///
    /// An inline object that calls this is stored as a dependency marker:
    /// readers do not decode it but record a
    /// [`DependRecord`](crate::DependRecord) for the field holding it.
    fn uuid(&mut self, data: &mut String) -> Result<(), ArchiveError>;

    /// A dynamically-typed value.
    fn any_value(&mut self, data: &mut Variant, name: &str) -> Result<(), ArchiveError>;

    /// A generic record of dynamically-typed values.
    fn plain_obj(&mut self, data: &mut PlainMap, name: &str) -> Result<(), ArchiveError>;

    /// A reference to a serializable object (shared, cyclic, inline or external).
    fn serializable_obj(
        &mut self,
        data: &mut Option<ObjectHandle>,
        name: &str,
    ) -> Result<(), ArchiveError>;

    fn boolean_array(&mut self, data: &mut Vec<bool>, name: &str) -> Result<(), ArchiveError>;
    fn int32_array(&mut self, data: &mut Vec<i32>, name: &str) -> Result<(), ArchiveError>;
    fn float32_array(&mut self, data: &mut Vec<f32>, name: &str) -> Result<(), ArchiveError>;
    fn float64_array(&mut self, data: &mut Vec<f64>, name: &str) -> Result<(), ArchiveError>;
    fn str_array(&mut self, data: &mut Vec<String>, name: &str) -> Result<(), ArchiveError>;

    fn plain_obj_array(
        &mut self,
        data: &mut Vec<PlainMap>,
        name: &str,
    ) -> Result<(), ArchiveError>;

    /// A nullable array of object references. `None` is the null array.
    fn serializable_obj_array(
        &mut self,
        data: &mut Option<Vec<Option<ObjectHandle>>>,
        name: &str,
    ) -> Result<(), ArchiveError>;

    /// Raw typed-array blobs. No format supports these yet.
    fn typed_array(&mut self, _data: &mut Vec<u8>, _name: &str) -> Result<(), ArchiveError> {
        Err(ArchiveError::Unimplemented("typed_array"))
    }
}

/// Settings shared by the output archives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputOptions {
    /// Reported through [`Archive::is_exporting`].
    pub exporting: bool,
}

impl OutputOptions {
    pub fn exporting() -> Self {
        Self { exporting: true }
    }
}
