//! Binary reader.

use std::collections::{HashMap, VecDeque};

use super::node::SerializeNode;
use crate::archive::Archive;
use crate::details::Details;
use crate::error::ArchiveError;
use crate::node::TYPE_KEY;
use crate::resolver::DeserializeOptions;
use crate::serializable::{ObjectHandle, lock_object, needs_inline, run_serialize};
use crate::string_table::{StringId, StringTable};
use crate::tag::{ObjectKindFlag, SerializeTag};
use crate::variant::{PlainMap, Variant};

/// Rebuilds an object graph from bytes written by
/// [`BinaryOutputArchive`](super::BinaryOutputArchive).
///
/// Objects are cached by the absolute offset of their node before their
/// fields are decoded, so cycles and shared references resolve to the same
/// handle. Referenced objects are queued and decoded after the object that
/// first mentions them, so reference chains never nest calls. External
/// references become [`Details`] records.
pub struct BinaryInputArchive<'a, 'o> {
    node: SerializeNode,
    strings: StringTable,
    uuids: StringTable,
    cache: HashMap<usize, ObjectHandle>,
    /// Referenced objects waiting for their fields, with their node offset.
    pending: VecDeque<(ObjectHandle, usize)>,
    owners: Vec<ObjectHandle>,
    root_scope: bool,
    details: &'a mut Details,
    options: &'a mut DeserializeOptions<'o>,
}

impl<'a, 'o> BinaryInputArchive<'a, 'o> {
    pub fn new(
        bytes: Vec<u8>,
        details: &'a mut Details,
        options: &'a mut DeserializeOptions<'o>,
    ) -> Self {
        Self {
            node: SerializeNode::from_bytes("binary input", bytes),
            strings: StringTable::new(),
            uuids: StringTable::new(),
            cache: HashMap::new(),
            pending: VecDeque::new(),
            owners: Vec::new(),
            root_scope: false,
            details,
            options,
        }
    }

    /// Decode the whole archive and return its root.
    ///
    /// Returns `Ok(None)` when the root's class cannot be resolved.
    pub fn start(&mut self) -> Result<Option<ObjectHandle>, ArchiveError> {
        self.read_tables()?;
        let root_offset = self.node.offset;
        let type_id = self.pop_string_ref()?;
        let Some(root) = self.options.instantiate(None, &type_id, None, "") else {
            return Ok(None);
        };
        self.decode_root(&root, &type_id, root_offset)?;
        Ok(Some(root))
    }

    /// Decode the archive into an existing root object of the stored class.
    pub fn start_into(&mut self, root: &ObjectHandle) -> Result<(), ArchiveError> {
        self.read_tables()?;
        let root_offset = self.node.offset;
        let type_id = self.pop_string_ref()?;
        let class_id = lock_object(root, None)?.class_id().to_owned();
        if class_id != type_id {
            return Err(ArchiveError::TypeMismatch {
                field: TYPE_KEY.to_owned(),
                expected: "the class of the provided root",
                found: type_id,
            });
        }
        self.decode_root(root, &type_id, root_offset)
    }

    fn read_tables(&mut self) -> Result<(), ArchiveError> {
        self.uuids = self.read_table()?;
        self.strings = self.read_table()?;
        log::debug!(
            "binary archive start: {} uuids, {} strings, root at {}",
            self.uuids.len(),
            self.strings.len(),
            self.node.offset
        );
        Ok(())
    }

    fn read_table(&mut self) -> Result<StringTable, ArchiveError> {
        let count = self.node.pop_uint32()?;
        (0..count).map(|_| self.node.pop_string()).collect()
    }

    fn decode_root(
        &mut self,
        root: &ObjectHandle,
        type_id: &str,
        offset: usize,
    ) -> Result<(), ArchiveError> {
        self.cache.insert(offset, root.clone());
        let capabilities = lock_object(root, Some(type_id))?.capabilities();
        self.root_scope = true;
        let result = self.decode_fields(root, type_id, needs_inline(capabilities, true));
        self.root_scope = false;
        result?;
        self.flush_pending()
    }

    fn flush_pending(&mut self) -> Result<(), ArchiveError> {
        while let Some((handle, offset)) = self.pending.pop_front() {
            self.node.offset = offset;
            let type_id = self.pop_string_ref()?;
            log::trace!("decode '{type_id}' from offset {offset}");
            self.decode_nested(&handle, &type_id, false)?;
        }
        Ok(())
    }

    fn decode_fields(
        &mut self,
        handle: &ObjectHandle,
        type_id: &str,
        inline: bool,
    ) -> Result<(), ArchiveError> {
        let mut guard = lock_object(handle, Some(type_id))?;
        self.owners.push(handle.clone());
        let result = run_serialize(&mut *guard, self, inline);
        self.owners.pop();
        result?;
        guard.on_after_deserialize();
        Ok(())
    }

    fn decode_nested(
        &mut self,
        handle: &ObjectHandle,
        type_id: &str,
        inline: bool,
    ) -> Result<(), ArchiveError> {
        let was_root = std::mem::replace(&mut self.root_scope, false);
        let result = self.decode_fields(handle, type_id, inline);
        self.root_scope = was_root;
        result
    }

    fn pop_string_ref(&mut self) -> Result<String, ArchiveError> {
        let index = self.node.pop_uint32()?;
        self.strings
            .try_get(StringId(index))
            .map(str::to_owned)
            .ok_or(ArchiveError::InvalidReference { id: index.into() })
    }

    fn pop_len(&mut self) -> Result<usize, ArchiveError> {
        let at = self.node.offset;
        let len = self.node.pop_int32()?;
        usize::try_from(len).map_err(|_| {
            ArchiveError::StructuralAssertion(format!("negative length {len} at offset {at}"))
        })
    }

    /// Read an array header. `None` is a null array, only legal when `nullable`.
    fn pop_array_header(&mut self, nullable: bool) -> Result<Option<usize>, ArchiveError> {
        let at = self.node.offset;
        let tag = self.node.pop_int8()?;
        match SerializeTag::from_byte(tag, at)? {
            SerializeTag::Array => self.pop_len().map(Some),
            SerializeTag::Null if nullable => Ok(None),
            _ => Err(ArchiveError::InvalidTag { tag, offset: at }),
        }
    }

    fn pop_array_len(&mut self) -> Result<usize, ArchiveError> {
        self.pop_array_header(false)
            .map(|len| len.unwrap_or_default())
    }

    fn read_object(&mut self, name: &str) -> Result<Option<ObjectHandle>, ArchiveError> {
        self.read_object_into(None, name)
    }

    /// Decode one object slot. `existing` is reused when it has the stored class.
    fn read_object_into(
        &mut self,
        existing: Option<ObjectHandle>,
        name: &str,
    ) -> Result<Option<ObjectHandle>, ArchiveError> {
        let flag = ObjectKindFlag::from_bits_truncate(self.node.pop_uint8()?);
        if flag.contains(ObjectKindFlag::NULL) {
            self.node.pop_int32()?;
            return Ok(None);
        }
        if flag.contains(ObjectKindFlag::INLINE) {
            return self.read_inline(existing, name);
        }

        let target = self.node.pop_int32()?;
        if target == -1 {
            return Ok(None);
        }
        let resume = self.node.offset;
        let target = usize::try_from(target)
            .map_err(|_| ArchiveError::InvalidReference { id: target.into() })?;
        if let Some(cached) = self.cache.get(&target) {
            return Ok(Some(cached.clone()));
        }

        self.node.offset = target;
        let type_id = self.pop_string_ref();
        self.node.offset = resume;
        let type_id = type_id?;
        let Some(object) = self
            .options
            .instantiate(existing, &type_id, self.owners.last(), name)
        else {
            return Ok(None);
        };
        self.cache.insert(target, object.clone());
        self.pending.push_back((object.clone(), target));
        Ok(Some(object))
    }

    fn read_inline(
        &mut self,
        existing: Option<ObjectHandle>,
        name: &str,
    ) -> Result<Option<ObjectHandle>, ArchiveError> {
        let advance_at = self.node.offset;
        let advance = self.node.pop_int32()?;
        if advance == -1 {
            let type_id = self.pop_string_ref()?;
            let Some(object) = self
                .options
                .instantiate(existing, &type_id, self.owners.last(), name)
            else {
                return Err(ArchiveError::UnresolvedInlineType { type_id });
            };
            self.decode_nested(&object, &type_id, true)?;
            return Ok(Some(object));
        }

        let advance = usize::try_from(advance).map_err(|_| {
            ArchiveError::StructuralAssertion(format!(
                "negative uuid advance {advance} at offset {advance_at}"
            ))
        })?;
        let data_start = self.node.offset;
        let expected_type = self.pop_string_ref()?;
        self.node.offset = data_start + advance;
        let uuid_index = self.node.pop_uint32()?;
        let uuid = self
            .uuids
            .try_get(StringId(uuid_index))
            .map(str::to_owned)
            .ok_or(ArchiveError::InvalidReference {
                id: uuid_index.into(),
            })?;
        let owner = self.owners.last().cloned().ok_or_else(|| {
            ArchiveError::StructuralAssertion("external reference outside any object".into())
        })?;
        self.details.push(owner, name, uuid, expected_type);
        Ok(None)
    }

    fn read_variant(&mut self, name: &str) -> Result<Variant, ArchiveError> {
        let at = self.node.offset;
        let tag = self.node.pop_int8()?;
        Ok(match SerializeTag::from_byte(tag, at)? {
            SerializeTag::Null => Variant::Null,
            SerializeTag::Undefined => Variant::Undefined,
            SerializeTag::Number => Variant::Number(self.node.pop_float64()?),
            SerializeTag::Boolean => Variant::Boolean(self.node.pop_boolean()?),
            SerializeTag::String => Variant::String(self.pop_string_ref()?),
            SerializeTag::Array => {
                let len = self.pop_len()?;
                let mut items = Vec::new();
                for _ in 0..len {
                    items.push(self.read_variant(name)?);
                }
                Variant::Array(items)
            }
            SerializeTag::Map => Variant::Map(self.read_plain_map(name)?),
            SerializeTag::SerializableObject => Variant::from(self.read_object(name)?),
        })
    }

    fn read_plain_map(&mut self, name: &str) -> Result<PlainMap, ArchiveError> {
        let len = self.pop_len()?;
        let mut entries = Vec::new();
        for _ in 0..len {
            let key = self.pop_string_ref()?;
            let value = self.read_variant(name)?;
            entries.push((key, value));
        }
        Ok(entries)
    }
}

impl Archive for BinaryInputArchive<'_, '_> {
    fn is_reading(&self) -> bool {
        true
    }

    fn is_binary(&self) -> bool {
        true
    }

    fn is_root(&self) -> bool {
        self.root_scope
    }

    fn boolean(&mut self, data: &mut bool, _name: &str) -> Result<(), ArchiveError> {
        *data = self.node.pop_boolean()?;
        Ok(())
    }

    fn int8(&mut self, data: &mut i8, _name: &str) -> Result<(), ArchiveError> {
        *data = self.node.pop_int8()?;
        Ok(())
    }

    fn int16(&mut self, data: &mut i16, _name: &str) -> Result<(), ArchiveError> {
        *data = self.node.pop_int16()?;
        Ok(())
    }

    fn int32(&mut self, data: &mut i32, _name: &str) -> Result<(), ArchiveError> {
        *data = self.node.pop_int32()?;
        Ok(())
    }

    fn uint8(&mut self, data: &mut u8, _name: &str) -> Result<(), ArchiveError> {
        *data = self.node.pop_uint8()?;
        Ok(())
    }

    fn uint16(&mut self, data: &mut u16, _name: &str) -> Result<(), ArchiveError> {
        *data = self.node.pop_uint16()?;
        Ok(())
    }

    fn uint32(&mut self, data: &mut u32, _name: &str) -> Result<(), ArchiveError> {
        *data = self.node.pop_uint32()?;
        Ok(())
    }

    fn float32(&mut self, data: &mut f32, _name: &str) -> Result<(), ArchiveError> {
        *data = self.node.pop_float32()?;
        Ok(())
    }

    fn float64(&mut self, data: &mut f64, _name: &str) -> Result<(), ArchiveError> {
        *data = self.node.pop_float64()?;
        Ok(())
    }

    fn str(&mut self, data: &mut String, _name: &str) -> Result<(), ArchiveError> {
        *data = self.pop_string_ref()?;
        Ok(())
    }

    fn uuid(&mut self, _data: &mut String) -> Result<(), ArchiveError> {
        // Inline objects that declared a uuid are never decoded.
        Ok(())
    }

    fn any_value(&mut self, data: &mut Variant, name: &str) -> Result<(), ArchiveError> {
        *data = self.read_variant(name)?;
        Ok(())
    }

    fn plain_obj(&mut self, data: &mut PlainMap, name: &str) -> Result<(), ArchiveError> {
        *data = self.read_plain_map(name)?;
        Ok(())
    }

    fn serializable_obj(
        &mut self,
        data: &mut Option<ObjectHandle>,
        name: &str,
    ) -> Result<(), ArchiveError> {
        *data = self.read_object_into(data.take(), name)?;
        Ok(())
    }

    fn boolean_array(&mut self, data: &mut Vec<bool>, _name: &str) -> Result<(), ArchiveError> {
        let len = self.pop_array_len()?;
        data.clear();
        for _ in 0..len {
            data.push(self.node.pop_boolean()?);
        }
        Ok(())
    }

    fn int32_array(&mut self, data: &mut Vec<i32>, _name: &str) -> Result<(), ArchiveError> {
        let len = self.pop_array_len()?;
        data.clear();
        for _ in 0..len {
            data.push(self.node.pop_int32()?);
        }
        Ok(())
    }

    fn float32_array(&mut self, data: &mut Vec<f32>, _name: &str) -> Result<(), ArchiveError> {
        let len = self.pop_array_len()?;
        data.clear();
        for _ in 0..len {
            data.push(self.node.pop_float32()?);
        }
        Ok(())
    }

    fn float64_array(&mut self, data: &mut Vec<f64>, _name: &str) -> Result<(), ArchiveError> {
        let len = self.pop_array_len()?;
        data.clear();
        for _ in 0..len {
            data.push(self.node.pop_float64()?);
        }
        Ok(())
    }

    fn str_array(&mut self, data: &mut Vec<String>, _name: &str) -> Result<(), ArchiveError> {
        let len = self.pop_array_len()?;
        data.clear();
        for _ in 0..len {
            let s = self.pop_string_ref()?;
            data.push(s);
        }
        Ok(())
    }

    fn plain_obj_array(
        &mut self,
        data: &mut Vec<PlainMap>,
        name: &str,
    ) -> Result<(), ArchiveError> {
        let len = self.pop_array_len()?;
        data.clear();
        for _ in 0..len {
            let entries = self.read_plain_map(name)?;
            data.push(entries);
        }
        Ok(())
    }

    fn serializable_obj_array(
        &mut self,
        data: &mut Option<Vec<Option<ObjectHandle>>>,
        name: &str,
    ) -> Result<(), ArchiveError> {
        let Some(len) = self.pop_array_header(true)? else {
            *data = None;
            return Ok(());
        };
        let previous = data.take().unwrap_or_default();
        let mut items = Vec::with_capacity(len);
        for i in 0..len {
            let existing = previous.get(i).cloned().flatten();
            items.push(self.read_object_into(existing, name)?);
        }
        *data = Some(items);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Constructor;

    fn no_classes(_: &str, _: Option<&ObjectHandle>, _: &str) -> Option<Constructor> {
        None
    }

    #[test]
    fn truncated_input_is_out_of_bounds() {
        let mut details = Details::new();
        let mut options = DeserializeOptions::new(&no_classes);
        let mut ar = BinaryInputArchive::new(vec![0, 0], &mut details, &mut options);
        assert_eq!(
            ar.start().err(),
            Some(ArchiveError::OutOfBounds { offset: 0, len: 2 })
        );
    }

    #[test]
    fn unknown_root_class_yields_none() {
        // no uuids, one string "X", root type index 0
        let bytes = vec![0, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, b'X', 0, 0, 0, 0, 0];
        let mut reported = Vec::new();
        let mut details = Details::new();
        {
            let mut options = DeserializeOptions::new(&no_classes)
                .with_missing_class_reporter(|id| reported.push(id.to_owned()));
            let mut ar = BinaryInputArchive::new(bytes, &mut details, &mut options);
            assert!(ar.start().unwrap().is_none());
        }
        assert_eq!(reported, vec!["X"]);
    }

    #[test]
    fn bad_string_index_is_invalid_reference() {
        let bytes = vec![0, 0, 0, 0, 0, 0, 0, 0, 5, 0, 0, 0];
        let mut details = Details::new();
        let mut options = DeserializeOptions::new(&no_classes);
        let mut ar = BinaryInputArchive::new(bytes, &mut details, &mut options);
        assert_eq!(
            ar.start().err(),
            Some(ArchiveError::InvalidReference { id: 5 })
        );
    }

    #[test]
    fn primitive_array_rejects_null_tag() {
        let mut details = Details::new();
        let mut options = DeserializeOptions::new(&no_classes);
        let mut ar = BinaryInputArchive::new(vec![0], &mut details, &mut options);
        let mut values = vec![1, 2];
        assert_eq!(
            ar.int32_array(&mut values, "values"),
            Err(ArchiveError::InvalidTag { tag: 0, offset: 0 })
        );
    }
}
