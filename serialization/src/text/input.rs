//! Text reader.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::archive::Archive;
use crate::details::Details;
use crate::error::ArchiveError;
use crate::node::{EXPECTED_TYPE_KEY, ID_KEY, Node, TYPE_KEY, UUID_KEY};
use crate::resolver::DeserializeOptions;
use crate::serializable::{ObjectHandle, lock_object, needs_inline, run_serialize};
use crate::variant::{PlainMap, Variant};

fn mismatch(field: &str, expected: &'static str, found: &Node) -> ArchiveError {
    ArchiveError::TypeMismatch {
        field: field.to_owned(),
        expected,
        found: found.kind().to_owned(),
    }
}

fn class_of(node: &Node) -> Result<String, ArchiveError> {
    match node.get(TYPE_KEY) {
        Some(Node::String(type_id)) => Ok(type_id.clone()),
        Some(other) => Err(mismatch(TYPE_KEY, "string", other)),
        None => Err(mismatch(TYPE_KEY, "string", &Node::Null)),
    }
}

fn is_object_like(node: &Node) -> bool {
    [ID_KEY, UUID_KEY, TYPE_KEY]
        .iter()
        .any(|key| node.get(key).is_some())
}

/// Rebuilds an object graph from a document written by
/// [`TextOutputArchive`](super::TextOutputArchive).
///
/// Fields missing from the document leave the destination untouched.
/// Referenced slots are queued and decoded after the object that first
/// mentions them, so reference chains never nest calls.
pub struct TextInputArchive<'a, 'o> {
    slots: Vec<Node>,
    cache: HashMap<usize, ObjectHandle>,
    unresolved: HashSet<usize>,
    /// Referenced objects waiting for their fields, with their slot id.
    pending: VecDeque<(ObjectHandle, usize)>,
    /// Field maps of the objects currently being decoded, innermost last.
    frames: Vec<Node>,
    owners: Vec<ObjectHandle>,
    root_scope: bool,
    details: &'a mut Details,
    options: &'a mut DeserializeOptions<'o>,
}

impl<'a, 'o> TextInputArchive<'a, 'o> {
    /// A list document is taken as the slot list; anything else is a lone root.
    pub fn new(
        document: Node,
        details: &'a mut Details,
        options: &'a mut DeserializeOptions<'o>,
    ) -> Self {
        let slots = match document {
            Node::List(items) => items,
            other => vec![other],
        };
        Self {
            slots,
            cache: HashMap::new(),
            unresolved: HashSet::new(),
            pending: VecDeque::new(),
            frames: Vec::new(),
            owners: Vec::new(),
            root_scope: false,
            details,
            options,
        }
    }

    /// Decode the document and return its root.
    ///
    /// Returns `Ok(None)` when the root's class cannot be resolved.
    pub fn start(&mut self) -> Result<Option<ObjectHandle>, ArchiveError> {
        let root_node = self.take_root()?;
        let type_id = class_of(&root_node)?;
        let Some(root) = self.options.instantiate(None, &type_id, None, "") else {
            return Ok(None);
        };
        self.decode_root(&root, &type_id, root_node)?;
        Ok(Some(root))
    }

    /// Decode the document into an existing root object of the stored class.
    pub fn start_into(&mut self, root: &ObjectHandle) -> Result<(), ArchiveError> {
        let root_node = self.take_root()?;
        let type_id = class_of(&root_node)?;
        let class_id = lock_object(root, None)?.class_id().to_owned();
        if class_id != type_id {
            return Err(ArchiveError::TypeMismatch {
                field: TYPE_KEY.to_owned(),
                expected: "the class of the provided root",
                found: type_id,
            });
        }
        self.decode_root(root, &type_id, root_node)
    }

    fn take_root(&mut self) -> Result<Node, ArchiveError> {
        log::debug!("text archive start, {} slots", self.slots.len());
        self.slots
            .first_mut()
            .map(std::mem::take)
            .ok_or_else(|| ArchiveError::StructuralAssertion("empty text archive".into()))
    }

    fn decode_root(
        &mut self,
        root: &ObjectHandle,
        type_id: &str,
        node: Node,
    ) -> Result<(), ArchiveError> {
        self.cache.insert(0, root.clone());
        let capabilities = lock_object(root, Some(type_id))?.capabilities();
        self.root_scope = true;
        let result = self.decode_fields(root, type_id, node, needs_inline(capabilities, true));
        self.root_scope = false;
        result?;
        self.flush_pending()
    }

    fn flush_pending(&mut self) -> Result<(), ArchiveError> {
        while let Some((handle, index)) = self.pending.pop_front() {
            let slot = std::mem::take(&mut self.slots[index]);
            let type_id = class_of(&slot)?;
            log::trace!("decode '{type_id}' from slot {index}");
            self.decode_nested(&handle, &type_id, slot, false)?;
        }
        Ok(())
    }

    fn decode_fields(
        &mut self,
        handle: &ObjectHandle,
        type_id: &str,
        node: Node,
        inline: bool,
    ) -> Result<(), ArchiveError> {
        let mut guard = lock_object(handle, Some(type_id))?;
        self.frames.push(node);
        self.owners.push(handle.clone());
        let result = run_serialize(&mut *guard, self, inline);
        self.owners.pop();
        self.frames.pop();
        result?;
        guard.on_after_deserialize();
        Ok(())
    }

    fn decode_nested(
        &mut self,
        handle: &ObjectHandle,
        type_id: &str,
        node: Node,
        inline: bool,
    ) -> Result<(), ArchiveError> {
        let was_root = std::mem::replace(&mut self.root_scope, false);
        let result = self.decode_fields(handle, type_id, node, inline);
        self.root_scope = was_root;
        result
    }

    /// Take a field out of the current object's map.
    fn field(&mut self, name: &str) -> Option<Node> {
        self.frames
            .last_mut()
            .and_then(|frame| frame.get_mut(name))
            .map(std::mem::take)
    }

    fn field_list(&mut self, name: &str) -> Result<Option<Vec<Node>>, ArchiveError> {
        match self.field(name) {
            None => Ok(None),
            Some(Node::List(items)) => Ok(Some(items)),
            Some(other) => Err(mismatch(name, "array", &other)),
        }
    }

    fn read_int<T: TryFrom<i64>>(&mut self, data: &mut T, name: &str) -> Result<(), ArchiveError> {
        if let Some(node) = self.field(name) {
            *data = int_value(&node, name)?;
        }
        Ok(())
    }

    fn read_object(
        &mut self,
        node: Node,
        existing: Option<ObjectHandle>,
        name: &str,
    ) -> Result<Option<ObjectHandle>, ArchiveError> {
        if node.is_null() {
            return Ok(None);
        }

        if let Some(uuid) = node.get(UUID_KEY) {
            let uuid = uuid
                .as_str()
                .ok_or_else(|| mismatch(UUID_KEY, "string", uuid))?
                .to_owned();
            let expected_type = node
                .get(EXPECTED_TYPE_KEY)
                .and_then(Node::as_str)
                .unwrap_or_default()
                .to_owned();
            let owner = self.owners.last().cloned().ok_or_else(|| {
                ArchiveError::StructuralAssertion("external reference outside any object".into())
            })?;
            self.details.push(owner, name, uuid, expected_type);
            return Ok(None);
        }

        if let Some(id) = node.get(ID_KEY) {
            let id = id.as_i64().ok_or_else(|| mismatch(ID_KEY, "integer", id))?;
            return self.read_slot(id, existing, name);
        }

        if node.get(TYPE_KEY).is_some() {
            let type_id = class_of(&node)?;
            let Some(object) = self
                .options
                .instantiate(existing, &type_id, self.owners.last(), name)
            else {
                return Ok(None);
            };
            self.decode_nested(&object, &type_id, node, true)?;
            return Ok(Some(object));
        }

        Err(mismatch(name, "object", &node))
    }

    fn read_slot(
        &mut self,
        id: i64,
        existing: Option<ObjectHandle>,
        name: &str,
    ) -> Result<Option<ObjectHandle>, ArchiveError> {
        let index = usize::try_from(id)
            .ok()
            .filter(|&index| index < self.slots.len())
            .ok_or(ArchiveError::InvalidReference { id })?;
        if let Some(cached) = self.cache.get(&index) {
            return Ok(Some(cached.clone()));
        }
        if self.unresolved.contains(&index) {
            return Ok(None);
        }

        let type_id = class_of(&self.slots[index])?;
        let Some(object) = self
            .options
            .instantiate(existing, &type_id, self.owners.last(), name)
        else {
            self.unresolved.insert(index);
            return Ok(None);
        };
        self.cache.insert(index, object.clone());
        self.pending.push_back((object.clone(), index));
        Ok(Some(object))
    }

    fn variant_value(&mut self, node: Node, name: &str) -> Result<Variant, ArchiveError> {
        Ok(match node {
            Node::Null => Variant::Null,
            Node::Bool(v) => Variant::Boolean(v),
            Node::I64(_) | Node::U64(_) | Node::F32(_) | Node::F64(_) => {
                Variant::Number(node.as_f64().unwrap_or_default())
            }
            Node::String(s) => Variant::String(s),
            Node::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.variant_value(item, name)?);
                }
                Variant::Array(out)
            }
            map if is_object_like(&map) => Variant::from(self.read_object(map, None, name)?),
            Node::Map(entries) => Variant::Map(self.plain_map(entries, name)?),
        })
    }

    fn plain_map(&mut self, entries: Vec<(String, Node)>, name: &str) -> Result<PlainMap, ArchiveError> {
        let mut out = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let value = self.variant_value(value, name)?;
            out.push((key, value));
        }
        Ok(out)
    }
}

fn int_value<T: TryFrom<i64>>(node: &Node, name: &str) -> Result<T, ArchiveError> {
    node.as_i64()
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| mismatch(name, "integer", node))
}

fn f64_value(node: &Node, name: &str) -> Result<f64, ArchiveError> {
    node.as_f64().ok_or_else(|| mismatch(name, "number", node))
}

fn bool_value(node: &Node, name: &str) -> Result<bool, ArchiveError> {
    match node {
        Node::Bool(v) => Ok(*v),
        other => Err(mismatch(name, "boolean", other)),
    }
}

fn string_value(node: Node, name: &str) -> Result<String, ArchiveError> {
    match node {
        Node::String(s) => Ok(s),
        other => Err(mismatch(name, "string", &other)),
    }
}

impl Archive for TextInputArchive<'_, '_> {
    fn is_reading(&self) -> bool {
        true
    }

    fn is_binary(&self) -> bool {
        false
    }

    fn is_root(&self) -> bool {
        self.root_scope
    }

    fn boolean(&mut self, data: &mut bool, name: &str) -> Result<(), ArchiveError> {
        if let Some(node) = self.field(name) {
            *data = bool_value(&node, name)?;
        }
        Ok(())
    }

    fn int8(&mut self, data: &mut i8, name: &str) -> Result<(), ArchiveError> {
        self.read_int(data, name)
    }

    fn int16(&mut self, data: &mut i16, name: &str) -> Result<(), ArchiveError> {
        self.read_int(data, name)
    }

    fn int32(&mut self, data: &mut i32, name: &str) -> Result<(), ArchiveError> {
        self.read_int(data, name)
    }

    fn uint8(&mut self, data: &mut u8, name: &str) -> Result<(), ArchiveError> {
        self.read_int(data, name)
    }

    fn uint16(&mut self, data: &mut u16, name: &str) -> Result<(), ArchiveError> {
        self.read_int(data, name)
    }

    fn uint32(&mut self, data: &mut u32, name: &str) -> Result<(), ArchiveError> {
        self.read_int(data, name)
    }

    fn float32(&mut self, data: &mut f32, name: &str) -> Result<(), ArchiveError> {
        if let Some(node) = self.field(name) {
            *data = f64_value(&node, name)? as f32;
        }
        Ok(())
    }

    fn float64(&mut self, data: &mut f64, name: &str) -> Result<(), ArchiveError> {
        if let Some(node) = self.field(name) {
            *data = f64_value(&node, name)?;
        }
        Ok(())
    }

    fn str(&mut self, data: &mut String, name: &str) -> Result<(), ArchiveError> {
        if let Some(node) = self.field(name) {
            *data = string_value(node, name)?;
        }
        Ok(())
    }

    fn uuid(&mut self, _data: &mut String) -> Result<(), ArchiveError> {
        // Inline objects that declared a uuid are never decoded.
        Ok(())
    }

    fn any_value(&mut self, data: &mut Variant, name: &str) -> Result<(), ArchiveError> {
        if let Some(node) = self.field(name) {
            *data = self.variant_value(node, name)?;
        }
        Ok(())
    }

    fn plain_obj(&mut self, data: &mut PlainMap, name: &str) -> Result<(), ArchiveError> {
        match self.field(name) {
            None => Ok(()),
            Some(Node::Map(entries)) => {
                *data = self.plain_map(entries, name)?;
                Ok(())
            }
            Some(other) => Err(mismatch(name, "map", &other)),
        }
    }

    fn serializable_obj(
        &mut self,
        data: &mut Option<ObjectHandle>,
        name: &str,
    ) -> Result<(), ArchiveError> {
        if let Some(node) = self.field(name) {
            *data = self.read_object(node, data.take(), name)?;
        }
        Ok(())
    }

    fn boolean_array(&mut self, data: &mut Vec<bool>, name: &str) -> Result<(), ArchiveError> {
        if let Some(items) = self.field_list(name)? {
            *data = items
                .iter()
                .map(|n| bool_value(n, name))
                .collect::<Result<_, _>>()?;
        }
        Ok(())
    }

    fn int32_array(&mut self, data: &mut Vec<i32>, name: &str) -> Result<(), ArchiveError> {
        if let Some(items) = self.field_list(name)? {
            *data = items
                .iter()
                .map(|n| int_value(n, name))
                .collect::<Result<_, _>>()?;
        }
        Ok(())
    }

    fn float32_array(&mut self, data: &mut Vec<f32>, name: &str) -> Result<(), ArchiveError> {
        if let Some(items) = self.field_list(name)? {
            *data = items
                .iter()
                .map(|n| f64_value(n, name).map(|v| v as f32))
                .collect::<Result<_, _>>()?;
        }
        Ok(())
    }

    fn float64_array(&mut self, data: &mut Vec<f64>, name: &str) -> Result<(), ArchiveError> {
        if let Some(items) = self.field_list(name)? {
            *data = items
                .iter()
                .map(|n| f64_value(n, name))
                .collect::<Result<_, _>>()?;
        }
        Ok(())
    }

    fn str_array(&mut self, data: &mut Vec<String>, name: &str) -> Result<(), ArchiveError> {
        if let Some(items) = self.field_list(name)? {
            *data = items
                .into_iter()
                .map(|n| string_value(n, name))
                .collect::<Result<_, _>>()?;
        }
        Ok(())
    }

    fn plain_obj_array(
        &mut self,
        data: &mut Vec<PlainMap>,
        name: &str,
    ) -> Result<(), ArchiveError> {
        let Some(items) = self.field_list(name)? else {
            return Ok(());
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Node::Map(entries) => out.push(self.plain_map(entries, name)?),
                other => return Err(mismatch(name, "map", &other)),
            }
        }
        *data = out;
        Ok(())
    }

    fn serializable_obj_array(
        &mut self,
        data: &mut Option<Vec<Option<ObjectHandle>>>,
        name: &str,
    ) -> Result<(), ArchiveError> {
        let items = match self.field(name) {
            None => return Ok(()),
            Some(Node::Null) => {
                *data = None;
                return Ok(());
            }
            Some(Node::List(items)) => items,
            Some(other) => return Err(mismatch(name, "array", &other)),
        };
        let previous = data.take().unwrap_or_default();
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            let existing = previous.get(i).cloned().flatten();
            out.push(self.read_object(item, existing, name)?);
        }
        *data = Some(out);
        Ok(())
    }
}
