//! Binary writer.
//!
//! Output layout: `[uuid table][string table][root node][object nodes...]`.
//! Every referenced object gets its own node, appended in first-write
//! order. A reference is a 5-byte patch site (object flag + `i32` absolute
//! offset) that holds `-1` until [`BinaryOutputArchive::dump`] knows where
//! each node ends up.

use std::collections::{HashMap, VecDeque};

use super::node::SerializeNode;
use crate::archive::{Archive, OutputOptions};
use crate::error::ArchiveError;
use crate::serializable::{ObjectHandle, lock_object, needs_inline, object_key, run_serialize};
use crate::string_table::StringTable;
use crate::tag::{ObjectKindFlag, SerializeTag};
use crate::variant::{PlainMap, Variant};

const UUID_TABLE: usize = 0;
const STRING_TABLE: usize = 1;

#[derive(Debug, Clone, Copy)]
struct PatchSite {
    node: usize,
    /// Position of the object-flag byte inside `node`.
    offset: usize,
}

#[derive(Debug)]
struct DependTarget {
    node: usize,
    sites: Vec<PatchSite>,
}

fn to_i32(value: usize) -> Result<i32, ArchiveError> {
    i32::try_from(value).map_err(|_| {
        ArchiveError::StructuralAssertion(format!("{value} does not fit a 32-bit field"))
    })
}

/// Writes an object graph into the binary layout.
pub struct BinaryOutputArchive {
    nodes: Vec<SerializeNode>,
    strings: StringTable,
    uuids: StringTable,
    /// Object identity -> index into `targets`.
    identity: HashMap<usize, usize>,
    targets: Vec<DependTarget>,
    /// Keeps registered objects alive so their identity keys stay unique.
    retained: Vec<ObjectHandle>,
    pending: VecDeque<(ObjectHandle, usize)>,
    current: usize,
    uuid_stack: Vec<i32>,
    root_scope: bool,
    started: bool,
    options: OutputOptions,
}

impl BinaryOutputArchive {
    pub fn new(options: OutputOptions) -> Self {
        let mut uuid_table = SerializeNode::new("uuid table");
        uuid_table.push_uint32(0);
        let mut string_table = SerializeNode::new("string table");
        string_table.push_uint32(0);
        Self {
            nodes: vec![uuid_table, string_table],
            strings: StringTable::new(),
            uuids: StringTable::new(),
            identity: HashMap::new(),
            targets: Vec::new(),
            retained: Vec::new(),
            pending: VecDeque::new(),
            current: STRING_TABLE,
            uuid_stack: Vec::new(),
            root_scope: false,
            started: false,
            options,
        }
    }

    /// Serialize the graph reachable from `root`.
    ///
    /// The root is registered before its fields are written, so
    /// back-references to it resolve to the root node.
    pub fn start(&mut self, root: &ObjectHandle) -> Result<(), ArchiveError> {
        if self.started {
            return Err(ArchiveError::StructuralAssertion(
                "binary output archive started twice".into(),
            ));
        }
        self.started = true;

        let mut guard = lock_object(root, None)?;
        log::debug!("binary archive start, root '{}'", guard.class_id());
        let target = self.register(root, guard.class_id());
        self.current = self.targets[target].node;
        self.root_scope = true;

        guard.on_before_serialize();
        let type_index = self.intern(guard.class_id());
        self.node_mut().push_uint32(type_index);
        let inline = needs_inline(guard.capabilities(), true);
        let result = run_serialize(&mut *guard, self, inline);
        self.root_scope = false;
        drop(guard);
        result?;

        self.flush_pending()
    }

    /// Patch every reference and concatenate the nodes.
    pub fn dump(mut self) -> Result<Vec<u8>, ArchiveError> {
        let uuid_count = to_i32(self.uuids.len())? as u32;
        let string_count = to_i32(self.strings.len())? as u32;
        self.nodes[UUID_TABLE].data.set_uint32(0, uuid_count);
        self.nodes[STRING_TABLE].data.set_uint32(0, string_count);

        let mut total = 0usize;
        for node in &mut self.nodes {
            if node.offset != node.byte_length() {
                return Err(ArchiveError::StructuralAssertion(format!(
                    "node '{}' cursor {} drifted from its length {}",
                    node.name,
                    node.offset,
                    node.byte_length()
                )));
            }
            node.offset_in_binary = total;
            total += node.byte_length();
        }

        for target in &self.targets {
            let target_offset = self.nodes[target.node].offset_in_binary;
            let target_size = self.nodes[target.node].byte_length();
            let value = to_i32(target_offset)?;
            for site in &target.sites {
                let owner = &mut self.nodes[site.node];
                let placeholder = owner.data.get_int32(site.offset + 1)?;
                if placeholder != -1 {
                    return Err(ArchiveError::StructuralAssertion(format!(
                        "patch site {} in node '{}' already holds {placeholder}",
                        site.offset, owner.name
                    )));
                }
                owner.data.set_int32(site.offset + 1, value);
                log::trace!(
                    "patch '{}' at {} -> {target_offset} ({target_size} bytes)",
                    owner.name,
                    owner.offset_in_binary + site.offset
                );
            }
        }

        let mut out = Vec::with_capacity(total);
        for node in &self.nodes {
            out.extend_from_slice(node.data.as_bytes());
        }
        log::debug!(
            "binary archive dump: {} nodes, {} strings, {} uuids, {total} bytes",
            self.nodes.len(),
            self.strings.len(),
            self.uuids.len()
        );
        Ok(out)
    }

    fn node_mut(&mut self) -> &mut SerializeNode {
        &mut self.nodes[self.current]
    }

    fn intern(&mut self, value: &str) -> u32 {
        let (id, is_new) = self.strings.intern(value);
        if is_new {
            self.nodes[STRING_TABLE].push_string(value);
        }
        id.0
    }

    fn register(&mut self, handle: &ObjectHandle, class_id: &str) -> usize {
        let node = self.nodes.len();
        self.nodes.push(SerializeNode::new(class_id));
        let target = self.targets.len();
        self.targets.push(DependTarget {
            node,
            sites: Vec::new(),
        });
        self.identity.insert(object_key(handle), target);
        self.retained.push(handle.clone());
        target
    }

    fn flush_pending(&mut self) -> Result<(), ArchiveError> {
        while let Some((handle, node)) = self.pending.pop_front() {
            let class_id = self.nodes[node].name.clone();
            let mut guard = lock_object(&handle, Some(&class_id))?;
            log::trace!("serialize '{}' into node {node}", guard.class_id());
            self.current = node;
            guard.on_before_serialize();
            let type_index = self.intern(guard.class_id());
            self.node_mut().push_uint32(type_index);
            run_serialize(&mut *guard, self, false)?;
        }
        Ok(())
    }

    fn push_reference(&mut self, target: usize) {
        let node = self.current;
        let offset = self.nodes[node].offset;
        self.targets[target].sites.push(PatchSite { node, offset });
        self.push_depend_target_info();
    }

    fn push_depend_target_info(&mut self) {
        let node = self.node_mut();
        node.push_uint8(ObjectKindFlag::empty().bits());
        node.push_int32(-1);
    }

    fn write_object(&mut self, data: Option<&ObjectHandle>) -> Result<(), ArchiveError> {
        let Some(handle) = data else {
            let node = self.node_mut();
            node.push_uint8(ObjectKindFlag::NULL.bits());
            node.push_int32(-1);
            return Ok(());
        };

        if let Some(&target) = self.identity.get(&object_key(handle)) {
            self.push_reference(target);
            return Ok(());
        }

        let (inline, class_id) = {
            let guard = lock_object(handle, None)?;
            (
                needs_inline(guard.capabilities(), false),
                guard.class_id().to_owned(),
            )
        };
        if inline {
            return self.write_inline(handle, &class_id);
        }

        let target = self.register(handle, &class_id);
        self.push_reference(target);
        self.pending
            .push_back((handle.clone(), self.targets[target].node));
        Ok(())
    }

    fn write_inline(&mut self, handle: &ObjectHandle, class_id: &str) -> Result<(), ArchiveError> {
        let mut guard = lock_object(handle, Some(class_id))?;
        guard.on_before_serialize();
        let type_index = self.intern(guard.class_id());

        let node = self.node_mut();
        node.push_uint8(ObjectKindFlag::INLINE.bits());
        let advance_at = node.offset;
        node.push_int32(-1);
        node.push_uint32(type_index);

        self.uuid_stack.push(-1);
        let was_root = std::mem::replace(&mut self.root_scope, false);
        let result = run_serialize(&mut *guard, self, true);
        self.root_scope = was_root;
        let uuid_index = self.uuid_stack.pop().unwrap_or(-1);
        result?;

        if uuid_index != -1 {
            let node = self.node_mut();
            let advance = to_i32(node.offset - advance_at - 4)?;
            node.data.set_int32(advance_at, advance);
            node.push_uint32(uuid_index as u32);
        }
        Ok(())
    }

    fn push_len(&mut self, len: usize) -> Result<(), ArchiveError> {
        let len = to_i32(len)?;
        self.node_mut().push_int32(len);
        Ok(())
    }

    fn begin_array(&mut self, len: usize) -> Result<(), ArchiveError> {
        self.node_mut().push_int8(SerializeTag::Array as i8);
        self.push_len(len)
    }

    fn write_variant(&mut self, value: &Variant) -> Result<(), ArchiveError> {
        self.node_mut().push_int8(value.tag() as i8);
        match value {
            Variant::Undefined | Variant::Null => {}
            Variant::Number(v) => self.node_mut().push_float64(*v),
            Variant::Boolean(v) => self.node_mut().push_boolean(*v),
            Variant::String(s) => {
                let index = self.intern(s);
                self.node_mut().push_uint32(index);
            }
            Variant::Array(items) => {
                self.push_len(items.len())?;
                for item in items {
                    self.write_variant(item)?;
                }
            }
            Variant::Map(entries) => self.write_plain_map(entries)?,
            Variant::Object(handle) => self.write_object(Some(handle))?,
        }
        Ok(())
    }

    fn write_plain_map(&mut self, entries: &PlainMap) -> Result<(), ArchiveError> {
        self.push_len(entries.len())?;
        for (key, value) in entries {
            let index = self.intern(key);
            self.node_mut().push_uint32(index);
            self.write_variant(value)?;
        }
        Ok(())
    }
}

impl Archive for BinaryOutputArchive {
    fn is_reading(&self) -> bool {
        false
    }

    fn is_exporting(&self) -> bool {
        self.options.exporting
    }

    fn is_binary(&self) -> bool {
        true
    }

    fn is_root(&self) -> bool {
        self.root_scope
    }

    fn boolean(&mut self, data: &mut bool, _name: &str) -> Result<(), ArchiveError> {
        self.node_mut().push_boolean(*data);
        Ok(())
    }

    fn int8(&mut self, data: &mut i8, _name: &str) -> Result<(), ArchiveError> {
        self.node_mut().push_int8(*data);
        Ok(())
    }

    fn int16(&mut self, data: &mut i16, _name: &str) -> Result<(), ArchiveError> {
        self.node_mut().push_int16(*data);
        Ok(())
    }

    fn int32(&mut self, data: &mut i32, _name: &str) -> Result<(), ArchiveError> {
        self.node_mut().push_int32(*data);
        Ok(())
    }

    fn uint8(&mut self, data: &mut u8, _name: &str) -> Result<(), ArchiveError> {
        self.node_mut().push_uint8(*data);
        Ok(())
    }

    fn uint16(&mut self, data: &mut u16, _name: &str) -> Result<(), ArchiveError> {
        self.node_mut().push_uint16(*data);
        Ok(())
    }

    fn uint32(&mut self, data: &mut u32, _name: &str) -> Result<(), ArchiveError> {
        self.node_mut().push_uint32(*data);
        Ok(())
    }

    fn float32(&mut self, data: &mut f32, _name: &str) -> Result<(), ArchiveError> {
        self.node_mut().push_float32(*data);
        Ok(())
    }

    fn float64(&mut self, data: &mut f64, _name: &str) -> Result<(), ArchiveError> {
        self.node_mut().push_float64(*data);
        Ok(())
    }

    fn str(&mut self, data: &mut String, _name: &str) -> Result<(), ArchiveError> {
        let index = self.intern(data);
        self.node_mut().push_uint32(index);
        Ok(())
    }

    fn uuid(&mut self, data: &mut String) -> Result<(), ArchiveError> {
        let (id, is_new) = self.uuids.intern(data);
        if is_new {
            self.nodes[UUID_TABLE].push_string(data);
        }
        let index = to_i32(id.0 as usize)?;
        match self.uuid_stack.last_mut() {
            Some(top) => *top = index,
            None => log::warn!("uuid '{data}' declared outside an inline object, ignored"),
        }
        Ok(())
    }

    fn any_value(&mut self, data: &mut Variant, _name: &str) -> Result<(), ArchiveError> {
        self.write_variant(data)
    }

    fn plain_obj(&mut self, data: &mut PlainMap, _name: &str) -> Result<(), ArchiveError> {
        self.write_plain_map(data)
    }

    fn serializable_obj(
        &mut self,
        data: &mut Option<ObjectHandle>,
        _name: &str,
    ) -> Result<(), ArchiveError> {
        self.write_object(data.as_ref())
    }

    fn boolean_array(&mut self, data: &mut Vec<bool>, _name: &str) -> Result<(), ArchiveError> {
        self.begin_array(data.len())?;
        for &v in data.iter() {
            self.node_mut().push_boolean(v);
        }
        Ok(())
    }

    fn int32_array(&mut self, data: &mut Vec<i32>, _name: &str) -> Result<(), ArchiveError> {
        self.begin_array(data.len())?;
        for &v in data.iter() {
            self.node_mut().push_int32(v);
        }
        Ok(())
    }

    fn float32_array(&mut self, data: &mut Vec<f32>, _name: &str) -> Result<(), ArchiveError> {
        self.begin_array(data.len())?;
        for &v in data.iter() {
            self.node_mut().push_float32(v);
        }
        Ok(())
    }

    fn float64_array(&mut self, data: &mut Vec<f64>, _name: &str) -> Result<(), ArchiveError> {
        self.begin_array(data.len())?;
        for &v in data.iter() {
            self.node_mut().push_float64(v);
        }
        Ok(())
    }

    fn str_array(&mut self, data: &mut Vec<String>, _name: &str) -> Result<(), ArchiveError> {
        self.begin_array(data.len())?;
        for s in data.iter() {
            let index = self.intern(s);
            self.node_mut().push_uint32(index);
        }
        Ok(())
    }

    fn plain_obj_array(
        &mut self,
        data: &mut Vec<PlainMap>,
        _name: &str,
    ) -> Result<(), ArchiveError> {
        self.begin_array(data.len())?;
        for entries in data.iter() {
            self.write_plain_map(entries)?;
        }
        Ok(())
    }

    fn serializable_obj_array(
        &mut self,
        data: &mut Option<Vec<Option<ObjectHandle>>>,
        _name: &str,
    ) -> Result<(), ArchiveError> {
        let Some(items) = data else {
            self.node_mut().push_int8(SerializeTag::Null as i8);
            return Ok(());
        };
        self.begin_array(items.len())?;
        for item in items.iter() {
            self.write_object(item.as_ref())?;
        }
        Ok(())
    }
}
