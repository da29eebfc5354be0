//! Text writer.

use std::collections::{HashMap, VecDeque};

use crate::archive::{Archive, OutputOptions};
use crate::error::ArchiveError;
use crate::format::{self, TextFormat};
use crate::node::{EXPECTED_TYPE_KEY, Node, TYPE_KEY, UUID_KEY};
use crate::serializable::{ObjectHandle, lock_object, needs_inline, object_key, run_serialize};
use crate::variant::{PlainMap, Variant};

type Fields = Vec<(String, Node)>;

fn finite_f32(value: f32, name: &str) -> Result<Node, ArchiveError> {
    if value.is_finite() {
        Ok(Node::F32(value))
    } else {
        Err(ArchiveError::NonFiniteNumber {
            field: name.to_owned(),
        })
    }
}

fn finite_f64(value: f64, name: &str) -> Result<Node, ArchiveError> {
    if value.is_finite() {
        Ok(Node::F64(value))
    } else {
        Err(ArchiveError::NonFiniteNumber {
            field: name.to_owned(),
        })
    }
}

/// Writes an object graph as a list of JSON-compatible [`Node`] slots.
///
/// Slot 0 is the root. Every other referenced object gets the next free
/// slot on first write and is referenced as `{"__id__": N}`. Inline
/// objects are embedded as maps starting with `__type__`.
pub struct TextOutputArchive {
    serialized: Vec<Node>,
    /// Field maps of the objects currently being written, innermost last.
    frames: Vec<Fields>,
    identity: HashMap<usize, usize>,
    retained: Vec<ObjectHandle>,
    /// Referenced objects waiting for their fields: handle, slot id, class id.
    pending: VecDeque<(ObjectHandle, usize, String)>,
    uuid_stack: Vec<Option<String>>,
    root_scope: bool,
    started: bool,
    options: OutputOptions,
}

impl TextOutputArchive {
    pub fn new(options: OutputOptions) -> Self {
        Self {
            serialized: vec![Node::map()],
            frames: Vec::new(),
            identity: HashMap::new(),
            retained: Vec::new(),
            pending: VecDeque::new(),
            uuid_stack: Vec::new(),
            root_scope: false,
            started: false,
            options,
        }
    }

    /// Serialize the graph reachable from `root` into slot 0 onwards.
    pub fn start(&mut self, root: &ObjectHandle) -> Result<(), ArchiveError> {
        if self.started {
            return Err(ArchiveError::StructuralAssertion(
                "text output archive started twice".into(),
            ));
        }
        self.started = true;

        let mut guard = lock_object(root, None)?;
        log::debug!("text archive start, root '{}'", guard.class_id());
        self.identity.insert(object_key(root), 0);
        self.retained.push(root.clone());

        guard.on_before_serialize();
        self.begin_object(guard.class_id());
        self.root_scope = true;
        let inline = needs_inline(guard.capabilities(), true);
        let result = run_serialize(&mut *guard, self, inline);
        self.root_scope = false;
        let node = self.end_object()?;
        drop(guard);
        result?;
        self.serialized[0] = node;

        self.flush_pending()
    }

    /// The finished document: the root map alone, or the list of all slots.
    pub fn dump(mut self) -> Node {
        if self.serialized.len() == 1 {
            self.serialized.pop().unwrap_or_default()
        } else {
            Node::List(self.serialized)
        }
    }

    /// [`dump`](Self::dump) and encode the document.
    pub fn dump_to(self, format: TextFormat) -> Result<Vec<u8>, ArchiveError> {
        format::encode(&self.dump(), format)
    }

    fn begin_object(&mut self, class_id: &str) {
        self.frames
            .push(vec![(TYPE_KEY.to_owned(), Node::String(class_id.to_owned()))]);
    }

    fn end_object(&mut self) -> Result<Node, ArchiveError> {
        self.frames.pop().map(Node::Map).ok_or_else(|| {
            ArchiveError::StructuralAssertion("object frame stack underflow".into())
        })
    }

    fn put(&mut self, name: &str, node: Node) -> Result<(), ArchiveError> {
        let frame = self.frames.last_mut().ok_or_else(|| {
            ArchiveError::StructuralAssertion(format!("field '{name}' written outside any object"))
        })?;
        match frame.iter_mut().find(|(k, _)| k == name) {
            Some((_, slot)) => *slot = node,
            None => frame.push((name.to_owned(), node)),
        }
        Ok(())
    }

    fn flush_pending(&mut self) -> Result<(), ArchiveError> {
        while let Some((handle, id, class_id)) = self.pending.pop_front() {
            let mut guard = lock_object(&handle, Some(&class_id))?;
            log::trace!("serialize '{}' into slot {id}", guard.class_id());
            guard.on_before_serialize();
            self.begin_object(guard.class_id());
            let result = run_serialize(&mut *guard, self, false);
            let node = self.end_object()?;
            result?;
            self.serialized[id] = node;
        }
        Ok(())
    }

    fn write_object(&mut self, data: Option<&ObjectHandle>) -> Result<Node, ArchiveError> {
        let Some(handle) = data else {
            return Ok(Node::Null);
        };
        if let Some(&id) = self.identity.get(&object_key(handle)) {
            return Ok(Node::object_ref(id));
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

        let id = self.serialized.len();
        self.serialized.push(Node::Null);
        self.identity.insert(object_key(handle), id);
        self.retained.push(handle.clone());
        self.pending.push_back((handle.clone(), id, class_id));
        Ok(Node::object_ref(id))
    }

    fn write_inline(&mut self, handle: &ObjectHandle, class_id: &str) -> Result<Node, ArchiveError> {
        let mut guard = lock_object(handle, Some(class_id))?;
        guard.on_before_serialize();
        self.begin_object(guard.class_id());
        self.uuid_stack.push(None);
        let was_root = std::mem::replace(&mut self.root_scope, false);
        let result = run_serialize(&mut *guard, self, true);
        self.root_scope = was_root;
        let uuid = self.uuid_stack.pop().flatten();
        let node = self.end_object()?;
        result?;

        Ok(match uuid {
            Some(uuid) => Node::Map(vec![
                (UUID_KEY.to_owned(), Node::String(uuid)),
                (
                    EXPECTED_TYPE_KEY.to_owned(),
                    Node::String(guard.class_id().to_owned()),
                ),
            ]),
            None => node,
        })
    }

    /// `None` for [`Variant::Undefined`], which is left out of maps.
    ///
    /// `name` is the field the value belongs to, for error reporting.
    fn variant_node(&mut self, value: &Variant, name: &str) -> Result<Option<Node>, ArchiveError> {
        Ok(Some(match value {
            Variant::Undefined => return Ok(None),
            Variant::Null => Node::Null,
            Variant::Number(v) => finite_f64(*v, name)?,
            Variant::Boolean(v) => Node::Bool(*v),
            Variant::String(s) => Node::String(s.clone()),
            Variant::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.variant_node(item, name)?.unwrap_or_default());
                }
                Node::List(out)
            }
            Variant::Map(entries) => self.plain_map_node(entries, name)?,
            Variant::Object(handle) => self.write_object(Some(handle))?,
        }))
    }

    fn plain_map_node(&mut self, entries: &PlainMap, name: &str) -> Result<Node, ArchiveError> {
        let mut out = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            if let Some(node) = self.variant_node(value, name)? {
                out.push((key.clone(), node));
            }
        }
        Ok(Node::Map(out))
    }
}

impl Archive for TextOutputArchive {
    fn is_reading(&self) -> bool {
        false
    }

    fn is_exporting(&self) -> bool {
        self.options.exporting
    }

    fn is_binary(&self) -> bool {
        false
    }

    fn is_root(&self) -> bool {
        self.root_scope
    }

    fn boolean(&mut self, data: &mut bool, name: &str) -> Result<(), ArchiveError> {
        self.put(name, Node::Bool(*data))
    }

    fn int8(&mut self, data: &mut i8, name: &str) -> Result<(), ArchiveError> {
        self.put(name, Node::I64(i64::from(*data)))
    }

    fn int16(&mut self, data: &mut i16, name: &str) -> Result<(), ArchiveError> {
        self.put(name, Node::I64(i64::from(*data)))
    }

    fn int32(&mut self, data: &mut i32, name: &str) -> Result<(), ArchiveError> {
        self.put(name, Node::I64(i64::from(*data)))
    }

    fn uint8(&mut self, data: &mut u8, name: &str) -> Result<(), ArchiveError> {
        self.put(name, Node::U64(u64::from(*data)))
    }

    fn uint16(&mut self, data: &mut u16, name: &str) -> Result<(), ArchiveError> {
        self.put(name, Node::U64(u64::from(*data)))
    }

    fn uint32(&mut self, data: &mut u32, name: &str) -> Result<(), ArchiveError> {
        self.put(name, Node::U64(u64::from(*data)))
    }

    fn float32(&mut self, data: &mut f32, name: &str) -> Result<(), ArchiveError> {
        let node = finite_f32(*data, name)?;
        self.put(name, node)
    }

    fn float64(&mut self, data: &mut f64, name: &str) -> Result<(), ArchiveError> {
        let node = finite_f64(*data, name)?;
        self.put(name, node)
    }

    fn str(&mut self, data: &mut String, name: &str) -> Result<(), ArchiveError> {
        self.put(name, Node::String(data.clone()))
    }

    fn uuid(&mut self, data: &mut String) -> Result<(), ArchiveError> {
        match self.uuid_stack.last_mut() {
            Some(top) => *top = Some(data.clone()),
            None => log::warn!("uuid '{data}' declared outside an inline object, ignored"),
        }
        Ok(())
    }

    fn any_value(&mut self, data: &mut Variant, name: &str) -> Result<(), ArchiveError> {
        match self.variant_node(data, name)? {
            Some(node) => self.put(name, node),
            None => Ok(()),
        }
    }

    fn plain_obj(&mut self, data: &mut PlainMap, name: &str) -> Result<(), ArchiveError> {
        let node = self.plain_map_node(data, name)?;
        self.put(name, node)
    }

    fn serializable_obj(
        &mut self,
        data: &mut Option<ObjectHandle>,
        name: &str,
    ) -> Result<(), ArchiveError> {
        let node = self.write_object(data.as_ref())?;
        self.put(name, node)
    }

    fn boolean_array(&mut self, data: &mut Vec<bool>, name: &str) -> Result<(), ArchiveError> {
        let items = data.iter().map(|&v| Node::Bool(v)).collect();
        self.put(name, Node::List(items))
    }

    fn int32_array(&mut self, data: &mut Vec<i32>, name: &str) -> Result<(), ArchiveError> {
        let items = data.iter().map(|&v| Node::I64(i64::from(v))).collect();
        self.put(name, Node::List(items))
    }

    fn float32_array(&mut self, data: &mut Vec<f32>, name: &str) -> Result<(), ArchiveError> {
        let items = data
            .iter()
            .map(|&v| finite_f32(v, name))
            .collect::<Result<_, _>>()?;
        self.put(name, Node::List(items))
    }

    fn float64_array(&mut self, data: &mut Vec<f64>, name: &str) -> Result<(), ArchiveError> {
        let items = data
            .iter()
            .map(|&v| finite_f64(v, name))
            .collect::<Result<_, _>>()?;
        self.put(name, Node::List(items))
    }

    fn str_array(&mut self, data: &mut Vec<String>, name: &str) -> Result<(), ArchiveError> {
        let items = data.iter().cloned().map(Node::String).collect();
        self.put(name, Node::List(items))
    }

    fn plain_obj_array(
        &mut self,
        data: &mut Vec<PlainMap>,
        name: &str,
    ) -> Result<(), ArchiveError> {
        let mut items = Vec::with_capacity(data.len());
        for entries in data.iter() {
            items.push(self.plain_map_node(entries, name)?);
        }
        self.put(name, Node::List(items))
    }

    fn serializable_obj_array(
        &mut self,
        data: &mut Option<Vec<Option<ObjectHandle>>>,
        name: &str,
    ) -> Result<(), ArchiveError> {
        let Some(objects) = data else {
            return self.put(name, Node::Null);
        };
        let mut items = Vec::with_capacity(objects.len());
        for object in objects.iter() {
            items.push(self.write_object(object.as_ref())?);
        }
        self.put(name, Node::List(items))
    }
}
