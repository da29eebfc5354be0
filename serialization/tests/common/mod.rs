//! Fixture classes shared by the integration tests.
#![allow(dead_code)]

use redlilium_serialization::{
    Archive, ArchiveError, AssetFormat, Capabilities, Constructor, DeserializeOptions,
    DeserializedAsset, Details, ObjectHandle, OutputOptions, PlainMap, Pool, Serializable,
    SerializedAsset, TextFormat, Variant, deserialize_asset, format, serialize_asset, share,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ---------------------------------------------------------------------------
// Fixture classes
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Serializable for Point {
    fn class_id(&self) -> &str {
        "Point"
    }

    fn serialize(&mut self, ar: &mut dyn Archive) -> Result<(), ArchiveError> {
        ar.float64(&mut self.x, "x")?;
        ar.float64(&mut self.y, "y")
    }
}

/// Inline-only value type.
#[derive(Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Serializable for Vec3 {
    fn class_id(&self) -> &str {
        "Vec3"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::INLINE
    }

    fn serialize_inline_data(&mut self, ar: &mut dyn Archive) -> Result<(), ArchiveError> {
        ar.float32(&mut self.x, "x")?;
        ar.float32(&mut self.y, "y")?;
        ar.float32(&mut self.z, "z")
    }
}

#[derive(Default)]
pub struct Holder {
    pub a: Option<ObjectHandle>,
    pub b: Option<ObjectHandle>,
}

impl Serializable for Holder {
    fn class_id(&self) -> &str {
        "Holder"
    }

    fn serialize(&mut self, ar: &mut dyn Archive) -> Result<(), ArchiveError> {
        ar.serializable_obj(&mut self.a, "a")?;
        ar.serializable_obj(&mut self.b, "b")
    }
}

#[derive(Debug, Default)]
pub struct Shared {
    pub value: i32,
}

impl Serializable for Shared {
    fn class_id(&self) -> &str {
        "Shared"
    }

    fn serialize(&mut self, ar: &mut dyn Archive) -> Result<(), ArchiveError> {
        ar.int32(&mut self.value, "value")
    }
}

/// Asset with both forms. Embedded in another asset it is only a uuid.
#[derive(Debug, Default)]
pub struct Texture {
    pub uuid: String,
    pub width: u32,
}

impl Serializable for Texture {
    fn class_id(&self) -> &str {
        "Texture"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::SERIALIZE | Capabilities::INLINE
    }

    fn serialize(&mut self, ar: &mut dyn Archive) -> Result<(), ArchiveError> {
        ar.str(&mut self.uuid, "uuid")?;
        ar.uint32(&mut self.width, "width")
    }

    fn serialize_inline_data(&mut self, ar: &mut dyn Archive) -> Result<(), ArchiveError> {
        ar.uuid(&mut self.uuid)?;
        ar.uint32(&mut self.width, "width")
    }
}

#[derive(Default)]
pub struct Material {
    pub name: String,
    pub texture: Option<ObjectHandle>,
    pub tint: Option<ObjectHandle>,
}

impl Serializable for Material {
    fn class_id(&self) -> &str {
        "Material"
    }

    fn serialize(&mut self, ar: &mut dyn Archive) -> Result<(), ArchiveError> {
        ar.str(&mut self.name, "name")?;
        ar.serializable_obj(&mut self.texture, "texture")?;
        ar.serializable_obj(&mut self.tint, "tint")
    }
}

/// Exercises every field kind of the archive interface.
#[derive(Default)]
pub struct SceneNode {
    pub name: String,
    pub visible: bool,
    pub bias: i8,
    pub order: i16,
    pub layer: u8,
    pub mask: u16,
    pub id: u32,
    pub position: Option<ObjectHandle>,
    pub parent: Option<ObjectHandle>,
    pub children: Option<Vec<Option<ObjectHandle>>>,
    pub flags: Vec<bool>,
    pub indices: Vec<i32>,
    pub weights: Vec<f32>,
    pub samples: Vec<f64>,
    pub tags: Vec<String>,
    pub meta: PlainMap,
    pub rows: Vec<PlainMap>,
    pub extra: Variant,
}

impl Serializable for SceneNode {
    fn class_id(&self) -> &str {
        "SceneNode"
    }

    fn serialize(&mut self, ar: &mut dyn Archive) -> Result<(), ArchiveError> {
        ar.str(&mut self.name, "name")?;
        ar.boolean(&mut self.visible, "visible")?;
        ar.int8(&mut self.bias, "bias")?;
        ar.int16(&mut self.order, "order")?;
        ar.uint8(&mut self.layer, "layer")?;
        ar.uint16(&mut self.mask, "mask")?;
        ar.uint32(&mut self.id, "id")?;
        ar.serializable_obj(&mut self.position, "position")?;
        ar.serializable_obj(&mut self.parent, "parent")?;
        ar.serializable_obj_array(&mut self.children, "children")?;
        ar.boolean_array(&mut self.flags, "flags")?;
        ar.int32_array(&mut self.indices, "indices")?;
        ar.float32_array(&mut self.weights, "weights")?;
        ar.float64_array(&mut self.samples, "samples")?;
        ar.str_array(&mut self.tags, "tags")?;
        ar.plain_obj(&mut self.meta, "meta")?;
        ar.plain_obj_array(&mut self.rows, "rows")?;
        ar.any_value(&mut self.extra, "extra")
    }
}

/// Inline-only container of references.
#[derive(Default)]
pub struct Group {
    pub members: Option<Vec<Option<ObjectHandle>>>,
}

impl Serializable for Group {
    fn class_id(&self) -> &str {
        "Group"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::INLINE
    }

    fn serialize_inline_data(&mut self, ar: &mut dyn Archive) -> Result<(), ArchiveError> {
        ar.serializable_obj_array(&mut self.members, "members")
    }
}

#[derive(Default)]
pub struct Wrapper {
    pub group: Option<ObjectHandle>,
    pub direct: Option<ObjectHandle>,
}

impl Serializable for Wrapper {
    fn class_id(&self) -> &str {
        "Wrapper"
    }

    fn serialize(&mut self, ar: &mut dyn Archive) -> Result<(), ArchiveError> {
        ar.serializable_obj(&mut self.group, "group")?;
        ar.serializable_obj(&mut self.direct, "direct")
    }
}

/// Counts lifecycle hook calls and records what the archive reported.
#[derive(Default)]
pub struct Hooked {
    pub value: i32,
    pub child: Option<ObjectHandle>,
    pub before_calls: u32,
    pub after_calls: u32,
    pub saw_root: Option<bool>,
    pub saw_reading: Option<bool>,
    pub saw_exporting: Option<bool>,
}

impl Serializable for Hooked {
    fn class_id(&self) -> &str {
        "Hooked"
    }

    fn serialize(&mut self, ar: &mut dyn Archive) -> Result<(), ArchiveError> {
        self.saw_root = Some(ar.is_root());
        self.saw_reading = Some(ar.is_reading());
        self.saw_exporting = Some(ar.is_exporting());
        ar.int32(&mut self.value, "value")?;
        ar.serializable_obj(&mut self.child, "child")
    }

    fn on_before_serialize(&mut self) {
        self.before_calls += 1;
    }

    fn on_after_deserialize(&mut self) {
        self.after_calls += 1;
    }
}

#[derive(Default)]
pub struct Labels {
    pub a: String,
    pub b: String,
    pub list: Vec<String>,
}

impl Serializable for Labels {
    fn class_id(&self) -> &str {
        "Labels"
    }

    fn serialize(&mut self, ar: &mut dyn Archive) -> Result<(), ArchiveError> {
        ar.str(&mut self.a, "a")?;
        ar.str(&mut self.b, "b")?;
        ar.str_array(&mut self.list, "list")
    }
}

/// Uses the one operation no archive supports.
#[derive(Default)]
pub struct Blob {
    pub bytes: Vec<u8>,
}

impl Serializable for Blob {
    fn class_id(&self) -> &str {
        "Blob"
    }

    fn serialize(&mut self, ar: &mut dyn Archive) -> Result<(), ArchiveError> {
        ar.typed_array(&mut self.bytes, "bytes")
    }
}

/// Serializable, but unknown to [`find_class`].
#[derive(Default)]
pub struct Ghost {
    pub value: i32,
}

impl Serializable for Ghost {
    fn class_id(&self) -> &str {
        "Ghost"
    }

    fn serialize(&mut self, ar: &mut dyn Archive) -> Result<(), ArchiveError> {
        ar.int32(&mut self.value, "value")
    }
}

// ---------------------------------------------------------------------------
// Class lookup and helpers
// ---------------------------------------------------------------------------

fn make<T: Serializable + Default>() -> ObjectHandle {
    share(T::default())
}

pub fn find_class(type_id: &str, _owner: Option<&ObjectHandle>, _property: &str) -> Option<Constructor> {
    let ctor = match type_id {
        "Point" => make::<Point> as Constructor,
        "Vec3" => make::<Vec3> as Constructor,
        "Holder" => make::<Holder> as Constructor,
        "Shared" => make::<Shared> as Constructor,
        "Texture" => make::<Texture> as Constructor,
        "Material" => make::<Material> as Constructor,
        "SceneNode" => make::<SceneNode> as Constructor,
        "Group" => make::<Group> as Constructor,
        "Wrapper" => make::<Wrapper> as Constructor,
        "Hooked" => make::<Hooked> as Constructor,
        "Labels" => make::<Labels> as Constructor,
        "Blob" => make::<Blob> as Constructor,
        _ => return None,
    };
    Some(ctor)
}

/// Borrow the concrete object behind a handle.
pub fn with<T: Serializable, R>(handle: &ObjectHandle, f: impl FnOnce(&T) -> R) -> R {
    let guard = handle.lock();
    let object = guard
        .downcast_ref::<T>()
        .unwrap_or_else(|| panic!("unexpected class '{}'", guard.class_id()));
    f(object)
}

pub fn serialize(root: &ObjectHandle, format: AssetFormat) -> SerializedAsset {
    serialize_asset(root, format, OutputOptions::default()).expect("serialize")
}

/// Text documents additionally go through JSON bytes.
pub fn through_bytes(asset: SerializedAsset) -> SerializedAsset {
    match asset {
        SerializedAsset::Text(doc) => {
            let bytes = format::encode(&doc, TextFormat::Json).expect("encode");
            SerializedAsset::Text(format::decode(&bytes, TextFormat::Json).expect("decode"))
        }
        binary => binary,
    }
}

pub fn deserialize(asset: SerializedAsset) -> DeserializedAsset {
    let pool = Pool::<Details>::new();
    let mut options = DeserializeOptions::new(&find_class);
    deserialize_asset(asset, &pool, &mut options).expect("deserialize")
}

pub fn round_trip(root: &ObjectHandle, format: AssetFormat) -> DeserializedAsset {
    deserialize(through_bytes(serialize(root, format)))
}

/// Round trip and return the loaded root.
pub fn reload(root: &ObjectHandle, format: AssetFormat) -> ObjectHandle {
    round_trip(root, format).root.expect("root class is registered")
}
