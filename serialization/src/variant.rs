//! Dynamically-typed values carried by `any_value` and `plain_obj`.

use std::fmt;
use std::sync::Arc;

use crate::serializable::ObjectHandle;
use crate::tag::SerializeTag;

/// A generic record: ordered `(key, value)` pairs.
pub type PlainMap = Vec<(String, Variant)>;

/// A value whose kind is only known at runtime.
#[derive(Clone, Default)]
pub enum Variant {
    /// Absent value. Text archives omit the key entirely.
    #[default]
    Undefined,
    Null,
    Number(f64),
    Boolean(bool),
    String(String),
    Array(Vec<Variant>),
    Map(PlainMap),
    /// A serializable object, encoded like a `serializable_obj` field.
    Object(ObjectHandle),
}

impl Variant {
    /// The binary tag this value is written with.
    pub fn tag(&self) -> SerializeTag {
        match self {
            Self::Undefined => SerializeTag::Undefined,
            Self::Null => SerializeTag::Null,
            Self::Number(_) => SerializeTag::Number,
            Self::Boolean(_) => SerializeTag::Boolean,
            Self::String(_) => SerializeTag::String,
            Self::Array(_) => SerializeTag::Array,
            Self::Map(_) => SerializeTag::Map,
            Self::Object(_) => SerializeTag::SerializableObject,
        }
    }

    /// Look up a key when this is a [`Variant::Map`].
    pub fn get(&self, key: &str) -> Option<&Variant> {
        match self {
            Self::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectHandle> {
        match self {
            Self::Object(h) => Some(h),
            _ => None,
        }
    }
}

impl From<Option<ObjectHandle>> for Variant {
    fn from(value: Option<ObjectHandle>) -> Self {
        value.map_or(Self::Null, Self::Object)
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "Undefined"),
            Self::Null => write!(f, "Null"),
            Self::Number(v) => f.debug_tuple("Number").field(v).finish(),
            Self::Boolean(v) => f.debug_tuple("Boolean").field(v).finish(),
            Self::String(v) => f.debug_tuple("String").field(v).finish(),
            Self::Array(v) => f.debug_tuple("Array").field(v).finish(),
            Self::Map(v) => f.debug_tuple("Map").field(v).finish(),
            Self::Object(h) => match h.try_lock() {
                Some(obj) => write!(f, "Object({})", obj.class_id()),
                None => write!(f, "Object(<locked>)"),
            },
        }
    }
}
