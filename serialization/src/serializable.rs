//! The capability contract application objects implement to be archived.
//!
//! An object participates through [`Serializable`]. Which of its two
//! serialization forms it offers is declared by [`Serializable::capabilities`]
//! instead of being detected at runtime, and [`needs_inline`] turns that into
//! the inline-vs-referenced decision both archive formats share.

use std::any::Any;
use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::Mutex;

use crate::archive::Archive;
use crate::error::ArchiveError;

/// Shared, identity-carrying handle to a serializable object.
///
/// Two handles refer to the same object iff [`Arc::ptr_eq`] holds. Archives
/// deduplicate by that identity.
pub type ObjectHandle = Arc<Mutex<dyn Serializable>>;

/// Wrap a value in a new [`ObjectHandle`].
pub fn share<T: Serializable>(value: T) -> ObjectHandle {
    Arc::new(Mutex::new(value))
}

/// Identity key of a handle (address of the shared allocation).
pub(crate) fn object_key(handle: &ObjectHandle) -> usize {
    Arc::as_ptr(handle) as *const () as usize
}

bitflags! {
    /// Serialization forms an object supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Has a top-level, addressable form ([`Serializable::serialize`]).
        const SERIALIZE = 1 << 0;
        /// Has an inline form ([`Serializable::serialize_inline_data`]).
        const INLINE = 1 << 1;
    }
}

/// An object that can be written to and read from an [`Archive`].
///
/// The same method serves both directions: writers read each field,
/// readers overwrite it. Field calls must happen in the same order on
/// both sides.
pub trait Serializable: Any {
    /// Class identifier stored as `__type__` and handed to the class finder.
    fn class_id(&self) -> &str;

    /// Forms this object implements. Defaults to the top-level form only.
    fn capabilities(&self) -> Capabilities {
        Capabilities::SERIALIZE
    }

    /// Top-level form.
    fn serialize(&mut self, _ar: &mut dyn Archive) -> Result<(), ArchiveError> {
        Err(ArchiveError::Unimplemented("serialize"))
    }

    /// Inline form, embedded in the parent's stream without an identity.
    fn serialize_inline_data(&mut self, _ar: &mut dyn Archive) -> Result<(), ArchiveError> {
        Err(ArchiveError::Unimplemented("serialize_inline_data"))
    }

    /// Called before the object's fields are written.
    fn on_before_serialize(&mut self) {}

    /// Called after the object's fields have been read.
    fn on_after_deserialize(&mut self) {}
}

impl dyn Serializable {
    /// Downcast to a concrete type.
    pub fn downcast_ref<T: Serializable>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }

    /// Mutably downcast to a concrete type.
    pub fn downcast_mut<T: Serializable>(&mut self) -> Option<&mut T> {
        (self as &mut dyn Any).downcast_mut::<T>()
    }
}

/// Whether an object is embedded in its parent instead of getting its own node.
///
/// Objects offering both forms are referenced when they are the document
/// root and inlined everywhere else. Objects offering only the inline form
/// are always inlined.
pub fn needs_inline(capabilities: Capabilities, is_root: bool) -> bool {
    if capabilities.contains(Capabilities::SERIALIZE | Capabilities::INLINE) {
        !is_root
    } else {
        capabilities.contains(Capabilities::INLINE)
    }
}

/// Run the form selected for `object` against `ar`.
///
/// `inline` is the decision made by [`needs_inline`]. A referenced object
/// without a top-level form (only possible for the root) falls back to its
/// inline form.
pub(crate) fn run_serialize(
    object: &mut dyn Serializable,
    ar: &mut dyn Archive,
    inline: bool,
) -> Result<(), ArchiveError> {
    if inline || !object.capabilities().contains(Capabilities::SERIALIZE) {
        object.serialize_inline_data(ar)
    } else {
        object.serialize(ar)
    }
}

/// Lock `handle` for the duration of a serialize call.
///
/// `type_id` names the class in the error when the caller already knows it.
pub(crate) fn lock_object<'h>(
    handle: &'h ObjectHandle,
    type_id: Option<&str>,
) -> Result<parking_lot::MutexGuard<'h, dyn Serializable>, ArchiveError> {
    handle.try_lock().ok_or_else(|| ArchiveError::ObjectBusy {
        type_id: type_id.map(str::to_owned),
    })
}

/// Whether `handle` is an unlocked object of class `type_id`.
pub(crate) fn has_class(handle: &ObjectHandle, type_id: &str) -> bool {
    handle
        .try_lock()
        .is_some_and(|object| object.class_id() == type_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    impl Serializable for Dummy {
        fn class_id(&self) -> &str {
            "Dummy"
        }
    }

    #[test]
    fn serialize_only_is_never_inlined() {
        assert!(!needs_inline(Capabilities::SERIALIZE, true));
        assert!(!needs_inline(Capabilities::SERIALIZE, false));
    }

    #[test]
    fn inline_only_is_always_inlined() {
        assert!(needs_inline(Capabilities::INLINE, true));
        assert!(needs_inline(Capabilities::INLINE, false));
    }

    #[test]
    fn both_forms_inline_unless_root() {
        assert!(!needs_inline(Capabilities::all(), true));
        assert!(needs_inline(Capabilities::all(), false));
    }

    #[test]
    fn handles_compare_by_identity() {
        let a = share(Dummy);
        let b = a.clone();
        let c = share(Dummy);
        assert_eq!(object_key(&a), object_key(&b));
        assert_ne!(object_key(&a), object_key(&c));
    }

    #[test]
    fn downcast_through_handle() {
        let handle = share(Dummy);
        let guard = handle.lock();
        assert!(guard.downcast_ref::<Dummy>().is_some());
        assert_eq!(guard.class_id(), "Dummy");
    }

    #[test]
    fn locked_object_is_busy() {
        let handle = share(Dummy);
        let _guard = handle.lock();
        assert_eq!(
            lock_object(&handle, Some("Dummy")).err(),
            Some(ArchiveError::ObjectBusy {
                type_id: Some("Dummy".into())
            })
        );
        assert!(!has_class(&handle, "Dummy"));
    }

    #[test]
    fn class_check_by_id() {
        let handle = share(Dummy);
        assert!(has_class(&handle, "Dummy"));
        assert!(!has_class(&handle, "Other"));
    }
}
