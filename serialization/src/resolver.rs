//! Mapping `__type__` ids back to constructible classes.
//!
//! The crate keeps no class registry of its own. Readers ask a host-supplied
//! [`ClassFinder`] for a [`Constructor`] and report ids it cannot resolve
//! through an optional callback, at most once per id per call.

use std::collections::HashSet;

use crate::serializable::{ObjectHandle, has_class};

/// Creates a fresh, default-initialised instance of a class.
pub type Constructor = fn() -> ObjectHandle;

/// Host-side class lookup.
pub trait ClassFinder {
    /// Resolve `type_id`.
    ///
    /// `owner` and `property` describe the field being decoded; both are
    /// absent for the document root.
    fn find_class(
        &self,
        type_id: &str,
        owner: Option<&ObjectHandle>,
        property: &str,
    ) -> Option<Constructor>;
}

impl<F> ClassFinder for F
where
    F: Fn(&str, Option<&ObjectHandle>, &str) -> Option<Constructor>,
{
    fn find_class(
        &self,
        type_id: &str,
        owner: Option<&ObjectHandle>,
        property: &str,
    ) -> Option<Constructor> {
        self(type_id, owner, property)
    }
}

type MissingClassReporter<'a> = Box<dyn FnMut(&str) + 'a>;

/// Collaborators and settings of one deserialization call.
pub struct DeserializeOptions<'a> {
    class_finder: &'a dyn ClassFinder,
    missing_class: Option<MissingClassReporter<'a>>,
    reported: HashSet<String>,
}

impl<'a> DeserializeOptions<'a> {
    pub fn new(class_finder: &'a dyn ClassFinder) -> Self {
        Self {
            class_finder,
            missing_class: None,
            reported: HashSet::new(),
        }
    }

    /// Install a callback invoked once for every unresolved class id.
    pub fn with_missing_class_reporter(mut self, reporter: impl FnMut(&str) + 'a) -> Self {
        self.missing_class = Some(Box::new(reporter));
        self
    }

    pub(crate) fn find_class(
        &self,
        type_id: &str,
        owner: Option<&ObjectHandle>,
        property: &str,
    ) -> Option<Constructor> {
        self.class_finder.find_class(type_id, owner, property)
    }

    /// The object to decode a `type_id` slot into.
    ///
    /// `existing` is kept when it already has that class. Otherwise a fresh
    /// instance is constructed. `None` means the class is unknown; it has
    /// been reported.
    pub(crate) fn instantiate(
        &mut self,
        existing: Option<ObjectHandle>,
        type_id: &str,
        owner: Option<&ObjectHandle>,
        property: &str,
    ) -> Option<ObjectHandle> {
        if let Some(object) = existing.filter(|object| has_class(object, type_id)) {
            return Some(object);
        }
        match self.find_class(type_id, owner, property) {
            Some(ctor) => Some(ctor()),
            None => {
                self.report_missing(type_id);
                None
            }
        }
    }

    /// Report an unresolved class id unless it was already reported.
    pub(crate) fn report_missing(&mut self, type_id: &str) {
        if !self.reported.insert(type_id.to_owned()) {
            return;
        }
        log::warn!("missing class '{type_id}', field left empty");
        if let Some(reporter) = self.missing_class.as_mut() {
            reporter(type_id);
        }
    }

    /// Class ids reported so far.
    pub fn reported_classes(&self) -> impl Iterator<Item = &str> {
        self.reported.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::serializable::{Serializable, share};

    struct Thing;

    impl Serializable for Thing {
        fn class_id(&self) -> &str {
            "Thing"
        }
    }

    fn make_thing() -> ObjectHandle {
        share(Thing)
    }

    fn finder(type_id: &str, _owner: Option<&ObjectHandle>, _property: &str) -> Option<Constructor> {
        match type_id {
            "Thing" => Some(make_thing as Constructor),
            _ => None,
        }
    }

    #[test]
    fn closures_are_finders() {
        let options = DeserializeOptions::new(&finder);
        let ctor = options.find_class("Thing", None, "").unwrap();
        assert_eq!(ctor().lock().class_id(), "Thing");
        assert!(options.find_class("Other", None, "").is_none());
    }

    #[test]
    fn missing_class_reported_once_per_id() {
        let mut calls = Vec::new();
        {
            let mut options = DeserializeOptions::new(&finder)
                .with_missing_class_reporter(|id| calls.push(id.to_owned()));
            options.report_missing("Ghost");
            options.report_missing("Ghost");
            options.report_missing("Phantom");
        }
        assert_eq!(calls, vec!["Ghost", "Phantom"]);
    }

    #[test]
    fn instantiate_reuses_matching_object() {
        let mut options = DeserializeOptions::new(&finder);
        let existing = make_thing();
        let object = options
            .instantiate(Some(existing.clone()), "Thing", None, "")
            .unwrap();
        assert!(Arc::ptr_eq(&object, &existing));

        let fresh = options.instantiate(None, "Thing", None, "").unwrap();
        assert!(!Arc::ptr_eq(&fresh, &existing));
        assert!(options.instantiate(Some(existing), "Ghost", None, "").is_none());
        assert_eq!(options.reported_classes().collect::<Vec<_>>(), vec!["Ghost"]);
    }

    #[test]
    fn reporting_without_callback_is_tracked() {
        let mut options = DeserializeOptions::new(&finder);
        options.report_missing("Ghost");
        assert_eq!(options.reported_classes().collect::<Vec<_>>(), vec!["Ghost"]);
    }
}
