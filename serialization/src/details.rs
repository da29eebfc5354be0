//! Collected cross-asset references.
//!
//! Readers never load external assets themselves. Every field that points
//! at one is left empty and described by a [`DependRecord`] so the host can
//! fetch the asset and assign it afterwards.

use std::fmt;

use crate::pool::Poolable;
use crate::serializable::ObjectHandle;

/// One unresolved external reference.
#[derive(Clone)]
pub struct DependRecord {
    /// Object whose field holds the reference.
    pub owner: ObjectHandle,
    /// Name of that field.
    pub property: String,
    /// External asset identifier.
    pub uuid: String,
    /// Class the field expects once resolved.
    pub expected_type: String,
}

impl fmt::Debug for DependRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let owner = match self.owner.try_lock() {
            Some(obj) => obj.class_id().to_owned(),
            None => String::from("<locked>"),
        };
        f.debug_struct("DependRecord")
            .field("owner", &owner)
            .field("property", &self.property)
            .field("uuid", &self.uuid)
            .field("expected_type", &self.expected_type)
            .finish()
    }
}

/// Dependency collector filled by a reader during one deserialization.
#[derive(Debug, Default)]
pub struct Details {
    records: Vec<DependRecord>,
}

impl Details {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `owner.property` refers to the external asset `uuid`.
    pub fn push(
        &mut self,
        owner: ObjectHandle,
        property: impl Into<String>,
        uuid: impl Into<String>,
        expected_type: impl Into<String>,
    ) {
        self.records.push(DependRecord {
            owner,
            property: property.into(),
            uuid: uuid.into(),
            expected_type: expected_type.into(),
        });
    }

    pub fn records(&self) -> &[DependRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct uuids in first-seen order.
    pub fn uuids(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for record in &self.records {
            if !seen.contains(&record.uuid.as_str()) {
                seen.push(record.uuid.as_str());
            }
        }
        seen
    }

    /// Move the records out, leaving the collector empty.
    pub fn take_records(&mut self) -> Vec<DependRecord> {
        std::mem::take(&mut self.records)
    }

    /// Drop all records, keeping the allocation.
    pub fn reset(&mut self) {
        self.records.clear();
    }
}

impl Poolable for Details {
    fn new_empty() -> Self {
        Self::new()
    }

    fn reset(&mut self) {
        Details::reset(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Pool;
    use crate::serializable::{Serializable, share};

    struct Owner;

    impl Serializable for Owner {
        fn class_id(&self) -> &str {
            "Owner"
        }
    }

    #[test]
    fn push_keeps_order() {
        let owner = share(Owner);
        let mut details = Details::new();
        details.push(owner.clone(), "texture", "abc123", "Texture");
        details.push(owner, "mesh", "def456", "Mesh");

        assert_eq!(details.len(), 2);
        assert_eq!(details.records()[0].property, "texture");
        assert_eq!(details.records()[1].uuid, "def456");
    }

    #[test]
    fn uuids_are_distinct() {
        let owner = share(Owner);
        let mut details = Details::new();
        details.push(owner.clone(), "a", "u1", "T");
        details.push(owner.clone(), "b", "u2", "T");
        details.push(owner, "c", "u1", "T");
        assert_eq!(details.uuids(), vec!["u1", "u2"]);
    }

    #[test]
    fn pooled_details_come_back_empty() {
        let pool = Pool::<Details>::new();
        {
            let mut details = pool.checkout();
            details.push(share(Owner), "texture", "abc123", "Texture");
            assert_eq!(details.len(), 1);
        }
        let details = pool.checkout();
        assert!(details.is_empty());
    }

    #[test]
    fn debug_shows_owner_class() {
        let mut details = Details::new();
        details.push(share(Owner), "texture", "abc123", "Texture");
        let text = format!("{:?}", details.records()[0]);
        assert!(text.contains("\"Owner\""));
        assert!(text.contains("abc123"));
    }
}
