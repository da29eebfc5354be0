//! Deduplicating string storage for the binary format.
//!
//! The binary writer keeps two of these, one for plain strings and one for
//! external-asset uuids. Each distinct value is stored once and referenced
//! everywhere else by its `u32` index.

use std::collections::HashMap;

/// Index of an interned string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StringId(pub u32);

impl std::fmt::Display for StringId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StringId({})", self.0)
    }
}

/// An append-only interning table. Indices are assigned in first-seen order.
#[derive(Debug, Default)]
pub struct StringTable {
    strings: Vec<String>,
    lookup: HashMap<String, StringId>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string.
    ///
    /// Returns its id and whether this call inserted it.
    pub fn intern(&mut self, s: &str) -> (StringId, bool) {
        if let Some(&id) = self.lookup.get(s) {
            return (id, false);
        }
        let id = StringId(self.strings.len() as u32);
        self.strings.push(s.to_owned());
        self.lookup.insert(s.to_owned(), id);
        (id, true)
    }

    /// Try to resolve an id, returning `None` if out of range.
    pub fn try_get(&self, id: StringId) -> Option<&str> {
        self.strings.get(id.0 as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(String::as_str)
    }
}

impl FromIterator<String> for StringTable {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut table = Self::new();
        for s in iter {
            // Decoded tables may legitimately repeat a value; keep positions.
            let id = StringId(table.strings.len() as u32);
            table.lookup.entry(s.clone()).or_insert(id);
            table.strings.push(s);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_string_gets_index_zero() {
        let mut table = StringTable::new();
        assert_eq!(table.intern("Point"), (StringId(0), true));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn deduplication() {
        let mut table = StringTable::new();
        let (a, _) = table.intern("world");
        assert_eq!(table.intern("world"), (a, false));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn try_get_invalid() {
        let table = StringTable::new();
        assert!(table.try_get(StringId(999)).is_none());
    }

    #[test]
    fn decoded_table_keeps_positions() {
        let table: StringTable = ["a", "b", "a"].into_iter().map(String::from).collect();
        assert_eq!(table.len(), 3);
        assert_eq!(table.try_get(StringId(2)), Some("a"));
        assert_eq!(table.iter().collect::<Vec<_>>(), vec!["a", "b", "a"]);
    }
}
