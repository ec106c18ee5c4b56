//! Ordered collection of tables keyed by table ID.

use std::ops::Index;

use crate::table::data::DataTable;

/// Tables in insertion order; inserting an existing ID replaces it in place.
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    entries: Vec<(String, DataTable)>,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, table: DataTable) {
        let id = id.into();
        match self.entries.iter_mut().find(|(k, _)| *k == id) {
            Some(entry) => entry.1 = table,
            None => self.entries.push((id, table)),
        }
    }

    pub fn get(&self, id: &str) -> Option<&DataTable> {
        self.entries.iter().find(|(k, _)| k == id).map(|(_, t)| t)
    }

    pub fn remove(&mut self, id: &str) -> Option<DataTable> {
        let pos = self.entries.iter().position(|(k, _)| k == id)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataTable)> {
        self.entries.iter().map(|(k, t)| (k.as_str(), t))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Index<&str> for TableSet {
    type Output = DataTable;

    fn index(&self, id: &str) -> &DataTable {
        match self.get(id) {
            Some(table) => table,
            None => panic!("no table {} in set", id),
        }
    }
}

impl IntoIterator for TableSet {
    type Item = (String, DataTable);
    type IntoIter = std::vec::IntoIter<(String, DataTable)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::meta::TableMeta;

    fn table(entity: &str) -> DataTable {
        DataTable::empty(TableMeta::from_pairs([("entity", entity)]))
    }

    #[test]
    fn test_insertion_order_and_replace() {
        let mut set = TableSet::new();
        set.insert("b", table("B"));
        set.insert("a", table("A"));
        set.insert("b", table("B2"));

        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(set["b"].meta.get("entity"), Some("B2"));
        assert_eq!(set.len(), 2);

        assert!(set.remove("a").is_some());
        assert!(set.get("a").is_none());
    }
}
