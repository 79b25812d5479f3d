//! Read-only item lookup consumed by the demand engine

use std::collections::{BTreeMap, HashMap};

use regex::Regex;

use crate::models::ItemDefinition;

/// Lookup from item id to definition
///
/// Implementations must be fully populated before planning starts and must
/// not change while a tree is being built.
pub trait Catalog {
    fn lookup(&self, item_id: u64) -> Option<&ItemDefinition>;

    fn contains(&self, item_id: u64) -> bool {
        self.lookup(item_id).is_some()
    }
}

impl Catalog for HashMap<u64, ItemDefinition> {
    fn lookup(&self, item_id: u64) -> Option<&ItemDefinition> {
        self.get(&item_id)
    }
}

impl Catalog for BTreeMap<u64, ItemDefinition> {
    fn lookup(&self, item_id: u64) -> Option<&ItemDefinition> {
        self.get(&item_id)
    }
}

/// In-memory catalog, ordered by item id
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    items: BTreeMap<u64, ItemDefinition>,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item, returning the definition it replaced
    pub fn insert(&mut self, item: ItemDefinition) -> Option<ItemDefinition> {
        self.items.insert(item.id, item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemDefinition> {
        self.items.values()
    }

    /// Items whose name or generic name matches `pattern`
    pub fn search<'a>(&'a self, pattern: &'a Regex) -> impl Iterator<Item = &'a ItemDefinition> {
        self.items
            .values()
            .filter(move |item| pattern.is_match(&item.name) || pattern.is_match(&item.generic_name))
    }
}

impl Catalog for ItemCatalog {
    fn lookup(&self, item_id: u64) -> Option<&ItemDefinition> {
        self.items.get(&item_id)
    }
}

impl FromIterator<ItemDefinition> for ItemCatalog {
    fn from_iter<I: IntoIterator<Item = ItemDefinition>>(iter: I) -> Self {
        let mut catalog = ItemCatalog::new();
        for item in iter {
            catalog.insert(item);
        }
        catalog
    }
}
