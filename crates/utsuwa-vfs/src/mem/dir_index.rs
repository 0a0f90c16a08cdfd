//! Child-name index of one directory.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use super::node::NodeId;

/// Maps child names to arena slots. Names are unique and iterate sorted.
#[derive(Debug, Default, Clone)]
pub(crate) struct DirIndex {
    children: BTreeMap<String, NodeId>,
}

impl DirIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `name`. Returns the occupant instead if the name is taken.
    pub fn insert(&mut self, name: &str, id: NodeId) -> Result<(), NodeId> {
        match self.children.entry(name.to_string()) {
            Entry::Occupied(existing) => Err(*existing.get()),
            Entry::Vacant(slot) => {
                slot.insert(id);
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<NodeId> {
        self.children.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.children.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Children in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.children.iter().map(|(name, id)| (name.as_str(), *id))
    }
}
