//! Filesystem tree: an arena of nodes plus a path index.
//!
//! Parent/child links live in each directory's [`DirIndex`] as arena slots,
//! so there are no ownership cycles. The path index maps every normalized
//! absolute path to its slot and is kept in step with the links by every
//! structural operation. All paths given to this module are already
//! normalized; errors are bare [`ErrorKind`]s that the engine tags with the
//! operation and the caller's path.
//!
//! The tree itself is not synchronized. The engine wraps it in a lock and
//! calls the mutating methods with the write side held, which makes each of
//! them atomic to observers. Node locks are only ever taken one at a time
//! while the tree lock is held.

use std::collections::HashMap;
use std::sync::Arc;

use super::node::{Node, NodeId};
use crate::error::ErrorKind;
use crate::path::{self, ROOT};
use crate::types::{FileAttr, FileMode};

type TreeResult<T> = Result<T, ErrorKind>;

/// Permission bits of the root directory.
const ROOT_PERM: u32 = 0o755;

#[derive(Debug)]
pub(crate) struct Tree {
    slots: Vec<Option<Arc<Node>>>,
    free: Vec<usize>,
    index: HashMap<String, NodeId>,
    root: NodeId,
}

impl Tree {
    pub fn new() -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            root: NodeId(0),
        };
        tree.root = tree.alloc(Node::dir(ROOT, FileMode::new(ROOT_PERM)));
        tree.index.insert(ROOT.to_string(), tree.root);
        tree
    }

    // ========================================================================
    // Arena
    // ========================================================================

    fn alloc(&mut self, node: Node) -> NodeId {
        let node = Some(Arc::new(node));
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = node;
                NodeId(slot)
            }
            None => {
                self.slots.push(node);
                NodeId(self.slots.len() - 1)
            }
        }
    }

    /// Free a slot. Open handles keep their own reference to the node.
    fn release(&mut self, id: NodeId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            if slot.take().is_some() {
                self.free.push(id.0);
            }
        }
    }

    fn node(&self, id: NodeId) -> TreeResult<&Arc<Node>> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(ErrorKind::NotExist)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Find the slot for `path`.
    ///
    /// Hits come straight from the index. On a miss the links are walked from
    /// the root to tell a missing entry from a file used as a directory.
    pub fn resolve(&self, path: &str) -> TreeResult<NodeId> {
        if let Some(id) = self.index.get(path) {
            return Ok(*id);
        }
        let mut current = self.root;
        for name in path::components(path) {
            let node = self.node(current)?;
            let state = node.lock();
            let children = state.children().ok_or(ErrorKind::NotDirectory)?;
            current = children.get(name).ok_or(ErrorKind::NotExist)?;
        }
        Ok(current)
    }

    pub fn lookup(&self, path: &str) -> TreeResult<Arc<Node>> {
        let id = self.resolve(path)?;
        self.node(id).cloned()
    }

    /// Resolve the parent of `path`, which must be a directory.
    fn parent_dir(&self, path: &str) -> TreeResult<NodeId> {
        let (parent, _) = path::split(path).ok_or(ErrorKind::Exist)?;
        let id = self.resolve(parent)?;
        if !self.node(id)?.is_dir() {
            return Err(ErrorKind::NotDirectory);
        }
        Ok(id)
    }

    /// Metadata of a directory's children in name order.
    ///
    /// Child slots are copied out under the directory's lock, then each child
    /// is locked on its own.
    pub fn read_dir(&self, path: &str) -> TreeResult<Vec<FileAttr>> {
        let dir = self.lookup(path)?;
        let ids: Vec<NodeId> = {
            let state = dir.lock();
            let children = state.children().ok_or(ErrorKind::NotDirectory)?;
            children.iter().map(|(_, id)| id).collect()
        };
        ids.into_iter()
            .map(|id| self.node(id).map(|node| node.attr()))
            .collect()
    }

    /// Every indexed path, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.index.keys().cloned().collect();
        paths.sort();
        paths
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Attach `node` at `path`. The parent must exist and be a directory.
    pub fn insert(&mut self, path: &str, node: Node) -> TreeResult<Arc<Node>> {
        let parent = self.parent_dir(path)?;
        if self.index.contains_key(path) {
            return Err(ErrorKind::Exist);
        }
        let (_, name) = path::split(path).ok_or(ErrorKind::Exist)?;
        let id = self.alloc(node);
        let linked = {
            let parent = self.node(parent)?;
            let mut state = parent.lock();
            match state.children_mut() {
                Some(children) => children.insert(name, id).map_err(|_| ErrorKind::Exist),
                None => Err(ErrorKind::NotDirectory),
            }
        };
        if let Err(kind) = linked {
            self.release(id);
            return Err(kind);
        }
        self.index.insert(path.to_string(), id);
        self.node(id).cloned()
    }

    /// Create `path` and every missing ancestor as directories.
    ///
    /// Existing directories are left as they are. Nothing is created unless
    /// every existing component is a directory, so a failure leaves the tree
    /// untouched.
    pub fn mkdir_all(&mut self, path: &str, mode: FileMode) -> TreeResult<()> {
        let mut current = ROOT.to_string();
        let mut missing = Vec::new();
        for name in path::components(path) {
            current = path::join(&current, name);
            match self.index.get(&current) {
                Some(id) if missing.is_empty() => {
                    if !self.node(*id)?.is_dir() {
                        return Err(ErrorKind::NotDirectory);
                    }
                }
                _ => missing.push(current.clone()),
            }
        }
        for dir in missing {
            let leaf = path::split(&dir).map(|(_, name)| name).unwrap_or(ROOT);
            let node = Node::dir(leaf, mode);
            self.insert(&dir, node)?;
        }
        Ok(())
    }

    /// Detach `path`. Directories must be empty unless `recursive`.
    pub fn remove(&mut self, path: &str, recursive: bool) -> TreeResult<()> {
        let (parent, name) = path::split(path).ok_or(ErrorKind::PermissionDenied)?;
        let id = self.resolve(path)?;
        if !recursive {
            let node = self.node(id)?;
            let state = node.lock();
            if state.children().is_some_and(|c| !c.is_empty()) {
                return Err(ErrorKind::NotEmpty);
            }
        }
        self.unlink(parent, name)?;
        self.drop_subtree(path, id);
        Ok(())
    }

    /// Remove every child of the root.
    pub fn clear(&mut self) -> TreeResult<()> {
        let children: Vec<(String, NodeId)> = {
            let root = self.node(self.root)?;
            let state = root.lock();
            match state.children() {
                Some(children) => children
                    .iter()
                    .map(|(name, id)| (name.to_string(), id))
                    .collect(),
                None => Vec::new(),
            }
        };
        for (name, id) in children {
            self.unlink(ROOT, &name)?;
            self.drop_subtree(&path::join(ROOT, &name), id);
        }
        Ok(())
    }

    /// Move the entry at `old` (and everything beneath it) to `new`.
    ///
    /// An existing destination is replaced the way POSIX rename does: a file
    /// by a file, an empty directory by a directory. Attributes and content
    /// of the moved node are untouched.
    pub fn rename(&mut self, old: &str, new: &str) -> TreeResult<()> {
        if old == ROOT || new == ROOT {
            return Err(ErrorKind::PermissionDenied);
        }
        let id = self.resolve(old)?;
        if old == new {
            return Ok(());
        }
        let new_parent = self.parent_dir(new)?;
        if path::is_within(new, old) {
            return Err(ErrorKind::InvalidArgument);
        }

        let moving_dir = self.node(id)?.is_dir();
        if let Some(existing) = self.index.get(new).copied() {
            let target = self.node(existing)?;
            match (moving_dir, target.is_dir()) {
                (true, false) => return Err(ErrorKind::NotDirectory),
                (false, true) => return Err(ErrorKind::IsDirectory),
                (true, true) => {
                    let state = target.lock();
                    if state.children().is_some_and(|c| !c.is_empty()) {
                        return Err(ErrorKind::NotEmpty);
                    }
                }
                (false, false) => {}
            }
            let (parent, name) = path::split(new).ok_or(ErrorKind::PermissionDenied)?;
            self.unlink(parent, name)?;
            self.drop_subtree(new, existing);
        }

        let (old_parent, old_name) = path::split(old).ok_or(ErrorKind::PermissionDenied)?;
        let (_, new_name) = path::split(new).ok_or(ErrorKind::PermissionDenied)?;
        self.unlink(old_parent, old_name)?;
        {
            let parent = self.node(new_parent)?;
            let mut state = parent.lock();
            if let Some(children) = state.children_mut() {
                children.insert(new_name, id).map_err(|_| ErrorKind::Exist)?;
            }
        }
        self.node(id)?.lock().name = new_name.to_string();
        self.rekey(old, new, id);
        Ok(())
    }

    /// Drop `name` from the children of the directory at `parent`.
    fn unlink(&mut self, parent: &str, name: &str) -> TreeResult<NodeId> {
        let parent = self.lookup(parent)?;
        let mut state = parent.lock();
        state
            .children_mut()
            .and_then(|children| children.remove(name))
            .ok_or(ErrorKind::NotExist)
    }

    /// Forget an already unlinked subtree: index entries and slots.
    fn drop_subtree(&mut self, path: &str, id: NodeId) {
        for (entry, id) in self.subtree(path, id) {
            self.index.remove(&entry);
            self.release(id);
        }
    }

    /// Re-key the index for a subtree that moved from `old` to `new`.
    fn rekey(&mut self, old: &str, new: &str, id: NodeId) {
        let entries = self.subtree(old, id);
        for (entry, _) in &entries {
            self.index.remove(entry);
        }
        for (entry, id) in entries {
            self.index.insert(path::rebase(&entry, old, new), id);
        }
    }

    /// Paths and slots of `id` and all its descendants, found through the
    /// links. `path` is the path `id` had in the index.
    fn subtree(&self, path: &str, id: NodeId) -> Vec<(String, NodeId)> {
        let mut out = Vec::new();
        let mut stack = vec![(path.to_string(), id)];
        while let Some((entry, id)) = stack.pop() {
            if let Ok(node) = self.node(id) {
                let state = node.lock();
                if let Some(children) = state.children() {
                    for (name, child) in children.iter() {
                        stack.push((path::join(&entry, name), child));
                    }
                }
            }
            out.push((entry, id));
        }
        out
    }

    // ========================================================================
    // Consistency
    // ========================================================================

    /// Differences between the path index and the parent/child links.
    /// Empty when both views agree.
    pub fn inconsistencies(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let linked = self.subtree(ROOT, self.root);
        for (entry, id) in &linked {
            match self.index.get(entry) {
                Some(indexed) if indexed == id => {}
                Some(indexed) => problems.push(format!(
                    "{entry}: linked as slot {} but indexed as slot {}",
                    id.0, indexed.0
                )),
                None => problems.push(format!("{entry}: linked but not indexed")),
            }
            if self.node(*id).is_err() {
                problems.push(format!("{entry}: slot {} is empty", id.0));
            }
        }
        if linked.len() != self.index.len() {
            let reachable: std::collections::HashSet<&str> =
                linked.iter().map(|(entry, _)| entry.as_str()).collect();
            for entry in self.index.keys() {
                if !reachable.contains(entry.as_str()) {
                    problems.push(format!("{entry}: indexed but not linked"));
                }
            }
        }
        problems
    }
}
