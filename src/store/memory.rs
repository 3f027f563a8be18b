//! In-memory item store
//!
//! Keeps items in insertion order so listings are predictable, and supports
//! injected failures so callers can exercise partial-progress paths.

use crate::error::StoreError;
use crate::store::{path_segments, ItemStore, StoreEntry};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Item store operations, used for fault injection and the call log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreOp {
    List,
    CreateContainer,
    CreateLeaf,
    ReadLeaf,
    DeleteContainer,
    DeleteLeaf,
    Move,
    Exists,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOp::List => "list",
            StoreOp::CreateContainer => "create_container",
            StoreOp::CreateLeaf => "create_leaf",
            StoreOp::ReadLeaf => "read_leaf",
            StoreOp::DeleteContainer => "delete_container",
            StoreOp::DeleteLeaf => "delete_leaf",
            StoreOp::Move => "move",
            StoreOp::Exists => "exists",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
enum Item {
    Container,
    Leaf(Vec<u8>),
}

#[derive(Debug, Default)]
struct State {
    /// (normalized path, item) in insertion order
    items: Vec<(String, Item)>,
    faults: Vec<(StoreOp, String)>,
    log: Vec<(StoreOp, String)>,
}

impl State {
    fn find(&self, path: &str) -> Option<&Item> {
        self.items.iter().find(|(p, _)| p == path).map(|(_, item)| item)
    }

    fn is_container(&self, path: &str) -> bool {
        path.is_empty() || matches!(self.find(path), Some(Item::Container))
    }

    fn enter(&mut self, op: StoreOp, path: &str) -> Result<(), StoreError> {
        self.log.push((op, path.to_string()));
        if self.faults.iter().any(|(o, p)| *o == op && p == path) {
            return Err(StoreError::Injected {
                op: op.to_string(),
                path: path.to_string(),
            });
        }
        Ok(())
    }

    fn require_parent(&self, path: &str) -> Result<(), StoreError> {
        let parent = parent_of(path);
        if self.is_container(parent) {
            Ok(())
        } else if self.find(parent).is_some() {
            Err(StoreError::NotAContainer(parent.to_string()))
        } else {
            Err(StoreError::NotFound(parent.to_string()))
        }
    }
}

/// Item store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    state: Mutex<State>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a leaf directly, creating missing parent containers. Not logged.
    pub fn add_leaf(&self, path: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = normalize(path)?;
        self.ensure_parents(&path)?;
        let mut state = self.state.lock();
        match state.items.iter_mut().find(|(p, _)| *p == path) {
            Some((_, Item::Leaf(existing))) => *existing = bytes.to_vec(),
            Some((_, Item::Container)) => return Err(StoreError::AlreadyExists(path)),
            None => state.items.push((path, Item::Leaf(bytes.to_vec()))),
        }
        Ok(())
    }

    /// Add a container directly, creating missing parents. Not logged.
    pub fn add_container(&self, path: &str) -> Result<(), StoreError> {
        let path = normalize(path)?;
        self.ensure_parents(&path)?;
        let mut state = self.state.lock();
        match state.find(&path) {
            Some(Item::Container) => Ok(()),
            Some(Item::Leaf(_)) => Err(StoreError::AlreadyExists(path)),
            None => {
                state.items.push((path, Item::Container));
                Ok(())
            }
        }
    }

    /// Remove an item (and anything below it) directly. Not logged.
    pub fn remove(&self, path: &str) -> Result<(), StoreError> {
        let path = normalize(path)?;
        let mut state = self.state.lock();
        remove_tree(&mut state, &path)
    }

    /// Make the next and every later `op` on `path` fail
    pub fn fail_on(&self, op: StoreOp, path: &str) {
        let path = normalize(path).unwrap_or_else(|_| path.to_string());
        self.state.lock().faults.push((op, path));
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    /// Operations received through the `ItemStore` interface, in call order
    pub fn operations(&self) -> Vec<(StoreOp, String)> {
        self.state.lock().log.clone()
    }

    pub fn clear_operations(&self) {
        self.state.lock().log.clear();
    }

    fn ensure_parents(&self, path: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let mut prefix = String::new();
        let segments: Vec<&str> = path.split('/').collect();
        for segment in &segments[..segments.len().saturating_sub(1)] {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            match state.find(&prefix) {
                Some(Item::Container) => {}
                Some(Item::Leaf(_)) => return Err(StoreError::NotAContainer(prefix)),
                None => state.items.push((prefix.clone(), Item::Container)),
            }
        }
        Ok(())
    }
}

fn normalize(path: &str) -> Result<String, StoreError> {
    Ok(path_segments(path)?.join("/"))
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..index],
        None => "",
    }
}

fn is_within(candidate: &str, root: &str) -> bool {
    candidate == root
        || (candidate.len() > root.len()
            && candidate.starts_with(root)
            && candidate.as_bytes()[root.len()] == b'/')
}

fn remove_tree(state: &mut State, path: &str) -> Result<(), StoreError> {
    if state.find(path).is_none() {
        return Err(StoreError::NotFound(path.to_string()));
    }
    state.items.retain(|(p, _)| !is_within(p, path));
    Ok(())
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn list(&self, path: &str) -> Result<Vec<StoreEntry>, StoreError> {
        let path = normalize(path)?;
        let mut state = self.state.lock();
        state.enter(StoreOp::List, &path)?;
        if !state.is_container(&path) {
            return Err(match state.find(&path) {
                Some(_) => StoreError::NotAContainer(path),
                None => StoreError::NotFound(path),
            });
        }

        let entries = state
            .items
            .iter()
            .filter(|(p, _)| p != &path && parent_of(p) == path)
            .map(|(p, item)| {
                let name = p.rsplit('/').next().unwrap_or(p.as_str());
                match item {
                    Item::Container => StoreEntry::container(&path, name),
                    Item::Leaf(_) => StoreEntry::leaf(&path, name),
                }
            })
            .collect();
        Ok(entries)
    }

    async fn create_container(&self, path: &str) -> Result<(), StoreError> {
        let path = normalize(path)?;
        let mut state = self.state.lock();
        state.enter(StoreOp::CreateContainer, &path)?;
        if path.is_empty() || state.find(&path).is_some() {
            return Err(StoreError::AlreadyExists(path));
        }
        state.require_parent(&path)?;
        state.items.push((path, Item::Container));
        Ok(())
    }

    async fn create_leaf(&self, path: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = normalize(path)?;
        let mut state = self.state.lock();
        state.enter(StoreOp::CreateLeaf, &path)?;
        if path.is_empty() {
            return Err(StoreError::InvalidPath(path));
        }
        state.require_parent(&path)?;
        match state.items.iter_mut().find(|(p, _)| *p == path) {
            Some((_, Item::Leaf(existing))) => *existing = bytes.to_vec(),
            Some((_, Item::Container)) => return Err(StoreError::AlreadyExists(path)),
            None => state.items.push((path, Item::Leaf(bytes.to_vec()))),
        }
        Ok(())
    }

    async fn read_leaf(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let path = normalize(path)?;
        let mut state = self.state.lock();
        state.enter(StoreOp::ReadLeaf, &path)?;
        match state.find(&path) {
            Some(Item::Leaf(bytes)) => Ok(bytes.clone()),
            Some(Item::Container) => Err(StoreError::InvalidPath(format!("{} is a container", path))),
            None => Err(StoreError::NotFound(path)),
        }
    }

    async fn delete_container(&self, path: &str) -> Result<(), StoreError> {
        let path = normalize(path)?;
        let mut state = self.state.lock();
        state.enter(StoreOp::DeleteContainer, &path)?;
        match state.find(&path) {
            Some(Item::Container) => remove_tree(&mut state, &path),
            Some(Item::Leaf(_)) => Err(StoreError::NotAContainer(path)),
            None if path.is_empty() => Err(StoreError::InvalidPath(
                "cannot delete the store root".to_string(),
            )),
            None => Err(StoreError::NotFound(path)),
        }
    }

    async fn delete_leaf(&self, path: &str) -> Result<(), StoreError> {
        let path = normalize(path)?;
        let mut state = self.state.lock();
        state.enter(StoreOp::DeleteLeaf, &path)?;
        match state.find(&path) {
            Some(Item::Leaf(_)) => remove_tree(&mut state, &path),
            Some(Item::Container) => Err(StoreError::InvalidPath(format!("{} is a container", path))),
            None => Err(StoreError::NotFound(path)),
        }
    }

    async fn move_item(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let from = normalize(from)?;
        let to = normalize(to)?;
        let mut state = self.state.lock();
        state.enter(StoreOp::Move, &from)?;
        if state.find(&from).is_none() {
            return Err(StoreError::NotFound(from));
        }
        if to.is_empty() || state.find(&to).is_some() {
            return Err(StoreError::AlreadyExists(to));
        }
        if is_within(&to, &from) {
            return Err(StoreError::InvalidPath(format!("cannot move {} into itself", from)));
        }
        state.require_parent(&to)?;

        for (p, _) in state.items.iter_mut() {
            if is_within(p, &from) {
                *p = format!("{}{}", to, &p[from.len()..]);
            }
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        let path = normalize(path)?;
        let mut state = self.state.lock();
        state.enter(StoreOp::Exists, &path)?;
        Ok(path.is_empty() || state.find(&path).is_some())
    }
}
