use smallvec::SmallVec;

use crate::node::NodeHandle;

/// Ordered list of owned element handles backing a full array value.
///
/// The container only tracks order; element nodes are allocated and freed by
/// the owning context. Count always equals the backing length.
#[derive(Debug, Default)]
pub(crate) struct ArrayContainer {
    elements: SmallVec<[NodeHandle; 4]>,
}

impl ArrayContainer {
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn get(&self, index: usize) -> Option<NodeHandle> {
        self.elements.get(index).copied()
    }

    pub fn handles(&self) -> &[NodeHandle] {
        &self.elements
    }

    pub fn push(&mut self, handle: NodeHandle) {
        self.elements.push(handle);
    }

    pub fn insert(&mut self, index: usize, handle: NodeHandle) {
        self.elements.insert(index, handle);
    }

    /// Removes `count` handles starting at `index`, returning them so the
    /// context can free the nodes.
    pub fn remove_range(&mut self, index: usize, count: usize) -> Vec<NodeHandle> {
        let end = (index + count).min(self.elements.len());
        if index >= end {
            return Vec::new();
        }
        self.elements.drain(index..end).collect()
    }

    /// Shrinks to `count` elements, returning the handles cut off the tail.
    pub fn drain_from(&mut self, count: usize) -> Vec<NodeHandle> {
        if count >= self.elements.len() {
            return Vec::new();
        }
        self.elements.drain(count..).collect()
    }

    pub fn take_all(&mut self) -> Vec<NodeHandle> {
        self.elements.drain(..).collect()
    }
}
