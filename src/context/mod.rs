mod array_ops;
mod copy;
mod table_ops;
mod vector_ops;

use std::collections::HashSet;

use smol_str::SmolStr;

use crate::cluster::{Cluster, Handle};
use crate::container::{ArrayContainer, TableContainer};
use crate::metadata::Metadata;
use crate::node::{ArrayHandle, Node, NodeHandle, Repr, TableHandle, SHORT_PAYLOAD_LEN};
use crate::types::{Kind, SubType};

const BASE_CLUSTER: u32 = 0;

/// Per-kind slab pool: an id-indexed registry of clusters plus the free-list
/// of not-yet-full cluster ids.
///
/// Cluster id 0 is the base cluster; it is created with the pool and never
/// destroyed, even when empty. Auxiliary clusters are destroyed the moment
/// they become empty and their ids are reused for later clusters.
pub(crate) struct Pool<T> {
    clusters: Vec<Option<Cluster<T>>>,
    free_head: Option<u32>,
    metadata_enabled: bool,
}

impl<T: Default> Pool<T> {
    fn new() -> Self {
        Self {
            clusters: vec![Some(Cluster::new(false))],
            free_head: Some(BASE_CLUSTER),
            metadata_enabled: false,
        }
    }

    fn cluster(&self, id: u32) -> Option<&Cluster<T>> {
        self.clusters.get(id as usize).and_then(Option::as_ref)
    }

    fn cluster_mut(&mut self, id: u32) -> Option<&mut Cluster<T>> {
        self.clusters.get_mut(id as usize).and_then(Option::as_mut)
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.cluster(handle.cluster())?.get(handle.slot())
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.cluster_mut(handle.cluster())?.get_mut(handle.slot())
    }

    /// Allocates from the free-list head, creating and appending a fresh
    /// cluster when no non-full cluster exists. A cluster that fills up is
    /// unlinked from the free list on the spot.
    pub fn alloc(&mut self) -> Handle<T> {
        if let Some(id) = self.free_head {
            let cluster = self
                .cluster_mut(id)
                .expect("free-list head must be a live cluster");
            let slot = cluster.alloc();
            if !cluster.is_free() {
                let next = cluster.next_free();
                cluster.set_next_free(None);
                self.free_head = next;
            }
            Handle::new(id, slot)
        } else {
            let id = self.vacant_id();
            let mut cluster = Cluster::new(self.metadata_enabled);
            let slot = cluster.alloc();
            self.clusters[id as usize] = Some(cluster);
            self.free_head = Some(id);
            Handle::new(id, slot)
        }
    }

    fn vacant_id(&mut self) -> u32 {
        match self.clusters.iter().position(Option::is_none) {
            Some(index) => index as u32,
            None => {
                self.clusters.push(None);
                (self.clusters.len() - 1) as u32
            }
        }
    }

    /// Releases a slot. A previously full cluster re-enters the free list; a
    /// cluster that becomes empty is destroyed outright unless it is the
    /// base cluster.
    pub fn free(&mut self, handle: Handle<T>) {
        let id = handle.cluster();
        let (was_full, now_empty) = {
            let Some(cluster) = self.cluster_mut(id) else {
                return;
            };
            if !cluster.is_allocated(handle.slot()) {
                return;
            }
            let was_full = !cluster.is_free();
            cluster.free(handle.slot());
            (was_full, cluster.is_empty())
        };

        if now_empty && id != BASE_CLUSTER {
            if !was_full {
                self.unlink(id);
            }
            self.clusters[id as usize] = None;
        } else if was_full {
            let head = self.free_head;
            if let Some(cluster) = self.cluster_mut(id) {
                cluster.set_next_free(head);
            }
            self.free_head = Some(id);
        }
    }

    fn unlink(&mut self, id: u32) {
        if self.free_head == Some(id) {
            self.free_head = self.cluster(id).and_then(Cluster::next_free);
            return;
        }

        let mut cursor = self.free_head;
        while let Some(current) = cursor {
            let next = self.cluster(current).and_then(Cluster::next_free);
            if next == Some(id) {
                let after = self.cluster(id).and_then(Cluster::next_free);
                if let Some(cluster) = self.cluster_mut(current) {
                    cluster.set_next_free(after);
                }
                return;
            }
            cursor = next;
        }
    }

    /// Resets every cluster to empty without releasing slab memory and
    /// rebuilds the free list over all of them, base cluster first so the
    /// next allocation comes from cluster 0 slot 0.
    pub fn clear(&mut self) {
        self.free_head = None;
        for id in (0..self.clusters.len()).rev() {
            if let Some(cluster) = self.clusters[id].as_mut() {
                cluster.reset();
                cluster.set_next_free(self.free_head);
                self.free_head = Some(id as u32);
            }
        }
    }

    /// Drops every auxiliary cluster and resets the base cluster.
    pub fn purge(&mut self) {
        self.clusters.truncate(1);
        let base = self.clusters[0]
            .as_mut()
            .expect("base cluster is never destroyed");
        base.reset();
        self.free_head = Some(BASE_CLUSTER);
    }

    pub fn set_metadata_enabled(&mut self, enable: bool) {
        if self.metadata_enabled == enable {
            return;
        }
        for cluster in self.clusters.iter_mut().flatten() {
            cluster.set_metadata_enabled(enable);
        }
        self.metadata_enabled = enable;
    }

    pub fn metadata(&self, handle: Handle<T>) -> Option<&Metadata> {
        let cluster = self.cluster(handle.cluster())?;
        if !cluster.is_allocated(handle.slot()) {
            return None;
        }
        cluster.metadata(handle.slot())
    }

    pub fn metadata_mut(&mut self, handle: Handle<T>) -> Option<&mut Metadata> {
        let cluster = self.cluster_mut(handle.cluster())?;
        if !cluster.is_allocated(handle.slot()) {
            return None;
        }
        cluster.metadata_mut(handle.slot())
    }

    pub fn live_cluster_count(&self) -> usize {
        self.clusters.iter().flatten().count()
    }

    pub fn live_element_count(&self) -> usize {
        self.clusters
            .iter()
            .flatten()
            .map(|cluster| cluster.live_count() as usize)
            .sum()
    }

    /// Cluster ids reachable by walking the free list from its head.
    pub fn free_list_ids(&self) -> Vec<u32> {
        let mut ids = Vec::new();
        let mut cursor = self.free_head;
        while let Some(id) = cursor {
            if ids.len() > self.clusters.len() {
                break;
            }
            ids.push(id);
            cursor = self.cluster(id).and_then(Cluster::next_free);
        }
        ids
    }

    /// Ids of live clusters whose occupancy mask is not the full sentinel.
    pub fn non_full_ids(&self) -> Vec<u32> {
        self.clusters
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| match slot {
                Some(cluster) if cluster.is_free() => Some(id as u32),
                _ => None,
            })
            .collect()
    }
}

/// Construction options for a [`Context`].
#[derive(Debug, Clone, Copy)]
pub struct ContextOptions {
    pub root: bool,
    pub metadata: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            root: true,
            metadata: false,
        }
    }
}

impl ContextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pool contexts (`root == false`) hand out nodes without reserving a
    /// pre-allocated root value.
    pub fn with_root(mut self, root: bool) -> Self {
        self.root = root;
        self
    }

    pub fn with_metadata(mut self, metadata: bool) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Allocation authority and owner for a tree of values.
///
/// Every node, array, table, cluster, and interned string lives exactly as
/// long as its context. Allocation never soft-fails: the host allocator
/// aborts on exhaustion, and no "could not allocate" path exists. The
/// context performs no locking; confine it to one thread or wrap it in an
/// external mutex.
pub struct Context {
    pub(crate) nodes: Pool<Node>,
    pub(crate) arrays: Pool<ArrayContainer>,
    pub(crate) tables: Pool<TableContainer>,
    symbols: HashSet<SmolStr>,
    binary_data: Vec<u8>,
    metadata_enabled: bool,
    root_available: bool,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A context with a pre-allocated root node and metadata disabled.
    pub fn new() -> Self {
        Self::with_options(ContextOptions::default())
    }

    pub fn with_options(options: ContextOptions) -> Self {
        let mut context = Self {
            nodes: Pool::new(),
            arrays: Pool::new(),
            tables: Pool::new(),
            symbols: HashSet::new(),
            binary_data: Vec::new(),
            metadata_enabled: false,
            root_available: options.root,
        };
        if options.metadata {
            context.enable_metadata(true);
        }
        if options.root {
            context.nodes.alloc();
        }
        context
    }

    /// The pre-allocated root node.
    ///
    /// # Panics
    ///
    /// Panics on a pool context created with `with_root(false)`; that is a
    /// caller bug, mirroring the original's fatal-error path.
    pub fn root(&self) -> NodeHandle {
        if !self.root_available {
            panic!("root() called on a pool context (no root available)");
        }
        Handle::new(BASE_CLUSTER, 0)
    }

    pub fn is_root_available(&self) -> bool {
        self.root_available
    }

    pub fn is_metadata_enabled(&self) -> bool {
        self.metadata_enabled
    }

    // ---- node allocation ----------------------------------------------

    /// Allocates a fresh null node.
    pub fn alloc_node(&mut self) -> NodeHandle {
        self.nodes.alloc()
    }

    /// Allocates a node pre-typed with the zero value for `kind`; container
    /// kinds get an empty container.
    pub fn alloc_node_typed(&mut self, kind: Kind, subtype: SubType) -> NodeHandle {
        let handle = self.alloc_node();
        let repr = match kind {
            Kind::Null => Repr::Null,
            Kind::Bool => Repr::Bool(false),
            Kind::Int => Repr::Int(0),
            Kind::UInt => Repr::UInt(0),
            Kind::Double => Repr::Double(0.0),
            Kind::String => Repr::StringShort([0; SHORT_PAYLOAD_LEN]),
            Kind::BinaryBlob => Repr::BlobOwned(Box::default()),
            Kind::Array => Repr::ArrayFull(self.arrays.alloc()),
            Kind::Table => Repr::Table(self.tables.alloc()),
        };
        self.node_mut(handle).install(repr, subtype);
        handle
    }

    /// Frees a node and, recursively, every array/table element reachable
    /// from it. The handle (and any handle into the freed subtree) must not
    /// be used afterwards; stale handles read as dangling, not as some other
    /// node.
    pub fn free_node(&mut self, handle: NodeHandle) {
        self.release_payload(handle);
        self.nodes.free(handle);
    }

    /// Resets a node to null, recursively freeing any container payload.
    /// This is the eager-release counterpart of retyping through
    /// [`node_mut`](Self::node_mut).
    pub fn set_to_null(&mut self, handle: NodeHandle) {
        self.release_payload(handle);
        if let Some(node) = self.nodes.get_mut(handle) {
            node.set_to_null();
        }
    }

    fn release_payload(&mut self, handle: NodeHandle) {
        let Some(node) = self.nodes.get_mut(handle) else {
            return;
        };
        match std::mem::take(&mut node.repr) {
            Repr::ArrayFull(array) => self.free_array(array),
            Repr::Table(table) => self.free_table(table),
            _ => {}
        }
    }

    pub(crate) fn free_array(&mut self, handle: ArrayHandle) {
        let elements = match self.arrays.get_mut(handle) {
            Some(array) => array.take_all(),
            None => return,
        };
        for element in elements {
            self.free_node(element);
        }
        self.arrays.free(handle);
    }

    pub(crate) fn free_table(&mut self, handle: TableHandle) {
        let members = match self.tables.get_mut(handle) {
            Some(table) => table.take_all(),
            None => return,
        };
        for member in members {
            self.free_node(member);
        }
        self.tables.free(handle);
    }

    // ---- node access --------------------------------------------------

    pub fn try_node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    pub fn try_node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    /// # Panics
    ///
    /// Panics if the handle is dangling.
    pub fn node(&self, handle: NodeHandle) -> &Node {
        self.try_node(handle).expect("dangling node handle")
    }

    /// # Panics
    ///
    /// Panics if the handle is dangling.
    pub fn node_mut(&mut self, handle: NodeHandle) -> &mut Node {
        self.try_node_mut(handle).expect("dangling node handle")
    }

    // ---- strings ------------------------------------------------------

    /// Deduplicates a string into the context's symbol table. The returned
    /// value shares storage with every other intern of the same text and
    /// stays valid for the context's lifetime.
    pub fn intern(&mut self, text: &str) -> SmolStr {
        if let Some(existing) = self.symbols.get(text) {
            return existing.clone();
        }
        let symbol = SmolStr::new(text);
        self.symbols.insert(symbol.clone());
        symbol
    }

    // ---- binary scratch buffer ----------------------------------------

    /// Scratch buffer used to stage binary payloads across a load; owned by
    /// the context so repeated loads reuse the allocation.
    pub fn binary_data(&self) -> &[u8] {
        &self.binary_data
    }

    pub fn binary_data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.binary_data
    }

    // ---- metadata -----------------------------------------------------

    /// Enables or disables metadata uniformly across all node clusters,
    /// present and future.
    pub fn enable_metadata(&mut self, enable: bool) {
        if enable != self.metadata_enabled {
            self.nodes.set_metadata_enabled(enable);
            self.metadata_enabled = enable;
        }
    }

    /// Per-node metadata record; `None` while metadata is disabled (no
    /// allocation happens on lookup).
    pub fn metadata(&self, handle: NodeHandle) -> Option<&Metadata> {
        self.nodes.metadata(handle)
    }

    pub fn metadata_mut(&mut self, handle: NodeHandle) -> Option<&mut Metadata> {
        self.nodes.metadata_mut(handle)
    }

    /// Copies one node's metadata record onto another, re-interning the
    /// name symbol in this context.
    pub fn copy_metadata(&mut self, dst: NodeHandle, src: NodeHandle) {
        let Some(source) = self.nodes.metadata(src).cloned() else {
            if let Some(record) = self.nodes.metadata_mut(dst) {
                record.clear();
            }
            return;
        };
        let name = source.name.as_deref().map(|name| self.intern(name));
        if let Some(record) = self.nodes.metadata_mut(dst) {
            record.line = source.line;
            record.column = source.column;
            record.flags = source.flags;
            record.name = name;
            record.comments = source.comments;
        }
    }

    // ---- lifecycle ----------------------------------------------------

    /// Resets the context to an empty tree without releasing slab memory:
    /// all clusters are emptied and re-linked, symbols are dropped, and the
    /// root node is re-established. Cheap enough to run once per load cycle.
    pub fn clear(&mut self) {
        self.binary_data.clear();
        self.nodes.clear();
        self.arrays.clear();
        self.tables.clear();
        self.symbols.clear();
        if self.root_available {
            self.nodes.alloc();
        }
    }

    /// Like [`clear`](Self::clear), but also frees every auxiliary cluster
    /// slab. The context stays usable afterwards.
    pub fn purge(&mut self) {
        self.binary_data = Vec::new();
        self.nodes.purge();
        self.arrays.purge();
        self.tables.purge();
        self.symbols.clear();
        if self.root_available {
            self.nodes.alloc();
        }
    }

    // ---- introspection ------------------------------------------------

    pub fn live_node_count(&self) -> usize {
        self.nodes.live_element_count()
    }

    pub fn node_cluster_count(&self) -> usize {
        self.nodes.live_cluster_count()
    }

    pub fn array_cluster_count(&self) -> usize {
        self.arrays.live_cluster_count()
    }

    pub fn table_cluster_count(&self) -> usize {
        self.tables.live_cluster_count()
    }

    /// Cluster ids on the node free list, head first.
    pub fn node_free_list(&self) -> Vec<u32> {
        self.nodes.free_list_ids()
    }

    /// Ids of live node clusters that still have open slots.
    pub fn node_non_full_clusters(&self) -> Vec<u32> {
        self.nodes.non_full_ids()
    }
}
