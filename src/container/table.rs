use std::collections::HashMap;

use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::node::NodeHandle;

/// Membership size at which the hash index is built.
const FAST_SEARCH_THRESHOLD: usize = 128;

/// Stale lookups tolerated against an ignored index before it is rebuilt.
const MAX_IGNORED_LOOKUPS: i8 = 4;

/// 32-bit FNV-1a over the member name bytes.
pub(crate) fn member_hash(name: &str) -> u32 {
    let mut hash = 0x811c_9dc5u32;
    for &byte in name.as_bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// A member name, either interned in the owning context's symbol table or
/// borrowed from caller-owned memory.
#[derive(Debug, Clone)]
pub(crate) enum MemberName {
    Interned(SmolStr),
    External(&'static str),
}

impl MemberName {
    pub fn as_str(&self) -> &str {
        match self {
            MemberName::Interned(name) => name,
            MemberName::External(name) => name,
        }
    }
}

/// Lazily built hash → member-index map.
///
/// Deletions shift member indices, so instead of patching every entry the
/// index is marked `ignore` and lookups fall back to the linear scan. After
/// a bounded number of ignored lookups the whole map is rebuilt; that keeps
/// drift bounded without paying a rebuild per deletion.
#[derive(Debug, Default)]
struct FastSearch {
    ignore: bool,
    ignores_counter: i8,
    ids: HashMap<u32, usize>,
}

/// Ordered association of member name → element handle.
///
/// Hash, handle, and name are index-aligned parallel arrays: member index
/// `i` selects all three. Member indices are dense and shift on removal.
#[derive(Debug, Default)]
pub(crate) struct TableContainer {
    hashes: SmallVec<[u32; 8]>,
    members: SmallVec<[NodeHandle; 8]>,
    names: SmallVec<[MemberName; 8]>,
    fast: Option<Box<FastSearch>>,
}

impl TableContainer {
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn member(&self, index: usize) -> Option<NodeHandle> {
        self.members.get(index).copied()
    }

    pub fn member_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(MemberName::as_str)
    }

    pub fn member_hash_at(&self, index: usize) -> Option<u32> {
        self.hashes.get(index).copied()
    }

    pub fn handles(&self) -> &[NodeHandle] {
        &self.members
    }

    /// Rebuilds the hash index from the parallel arrays and marks it live.
    pub fn enable_fast_search(&mut self) {
        let fast = self.fast.get_or_insert_with(Box::default);
        fast.ids.clear();
        for (index, &hash) in self.hashes.iter().enumerate() {
            fast.ids.insert(hash, index);
        }
        fast.ignore = false;
        fast.ignores_counter = 0;
    }

    pub fn has_fast_search(&self) -> bool {
        self.fast.is_some()
    }

    pub(crate) fn fast_search_is_stale(&self) -> bool {
        self.fast.as_ref().is_some_and(|fast| fast.ignore)
    }

    /// Finds a member by name hash.
    ///
    /// Uses the hash index when it is live; while the index is stale this
    /// scans linearly and counts the miss, rebuilding eagerly once the
    /// tolerated-staleness bound is crossed.
    pub fn find(&mut self, hash: u32) -> Option<usize> {
        let mut use_fast = false;

        if let Some(fast) = self.fast.as_mut() {
            if fast.ignore {
                fast.ignores_counter += 1;
                if fast.ignores_counter > MAX_IGNORED_LOOKUPS {
                    self.enable_fast_search();
                    use_fast = true;
                }
            } else {
                use_fast = true;
            }
        }

        if use_fast {
            let fast = self.fast.as_ref().expect("fast search just checked");
            fast.ids.get(&hash).copied()
        } else {
            self.hashes.iter().position(|&h| h == hash)
        }
    }

    /// Linear identity search, for remove-by-handle.
    pub fn find_by_handle(&self, handle: NodeHandle) -> Option<usize> {
        self.members.iter().position(|&member| member == handle)
    }

    /// Appends a member, returning its index. Builds the hash index once
    /// membership reaches the threshold.
    pub fn push(&mut self, hash: u32, handle: NodeHandle, name: MemberName) -> usize {
        if self.hashes.len() >= FAST_SEARCH_THRESHOLD && self.fast.is_none() {
            self.enable_fast_search();
        }

        self.hashes.push(hash);
        self.members.push(handle);
        self.names.push(name);
        let index = self.hashes.len() - 1;

        if let Some(fast) = self.fast.as_mut() {
            if !fast.ignore {
                fast.ids.insert(hash, index);
            }
        }

        index
    }

    /// Removes a member by index, shifting later indices down. The hash
    /// index is marked stale rather than patched.
    pub fn remove(&mut self, index: usize) -> NodeHandle {
        self.hashes.remove(index);
        let handle = self.members.remove(index);
        self.names.remove(index);

        if let Some(fast) = self.fast.as_mut() {
            fast.ignore = true;
            fast.ignores_counter = 1;
        }

        handle
    }

    /// Drops every member, returning the handles for the context to free.
    pub fn take_all(&mut self) -> Vec<NodeHandle> {
        self.hashes.clear();
        self.names.clear();
        self.fast = None;
        self.members.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{member_hash, MemberName, TableContainer, MAX_IGNORED_LOOKUPS};
    use crate::cluster::Handle;
    use crate::node::NodeHandle;

    fn handle(n: u32) -> NodeHandle {
        Handle::new(0, n as u8)
    }

    fn push_named(table: &mut TableContainer, name: &str, n: u32) -> usize {
        table.push(member_hash(name), handle(n), MemberName::Interned(name.into()))
    }

    #[rstest::rstest]
    fn test_parallel_arrays_stay_aligned() {
        let mut table = TableContainer::default();
        push_named(&mut table, "alpha", 0);
        push_named(&mut table, "beta", 1);

        assert_eq!(table.len(), 2);
        assert_eq!(table.member_name(1), Some("beta"));
        assert_eq!(table.member_hash_at(1), Some(member_hash("beta")));
        assert_eq!(table.member(1), Some(handle(1)));
    }

    #[rstest::rstest]
    fn test_linear_then_indexed_find() {
        let mut table = TableContainer::default();
        for i in 0..200u32 {
            push_named(&mut table, &format!("member_{i}"), i);
        }
        assert!(table.has_fast_search());

        for i in 0..200u32 {
            let name = format!("member_{i}");
            assert_eq!(table.find(member_hash(&name)), Some(i as usize));
        }
    }

    #[rstest::rstest]
    fn test_stale_index_rebuilds_after_bounded_retries() {
        let mut table = TableContainer::default();
        for i in 0..130u32 {
            push_named(&mut table, &format!("member_{i}"), i);
        }

        // Deleting marks the index stale; lookups fall back to linear scan.
        table.remove(0);
        assert!(table.fast_search_is_stale());

        // The deletion itself counts as the first tolerated miss.
        let probe = member_hash("member_129");
        for _ in 0..MAX_IGNORED_LOOKUPS - 1 {
            assert_eq!(table.find(probe), Some(128));
            assert!(table.fast_search_is_stale());
        }

        // One more lookup crosses the bound and rebuilds the index.
        assert_eq!(table.find(probe), Some(128));
        assert!(!table.fast_search_is_stale());
    }

    #[rstest::rstest]
    fn test_remove_shifts_indices() {
        let mut table = TableContainer::default();
        push_named(&mut table, "a", 0);
        push_named(&mut table, "b", 1);
        push_named(&mut table, "c", 2);

        let removed = table.remove(1);
        assert_eq!(removed, handle(1));
        assert_eq!(table.member_name(1), Some("c"));
        assert_eq!(table.find(member_hash("c")), Some(1));
    }
}
