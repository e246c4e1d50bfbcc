use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::metadata::Metadata;

/// Number of element slots in one cluster.
pub const CLUSTER_CAPACITY: usize = 63;

/// Occupancy mask with every slot taken. Bit 63 is reserved as a sentinel so
/// the full state is a specific non-zero constant rather than all-ones.
pub(crate) const FULL_MASK: u64 = 0x7fff_ffff_ffff_ffff;

/// Identifier of an element inside a context pool: the owning cluster's id
/// plus the slot index inside that cluster.
///
/// The element itself stores no back-pointer; everything that needs to find
/// the owning cluster resolves this pair through the pool's cluster registry.
pub struct Handle<T> {
    cluster: u32,
    slot: u8,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(cluster: u32, slot: u8) -> Self {
        Self {
            cluster,
            slot,
            _marker: PhantomData,
        }
    }

    pub(crate) fn cluster(self) -> u32 {
        self.cluster
    }

    pub(crate) fn slot(self) -> u8 {
        self.slot
    }
}

// Manual impls: derived ones would bound on `T`.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cluster == other.cluster && self.slot == other.slot
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cluster.hash(state);
        self.slot.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}:{})", self.cluster, self.slot)
    }
}

fn boxed_slab<T: Default>() -> Box<[T; CLUSTER_CAPACITY]> {
    Box::new(std::array::from_fn(|_| T::default()))
}

/// Fixed-capacity slab of 63 elements with bitmask occupancy tracking.
///
/// A cluster is "free" while at least one slot is open; once the mask reaches
/// [`FULL_MASK`] the owning pool unlinks it from the free list. The optional
/// metadata slab stays index-aligned with the element slab and is allocated
/// lazily, only for pools with metadata enabled.
pub(crate) struct Cluster<T> {
    allocated: u64,
    slots: Box<[T; CLUSTER_CAPACITY]>,
    meta: Option<Box<[Metadata; CLUSTER_CAPACITY]>>,
    next_free: Option<u32>,
}

impl<T: Default> Cluster<T> {
    pub fn new(with_metadata: bool) -> Self {
        Self {
            allocated: 0,
            slots: boxed_slab(),
            meta: with_metadata.then(boxed_slab),
            next_free: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.allocated != FULL_MASK
    }

    pub fn is_empty(&self) -> bool {
        self.allocated == 0
    }

    pub fn live_count(&self) -> u32 {
        self.allocated.count_ones()
    }

    pub fn is_allocated(&self, slot: u8) -> bool {
        (slot as usize) < CLUSTER_CAPACITY && self.allocated & (1u64 << slot) != 0
    }

    /// Takes the lowest open slot. The caller must check [`is_free`] first.
    pub fn alloc(&mut self) -> u8 {
        debug_assert!(self.is_free());
        let slot = (!self.allocated).trailing_zeros() as u8;
        self.allocated |= 1u64 << slot;
        slot
    }

    /// Releases a slot, resetting its storage and metadata record.
    pub fn free(&mut self, slot: u8) {
        debug_assert!(self.is_allocated(slot));
        self.slots[slot as usize] = T::default();
        if let Some(meta) = self.meta.as_mut() {
            meta[slot as usize].clear();
        }
        self.allocated &= !(1u64 << slot);
    }

    pub fn get(&self, slot: u8) -> Option<&T> {
        self.is_allocated(slot).then(|| &self.slots[slot as usize])
    }

    pub fn get_mut(&mut self, slot: u8) -> Option<&mut T> {
        self.is_allocated(slot)
            .then(|| &mut self.slots[slot as usize])
    }

    pub fn next_free(&self) -> Option<u32> {
        self.next_free
    }

    pub fn set_next_free(&mut self, next: Option<u32>) {
        self.next_free = next;
    }

    pub fn metadata(&self, slot: u8) -> Option<&Metadata> {
        self.meta.as_ref().map(|meta| &meta[slot as usize])
    }

    pub fn metadata_mut(&mut self, slot: u8) -> Option<&mut Metadata> {
        self.meta.as_mut().map(|meta| &mut meta[slot as usize])
    }

    pub fn set_metadata_enabled(&mut self, enable: bool) {
        if enable {
            if self.meta.is_none() {
                self.meta = Some(boxed_slab());
            }
        } else {
            self.meta = None;
        }
    }

    /// Resets every live slot to its default state and empties the occupancy
    /// mask, keeping the slab (and metadata slab) allocated for reuse.
    pub fn reset(&mut self) {
        let mut mask = self.allocated;
        while mask != 0 {
            let slot = mask.trailing_zeros() as usize;
            self.slots[slot] = T::default();
            mask &= mask - 1;
        }
        if let Some(meta) = self.meta.as_mut() {
            for record in meta.iter_mut() {
                record.clear();
            }
        }
        self.allocated = 0;
        self.next_free = None;
    }
}

#[cfg(test)]
mod tests {
    use super::{Cluster, CLUSTER_CAPACITY, FULL_MASK};

    #[rstest::rstest]
    fn test_alloc_takes_lowest_slot_and_fills() {
        let mut cluster: Cluster<u32> = Cluster::new(false);
        for expected in 0..CLUSTER_CAPACITY as u8 {
            assert!(cluster.is_free());
            assert_eq!(cluster.alloc(), expected);
        }
        assert!(!cluster.is_free());
        assert_eq!(cluster.allocated, FULL_MASK);
        assert_eq!(cluster.live_count(), 63);
    }

    #[rstest::rstest]
    fn test_free_reopens_exact_slot() {
        let mut cluster: Cluster<u32> = Cluster::new(false);
        for _ in 0..10 {
            cluster.alloc();
        }
        *cluster.get_mut(7).unwrap() = 99;
        cluster.free(7);
        assert!(cluster.get(7).is_none());
        assert_eq!(cluster.alloc(), 7);
        assert_eq!(*cluster.get(7).unwrap(), 0);
    }

    #[rstest::rstest]
    fn test_reset_clears_slots_but_keeps_metadata_slab() {
        let mut cluster: Cluster<u32> = Cluster::new(true);
        let slot = cluster.alloc();
        *cluster.get_mut(slot).unwrap() = 5;
        cluster.metadata_mut(slot).unwrap().line = 44;

        cluster.reset();
        assert!(cluster.is_empty());
        assert_eq!(cluster.metadata(0).unwrap().line, 0);

        let slot = cluster.alloc();
        assert_eq!(*cluster.get(slot).unwrap(), 0);
    }

    #[rstest::rstest]
    fn test_metadata_disabled_returns_none() {
        let mut cluster: Cluster<u32> = Cluster::new(false);
        let slot = cluster.alloc();
        assert!(cluster.metadata(slot).is_none());
        cluster.set_metadata_enabled(true);
        assert!(cluster.metadata(slot).is_some());
    }
}
