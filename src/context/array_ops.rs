//! Array operations. These live on the context because element nodes are
//! context-allocated; the node itself only carries the representation tag.

use crate::context::Context;
use crate::node::compact::{self, CompactSource};
use crate::node::{ArrayHandle, Node, NodeHandle, Repr, COMPACT_ARRAY_MAX_LEN, SHORT_PAYLOAD_LEN};
use crate::types::SubType;

impl Context {
    /// Element count of any array representation; 0 for non-arrays.
    pub fn array_len(&self, handle: NodeHandle) -> usize {
        let Some(node) = self.try_node(handle) else {
            return 0;
        };
        match &node.repr {
            Repr::ArrayFull(array) => self.arrays.get(*array).map_or(0, |c| c.len()),
            other => compact::compact_len(other).unwrap_or(0),
        }
    }

    /// Rewrites a compact array into the full per-element form, preserving
    /// the element values and the node's subtype. Full arrays and non-array
    /// nodes are left untouched. The promotion is one-way; nothing demotes
    /// back to a compact form.
    pub fn normalize_array(&mut self, handle: NodeHandle) {
        let repr = {
            let Some(node) = self.try_node_mut(handle) else {
                return;
            };
            if node.compact_array_len().is_none() {
                return;
            }
            std::mem::take(&mut node.repr)
        };

        let mut elements: Vec<NodeHandle> = Vec::new();
        let emit = |ctx: &mut Context, set: &dyn Fn(&mut Node)| {
            let element = ctx.alloc_node();
            set(ctx.node_mut(element));
            element
        };
        match repr {
            Repr::ArrayShortU8 { buf, len } => {
                for &v in &buf[..len as usize] {
                    elements.push(emit(self, &|n| n.set_u8(v)));
                }
            }
            Repr::ArrayShortI16 { buf, len } => {
                for &v in &buf[..len as usize] {
                    elements.push(emit(self, &|n| n.set_i16(v)));
                }
            }
            Repr::ArrayI16(data) => {
                for &v in data.iter() {
                    elements.push(emit(self, &|n| n.set_i16(v)));
                }
            }
            Repr::ArrayI32(data) => {
                for &v in data.iter() {
                    elements.push(emit(self, &|n| n.set_i32(v)));
                }
            }
            Repr::ArrayF32(data) => {
                for &v in data.iter() {
                    elements.push(emit(self, &|n| n.set_f32(v)));
                }
            }
            Repr::ArrayF64(data) => {
                for &v in data.iter() {
                    elements.push(emit(self, &|n| n.set_f64(v)));
                }
            }
            // compact_array_len() said compact; nothing else reaches here.
            other => {
                self.node_mut(handle).repr = other;
                return;
            }
        }

        let array = self.arrays.alloc();
        let container = self.arrays.get_mut(array).expect("just allocated");
        for element in elements {
            container.push(element);
        }
        // Direct repr swap: the subtype survives normalization.
        self.node_mut(handle).repr = Repr::ArrayFull(array);
    }

    /// The full-form container behind an array node, normalizing a compact
    /// payload on the way. `None` when the node is not an array.
    fn full_array_handle(&mut self, handle: NodeHandle) -> Option<ArrayHandle> {
        self.normalize_array(handle);
        match self.try_node(handle)?.repr {
            Repr::ArrayFull(array) => Some(array),
            _ => None,
        }
    }

    /// Like [`full_array_handle`](Self::full_array_handle), but retypes a
    /// non-array node into an empty array first.
    fn ensure_full_array(&mut self, handle: NodeHandle) -> ArrayHandle {
        self.normalize_array(handle);
        if let Repr::ArrayFull(array) = self.node(handle).repr {
            return array;
        }
        self.set_to_null(handle);
        let array = self.arrays.alloc();
        self.node_mut(handle)
            .install(Repr::ArrayFull(array), SubType::Unspecified);
        array
    }

    /// Handle of element `index`. Compact payloads are normalized so the
    /// element is individually addressable.
    pub fn array_element(&mut self, handle: NodeHandle, index: usize) -> Option<NodeHandle> {
        let array = self.full_array_handle(handle)?;
        self.arrays.get(array)?.get(index)
    }

    /// Element handles in order; empty for non-arrays. Normalizes compact
    /// payloads.
    pub fn array_elements(&mut self, handle: NodeHandle) -> &[NodeHandle] {
        match self.full_array_handle(handle) {
            Some(array) => self.arrays.get(array).map_or(&[], |c| c.handles()),
            None => &[],
        }
    }

    /// Appends a fresh null element, retyping the node into an array first
    /// if needed, and returns the new element's handle.
    pub fn array_append(&mut self, handle: NodeHandle) -> NodeHandle {
        let array = self.ensure_full_array(handle);
        let element = self.alloc_node();
        self.arrays
            .get_mut(array)
            .expect("array container just resolved")
            .push(element);
        element
    }

    /// Inserts a fresh null element before `index` (`index == len` appends).
    /// `None` when the node is not an array or the index is out of range.
    pub fn array_insert_before(
        &mut self,
        handle: NodeHandle,
        index: usize,
    ) -> Option<NodeHandle> {
        let array = self.full_array_handle(handle)?;
        if index > self.arrays.get(array)?.len() {
            return None;
        }
        let element = self.alloc_node();
        self.arrays
            .get_mut(array)
            .expect("array container just resolved")
            .insert(index, element);
        Some(element)
    }

    /// Bulk resize. Growing appends null elements; shrinking frees the tail.
    /// Retypes a non-array node into an array first.
    pub fn array_set_len(&mut self, handle: NodeHandle, count: usize) {
        let array = self.ensure_full_array(handle);
        let len = self.arrays.get(array).map_or(0, |c| c.len());
        if count < len {
            let cut = self
                .arrays
                .get_mut(array)
                .expect("array container just resolved")
                .drain_from(count);
            for element in cut {
                self.free_node(element);
            }
        } else {
            for _ in len..count {
                let element = self.alloc_node();
                self.arrays
                    .get_mut(array)
                    .expect("array container just resolved")
                    .push(element);
            }
        }
    }

    /// Removes `count` elements starting at `index`, freeing their nodes.
    /// No-op on non-arrays; the range is clamped to the array length.
    pub fn array_remove(&mut self, handle: NodeHandle, index: usize, count: usize) {
        let Some(array) = self.full_array_handle(handle) else {
            return;
        };
        let removed = self
            .arrays
            .get_mut(array)
            .expect("array container just resolved")
            .remove_range(index, count);
        for element in removed {
            self.free_node(element);
        }
    }

    pub fn set_to_empty_array(&mut self, handle: NodeHandle) {
        self.array_set_len(handle, 0);
    }

    // ---- typed bulk setters -------------------------------------------
    //
    // Each picks the narrowest compact representation that fits and falls
    // back to a full per-element array above the compact cap.

    pub fn set_array_u8(&mut self, handle: NodeHandle, data: &[u8]) {
        self.install_u8_array(handle, data, SubType::Array);
    }

    pub fn set_array_i16(&mut self, handle: NodeHandle, data: &[i16]) {
        self.install_i16_array(handle, CompactSource::Copied(data), SubType::Array);
    }

    pub fn set_array_i32(&mut self, handle: NodeHandle, data: &[i32]) {
        self.install_i32_array(handle, CompactSource::Copied(data), SubType::Array);
    }

    pub fn set_array_f32(&mut self, handle: NodeHandle, data: &[f32]) {
        self.install_f32_array(handle, CompactSource::Copied(data), SubType::Array);
    }

    pub fn set_array_f64(&mut self, handle: NodeHandle, data: &[f64]) {
        self.install_f64_array(handle, CompactSource::Copied(data), SubType::Array);
    }

    /// Borrows caller-owned memory for the compact buffer instead of
    /// copying. Above the compact cap the data is copied into a full array
    /// anyway, since full arrays have no borrowed form.
    pub fn set_array_f32_external(&mut self, handle: NodeHandle, data: &'static [f32]) {
        self.install_f32_array(handle, CompactSource::External(data), SubType::Array);
    }

    pub fn set_array_f64_external(&mut self, handle: NodeHandle, data: &'static [f64]) {
        self.install_f64_array(handle, CompactSource::External(data), SubType::Array);
    }

    pub fn set_array_i16_external(&mut self, handle: NodeHandle, data: &'static [i16]) {
        self.install_i16_array(handle, CompactSource::External(data), SubType::Array);
    }

    pub fn set_array_i32_external(&mut self, handle: NodeHandle, data: &'static [i32]) {
        self.install_i32_array(handle, CompactSource::External(data), SubType::Array);
    }

    /// Takes ownership of the caller's buffer for the compact form.
    pub fn set_array_f32_owned(&mut self, handle: NodeHandle, data: Vec<f32>) {
        self.install_f32_array(handle, CompactSource::Owned(data), SubType::Array);
    }

    pub fn set_array_f64_owned(&mut self, handle: NodeHandle, data: Vec<f64>) {
        self.install_f64_array(handle, CompactSource::Owned(data), SubType::Array);
    }

    pub fn set_array_i32_owned(&mut self, handle: NodeHandle, data: Vec<i32>) {
        self.install_i32_array(handle, CompactSource::Owned(data), SubType::Array);
    }

    fn install_compact(&mut self, handle: NodeHandle, repr: Repr, subtype: SubType) {
        self.set_to_null(handle);
        self.node_mut(handle).install(repr, subtype);
    }

    fn install_full_from(
        &mut self,
        handle: NodeHandle,
        count: usize,
        subtype: SubType,
        mut set: impl FnMut(&mut Node, usize),
    ) {
        self.set_to_null(handle);
        let mut elements = Vec::with_capacity(count);
        for i in 0..count {
            let element = self.alloc_node();
            set(self.node_mut(element), i);
            elements.push(element);
        }
        let array = self.arrays.alloc();
        let container = self.arrays.get_mut(array).expect("just allocated");
        for element in elements {
            container.push(element);
        }
        self.node_mut(handle).install(Repr::ArrayFull(array), subtype);
    }

    pub(crate) fn install_u8_array(&mut self, handle: NodeHandle, data: &[u8], subtype: SubType) {
        if data.len() <= SHORT_PAYLOAD_LEN {
            let repr = compact::choose_u8(CompactSource::Copied(data)).expect("fits inline");
            self.install_compact(handle, repr, subtype);
        } else {
            let values = data.to_vec();
            self.install_full_from(handle, values.len(), subtype, |node, i| {
                node.set_u8(values[i]);
            });
        }
    }

    pub(crate) fn install_i16_array(
        &mut self,
        handle: NodeHandle,
        source: CompactSource<'_, i16>,
        subtype: SubType,
    ) {
        if source.len() <= COMPACT_ARRAY_MAX_LEN {
            let repr = compact::choose_i16(source).expect("fits compact form");
            self.install_compact(handle, repr, subtype);
        } else {
            let values = source.into_cow();
            self.install_full_from(handle, values.len(), subtype, |node, i| {
                node.set_i16(values[i]);
            });
        }
    }

    pub(crate) fn install_i32_array(
        &mut self,
        handle: NodeHandle,
        source: CompactSource<'_, i32>,
        subtype: SubType,
    ) {
        if source.len() <= COMPACT_ARRAY_MAX_LEN {
            let repr = compact::choose_i32(source).expect("fits compact form");
            self.install_compact(handle, repr, subtype);
        } else {
            let values = source.into_cow();
            self.install_full_from(handle, values.len(), subtype, |node, i| {
                node.set_i32(values[i]);
            });
        }
    }

    pub(crate) fn install_f32_array(
        &mut self,
        handle: NodeHandle,
        source: CompactSource<'_, f32>,
        subtype: SubType,
    ) {
        if source.len() <= COMPACT_ARRAY_MAX_LEN {
            let repr = compact::choose_f32(source).expect("fits compact form");
            self.install_compact(handle, repr, subtype);
        } else {
            let values = source.into_cow();
            self.install_full_from(handle, values.len(), subtype, |node, i| {
                node.set_f32(values[i]);
            });
        }
    }

    pub(crate) fn install_f64_array(
        &mut self,
        handle: NodeHandle,
        source: CompactSource<'_, f64>,
        subtype: SubType,
    ) {
        if source.len() <= COMPACT_ARRAY_MAX_LEN {
            let repr = compact::choose_f64(source).expect("fits compact form");
            self.install_compact(handle, repr, subtype);
        } else {
            let values = source.into_cow();
            self.install_full_from(handle, values.len(), subtype, |node, i| {
                node.set_f64(values[i]);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::node::Repr;
    use crate::types::SubType;
    use crate::Context;

    #[rstest::rstest]
    fn test_setters_pick_narrowest_form() {
        let mut ctx = Context::new();
        let root = ctx.root();

        ctx.set_array_u8(root, &[1, 2, 3]);
        assert!(matches!(ctx.node(root).repr, Repr::ArrayShortU8 { .. }));

        ctx.set_array_i16(root, &[1, 2, 3, 4]);
        assert!(matches!(ctx.node(root).repr, Repr::ArrayShortI16 { .. }));

        ctx.set_array_i16(root, &[0; 5]);
        assert!(matches!(ctx.node(root).repr, Repr::ArrayI16(_)));

        ctx.set_array_f32(root, &[0.0; 31]);
        assert!(matches!(ctx.node(root).repr, Repr::ArrayF32(_)));

        ctx.set_array_f32(root, &[0.0; 32]);
        assert!(matches!(ctx.node(root).repr, Repr::ArrayFull(_)));
        assert_eq!(ctx.array_len(root), 32);
    }

    #[rstest::rstest]
    fn test_normalize_preserves_values_and_subtype() {
        let mut ctx = Context::new();
        let root = ctx.root();
        ctx.install_f32_array(
            root,
            crate::node::compact::CompactSource::Copied(&[1.0, 2.0, 3.0]),
            SubType::Vector,
        );

        ctx.normalize_array(root);
        assert!(matches!(ctx.node(root).repr, Repr::ArrayFull(_)));
        assert_eq!(ctx.node(root).subtype(), SubType::Vector);
        assert_eq!(ctx.array_len(root), 3);

        let second = ctx.array_element(root, 1).unwrap();
        assert_eq!(ctx.node(second).get_f32(0.0), 2.0);
        assert_eq!(ctx.node(second).subtype(), SubType::Float32);
    }

    #[rstest::rstest]
    fn test_element_access_normalizes_on_demand() {
        let mut ctx = Context::new();
        let root = ctx.root();
        ctx.set_array_u8(root, &[10, 20]);

        let element = ctx.array_element(root, 0).unwrap();
        assert_eq!(ctx.node(element).get_u8(0), 10);
        assert!(matches!(ctx.node(root).repr, Repr::ArrayFull(_)));
        assert!(ctx.array_element(root, 2).is_none());
    }

    #[rstest::rstest]
    fn test_append_retypes_non_array() {
        let mut ctx = Context::new();
        let root = ctx.root();
        ctx.node_mut(root).set_i32(5);

        let element = ctx.array_append(root);
        ctx.node_mut(element).set_string("first");

        assert_eq!(ctx.node(root).subtype(), SubType::Array);
        assert_eq!(ctx.array_len(root), 1);
        assert_eq!(ctx.node(element).get_string(), Some("first"));
    }

    #[rstest::rstest]
    fn test_insert_and_remove_keep_order() {
        let mut ctx = Context::new();
        let root = ctx.root();
        ctx.set_to_empty_array(root);
        for i in 0..4 {
            let e = ctx.array_append(root);
            ctx.node_mut(e).set_i32(i);
        }

        let inserted = ctx.array_insert_before(root, 0).unwrap();
        ctx.node_mut(inserted).set_i32(-1);
        assert_eq!(ctx.array_len(root), 5);

        ctx.array_remove(root, 1, 2);
        let handles = ctx.array_elements(root).to_vec();
        let values: Vec<i32> = handles.iter().map(|&h| ctx.node(h).get_i32(99)).collect();
        assert_eq!(values, vec![-1, 2, 3]);

        assert!(ctx.array_insert_before(root, 10).is_none());
    }

    #[rstest::rstest]
    fn test_set_len_grows_with_nulls_and_shrinks_freeing() {
        let mut ctx = Context::new();
        let root = ctx.root();
        let before = ctx.live_node_count();

        ctx.array_set_len(root, 3);
        assert_eq!(ctx.array_len(root), 3);
        let last = ctx.array_element(root, 2).unwrap();
        assert!(ctx.node(last).is_null());

        ctx.array_set_len(root, 1);
        assert_eq!(ctx.array_len(root), 1);
        assert_eq!(ctx.live_node_count(), before + 1);
    }
}
