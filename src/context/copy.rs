//! Deep copy between two nodes of the same context.

use crate::container::MemberName;
use crate::context::Context;
use crate::node::compact::CompactSource;
use crate::node::{NodeHandle, Repr};

impl Context {
    /// Replaces `dst` with a deep copy of `src`: subtype, flags, metadata,
    /// and the whole payload. Container elements get fresh nodes, so the
    /// copy shares no handles with the source. Externally-borrowed string
    /// and buffer payloads are copied into owned storage.
    ///
    /// `src` must not be a descendant of `dst`; the destination subtree is
    /// released before the copy walks the source.
    pub fn copy_node(&mut self, dst: NodeHandle, src: NodeHandle) {
        if dst == src || self.try_node(src).is_none() {
            return;
        }

        if self.is_metadata_enabled() {
            self.copy_metadata(dst, src);
        }

        let (repr, subtype, flags) = {
            let node = self.node(src);
            (node.repr.clone(), node.subtype(), node.flags())
        };

        match repr {
            Repr::Null
            | Repr::Bool(_)
            | Repr::Int(_)
            | Repr::UInt(_)
            | Repr::Double(_)
            | Repr::StringShort(_)
            | Repr::ArrayShortU8 { .. }
            | Repr::ArrayShortI16 { .. } => {
                self.set_to_null(dst);
                self.node_mut(dst).install(repr, subtype);
            }
            Repr::StringHeap(text) => {
                self.set_to_null(dst);
                self.node_mut(dst).set_string_with_subtype(&text, subtype);
            }
            // The copy owns its payload even when the source borrowed it.
            Repr::StringExtern(text) => {
                self.set_to_null(dst);
                self.node_mut(dst).set_string_with_subtype(text, subtype);
            }
            Repr::BlobOwned(bytes) => {
                self.set_to_null(dst);
                self.node_mut(dst).set_blob(&bytes);
            }
            Repr::BlobExtern(bytes) => {
                self.set_to_null(dst);
                self.node_mut(dst).set_blob(&bytes);
            }
            Repr::ArrayI16(data) => {
                self.install_i16_array(dst, CompactSource::Copied(&data), subtype);
            }
            Repr::ArrayI32(data) => {
                self.install_i32_array(dst, CompactSource::Copied(&data), subtype);
            }
            Repr::ArrayF32(data) => {
                self.install_f32_array(dst, CompactSource::Copied(&data), subtype);
            }
            Repr::ArrayF64(data) => {
                self.install_f64_array(dst, CompactSource::Copied(&data), subtype);
            }
            Repr::ArrayFull(src_array) => {
                let elements: Vec<NodeHandle> = self
                    .arrays
                    .get(src_array)
                    .map_or_else(Vec::new, |c| c.handles().to_vec());

                self.set_to_null(dst);
                let array = self.arrays.alloc();
                for element in elements {
                    let copy = self.alloc_node();
                    self.copy_node(copy, element);
                    self.arrays
                        .get_mut(array)
                        .expect("array just allocated")
                        .push(copy);
                }
                self.node_mut(dst).install(Repr::ArrayFull(array), subtype);
            }
            Repr::Table(src_table) => {
                let members: Vec<(u32, String, NodeHandle)> = match self.tables.get(src_table) {
                    Some(container) => (0..container.len())
                        .filter_map(|i| {
                            Some((
                                container.member_hash_at(i)?,
                                container.member_name(i)?.to_owned(),
                                container.member(i)?,
                            ))
                        })
                        .collect(),
                    None => Vec::new(),
                };

                self.set_to_null(dst);
                let table = self.tables.alloc();
                for (hash, name, member) in members {
                    let copy = self.alloc_node();
                    self.copy_node(copy, member);
                    let symbol = self.intern(&name);
                    self.tables
                        .get_mut(table)
                        .expect("table just allocated")
                        .push(hash, copy, MemberName::Interned(symbol));
                }
                self.node_mut(dst).install(Repr::Table(table), subtype);
            }
        }

        let node = self.node_mut(dst);
        node.set_subtype(subtype);
        node.set_flags(flags);
    }
}

#[cfg(test)]
mod tests {
    use crate::node::Repr;
    use crate::types::SubType;
    use crate::Context;

    #[rstest::rstest]
    fn test_copy_scalar_carries_subtype_and_flags() {
        let mut ctx = Context::new();
        let root = ctx.root();
        let src = ctx.alloc_node();
        ctx.node_mut(src).set_i16(-5);
        ctx.node_mut(src).set_flags(3);

        ctx.copy_node(root, src);
        assert_eq!(ctx.node(root).get_i16(0), -5);
        assert_eq!(ctx.node(root).subtype(), SubType::Int16);
        assert_eq!(ctx.node(root).flags(), 3);
    }

    #[rstest::rstest]
    fn test_copy_tree_shares_no_handles() {
        let mut ctx = Context::new();
        let root = ctx.root();
        let src = ctx.alloc_node();
        let (name, _) = ctx.find_or_create_member(src, "name");
        ctx.node_mut(name).set_string("original");
        let (list, _) = ctx.find_or_create_member(src, "list");
        for i in 0..3 {
            let e = ctx.array_append(list);
            ctx.node_mut(e).set_i32(i);
        }

        ctx.copy_node(root, src);

        // Mutating the copy leaves the source untouched.
        let copied_name = ctx.find_member(root, "name").unwrap();
        assert_ne!(copied_name, name);
        ctx.node_mut(copied_name).set_string("changed");
        assert_eq!(ctx.node(name).get_string(), Some("original"));

        let copied_list = ctx.find_member(root, "list").unwrap();
        assert_eq!(ctx.array_len(copied_list), 3);
        let second = ctx.array_element(copied_list, 1).unwrap();
        assert_eq!(ctx.node(second).get_i32(-1), 1);
    }

    #[rstest::rstest]
    fn test_copy_external_payloads_become_owned() {
        let mut ctx = Context::new();
        let root = ctx.root();
        let src = ctx.alloc_node();
        ctx.node_mut(src)
            .set_string_external("a long external string constant");

        ctx.copy_node(root, src);
        assert!(matches!(ctx.node(root).repr, Repr::StringHeap(_)));
        assert_eq!(
            ctx.node(root).get_string(),
            Some("a long external string constant")
        );
    }

    #[rstest::rstest]
    fn test_copy_compact_array_keeps_encoding_family() {
        let mut ctx = Context::new();
        let root = ctx.root();
        let src = ctx.alloc_node();
        ctx.set_array_f32(src, &[1.0, 2.0, 3.0, 4.0, 5.0]);

        ctx.copy_node(root, src);
        assert!(matches!(ctx.node(root).repr, Repr::ArrayF32(_)));
        let mut out = [0f32; 5];
        assert!(ctx.read_array_f32(root, &mut out));
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 5.0]);
    }
}
