//! Self-contained binary image of a tree: a small checked header followed by
//! a depth-first encoding of every node.
//!
//! The image preserves physical encodings: a compact float array restores as
//! a compact float array, a full array restores element by element. The two
//! exceptions are externally-borrowed payloads, which restore as owned
//! copies, and string storage, which is re-chosen from the length on load
//! (the boundary is deterministic, so the same form comes back).

use crate::container::{member_hash, MemberName};
use crate::error::{Error, Result};
use crate::node::compact::CompactSource;
use crate::node::{NodeHandle, Repr, COMPACT_ARRAY_MAX_LEN, MAX_TREE_DEPTH, SHORT_PAYLOAD_LEN};
use crate::types::SubType;
use crate::utils::crc32;
use crate::Context;

const MAGIC: [u8; 4] = *b"KV3B";
const VERSION: u8 = 1;

// Wire tags, one per physical encoding.
const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_UINT: u8 = 3;
const TAG_DOUBLE: u8 = 4;
const TAG_STRING: u8 = 5;
const TAG_BLOB: u8 = 6;
const TAG_ARRAY_U8_SHORT: u8 = 7;
const TAG_ARRAY_I16_SHORT: u8 = 8;
const TAG_ARRAY_I16: u8 = 9;
const TAG_ARRAY_I32: u8 = 10;
const TAG_ARRAY_F32: u8 = 11;
const TAG_ARRAY_F64: u8 = 12;
const TAG_ARRAY_FULL: u8 = 13;
const TAG_TABLE: u8 = 14;

/// Serializes the subtree rooted at `handle` into a standalone byte image.
///
/// Containers nested deeper than the format's depth bound serialize as null
/// at the cut, the same way dangling handles do.
pub fn to_binary(context: &Context, handle: NodeHandle) -> Vec<u8> {
    let mut payload = Vec::new();
    write_node(context, handle, &mut payload, 0);

    let mut out = Vec::with_capacity(payload.len() + 9);
    out.extend_from_slice(&MAGIC);
    out.push(VERSION);
    out.extend_from_slice(&crc32(&payload).to_le_bytes());
    out.extend_from_slice(&payload);
    out
}

/// Restores a byte image produced by [`to_binary`] into `handle`, replacing
/// whatever the node held. The node is left untouched when the header or
/// checksum is rejected; a payload decode error may leave it partially
/// rebuilt.
pub fn from_binary(context: &mut Context, handle: NodeHandle, bytes: &[u8]) -> Result<()> {
    if bytes.len() < 9 {
        return Err(Error::UnexpectedEof {
            offset: bytes.len(),
            needed: 9 - bytes.len(),
        });
    }
    if bytes[..4] != MAGIC {
        return Err(Error::BadMagic);
    }
    if bytes[4] != VERSION {
        return Err(Error::UnsupportedVersion(bytes[4]));
    }

    let stored = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
    let payload = &bytes[9..];
    let computed = crc32(payload);
    if stored != computed {
        return Err(Error::ChecksumMismatch { stored, computed });
    }

    let mut reader = Reader {
        bytes: payload,
        pos: 0,
    };
    read_node(context, handle, &mut reader, 0)?;
    Ok(())
}

impl Context {
    /// See [`to_binary`].
    pub fn save_binary(&self, handle: NodeHandle) -> Vec<u8> {
        to_binary(self, handle)
    }

    /// See [`from_binary`].
    pub fn load_binary(&mut self, handle: NodeHandle, bytes: &[u8]) -> Result<()> {
        from_binary(self, handle, bytes)
    }
}

// ---- writer ------------------------------------------------------------

fn write_len_prefixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

fn write_node(context: &Context, handle: NodeHandle, out: &mut Vec<u8>, depth: usize) {
    // Dangling handles and over-deep subtrees serialize as null rather than
    // poisoning the image (or blowing the stack).
    let node = match context.try_node(handle) {
        Some(node) if depth <= MAX_TREE_DEPTH => node,
        _ => {
            out.push(TAG_NULL);
            out.push(SubType::Null as u8);
            out.push(0);
            return;
        }
    };

    let tag = match &node.repr {
        Repr::Null => TAG_NULL,
        Repr::Bool(_) => TAG_BOOL,
        Repr::Int(_) => TAG_INT,
        Repr::UInt(_) => TAG_UINT,
        Repr::Double(_) => TAG_DOUBLE,
        Repr::StringShort(_) | Repr::StringHeap(_) | Repr::StringExtern(_) => TAG_STRING,
        Repr::BlobOwned(_) | Repr::BlobExtern(_) => TAG_BLOB,
        Repr::ArrayShortU8 { .. } => TAG_ARRAY_U8_SHORT,
        Repr::ArrayShortI16 { .. } => TAG_ARRAY_I16_SHORT,
        Repr::ArrayI16(_) => TAG_ARRAY_I16,
        Repr::ArrayI32(_) => TAG_ARRAY_I32,
        Repr::ArrayF32(_) => TAG_ARRAY_F32,
        Repr::ArrayF64(_) => TAG_ARRAY_F64,
        Repr::ArrayFull(_) => TAG_ARRAY_FULL,
        Repr::Table(_) => TAG_TABLE,
    };
    out.push(tag);
    out.push(node.subtype() as u8);
    out.push(node.flags());

    match &node.repr {
        Repr::Null => {}
        Repr::Bool(v) => out.push(*v as u8),
        Repr::Int(v) => out.extend_from_slice(&v.to_le_bytes()),
        Repr::UInt(v) => out.extend_from_slice(&v.to_le_bytes()),
        Repr::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
        Repr::StringShort(_) | Repr::StringHeap(_) | Repr::StringExtern(_) => {
            write_len_prefixed(out, node.get_string_or("").as_bytes());
        }
        Repr::BlobOwned(bytes) => write_len_prefixed(out, bytes),
        Repr::BlobExtern(bytes) => write_len_prefixed(out, bytes),
        Repr::ArrayShortU8 { buf, len } => {
            out.push(*len);
            out.extend_from_slice(&buf[..*len as usize]);
        }
        Repr::ArrayShortI16 { buf, len } => {
            out.push(*len);
            for v in &buf[..*len as usize] {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        Repr::ArrayI16(data) => {
            out.push(data.len() as u8);
            for v in data.iter() {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        Repr::ArrayI32(data) => {
            out.push(data.len() as u8);
            for v in data.iter() {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        Repr::ArrayF32(data) => {
            out.push(data.len() as u8);
            for v in data.iter() {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        Repr::ArrayF64(data) => {
            out.push(data.len() as u8);
            for v in data.iter() {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        Repr::ArrayFull(array) => {
            let elements = context.arrays.get(*array).map_or(&[][..], |c| c.handles());
            out.extend_from_slice(&(elements.len() as u32).to_le_bytes());
            for &element in elements {
                write_node(context, element, out, depth + 1);
            }
        }
        Repr::Table(table) => {
            let Some(container) = context.tables.get(*table) else {
                out.extend_from_slice(&0u32.to_le_bytes());
                return;
            };
            out.extend_from_slice(&(container.len() as u32).to_le_bytes());
            for index in 0..container.len() {
                let name = container.member_name(index).unwrap_or("");
                write_len_prefixed(out, name.as_bytes());
                if let Some(member) = container.member(index) {
                    write_node(context, member, out, depth + 1);
                }
            }
        }
    }
}

// ---- reader ------------------------------------------------------------

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let remaining = self.bytes.len() - self.pos;
        if count > remaining {
            return Err(Error::UnexpectedEof {
                offset: self.pos,
                needed: count - remaining,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes(b.try_into().expect("8 bytes")))
    }

    fn str(&mut self) -> Result<&'a str> {
        let len = self.u32()? as usize;
        Ok(std::str::from_utf8(self.take(len)?)?)
    }
}

fn check_count(what: &'static str, count: usize, max: usize) -> Result<()> {
    if count > max {
        return Err(Error::BadCount {
            what,
            count: count as u64,
        });
    }
    Ok(())
}

fn read_node(
    context: &mut Context,
    handle: NodeHandle,
    reader: &mut Reader<'_>,
    depth: usize,
) -> Result<()> {
    let tag_offset = reader.pos;
    // A crafted image can nest containers far past anything the writer
    // produces; reject it before the recursion eats the stack.
    if depth > MAX_TREE_DEPTH {
        return Err(Error::TooDeep {
            offset: tag_offset,
            limit: MAX_TREE_DEPTH,
        });
    }
    let tag = reader.u8()?;
    let subtype_offset = reader.pos;
    let raw_subtype = reader.u8()?;
    let subtype = SubType::from_u8(raw_subtype).ok_or(Error::BadSubType {
        tag: raw_subtype,
        offset: subtype_offset,
    })?;
    let flags = reader.u8()?;

    match tag {
        TAG_NULL => context.set_to_null(handle),
        TAG_BOOL => {
            let v = reader.u8()? != 0;
            context.set_to_null(handle);
            context.node_mut(handle).install(Repr::Bool(v), subtype);
        }
        TAG_INT => {
            let v = reader.u64()? as i64;
            context.set_to_null(handle);
            context.node_mut(handle).install(Repr::Int(v), subtype);
        }
        TAG_UINT => {
            let v = reader.u64()?;
            context.set_to_null(handle);
            context.node_mut(handle).install(Repr::UInt(v), subtype);
        }
        TAG_DOUBLE => {
            let v = f64::from_bits(reader.u64()?);
            context.set_to_null(handle);
            context.node_mut(handle).install(Repr::Double(v), subtype);
        }
        TAG_STRING => {
            let text = reader.str()?.to_owned();
            context.set_to_null(handle);
            context
                .node_mut(handle)
                .set_string_with_subtype(&text, subtype);
        }
        TAG_BLOB => {
            let len = reader.u32()? as usize;
            let bytes = reader.take(len)?.to_vec();
            context.set_to_null(handle);
            context.node_mut(handle).set_blob(&bytes);
        }
        TAG_ARRAY_U8_SHORT => {
            let len = reader.u8()? as usize;
            check_count("inline byte array", len, SHORT_PAYLOAD_LEN)?;
            let data = reader.take(len)?.to_vec();
            context.install_u8_array(handle, &data, subtype);
        }
        TAG_ARRAY_I16_SHORT | TAG_ARRAY_I16 => {
            let len = reader.u8()? as usize;
            let max = if tag == TAG_ARRAY_I16_SHORT {
                4
            } else {
                COMPACT_ARRAY_MAX_LEN
            };
            check_count("compact i16 array", len, max)?;
            let mut data = Vec::with_capacity(len);
            for _ in 0..len {
                let b = reader.take(2)?;
                data.push(i16::from_le_bytes([b[0], b[1]]));
            }
            context.install_i16_array(handle, CompactSource::Owned(data), subtype);
        }
        TAG_ARRAY_I32 => {
            let len = reader.u8()? as usize;
            check_count("compact i32 array", len, COMPACT_ARRAY_MAX_LEN)?;
            let mut data = Vec::with_capacity(len);
            for _ in 0..len {
                data.push(reader.u32()? as i32);
            }
            context.install_i32_array(handle, CompactSource::Owned(data), subtype);
        }
        TAG_ARRAY_F32 => {
            let len = reader.u8()? as usize;
            check_count("compact f32 array", len, COMPACT_ARRAY_MAX_LEN)?;
            let mut data = Vec::with_capacity(len);
            for _ in 0..len {
                data.push(f32::from_bits(reader.u32()?));
            }
            context.install_f32_array(handle, CompactSource::Owned(data), subtype);
        }
        TAG_ARRAY_F64 => {
            let len = reader.u8()? as usize;
            check_count("compact f64 array", len, COMPACT_ARRAY_MAX_LEN)?;
            let mut data = Vec::with_capacity(len);
            for _ in 0..len {
                data.push(f64::from_bits(reader.u64()?));
            }
            context.install_f64_array(handle, CompactSource::Owned(data), subtype);
        }
        TAG_ARRAY_FULL => {
            let count = reader.u32()? as usize;
            context.set_to_null(handle);
            let array = context.arrays.alloc();
            for _ in 0..count {
                let element = context.alloc_node();
                context
                    .arrays
                    .get_mut(array)
                    .expect("array just allocated")
                    .push(element);
                read_node(context, element, reader, depth + 1)?;
            }
            context
                .node_mut(handle)
                .install(Repr::ArrayFull(array), subtype);
        }
        TAG_TABLE => {
            let count = reader.u32()? as usize;
            context.set_to_null(handle);
            let table = context.tables.alloc();
            for _ in 0..count {
                let name = reader.str()?.to_owned();
                let symbol = context.intern(&name);
                let member = context.alloc_node();
                context
                    .tables
                    .get_mut(table)
                    .expect("table just allocated")
                    .push(member_hash(&name), member, MemberName::Interned(symbol));
                read_node(context, member, reader, depth + 1)?;
            }
            context
                .node_mut(handle)
                .install(Repr::Table(table), subtype);
        }
        unknown => {
            return Err(Error::BadValueTag {
                tag: unknown,
                offset: tag_offset,
            })
        }
    }

    let node = context.node_mut(handle);
    node.set_subtype(subtype);
    node.set_flags(flags);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::node::Repr;
    use crate::types::SubType;
    use crate::Context;

    fn build_sample(ctx: &mut Context) {
        let root = ctx.root();
        let (title, _) = ctx.find_or_create_member(root, "title");
        ctx.node_mut(title).set_string("sample document");
        let (count, _) = ctx.find_or_create_member(root, "count");
        ctx.node_mut(count).set_i32(1234);
        let (scale, _) = ctx.find_or_create_member(root, "scale");
        ctx.set_array_f32(scale, &[1.0, 0.5, 0.25]);
        let (blob, _) = ctx.find_or_create_member(root, "blob");
        ctx.node_mut(blob).set_blob(&[0xde, 0xad, 0xbe, 0xef]);
        let (items, _) = ctx.find_or_create_member(root, "items");
        for i in 0..3 {
            let e = ctx.array_append(items);
            ctx.node_mut(e).set_i64(i * 100);
        }
    }

    #[rstest::rstest]
    fn test_roundtrip_preserves_tree_and_encodings() {
        let mut ctx = Context::new();
        build_sample(&mut ctx);
        let image = ctx.save_binary(ctx.root());

        let mut restored = Context::new();
        restored.load_binary(restored.root(), &image).unwrap();
        let root = restored.root();

        assert_eq!(restored.member_count(root), 5);
        let title = restored.find_member(root, "title").unwrap();
        assert_eq!(restored.node(title).get_string(), Some("sample document"));

        let count = restored.find_member(root, "count").unwrap();
        assert_eq!(restored.node(count).get_i32(0), 1234);
        assert_eq!(restored.node(count).subtype(), SubType::Int32);

        let scale = restored.find_member(root, "scale").unwrap();
        assert!(matches!(restored.node(scale).repr, Repr::ArrayF32(_)));
        let mut v = [0f32; 3];
        assert!(restored.read_array_f32(scale, &mut v));
        assert_eq!(v, [1.0, 0.5, 0.25]);

        let blob = restored.find_member(root, "blob").unwrap();
        assert_eq!(restored.node(blob).get_blob(), Some(&[0xde, 0xad, 0xbe, 0xef][..]));

        let items = restored.find_member(root, "items").unwrap();
        assert_eq!(restored.array_len(items), 3);
        let last = restored.array_element(items, 2).unwrap();
        assert_eq!(restored.node(last).get_i64(0), 200);
    }

    #[rstest::rstest]
    fn test_bad_magic_and_version_rejected() {
        let mut ctx = Context::new();
        build_sample(&mut ctx);
        let image = ctx.save_binary(ctx.root());

        let mut wrong_magic = image.clone();
        wrong_magic[0] = b'X';
        let mut fresh = Context::new();
        assert!(matches!(
            fresh.load_binary(fresh.root(), &wrong_magic),
            Err(Error::BadMagic)
        ));

        let mut wrong_version = image;
        wrong_version[4] = 99;
        assert!(matches!(
            fresh.load_binary(fresh.root(), &wrong_version),
            Err(Error::UnsupportedVersion(99))
        ));
    }

    #[rstest::rstest]
    fn test_corrupted_payload_fails_checksum() {
        let mut ctx = Context::new();
        build_sample(&mut ctx);
        let mut image = ctx.save_binary(ctx.root());
        let last = image.len() - 1;
        image[last] ^= 0xff;

        let mut fresh = Context::new();
        assert!(matches!(
            fresh.load_binary(fresh.root(), &image),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[rstest::rstest]
    fn test_overdeep_image_rejected_not_recursed() {
        // 200k nested single-element arrays under a valid checked header.
        let mut payload = Vec::new();
        for _ in 0..200_000u32 {
            payload.push(super::TAG_ARRAY_FULL);
            payload.push(SubType::Array as u8);
            payload.push(0);
            payload.extend_from_slice(&1u32.to_le_bytes());
        }
        payload.push(super::TAG_NULL);
        payload.push(SubType::Null as u8);
        payload.push(0);

        let mut image = Vec::with_capacity(payload.len() + 9);
        image.extend_from_slice(&super::MAGIC);
        image.push(super::VERSION);
        image.extend_from_slice(&crate::utils::crc32(&payload).to_le_bytes());
        image.extend_from_slice(&payload);

        let mut ctx = Context::new();
        assert!(matches!(
            ctx.load_binary(ctx.root(), &image),
            Err(Error::TooDeep { .. })
        ));
    }

    #[rstest::rstest]
    fn test_truncated_input_reports_eof() {
        let mut ctx = Context::new();
        build_sample(&mut ctx);
        let image = ctx.save_binary(ctx.root());

        let mut fresh = Context::new();
        assert!(matches!(
            fresh.load_binary(fresh.root(), &image[..5]),
            Err(Error::UnexpectedEof { .. })
        ));
    }
}
