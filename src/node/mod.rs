pub(crate) mod compact;
mod display;

use std::borrow::Cow;

use memchr::memchr;

use crate::cluster::Handle;
use crate::container::{ArrayContainer, TableContainer};
use crate::types::{Kind, SubType};
use crate::utils;

pub use display::ValueRef;

/// Identifier of a node allocated from a [`Context`](crate::Context).
pub type NodeHandle = Handle<Node>;
pub(crate) type ArrayHandle = Handle<ArrayContainer>;
pub(crate) type TableHandle = Handle<TableContainer>;

/// Capacity of the inline string / byte-array payload.
pub const SHORT_PAYLOAD_LEN: usize = 8;

/// Largest element count a pointer-form compact array may hold before the
/// value must use a full per-element array.
pub const COMPACT_ARRAY_MAX_LEN: usize = 31;

/// Deepest container nesting the tree serializers will walk.
pub(crate) const MAX_TREE_DEPTH: usize = 128;

/// Physical representation of a node's payload.
///
/// Exactly one interpretation is valid at a time, determined solely by the
/// variant tag. Several variants share a logical [`Kind`]: the three string
/// variants are all `Kind::String`, and everything from `ArrayShortU8` to
/// `ArrayFull` is `Kind::Array`. Getters match on the broad kind; setters
/// pick the narrowest variant that fits.
///
/// `Cow::Borrowed` payloads are externally-owned memory the node must not
/// free; `Cow::Owned` payloads belong to the node.
#[derive(Debug, Clone, Default)]
pub(crate) enum Repr {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    /// NUL-terminated string of fewer than [`SHORT_PAYLOAD_LEN`] bytes.
    StringShort([u8; SHORT_PAYLOAD_LEN]),
    StringHeap(Box<str>),
    StringExtern(&'static str),
    BlobOwned(Box<[u8]>),
    BlobExtern(Cow<'static, [u8]>),
    ArrayShortU8 {
        buf: [u8; SHORT_PAYLOAD_LEN],
        len: u8,
    },
    ArrayShortI16 {
        buf: [i16; 4],
        len: u8,
    },
    ArrayF32(Cow<'static, [f32]>),
    ArrayF64(Cow<'static, [f64]>),
    ArrayI16(Cow<'static, [i16]>),
    ArrayI32(Cow<'static, [i32]>),
    ArrayFull(ArrayHandle),
    Table(TableHandle),
}

impl Repr {
    pub fn kind(&self) -> Kind {
        match self {
            Repr::Null => Kind::Null,
            Repr::Bool(_) => Kind::Bool,
            Repr::Int(_) => Kind::Int,
            Repr::UInt(_) => Kind::UInt,
            Repr::Double(_) => Kind::Double,
            Repr::StringShort(_) | Repr::StringHeap(_) | Repr::StringExtern(_) => Kind::String,
            Repr::BlobOwned(_) | Repr::BlobExtern(_) => Kind::BinaryBlob,
            Repr::ArrayShortU8 { .. }
            | Repr::ArrayShortI16 { .. }
            | Repr::ArrayF32(_)
            | Repr::ArrayF64(_)
            | Repr::ArrayI16(_)
            | Repr::ArrayI32(_)
            | Repr::ArrayFull(_) => Kind::Array,
            Repr::Table(_) => Kind::Table,
        }
    }
}

/// One dynamically-typed value: representation tag, semantic subtype, and a
/// small payload.
///
/// Nodes holding scalars, strings, blobs, or compact numeric arrays are
/// self-contained. Array and table payloads are handles into the owning
/// [`Context`](crate::Context), so every operation that walks or grows a
/// container lives on the context.
#[derive(Debug)]
pub struct Node {
    pub(crate) repr: Repr,
    subtype: SubType,
    flags: u8,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            repr: Repr::Null,
            subtype: SubType::Null,
            flags: 0,
        }
    }
}

impl Node {
    /// Logical type, derived from the representation tag.
    pub fn kind(&self) -> Kind {
        self.repr.kind()
    }

    pub fn subtype(&self) -> SubType {
        self.subtype
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn set_flags(&mut self, flags: u8) {
        self.flags = flags;
    }

    pub(crate) fn set_subtype(&mut self, subtype: SubType) {
        self.subtype = subtype;
    }

    pub fn is_null(&self) -> bool {
        matches!(self.repr, Repr::Null)
    }

    /// Installs a new representation, resolving an `Unspecified` subtype to
    /// the canonical one for the new kind.
    ///
    /// If the node currently holds an array or table handle, the container
    /// stays allocated in the owning context until `clear`/`purge`; use
    /// [`Context::set_to_null`](crate::Context::set_to_null) to recycle
    /// container payloads eagerly.
    pub(crate) fn install(&mut self, repr: Repr, subtype: SubType) {
        let kind = repr.kind();
        self.repr = repr;
        self.subtype = subtype.resolve(kind);
    }

    pub fn set_to_null(&mut self) {
        self.install(Repr::Null, SubType::Null);
    }

    // ---- scalars ------------------------------------------------------

    pub fn get_bool(&self, default: bool) -> bool {
        match &self.repr {
            Repr::Bool(v) => *v,
            Repr::Int(v) => *v != 0,
            Repr::UInt(v) if self.subtype != SubType::Pointer => *v != 0,
            Repr::Double(v) => *v != 0.0,
            _ => self.str_payload().map_or(default, |s| {
                utils::parse_bool(s).unwrap_or(default)
            }),
        }
    }

    pub fn get_f64(&self, default: f64) -> f64 {
        match &self.repr {
            Repr::Bool(v) => *v as u8 as f64,
            Repr::Int(v) => *v as f64,
            Repr::UInt(v) if self.subtype != SubType::Pointer => *v as f64,
            Repr::Double(v) => *v,
            _ => self
                .str_payload()
                .and_then(utils::parse_f64)
                .unwrap_or(default),
        }
    }

    pub fn get_f32(&self, default: f32) -> f32 {
        self.get_f64(default as f64) as f32
    }

    fn get_int_scalar(&self) -> Option<i64> {
        match &self.repr {
            Repr::Bool(v) => Some(*v as i64),
            Repr::Int(v) => Some(*v),
            Repr::UInt(v) if self.subtype != SubType::Pointer => Some(*v as i64),
            Repr::Double(v) => Some(*v as i64),
            _ => self.str_payload().and_then(utils::parse_i64),
        }
    }

    fn get_uint_scalar(&self) -> Option<u64> {
        match &self.repr {
            Repr::Bool(v) => Some(*v as u64),
            Repr::Int(v) => Some(*v as u64),
            Repr::UInt(v) if self.subtype != SubType::Pointer => Some(*v),
            Repr::Double(v) => Some(*v as u64),
            _ => self.str_payload().and_then(utils::parse_u64),
        }
    }

    pub fn get_i8(&self, default: i8) -> i8 {
        self.get_int_scalar().map_or(default, |v| v as i8)
    }

    pub fn get_i16(&self, default: i16) -> i16 {
        self.get_int_scalar().map_or(default, |v| v as i16)
    }

    pub fn get_i32(&self, default: i32) -> i32 {
        self.get_int_scalar().map_or(default, |v| v as i32)
    }

    pub fn get_i64(&self, default: i64) -> i64 {
        self.get_int_scalar().unwrap_or(default)
    }

    pub fn get_u8(&self, default: u8) -> u8 {
        self.get_uint_scalar().map_or(default, |v| v as u8)
    }

    pub fn get_u16(&self, default: u16) -> u16 {
        self.get_uint_scalar().map_or(default, |v| v as u16)
    }

    pub fn get_u32(&self, default: u32) -> u32 {
        self.get_uint_scalar().map_or(default, |v| v as u32)
    }

    pub fn get_u64(&self, default: u64) -> u64 {
        self.get_uint_scalar().unwrap_or(default)
    }

    pub fn get_char(&self, default: i8) -> i8 {
        self.get_i8(default)
    }

    pub fn get_uchar32(&self, default: u32) -> u32 {
        self.get_u32(default)
    }

    pub fn set_bool(&mut self, value: bool) {
        self.install(Repr::Bool(value), SubType::Bool8);
    }

    pub fn set_char(&mut self, value: i8) {
        self.install(Repr::Int(value as i64), SubType::Char8);
    }

    pub fn set_uchar32(&mut self, value: u32) {
        self.install(Repr::UInt(value as u64), SubType::UChar32);
    }

    pub fn set_i8(&mut self, value: i8) {
        self.install(Repr::Int(value as i64), SubType::Int8);
    }

    pub fn set_u8(&mut self, value: u8) {
        self.install(Repr::UInt(value as u64), SubType::UInt8);
    }

    pub fn set_i16(&mut self, value: i16) {
        self.install(Repr::Int(value as i64), SubType::Int16);
    }

    pub fn set_u16(&mut self, value: u16) {
        self.install(Repr::UInt(value as u64), SubType::UInt16);
    }

    pub fn set_i32(&mut self, value: i32) {
        self.install(Repr::Int(value as i64), SubType::Int32);
    }

    pub fn set_u32(&mut self, value: u32) {
        self.install(Repr::UInt(value as u64), SubType::UInt32);
    }

    pub fn set_i64(&mut self, value: i64) {
        self.install(Repr::Int(value), SubType::Int64);
    }

    pub fn set_u64(&mut self, value: u64) {
        self.install(Repr::UInt(value), SubType::UInt64);
    }

    pub fn set_f32(&mut self, value: f32) {
        self.install(Repr::Double(value as f64), SubType::Float32);
    }

    pub fn set_f64(&mut self, value: f64) {
        self.install(Repr::Double(value), SubType::Float64);
    }

    /// Opaque pointer-sized payload; readable only while the subtype is
    /// still `Pointer`.
    pub fn set_pointer(&mut self, value: u64) {
        self.install(Repr::UInt(value), SubType::Pointer);
    }

    pub fn get_pointer(&self, default: u64) -> u64 {
        match self.repr {
            Repr::UInt(v) if self.subtype == SubType::Pointer => v,
            _ => default,
        }
    }

    pub fn set_string_token(&mut self, hash: u32) {
        self.install(Repr::UInt(hash as u64), SubType::StringToken);
    }

    pub fn get_string_token(&self, default: u32) -> u32 {
        match self.repr {
            Repr::UInt(v) if self.subtype == SubType::StringToken => v as u32,
            _ => default,
        }
    }

    pub fn set_ehandle(&mut self, handle: u32) {
        self.install(Repr::UInt(handle as u64), SubType::EHandle);
    }

    pub fn get_ehandle(&self, default: u32) -> u32 {
        match self.repr {
            Repr::UInt(v) if self.subtype == SubType::EHandle => v as u32,
            _ => default,
        }
    }

    // ---- strings ------------------------------------------------------

    fn str_payload(&self) -> Option<&str> {
        match &self.repr {
            Repr::StringShort(buf) => {
                let len = memchr(0, buf).unwrap_or(buf.len());
                std::str::from_utf8(&buf[..len]).ok()
            }
            Repr::StringHeap(s) => Some(s),
            Repr::StringExtern(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_string(&self) -> Option<&str> {
        self.str_payload()
    }

    pub fn get_string_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.str_payload().unwrap_or(default)
    }

    /// True when the string payload fits the inline buffer (no allocation).
    pub fn is_string_inline(&self) -> bool {
        matches!(self.repr, Repr::StringShort(_))
    }

    pub fn set_string(&mut self, value: &str) {
        self.set_string_with_subtype(value, SubType::String);
    }

    pub fn set_string_with_subtype(&mut self, value: &str, subtype: SubType) {
        // The inline buffer is NUL-scanned, so an interior NUL byte forces
        // the heap form regardless of length.
        if value.len() < SHORT_PAYLOAD_LEN && memchr(0, value.as_bytes()).is_none() {
            let mut buf = [0u8; SHORT_PAYLOAD_LEN];
            buf[..value.len()].copy_from_slice(value.as_bytes());
            self.install(Repr::StringShort(buf), subtype);
        } else {
            self.install(Repr::StringHeap(value.into()), subtype);
        }
    }

    /// Stores a borrowed string without copying. Short strings are copied
    /// into the inline buffer anyway, since that is cheaper than carrying
    /// the borrow.
    pub fn set_string_external(&mut self, value: &'static str) {
        self.set_string_external_with_subtype(value, SubType::String);
    }

    pub fn set_string_external_with_subtype(&mut self, value: &'static str, subtype: SubType) {
        if value.len() < SHORT_PAYLOAD_LEN {
            self.set_string_with_subtype(value, subtype);
        } else {
            self.install(Repr::StringExtern(value), subtype);
        }
    }

    // ---- binary blobs -------------------------------------------------

    pub fn get_blob(&self) -> Option<&[u8]> {
        match &self.repr {
            Repr::BlobOwned(bytes) => Some(bytes),
            Repr::BlobExtern(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn blob_size(&self) -> usize {
        self.get_blob().map_or(0, <[u8]>::len)
    }

    pub fn set_blob(&mut self, bytes: &[u8]) {
        self.install(Repr::BlobOwned(bytes.into()), SubType::BinaryBlob);
    }

    /// Stores blob bytes without copying. `Cow::Borrowed` leaves ownership
    /// with the caller; `Cow::Owned` transfers it to the node (the original
    /// "free on release" flag).
    pub fn set_blob_external(&mut self, bytes: Cow<'static, [u8]>) {
        self.install(Repr::BlobExtern(bytes), SubType::BinaryBlob);
    }

    /// Element count of a compact array payload. `None` for full arrays
    /// (their length lives in the container) and non-array nodes.
    pub fn compact_array_len(&self) -> Option<usize> {
        compact::compact_len(&self.repr)
    }
}
