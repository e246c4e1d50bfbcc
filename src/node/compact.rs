//! Compact array representations: the pointer-free inline forms and the
//! single-buffer pointer forms that avoid per-element node allocation.
//!
//! A setter picks the narrowest encoding that fits; anything larger (or any
//! operation needing per-element addressability) goes through the full
//! array container instead.

use std::borrow::Cow;

use super::{Repr, COMPACT_ARRAY_MAX_LEN, SHORT_PAYLOAD_LEN};

/// How buffer memory for a pointer-form compact array is sourced.
pub(crate) enum CompactSource<'a, T: 'static> {
    /// Copy the caller's slice into a node-owned buffer.
    Copied(&'a [T]),
    /// Borrow caller-owned memory; the node never frees it.
    External(&'static [T]),
    /// Take ownership of the caller's buffer.
    Owned(Vec<T>),
}

impl<T: Copy + 'static> CompactSource<'_, T> {
    pub fn len(&self) -> usize {
        match self {
            CompactSource::Copied(data) => data.len(),
            CompactSource::External(data) => data.len(),
            CompactSource::Owned(data) => data.len(),
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            CompactSource::Copied(data) => data,
            CompactSource::External(data) => data,
            CompactSource::Owned(data) => data,
        }
    }

    pub fn into_cow(self) -> Cow<'static, [T]> {
        match self {
            CompactSource::Copied(data) => Cow::Owned(data.to_vec()),
            CompactSource::External(data) => Cow::Borrowed(data),
            CompactSource::Owned(data) => Cow::Owned(data),
        }
    }
}

pub(crate) fn compact_len(repr: &Repr) -> Option<usize> {
    match repr {
        Repr::ArrayShortU8 { len, .. } | Repr::ArrayShortI16 { len, .. } => Some(*len as usize),
        Repr::ArrayF32(data) => Some(data.len()),
        Repr::ArrayF64(data) => Some(data.len()),
        Repr::ArrayI16(data) => Some(data.len()),
        Repr::ArrayI32(data) => Some(data.len()),
        _ => None,
    }
}

/// Narrowest encoding for a u8 array: inline only (there is no pointer form
/// for bytes). `None` means the value needs a full array.
pub(crate) fn choose_u8(source: CompactSource<'_, u8>) -> Option<Repr> {
    let data = source.as_slice();
    if data.len() > SHORT_PAYLOAD_LEN {
        return None;
    }
    let mut buf = [0u8; SHORT_PAYLOAD_LEN];
    buf[..data.len()].copy_from_slice(data);
    Some(Repr::ArrayShortU8 {
        buf,
        len: data.len() as u8,
    })
}

/// Narrowest encoding for an i16 array: inline up to 4 elements, pointer
/// form up to 31, otherwise `None`.
pub(crate) fn choose_i16(source: CompactSource<'_, i16>) -> Option<Repr> {
    let len = source.len();
    if len <= 4 {
        let mut buf = [0i16; 4];
        buf[..len].copy_from_slice(source.as_slice());
        Some(Repr::ArrayShortI16 {
            buf,
            len: len as u8,
        })
    } else if len <= COMPACT_ARRAY_MAX_LEN {
        Some(Repr::ArrayI16(source.into_cow()))
    } else {
        None
    }
}

pub(crate) fn choose_i32(source: CompactSource<'_, i32>) -> Option<Repr> {
    (source.len() <= COMPACT_ARRAY_MAX_LEN).then(|| Repr::ArrayI32(source.into_cow()))
}

pub(crate) fn choose_f32(source: CompactSource<'_, f32>) -> Option<Repr> {
    (source.len() <= COMPACT_ARRAY_MAX_LEN).then(|| Repr::ArrayF32(source.into_cow()))
}

pub(crate) fn choose_f64(source: CompactSource<'_, f64>) -> Option<Repr> {
    (source.len() <= COMPACT_ARRAY_MAX_LEN).then(|| Repr::ArrayF64(source.into_cow()))
}

/// Widening integer read from a compact representation. Returns the source
/// element count after copying `min(src, dest)` elements; `None` when the
/// representation has no integer view.
pub(crate) fn read_compact_i32(repr: &Repr, dest: &mut [i32]) -> Option<usize> {
    match repr {
        Repr::ArrayShortU8 { buf, len } => {
            let src = &buf[..*len as usize];
            for (d, s) in dest.iter_mut().zip(src) {
                *d = *s as i32;
            }
            Some(src.len())
        }
        Repr::ArrayShortI16 { buf, len } => {
            let src = &buf[..*len as usize];
            for (d, s) in dest.iter_mut().zip(src) {
                *d = *s as i32;
            }
            Some(src.len())
        }
        Repr::ArrayI16(data) => {
            for (d, s) in dest.iter_mut().zip(data.iter()) {
                *d = *s as i32;
            }
            Some(data.len())
        }
        Repr::ArrayI32(data) => {
            let count = dest.len().min(data.len());
            dest[..count].copy_from_slice(&data[..count]);
            Some(data.len())
        }
        _ => None,
    }
}

/// Widening float read from a compact representation.
pub(crate) fn read_compact_f32(repr: &Repr, dest: &mut [f32]) -> Option<usize> {
    match repr {
        Repr::ArrayF32(data) => {
            let count = dest.len().min(data.len());
            dest[..count].copy_from_slice(&data[..count]);
            Some(data.len())
        }
        Repr::ArrayF64(data) => {
            for (d, s) in dest.iter_mut().zip(data.iter()) {
                *d = *s as f32;
            }
            Some(data.len())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{choose_f32, choose_i16, choose_u8, CompactSource};
    use crate::node::Repr;

    #[rstest::rstest]
    fn test_u8_inline_or_bust() {
        let repr = choose_u8(CompactSource::Copied(&[1, 2, 3])).unwrap();
        assert!(matches!(repr, Repr::ArrayShortU8 { len: 3, .. }));
        assert!(choose_u8(CompactSource::Copied(&[0; 9])).is_none());
    }

    #[rstest::rstest]
    fn test_i16_tiers() {
        let short = choose_i16(CompactSource::Copied(&[1, 2, 3, 4])).unwrap();
        assert!(matches!(short, Repr::ArrayShortI16 { len: 4, .. }));

        let ptr = choose_i16(CompactSource::Copied(&[0; 5])).unwrap();
        assert!(matches!(ptr, Repr::ArrayI16(_)));

        assert!(choose_i16(CompactSource::Copied(&[0; 32])).is_none());
    }

    #[rstest::rstest]
    fn test_external_f32_borrows() {
        static DATA: [f32; 3] = [1.0, 2.0, 3.0];
        let repr = choose_f32(CompactSource::External(&DATA)).unwrap();
        match repr {
            Repr::ArrayF32(cow) => assert!(matches!(cow, std::borrow::Cow::Borrowed(_))),
            other => panic!("unexpected repr: {other:?}"),
        }
    }

    #[rstest::rstest]
    fn test_widening_reads() {
        let repr = choose_i16(CompactSource::Copied(&[1, -2, 3])).unwrap();
        let mut out = [0i32; 3];
        assert_eq!(super::read_compact_i32(&repr, &mut out), Some(3));
        assert_eq!(out, [1, -2, 3]);

        let repr = choose_f32(CompactSource::Copied(&[0.5, 1.5])).unwrap();
        let mut out = [0f32; 4];
        assert_eq!(super::read_compact_f32(&repr, &mut out), Some(2));
        assert_eq!(out, [0.5, 1.5, 0.0, 0.0]);
    }
}
