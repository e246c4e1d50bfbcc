//! Lossy single-line projection of a value, mirroring what a debugger or log
//! line wants: scalars print their value, short numeric arrays print their
//! elements, and anything structured prints a summary placeholder.

use std::fmt;

use crate::context::Context;
use crate::node::{NodeHandle, Repr};
use crate::types::{Kind, SubType};

/// A borrowed view of one node inside its context, mainly useful for its
/// [`Display`](fmt::Display) impl. Container payloads need the context to
/// resolve element handles, so a bare [`Node`](crate::Node) cannot print
/// itself.
#[derive(Clone, Copy)]
pub struct ValueRef<'a> {
    context: &'a Context,
    handle: NodeHandle,
    depth: usize,
}

impl<'a> ValueRef<'a> {
    pub fn new(context: &'a Context, handle: NodeHandle) -> Self {
        Self {
            context,
            handle,
            depth: 0,
        }
    }

    pub fn handle(&self) -> NodeHandle {
        self.handle
    }

    pub(crate) fn context(&self) -> &'a Context {
        self.context
    }

    /// View of a child node, one nesting level down.
    pub(crate) fn descend(&self, handle: NodeHandle) -> ValueRef<'a> {
        ValueRef {
            context: self.context,
            handle,
            depth: self.depth + 1,
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }
}

impl Context {
    /// A printable view of one node.
    pub fn value(&self, handle: NodeHandle) -> ValueRef<'_> {
        ValueRef::new(self, handle)
    }

    /// One-line diagnostic rendering of a node.
    pub fn value_to_string(&self, handle: NodeHandle) -> String {
        self.value(handle).to_string()
    }
}

/// Element counts up to this print inline; larger arrays summarize.
const PRINT_ELEMENTS_MAX: usize = 4;

fn fmt_f64(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    let mut buffer = ryu::Buffer::new();
    f.write_str(buffer.format(value))
}

fn fmt_separated<T: Copy>(
    f: &mut fmt::Formatter<'_>,
    values: &[T],
    mut one: impl FnMut(&mut fmt::Formatter<'_>, T) -> fmt::Result,
) -> fmt::Result {
    for (i, &value) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        one(f, value)?;
    }
    Ok(())
}

fn fmt_int(f: &mut fmt::Formatter<'_>, value: i64) -> fmt::Result {
    let mut buffer = itoa::Buffer::new();
    f.write_str(buffer.format(value))
}

impl fmt::Display for ValueRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(node) = self.context.try_node(self.handle) else {
            return Ok(());
        };

        match &node.repr {
            Repr::Null => Ok(()),
            Repr::Bool(v) => f.write_str(if *v { "true" } else { "false" }),
            Repr::Int(v) => fmt_int(f, *v),
            Repr::UInt(v) => {
                if node.subtype() == SubType::Pointer {
                    f.write_str("<pointer>")
                } else {
                    let mut buffer = itoa::Buffer::new();
                    f.write_str(buffer.format(*v))
                }
            }
            Repr::Double(v) => fmt_f64(f, *v),
            Repr::StringShort(_) | Repr::StringHeap(_) | Repr::StringExtern(_) => {
                f.write_str(node.get_string_or(""))
            }
            Repr::BlobOwned(_) | Repr::BlobExtern(_) => {
                write!(f, "<binary blob: {} bytes>", node.blob_size())
            }
            Repr::ArrayShortU8 { buf, len } if (*len as usize) <= PRINT_ELEMENTS_MAX => {
                fmt_separated(f, &buf[..*len as usize], |f, v| fmt_int(f, v as i64))
            }
            Repr::ArrayShortI16 { buf, len } if (*len as usize) <= PRINT_ELEMENTS_MAX => {
                fmt_separated(f, &buf[..*len as usize], |f, v| fmt_int(f, v as i64))
            }
            Repr::ArrayI16(data) if data.len() <= PRINT_ELEMENTS_MAX => {
                fmt_separated(f, data.as_ref(), |f, v| fmt_int(f, v as i64))
            }
            Repr::ArrayI32(data) if data.len() <= PRINT_ELEMENTS_MAX => {
                fmt_separated(f, data.as_ref(), |f, v| fmt_int(f, v as i64))
            }
            Repr::ArrayF32(data) if data.len() <= PRINT_ELEMENTS_MAX => {
                fmt_separated(f, data.as_ref(), |f, v| fmt_f64(f, v as f64))
            }
            Repr::ArrayF64(data) if data.len() <= PRINT_ELEMENTS_MAX => {
                fmt_separated(f, data.as_ref(), fmt_f64)
            }
            Repr::ArrayFull(array) => {
                let elements = self
                    .context
                    .arrays
                    .get(*array)
                    .map(|container| container.handles())
                    .unwrap_or(&[]);
                let printable = elements.len() <= PRINT_ELEMENTS_MAX
                    && elements.iter().all(|&element| {
                        matches!(
                            self.context.try_node(element).map(|n| n.kind()),
                            Some(Kind::Bool | Kind::Int | Kind::UInt | Kind::Double)
                        )
                    });
                if printable {
                    for (i, &element) in elements.iter().enumerate() {
                        if i > 0 {
                            f.write_str(" ")?;
                        }
                        write!(f, "{}", ValueRef::new(self.context, element))?;
                    }
                    Ok(())
                } else {
                    write!(f, "<array: {} elements>", elements.len())
                }
            }
            Repr::Table(table) => {
                let count = self.context.tables.get(*table).map_or(0, |t| t.len());
                write!(f, "<table: {count} members>")
            }
            compact => write!(
                f,
                "<array: {} elements>",
                super::compact::compact_len(compact).unwrap_or(0)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Context;

    #[rstest::rstest]
    fn test_scalars_print_their_value() {
        let mut ctx = Context::new();
        let root = ctx.root();

        assert_eq!(ctx.value(root).to_string(), "");

        ctx.node_mut(root).set_bool(true);
        assert_eq!(ctx.value(root).to_string(), "true");

        ctx.node_mut(root).set_i32(-42);
        assert_eq!(ctx.value(root).to_string(), "-42");

        ctx.node_mut(root).set_f64(1.5);
        assert_eq!(ctx.value(root).to_string(), "1.5");

        ctx.node_mut(root).set_string("hello there");
        assert_eq!(ctx.value(root).to_string(), "hello there");
    }

    #[rstest::rstest]
    fn test_small_arrays_print_elements_larger_summarize() {
        let mut ctx = Context::new();
        let root = ctx.root();

        ctx.set_array_i32(root, &[1, 2, 3]);
        assert_eq!(ctx.value(root).to_string(), "1 2 3");

        ctx.set_array_i32(root, &[0; 9]);
        assert_eq!(ctx.value(root).to_string(), "<array: 9 elements>");
    }

    #[rstest::rstest]
    fn test_structured_values_summarize() {
        let mut ctx = Context::new();
        let root = ctx.root();

        ctx.find_or_create_member(root, "a");
        ctx.find_or_create_member(root, "b");
        assert_eq!(ctx.value(root).to_string(), "<table: 2 members>");

        ctx.node_mut(root).set_blob(&[1, 2, 3, 4, 5]);
        assert_eq!(ctx.value(root).to_string(), "<binary blob: 5 bytes>");

        ctx.node_mut(root).set_pointer(0xffff);
        assert_eq!(ctx.value(root).to_string(), "<pointer>");
    }
}
