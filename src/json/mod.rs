//! JSON bridge: trees serialize through [`serde`] and rebuild from
//! [`serde_json::Value`].
//!
//! The mapping is lossy by nature: subtypes, flags, metadata, and compact
//! encodings have no JSON spelling. Scalars, strings, arrays, and tables
//! round-trip; binary blobs flatten to arrays of byte values.

use serde::ser::{Error as _, Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::node::{NodeHandle, Repr, ValueRef, MAX_TREE_DEPTH};
use crate::Context;

impl Serialize for ValueRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.depth() > MAX_TREE_DEPTH {
            return Err(S::Error::custom("value nesting too deep to serialize"));
        }
        let context = self.context();
        let Some(node) = context.try_node(self.handle()) else {
            return serializer.serialize_unit();
        };

        match &node.repr {
            Repr::Null => serializer.serialize_unit(),
            Repr::Bool(v) => serializer.serialize_bool(*v),
            Repr::Int(v) => serializer.serialize_i64(*v),
            Repr::UInt(v) => serializer.serialize_u64(*v),
            Repr::Double(v) => serializer.serialize_f64(*v),
            Repr::StringShort(_) | Repr::StringHeap(_) | Repr::StringExtern(_) => {
                serializer.serialize_str(node.get_string_or(""))
            }
            Repr::BlobOwned(_) | Repr::BlobExtern(_) => {
                let bytes = node.get_blob().unwrap_or(&[]);
                let mut seq = serializer.serialize_seq(Some(bytes.len()))?;
                for byte in bytes {
                    seq.serialize_element(byte)?;
                }
                seq.end()
            }
            Repr::ArrayShortU8 { buf, len } => {
                serialize_numbers(serializer, &buf[..*len as usize])
            }
            Repr::ArrayShortI16 { buf, len } => {
                serialize_numbers(serializer, &buf[..*len as usize])
            }
            Repr::ArrayI16(data) => serialize_numbers(serializer, data.as_ref()),
            Repr::ArrayI32(data) => serialize_numbers(serializer, data.as_ref()),
            Repr::ArrayF32(data) => serialize_numbers(serializer, data.as_ref()),
            Repr::ArrayF64(data) => serialize_numbers(serializer, data.as_ref()),
            Repr::ArrayFull(array) => {
                let elements = context.arrays.get(*array).map_or(&[][..], |c| c.handles());
                let mut seq = serializer.serialize_seq(Some(elements.len()))?;
                for &element in elements {
                    seq.serialize_element(&self.descend(element))?;
                }
                seq.end()
            }
            Repr::Table(table) => {
                let Some(container) = context.tables.get(*table) else {
                    return serializer.serialize_map(Some(0))?.end();
                };
                let mut map = serializer.serialize_map(Some(container.len()))?;
                for index in 0..container.len() {
                    let name = container.member_name(index).unwrap_or("");
                    if let Some(member) = container.member(index) {
                        map.serialize_entry(name, &self.descend(member))?;
                    }
                }
                map.end()
            }
        }
    }
}

fn serialize_numbers<S: Serializer, T: Serialize>(
    serializer: S,
    values: &[T],
) -> std::result::Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(values.len()))?;
    for value in values {
        seq.serialize_element(value)?;
    }
    seq.end()
}

impl Context {
    pub fn to_json(&self, handle: NodeHandle) -> Result<Value> {
        Ok(serde_json::to_value(self.value(handle))?)
    }

    pub fn to_json_string(&self, handle: NodeHandle) -> Result<String> {
        Ok(serde_json::to_string(&self.value(handle))?)
    }

    pub fn to_json_string_pretty(&self, handle: NodeHandle) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.value(handle))?)
    }

    /// Rebuilds the node from a JSON value: objects become tables (member
    /// order preserved), arrays become full arrays, scalars map directly.
    pub fn from_json(&mut self, handle: NodeHandle, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.set_to_null(handle),
            Value::Bool(v) => {
                self.set_to_null(handle);
                self.node_mut(handle).set_bool(*v);
            }
            Value::Number(number) => {
                self.set_to_null(handle);
                if let Some(v) = number.as_i64() {
                    self.node_mut(handle).set_i64(v);
                } else if let Some(v) = number.as_u64() {
                    self.node_mut(handle).set_u64(v);
                } else if let Some(v) = number.as_f64() {
                    self.node_mut(handle).set_f64(v);
                } else {
                    return Err(Error::UnsupportedJson(number.to_string()));
                }
            }
            Value::String(text) => {
                self.set_to_null(handle);
                self.node_mut(handle).set_string(text);
            }
            Value::Array(values) => {
                if !self.import_numeric_array(handle, values) {
                    self.set_to_empty_array(handle);
                    for item in values {
                        let element = self.array_append(handle);
                        self.from_json(element, item)?;
                    }
                }
            }
            Value::Object(members) => {
                self.set_to_empty_table(handle);
                for (name, item) in members {
                    let (member, _) = self.find_or_create_member(handle, name);
                    self.from_json(member, item)?;
                }
            }
        }
        Ok(())
    }

    pub fn from_json_str(&mut self, handle: NodeHandle, text: &str) -> Result<()> {
        let value: Value = serde_json::from_str(text)?;
        self.from_json(handle, &value)
    }

    /// Small uniform numeric arrays import straight into a compact
    /// representation; everything else takes the full per-element path.
    /// Numbers above `i64::MAX` are excluded so they keep their `u64`
    /// scalar nodes.
    fn import_numeric_array(&mut self, handle: NodeHandle, values: &[Value]) -> bool {
        if values.is_empty()
            || values.len() > crate::node::COMPACT_ARRAY_MAX_LEN
            || !values.iter().all(|v| v.as_i64().is_some() || v.is_f64())
        {
            return false;
        }

        let all_i32 = values
            .iter()
            .all(|v| v.as_i64().is_some_and(|n| i32::try_from(n).is_ok()));
        if all_i32 {
            let data: Vec<i32> = values
                .iter()
                .map(|v| v.as_i64().unwrap_or(0) as i32)
                .collect();
            self.set_array_i32(handle, &data);
        } else {
            let data: Vec<f64> = values.iter().map(|v| v.as_f64().unwrap_or(0.0)).collect();
            self.set_array_f64(handle, &data);
        }
        true
    }
}
