//! An in-memory document model for dynamically-typed, self-describing
//! values: scalars, strings, binary blobs, arrays, and name-keyed tables,
//! allocated out of slab clusters owned by a [`Context`].
//!
//! The model separates a value's logical type ([`Kind`]) from its physical
//! encoding: small strings live inline, small numeric arrays live in compact
//! typed buffers, and only values that need per-element addressability pay
//! for per-element nodes. Encoding changes are invisible through the typed
//! getter/setter surface.
//!
//! ```
//! use kv3::Context;
//!
//! let mut ctx = Context::new();
//! let root = ctx.root();
//! let (name, _) = ctx.find_or_create_member(root, "name");
//! ctx.node_mut(name).set_string("widget");
//! let (size, _) = ctx.find_or_create_member(root, "size");
//! ctx.set_array_i32(size, &[10, 20]);
//!
//! assert_eq!(ctx.node(name).get_string(), Some("widget"));
//! assert_eq!(ctx.array_len(size), 2);
//! ```

pub mod binary;
pub mod cluster;
mod container;
mod context;
mod error;
pub mod json;
mod metadata;
mod node;
pub mod types;
mod utils;

pub use binary::{from_binary, to_binary};
pub use cluster::CLUSTER_CAPACITY;
pub use context::{Context, ContextOptions};
pub use error::{Error, Result};
pub use metadata::{Metadata, METADATA_MULTILINE_STRING, METADATA_SINGLE_QUOTED_STRING};
pub use node::{Node, NodeHandle, ValueRef, COMPACT_ARRAY_MAX_LEN, SHORT_PAYLOAD_LEN};
pub use types::geom::{Color32, Matrix3x4, QAngle, Quaternion, Vec2, Vec3, Vec4};
pub use types::{Kind, SubType};
