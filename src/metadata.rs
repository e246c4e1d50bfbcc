use std::collections::BTreeMap;

use smol_str::SmolStr;

/// The string was written across multiple lines in the source text.
pub const METADATA_MULTILINE_STRING: u32 = 1 << 0;
/// The string was single-quoted in the source text.
pub const METADATA_SINGLE_QUOTED_STRING: u32 = 1 << 1;

/// Side-channel record kept per node when metadata is enabled on a context.
///
/// Editors and tooling use this to preserve source position and comments
/// across a load/save cycle. The records live in a parallel slab next to the
/// node cluster and are never allocated for contexts that leave metadata
/// disabled, so the common case pays one null pointer per cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub line: u32,
    pub column: u32,
    pub flags: u32,
    pub name: Option<SmolStr>,
    /// Comment text keyed by the line it was attached to.
    pub comments: BTreeMap<u32, String>,
}

impl Metadata {
    pub fn clear(&mut self) {
        self.line = 0;
        self.column = 0;
        self.flags = 0;
        self.name = None;
        self.comments.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.line == 0
            && self.column == 0
            && self.flags == 0
            && self.name.is_none()
            && self.comments.is_empty()
    }
}
