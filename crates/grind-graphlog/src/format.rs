//! On-disk constants of the graphlog format

/// File magic, first 8 bytes of every graphlog
pub const MAGIC: &[u8; 8] = b"GRINDLOG";

/// Number of update operations in the log (inserts + deletes)
pub const PROP_NUM_OPERATIONS: &str = "internal.edges.cardinality";
/// Number of edges in the final graph, after replaying the whole log
pub const PROP_NUM_EDGES_FINAL: &str = "internal.edges.final";
/// Number of vertices in the final graph
pub const PROP_NUM_VERTICES_FINAL: &str = "internal.vertices.final.cardinality";
/// Number of artificial vertices to remove once the replay is done
pub const PROP_NUM_VERTICES_TEMPORARY: &str = "internal.vertices.temporary.cardinality";
/// Producer-chosen batch length for the EDGES section, in words (3 per edge)
pub const PROP_BLOCK_SIZE: &str = "internal.edges.block_size";

/// Sections a graphlog can carry. Tags are 4 raw bytes on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// Batches of edge operations, three parallel arrays per batch
    Edges,
    /// Flat list of the artificial vertex ids
    VtxTemp,
}

impl Section {
    pub fn tag(self) -> [u8; 4] {
        match self {
            Section::Edges => *b"EDGS",
            Section::VtxTemp => *b"VTMP",
        }
    }

    /// Property key holding the byte offset of this section's header
    pub fn marker_property(self) -> &'static str {
        match self {
            Section::Edges => "internal.section.edges",
            Section::VtxTemp => "internal.section.vtx_temp",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Section::Edges => write!(f, "EDGES"),
            Section::VtxTemp => write!(f, "VTX_TEMP"),
        }
    }
}
