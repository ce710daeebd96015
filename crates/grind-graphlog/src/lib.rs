//! Graphlog - the binary update-stream format consumed by the driver
//!
//! A graphlog records an ordered stream of edge insertions and deletions
//! together with a textual property dictionary. The file is produced ahead
//! of time by a generator; this crate only reads it, streaming batches into
//! caller-provided buffers so the log is never held in memory as a whole.
//!
//! Layout (little-endian):
//!
//! ```text
//! magic       8 bytes  "GRINDLOG"
//! properties  ASCII key=value lines, terminated by a NUL byte
//! sections    repeated: 4-byte tag, u64 payload length, payload
//! ```
//!
//! The byte offset of each section is itself recorded in the property
//! dictionary, so a reader seeks straight to the section it needs.

pub mod format;
pub mod reader;

pub use format::Section;
pub use reader::{
    parse_properties, parse_properties_from, property_u64, set_marker, EdgeBatch, EdgeLoader,
    Properties, VertexLoader,
};
