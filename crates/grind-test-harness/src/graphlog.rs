//! Graphlog writer for fixtures
//!
//! The production graphlogs come from an external generator; tests build
//! small ones here. The builder replays its own operation list to derive
//! the final-count properties, so a correct driver always reports a match.

use std::fs;
use std::path::Path;

use grind_core::{GrindResult, WeightedEdge};
use grind_graphlog::format::{self, Section};
use rustc_hash::FxHashSet;

pub struct GraphlogBuilder {
    operations: Vec<WeightedEdge>,
    temporary_vertices: Vec<u64>,
    edges_per_block: usize,
}

impl Default for GraphlogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphlogBuilder {
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
            temporary_vertices: Vec::new(),
            edges_per_block: 64,
        }
    }

    /// Edges per EDGES block; the declared block size is three times this
    pub fn with_edges_per_block(mut self, edges: usize) -> Self {
        self.edges_per_block = edges.max(1);
        self
    }

    pub fn insert(mut self, source: u64, destination: u64, weight: f64) -> Self {
        self.operations
            .push(WeightedEdge::new(source, destination, weight));
        self
    }

    pub fn delete(mut self, source: u64, destination: u64) -> Self {
        self.operations
            .push(WeightedEdge::new(source, destination, -1.0));
        self
    }

    pub fn operations(mut self, operations: impl IntoIterator<Item = WeightedEdge>) -> Self {
        self.operations.extend(operations);
        self
    }

    pub fn temporary_vertices(mut self, vertices: impl IntoIterator<Item = u64>) -> Self {
        self.temporary_vertices.extend(vertices);
        self
    }

    pub fn num_operations(&self) -> usize {
        self.operations.len()
    }

    /// Replay the operation list to the final counts the log will declare:
    /// vertices are every insertion endpoint, minus the temporary ones;
    /// edges are whatever survives the stream, minus those incident to a
    /// temporary vertex.
    pub fn final_counts(&self) -> (u64, u64) {
        let mut vertices = FxHashSet::default();
        let mut edges = FxHashSet::default();
        let pair = |a: u64, b: u64| (a.min(b), a.max(b));
        for operation in &self.operations {
            if operation.is_insertion() {
                vertices.insert(operation.source);
                vertices.insert(operation.destination);
                edges.insert(pair(operation.source, operation.destination));
            } else {
                edges.remove(&pair(operation.source, operation.destination));
            }
        }
        for vertex in &self.temporary_vertices {
            vertices.remove(vertex);
            edges.retain(|&(a, b)| a != *vertex && b != *vertex);
        }
        (vertices.len() as u64, edges.len() as u64)
    }

    pub fn write_to(&self, path: &Path) -> GrindResult<()> {
        let (final_vertices, final_edges) = self.final_counts();

        let mut edges_payload = Vec::new();
        for chunk in self.operations.chunks(self.edges_per_block) {
            edges_payload.extend_from_slice(&(chunk.len() as u64).to_le_bytes());
            for operation in chunk {
                edges_payload.extend_from_slice(&operation.source.to_le_bytes());
            }
            for operation in chunk {
                edges_payload.extend_from_slice(&operation.destination.to_le_bytes());
            }
            for operation in chunk {
                edges_payload.extend_from_slice(&operation.weight.to_le_bytes());
            }
        }
        let mut vtx_payload = Vec::new();
        for vertex in &self.temporary_vertices {
            vtx_payload.extend_from_slice(&vertex.to_le_bytes());
        }

        // Section header: 4-byte tag + u64 length.
        let edges_section_offset = 0;
        let vtx_section_offset = 12 + edges_payload.len();

        let mut properties = String::new();
        let mut put = |key: &str, value: u64| {
            properties.push_str(&format!("{key}={value}\n"));
        };
        put(format::PROP_NUM_OPERATIONS, self.operations.len() as u64);
        put(format::PROP_NUM_EDGES_FINAL, final_edges);
        put(format::PROP_NUM_VERTICES_FINAL, final_vertices);
        put(
            format::PROP_NUM_VERTICES_TEMPORARY,
            self.temporary_vertices.len() as u64,
        );
        put(format::PROP_BLOCK_SIZE, self.edges_per_block as u64 * 3);

        // Marker offsets use fixed 10-digit padding so the header length is
        // known before the offsets are.
        let marker_len = |section: Section| {
            format!("{}={:010}\n", section.marker_property(), 0).len()
        };
        let header_len = format::MAGIC.len()
            + properties.len()
            + marker_len(Section::Edges)
            + marker_len(Section::VtxTemp)
            + 1;
        properties.push_str(&format!(
            "{}={:010}\n",
            Section::Edges.marker_property(),
            header_len + edges_section_offset
        ));
        properties.push_str(&format!(
            "{}={:010}\n",
            Section::VtxTemp.marker_property(),
            header_len + vtx_section_offset
        ));

        let mut bytes = Vec::new();
        bytes.extend_from_slice(format::MAGIC);
        bytes.extend_from_slice(properties.as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(&Section::Edges.tag());
        bytes.extend_from_slice(&(edges_payload.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&edges_payload);
        bytes.extend_from_slice(&Section::VtxTemp.tag());
        bytes.extend_from_slice(&(vtx_payload.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&vtx_payload);

        fs::write(path, bytes)?;
        Ok(())
    }
}
