//! Streaming graphlog reader
//!
//! The reader owns no heap-resident copy of the log: `EdgeLoader` and
//! `VertexLoader` fill caller-provided buffers block by block and report
//! EOF of their section by returning 0. A malformed header or a truncated
//! record is a `BadLog`; there is no partial-batch recovery.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use grind_core::types::WeightedEdge;
use grind_core::{GrindError, GrindResult};

use crate::format::{Section, MAGIC};

/// The property dictionary at the head of a graphlog
pub type Properties = HashMap<String, String>;

/// Parse the property dictionary of the graphlog at `path`
pub fn parse_properties(path: &Path) -> GrindResult<Properties> {
    let mut reader = BufReader::new(File::open(path)?);
    parse_properties_from(&mut reader)
}

/// Parse the property dictionary from an already-open stream.
///
/// Leaves the stream positioned on the first byte after the dictionary.
pub fn parse_properties_from<R: BufRead>(reader: &mut R) -> GrindResult<Properties> {
    let mut magic = [0u8; 8];
    read_exact_or_bad_log(reader, &mut magic, "file magic")?;
    if &magic != MAGIC {
        return Err(GrindError::bad_log("not a graphlog: bad magic"));
    }

    let mut raw = Vec::new();
    reader.read_until(0, &mut raw)?;
    if raw.pop() != Some(0) {
        return Err(GrindError::bad_log("unterminated property dictionary"));
    }
    let text = std::str::from_utf8(&raw)
        .map_err(|_| GrindError::bad_log("property dictionary is not valid UTF-8"))?;

    let mut properties = Properties::default();
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| GrindError::bad_log(format!("malformed property line: {line:?}")))?;
        properties.insert(key.to_string(), value.to_string());
    }
    Ok(properties)
}

/// Fetch a numeric property, `BadLog` if missing or unparsable
pub fn property_u64(properties: &Properties, key: &str) -> GrindResult<u64> {
    properties
        .get(key)
        .ok_or_else(|| GrindError::bad_log(format!("missing property {key}")))?
        .parse()
        .map_err(|_| GrindError::bad_log(format!("property {key} is not an integer")))
}

/// Seek to the start of `section` and validate its header.
///
/// Returns the section payload length in bytes.
pub fn set_marker<R: Read + Seek>(
    properties: &Properties,
    reader: &mut R,
    section: Section,
) -> GrindResult<u64> {
    let offset = property_u64(properties, section.marker_property())?;
    reader.seek(SeekFrom::Start(offset))?;

    let mut tag = [0u8; 4];
    read_exact_or_bad_log(reader, &mut tag, "section tag")?;
    if tag != section.tag() {
        return Err(GrindError::bad_log(format!(
            "expected {section} section at offset {offset}"
        )));
    }
    let length = read_u64(reader, "section length")?;
    tracing::debug!(%section, offset, length, "section located");
    Ok(length)
}

/// A batch of edge operations as three parallel arrays
#[derive(Debug, Clone, Default)]
pub struct EdgeBatch {
    sources: Vec<u64>,
    destinations: Vec<u64>,
    weights: Vec<f64>,
}

impl EdgeBatch {
    pub fn with_capacity(num_edges: usize) -> Self {
        Self {
            sources: Vec::with_capacity(num_edges),
            destinations: Vec::with_capacity(num_edges),
            weights: Vec::with_capacity(num_edges),
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn clear(&mut self) {
        self.sources.clear();
        self.destinations.clear();
        self.weights.clear();
    }

    pub fn push(&mut self, edge: WeightedEdge) {
        self.sources.push(edge.source);
        self.destinations.push(edge.destination);
        self.weights.push(edge.weight);
    }

    pub fn get(&self, index: usize) -> WeightedEdge {
        WeightedEdge::new(
            self.sources[index],
            self.destinations[index],
            self.weights[index],
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = WeightedEdge> + '_ {
        (0..self.len()).map(|i| self.get(i))
    }
}

/// Streams the EDGES section block by block
pub struct EdgeLoader<R> {
    reader: R,
    remaining: u64,
    scratch: Vec<u8>,
}

impl<R: Read> EdgeLoader<R> {
    /// `section_length` is the payload length returned by [`set_marker`]
    pub fn new(reader: R, section_length: u64) -> Self {
        Self {
            reader,
            remaining: section_length,
            scratch: Vec::new(),
        }
    }

    /// Fill `batch` with the next block of at most `capacity` edges.
    ///
    /// Returns the number of edges loaded, 0 once the section is exhausted.
    pub fn load(&mut self, batch: &mut EdgeBatch, capacity: usize) -> GrindResult<usize> {
        batch.clear();
        if self.remaining == 0 {
            return Ok(0);
        }
        if self.remaining < 8 {
            return Err(GrindError::bad_log("truncated edge block header"));
        }

        let num_edges = read_u64(&mut self.reader, "edge block length")? as usize;
        if num_edges == 0 || num_edges > capacity {
            return Err(GrindError::bad_log(format!(
                "edge block of {num_edges} edges does not fit buffer capacity {capacity}"
            )));
        }
        let payload = num_edges as u64 * 3 * 8;
        if self.remaining - 8 < payload {
            return Err(GrindError::bad_log("truncated edge block"));
        }

        self.read_words(num_edges, |word, batch| batch.sources.push(word), batch)?;
        self.read_words(num_edges, |word, batch| batch.destinations.push(word), batch)?;
        self.read_words(
            num_edges,
            |word, batch| batch.weights.push(f64::from_bits(word)),
            batch,
        )?;

        self.remaining -= 8 + payload;
        Ok(num_edges)
    }

    fn read_words(
        &mut self,
        count: usize,
        mut push: impl FnMut(u64, &mut EdgeBatch),
        batch: &mut EdgeBatch,
    ) -> GrindResult<()> {
        self.scratch.resize(count * 8, 0);
        read_exact_or_bad_log(&mut self.reader, &mut self.scratch, "edge block payload")?;
        for chunk in self.scratch.chunks_exact(8) {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            push(u64::from_le_bytes(word), batch);
        }
        Ok(())
    }
}

/// Streams the VTX_TEMP section
pub struct VertexLoader<R> {
    reader: R,
    remaining: u64,
    scratch: Vec<u8>,
}

impl<R: Read> VertexLoader<R> {
    /// `section_length` is the payload length returned by [`set_marker`]
    pub fn new(reader: R, section_length: u64) -> Self {
        Self {
            reader,
            remaining: section_length,
            scratch: Vec::new(),
        }
    }

    /// Fill `out` with at most `capacity` vertex ids; 0 once exhausted.
    pub fn load(&mut self, out: &mut Vec<u64>, capacity: usize) -> GrindResult<usize> {
        out.clear();
        if self.remaining == 0 {
            return Ok(0);
        }
        if self.remaining % 8 != 0 {
            return Err(GrindError::bad_log("truncated vertex record"));
        }

        let count = capacity.min((self.remaining / 8) as usize);
        self.scratch.resize(count * 8, 0);
        read_exact_or_bad_log(&mut self.reader, &mut self.scratch, "vertex ids")?;
        for chunk in self.scratch.chunks_exact(8) {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            out.push(u64::from_le_bytes(word));
        }
        self.remaining -= count as u64 * 8;
        Ok(count)
    }
}

fn read_u64<R: Read>(reader: &mut R, what: &str) -> GrindResult<u64> {
    let mut buf = [0u8; 8];
    read_exact_or_bad_log(reader, &mut buf, what)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_exact_or_bad_log<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> GrindResult<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => {
            GrindError::bad_log(format!("unexpected end of file reading {what}"))
        }
        _ => GrindError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{self, MAGIC};
    use std::io::Cursor;

    /// Hand-rolled writer so the reader is tested against raw bytes.
    fn write_log(edges: &[(u64, u64, f64)], vertices: &[u64], block: usize) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);

        let mut body = Vec::new();
        let edges_offset_placeholder;
        {
            // EDGES section
            edges_offset_placeholder = body.len();
            body.extend_from_slice(&Section::Edges.tag());
            let mut payload = Vec::new();
            for chunk in edges.chunks(block) {
                payload.extend_from_slice(&(chunk.len() as u64).to_le_bytes());
                for (s, _, _) in chunk {
                    payload.extend_from_slice(&s.to_le_bytes());
                }
                for (_, d, _) in chunk {
                    payload.extend_from_slice(&d.to_le_bytes());
                }
                for (_, _, w) in chunk {
                    payload.extend_from_slice(&w.to_le_bytes());
                }
            }
            body.extend_from_slice(&(payload.len() as u64).to_le_bytes());
            body.extend_from_slice(&payload);
        }
        let vtx_offset_placeholder = body.len();
        {
            // VTX_TEMP section
            body.extend_from_slice(&Section::VtxTemp.tag());
            body.extend_from_slice(&(vertices.len() as u64 * 8).to_le_bytes());
            for v in vertices {
                body.extend_from_slice(&v.to_le_bytes());
            }
        }

        let mut props = String::new();
        props.push_str(&format!("{}={}\n", format::PROP_NUM_OPERATIONS, edges.len()));
        props.push_str(&format!("{}={}\n", format::PROP_BLOCK_SIZE, block * 3));
        // Offsets are written with fixed 10-digit padding so the header
        // length is known before the offsets are.
        let marker_len =
            |s: Section| format!("{}={:010}\n", s.marker_property(), 0).len();
        let header_len = MAGIC.len()
            + props.len()
            + marker_len(Section::Edges)
            + marker_len(Section::VtxTemp)
            + 1;
        props.push_str(&format!(
            "{}={:010}\n",
            Section::Edges.marker_property(),
            header_len + edges_offset_placeholder
        ));
        props.push_str(&format!(
            "{}={:010}\n",
            Section::VtxTemp.marker_property(),
            header_len + vtx_offset_placeholder
        ));

        out.extend_from_slice(props.as_bytes());
        out.push(0);
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn parses_properties_and_streams_edges() {
        let edges = [(1u64, 2u64, 1.0f64), (3, 4, 2.0), (2, 1, -1.0)];
        let bytes = write_log(&edges, &[9, 10], 2);

        let mut cursor = Cursor::new(&bytes);
        let mut buffered = BufReader::new(&mut cursor);
        let props = parse_properties_from(&mut buffered).unwrap();
        assert_eq!(property_u64(&props, format::PROP_NUM_OPERATIONS).unwrap(), 3);

        let mut cursor = Cursor::new(&bytes);
        let length = set_marker(&props, &mut cursor, Section::Edges).unwrap();
        let mut loader = EdgeLoader::new(cursor, length);
        let mut batch = EdgeBatch::with_capacity(2);

        assert_eq!(loader.load(&mut batch, 2).unwrap(), 2);
        assert_eq!(batch.get(0).source, 1);
        assert_eq!(batch.get(1).weight, 2.0);
        assert_eq!(loader.load(&mut batch, 2).unwrap(), 1);
        assert_eq!(batch.get(0).weight, -1.0);
        assert!(!batch.get(0).is_insertion());
        assert_eq!(loader.load(&mut batch, 2).unwrap(), 0);
    }

    #[test]
    fn streams_temporary_vertices() {
        let bytes = write_log(&[(1, 2, 1.0)], &[7, 8, 9], 4);
        let props = parse_properties_from(&mut BufReader::new(Cursor::new(&bytes))).unwrap();

        let mut cursor = Cursor::new(&bytes);
        let length = set_marker(&props, &mut cursor, Section::VtxTemp).unwrap();
        let mut loader = VertexLoader::new(cursor, length);

        let mut out = Vec::new();
        assert_eq!(loader.load(&mut out, 2).unwrap(), 2);
        assert_eq!(out, vec![7, 8]);
        assert_eq!(loader.load(&mut out, 2).unwrap(), 1);
        assert_eq!(out, vec![9]);
        assert_eq!(loader.load(&mut out, 2).unwrap(), 0);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = write_log(&[(1, 2, 1.0)], &[], 4);
        bytes[0] = b'X';
        let err = parse_properties_from(&mut BufReader::new(Cursor::new(&bytes))).unwrap_err();
        assert!(matches!(err, GrindError::BadLog { .. }));
    }

    #[test]
    fn truncated_block_is_bad_log() {
        let bytes = write_log(&[(1, 2, 1.0), (3, 4, 2.0)], &[], 4);
        let truncated = &bytes[..bytes.len() - 40];

        let props = parse_properties_from(&mut BufReader::new(Cursor::new(truncated))).unwrap();
        let mut cursor = Cursor::new(truncated);
        // Section length still claims the full payload; the read must fail.
        let length = set_marker(&props, &mut cursor, Section::Edges).unwrap();
        let mut loader = EdgeLoader::new(cursor, length);
        let mut batch = EdgeBatch::with_capacity(4);
        let err = loader.load(&mut batch, 4).unwrap_err();
        assert!(matches!(err, GrindError::BadLog { .. }));
    }

    #[test]
    fn wrong_section_tag_is_bad_log() {
        let bytes = write_log(&[(1, 2, 1.0)], &[], 4);
        let mut props = parse_properties_from(&mut BufReader::new(Cursor::new(&bytes))).unwrap();
        // Point the EDGES marker at the VTX_TEMP section.
        let vtx_offset = props
            .get(Section::VtxTemp.marker_property())
            .unwrap()
            .clone();
        props.insert(Section::Edges.marker_property().to_string(), vtx_offset);

        let mut cursor = Cursor::new(&bytes);
        let err = set_marker(&props, &mut cursor, Section::Edges).unwrap_err();
        assert!(matches!(err, GrindError::BadLog { .. }));
    }
}
