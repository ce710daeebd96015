//! Request/response codec
//!
//! Every message is a frame: `u32` total length (including the length
//! field itself), `u32` type tag, then the payload. Integers and booleans
//! travel as little-endian `u64` (booleans as 0/1), doubles as IEEE 754
//! `f64`, strings as a `u64` length followed by the raw bytes. Optional
//! output paths are encoded as empty strings.
//!
//! Responses start with a status tag (`OK`, `NOT_SUPPORTED`, `ERROR`); the
//! payload shape of an `OK` depends on the request it answers, so decoding
//! takes the expected [`PayloadKind`].

use grind_core::{GrindError, GrindResult};

/// Upper bound on any frame, requests and responses alike
pub const MAX_MESSAGE_SIZE: usize = 1 << 20;

const TAG_TERMINATE_WORKER: u32 = 0;
const TAG_TERMINATE_SERVER: u32 = 1;
const TAG_TERMINATE_ON_LAST_CONNECTION: u32 = 2;
const TAG_LIBRARY_NAME: u32 = 3;
const TAG_ON_MAIN_INIT: u32 = 4;
const TAG_ON_MAIN_DESTROY: u32 = 5;
const TAG_ON_THREAD_INIT: u32 = 6;
const TAG_ON_THREAD_DESTROY: u32 = 7;
const TAG_NUM_EDGES: u32 = 8;
const TAG_NUM_VERTICES: u32 = 9;
const TAG_IS_DIRECTED: u32 = 10;
const TAG_HAS_VERTEX: u32 = 11;
const TAG_HAS_EDGE: u32 = 12;
const TAG_GET_WEIGHT: u32 = 13;
const TAG_ADD_VERTEX: u32 = 14;
const TAG_REMOVE_VERTEX: u32 = 15;
const TAG_ADD_EDGE: u32 = 16;
const TAG_REMOVE_EDGE: u32 = 17;
const TAG_LOAD: u32 = 18;
const TAG_BFS: u32 = 19;
const TAG_PAGERANK: u32 = 20;
const TAG_WCC: u32 = 21;
const TAG_CDLP: u32 = 22;
const TAG_LCC: u32 = 23;
const TAG_SSSP: u32 = 24;
const TAG_DUMP_CLIENT: u32 = 25;

const STATUS_OK: u32 = 0;
const STATUS_NOT_SUPPORTED: u32 = 1;
const STATUS_ERROR: u32 = 2;

/// One request of the wire protocol
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    TerminateWorker,
    TerminateServer,
    TerminateOnLastConnection,
    LibraryName,
    OnMainInit { num_threads: u64 },
    OnMainDestroy,
    OnThreadInit { thread_id: u64 },
    OnThreadDestroy { thread_id: u64 },
    NumEdges,
    NumVertices,
    IsDirected,
    HasVertex { vertex: u64 },
    HasEdge { source: u64, destination: u64 },
    GetWeight { source: u64, destination: u64 },
    AddVertex { vertex: u64 },
    RemoveVertex { vertex: u64 },
    AddEdge { source: u64, destination: u64, weight: f64 },
    RemoveEdge { source: u64, destination: u64 },
    Load { path: String },
    Bfs { root: u64, output: Option<String> },
    Pagerank { iterations: u64, damping: f64, output: Option<String> },
    Wcc { output: Option<String> },
    Cdlp { max_iterations: u64, output: Option<String> },
    Lcc { output: Option<String> },
    Sssp { root: u64, output: Option<String> },
    DumpClient,
}

/// Payload shape of a successful response, per request kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    None,
    Bool,
    U64,
    F64,
    Text,
}

/// Typed payload carried by an `OK` response
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    None,
    Bool(bool),
    U64(u64),
    F64(f64),
    Text(String),
}

/// One response of the wire protocol
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ok(ResponsePayload),
    NotSupported,
    Error { message: String },
}

impl Request {
    fn tag(&self) -> u32 {
        match self {
            Request::TerminateWorker => TAG_TERMINATE_WORKER,
            Request::TerminateServer => TAG_TERMINATE_SERVER,
            Request::TerminateOnLastConnection => TAG_TERMINATE_ON_LAST_CONNECTION,
            Request::LibraryName => TAG_LIBRARY_NAME,
            Request::OnMainInit { .. } => TAG_ON_MAIN_INIT,
            Request::OnMainDestroy => TAG_ON_MAIN_DESTROY,
            Request::OnThreadInit { .. } => TAG_ON_THREAD_INIT,
            Request::OnThreadDestroy { .. } => TAG_ON_THREAD_DESTROY,
            Request::NumEdges => TAG_NUM_EDGES,
            Request::NumVertices => TAG_NUM_VERTICES,
            Request::IsDirected => TAG_IS_DIRECTED,
            Request::HasVertex { .. } => TAG_HAS_VERTEX,
            Request::HasEdge { .. } => TAG_HAS_EDGE,
            Request::GetWeight { .. } => TAG_GET_WEIGHT,
            Request::AddVertex { .. } => TAG_ADD_VERTEX,
            Request::RemoveVertex { .. } => TAG_REMOVE_VERTEX,
            Request::AddEdge { .. } => TAG_ADD_EDGE,
            Request::RemoveEdge { .. } => TAG_REMOVE_EDGE,
            Request::Load { .. } => TAG_LOAD,
            Request::Bfs { .. } => TAG_BFS,
            Request::Pagerank { .. } => TAG_PAGERANK,
            Request::Wcc { .. } => TAG_WCC,
            Request::Cdlp { .. } => TAG_CDLP,
            Request::Lcc { .. } => TAG_LCC,
            Request::Sssp { .. } => TAG_SSSP,
            Request::DumpClient => TAG_DUMP_CLIENT,
        }
    }

    /// Payload shape of the `OK` response answering this request
    pub fn response_payload_kind(&self) -> PayloadKind {
        match self {
            Request::LibraryName | Request::DumpClient => PayloadKind::Text,
            Request::NumEdges | Request::NumVertices => PayloadKind::U64,
            Request::IsDirected
            | Request::HasVertex { .. }
            | Request::HasEdge { .. }
            | Request::AddVertex { .. }
            | Request::RemoveVertex { .. }
            | Request::AddEdge { .. }
            | Request::RemoveEdge { .. } => PayloadKind::Bool,
            Request::GetWeight { .. } => PayloadKind::F64,
            _ => PayloadKind::None,
        }
    }

    pub fn encode(&self) -> GrindResult<Vec<u8>> {
        let mut frame = Frame::new(self.tag());
        match self {
            Request::TerminateWorker
            | Request::TerminateServer
            | Request::TerminateOnLastConnection
            | Request::LibraryName
            | Request::OnMainDestroy
            | Request::NumEdges
            | Request::NumVertices
            | Request::IsDirected
            | Request::DumpClient => {}
            Request::OnMainInit { num_threads } => frame.put_u64(*num_threads),
            Request::OnThreadInit { thread_id } | Request::OnThreadDestroy { thread_id } => {
                frame.put_u64(*thread_id)
            }
            Request::HasVertex { vertex }
            | Request::AddVertex { vertex }
            | Request::RemoveVertex { vertex } => frame.put_u64(*vertex),
            Request::HasEdge {
                source,
                destination,
            }
            | Request::GetWeight {
                source,
                destination,
            }
            | Request::RemoveEdge {
                source,
                destination,
            } => {
                frame.put_u64(*source);
                frame.put_u64(*destination);
            }
            Request::AddEdge {
                source,
                destination,
                weight,
            } => {
                frame.put_u64(*source);
                frame.put_u64(*destination);
                frame.put_f64(*weight);
            }
            Request::Load { path } => frame.put_str(path),
            Request::Bfs { root, output } | Request::Sssp { root, output } => {
                frame.put_u64(*root);
                frame.put_opt_str(output);
            }
            Request::Pagerank {
                iterations,
                damping,
                output,
            } => {
                frame.put_u64(*iterations);
                frame.put_f64(*damping);
                frame.put_opt_str(output);
            }
            Request::Cdlp {
                max_iterations,
                output,
            } => {
                frame.put_u64(*max_iterations);
                frame.put_opt_str(output);
            }
            Request::Wcc { output } | Request::Lcc { output } => frame.put_opt_str(output),
        }
        frame.finish()
    }

    /// Decode a full frame, length field included
    pub fn decode(frame: &[u8]) -> GrindResult<Request> {
        let mut cursor = Cursor::new(frame)?;
        let request = match cursor.tag {
            TAG_TERMINATE_WORKER => Request::TerminateWorker,
            TAG_TERMINATE_SERVER => Request::TerminateServer,
            TAG_TERMINATE_ON_LAST_CONNECTION => Request::TerminateOnLastConnection,
            TAG_LIBRARY_NAME => Request::LibraryName,
            TAG_ON_MAIN_INIT => Request::OnMainInit {
                num_threads: cursor.take_u64()?,
            },
            TAG_ON_MAIN_DESTROY => Request::OnMainDestroy,
            TAG_ON_THREAD_INIT => Request::OnThreadInit {
                thread_id: cursor.take_u64()?,
            },
            TAG_ON_THREAD_DESTROY => Request::OnThreadDestroy {
                thread_id: cursor.take_u64()?,
            },
            TAG_NUM_EDGES => Request::NumEdges,
            TAG_NUM_VERTICES => Request::NumVertices,
            TAG_IS_DIRECTED => Request::IsDirected,
            TAG_HAS_VERTEX => Request::HasVertex {
                vertex: cursor.take_u64()?,
            },
            TAG_HAS_EDGE => Request::HasEdge {
                source: cursor.take_u64()?,
                destination: cursor.take_u64()?,
            },
            TAG_GET_WEIGHT => Request::GetWeight {
                source: cursor.take_u64()?,
                destination: cursor.take_u64()?,
            },
            TAG_ADD_VERTEX => Request::AddVertex {
                vertex: cursor.take_u64()?,
            },
            TAG_REMOVE_VERTEX => Request::RemoveVertex {
                vertex: cursor.take_u64()?,
            },
            TAG_ADD_EDGE => Request::AddEdge {
                source: cursor.take_u64()?,
                destination: cursor.take_u64()?,
                weight: cursor.take_f64()?,
            },
            TAG_REMOVE_EDGE => Request::RemoveEdge {
                source: cursor.take_u64()?,
                destination: cursor.take_u64()?,
            },
            TAG_LOAD => Request::Load {
                path: cursor.take_str()?,
            },
            TAG_BFS => Request::Bfs {
                root: cursor.take_u64()?,
                output: cursor.take_opt_str()?,
            },
            TAG_PAGERANK => Request::Pagerank {
                iterations: cursor.take_u64()?,
                damping: cursor.take_f64()?,
                output: cursor.take_opt_str()?,
            },
            TAG_WCC => Request::Wcc {
                output: cursor.take_opt_str()?,
            },
            TAG_CDLP => Request::Cdlp {
                max_iterations: cursor.take_u64()?,
                output: cursor.take_opt_str()?,
            },
            TAG_LCC => Request::Lcc {
                output: cursor.take_opt_str()?,
            },
            TAG_SSSP => Request::Sssp {
                root: cursor.take_u64()?,
                output: cursor.take_opt_str()?,
            },
            TAG_DUMP_CLIENT => Request::DumpClient,
            unknown => {
                return Err(GrindError::protocol(format!(
                    "unknown request tag {unknown}"
                )))
            }
        };
        Ok(request)
    }
}

impl Response {
    pub fn encode(&self) -> GrindResult<Vec<u8>> {
        let mut frame = match self {
            Response::Ok(payload) => {
                let mut frame = Frame::new(STATUS_OK);
                match payload {
                    ResponsePayload::None => {}
                    ResponsePayload::Bool(value) => frame.put_u64(*value as u64),
                    ResponsePayload::U64(value) => frame.put_u64(*value),
                    ResponsePayload::F64(value) => frame.put_f64(*value),
                    ResponsePayload::Text(text) => frame.put_str(text),
                }
                frame
            }
            Response::NotSupported => Frame::new(STATUS_NOT_SUPPORTED),
            Response::Error { message } => {
                let mut frame = Frame::new(STATUS_ERROR);
                frame.put_str(message);
                frame
            }
        };
        frame.finish()
    }

    /// Decode a full frame; `kind` is the payload shape an `OK` carries
    pub fn decode(frame: &[u8], kind: PayloadKind) -> GrindResult<Response> {
        let mut cursor = Cursor::new(frame)?;
        match cursor.tag {
            STATUS_OK => {
                let payload = match kind {
                    PayloadKind::None => ResponsePayload::None,
                    PayloadKind::Bool => ResponsePayload::Bool(cursor.take_u64()? != 0),
                    PayloadKind::U64 => ResponsePayload::U64(cursor.take_u64()?),
                    PayloadKind::F64 => ResponsePayload::F64(cursor.take_f64()?),
                    PayloadKind::Text => ResponsePayload::Text(cursor.take_str()?),
                };
                Ok(Response::Ok(payload))
            }
            STATUS_NOT_SUPPORTED => Ok(Response::NotSupported),
            STATUS_ERROR => Ok(Response::Error {
                message: cursor.take_str()?,
            }),
            unknown => Err(GrindError::protocol(format!(
                "unknown response status {unknown}"
            ))),
        }
    }
}

/// Outgoing frame under construction; the length field is patched last
struct Frame {
    buffer: Vec<u8>,
}

impl Frame {
    fn new(tag: u32) -> Self {
        let mut buffer = Vec::with_capacity(32);
        buffer.extend_from_slice(&[0u8; 4]);
        buffer.extend_from_slice(&tag.to_le_bytes());
        Self { buffer }
    }

    fn put_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn put_f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn put_str(&mut self, text: &str) {
        self.put_u64(text.len() as u64);
        self.buffer.extend_from_slice(text.as_bytes());
    }

    fn put_opt_str(&mut self, text: &Option<String>) {
        self.put_str(text.as_deref().unwrap_or(""));
    }

    fn finish(mut self) -> GrindResult<Vec<u8>> {
        if self.buffer.len() > MAX_MESSAGE_SIZE {
            return Err(GrindError::protocol(format!(
                "frame of {} bytes exceeds the {} byte bound",
                self.buffer.len(),
                MAX_MESSAGE_SIZE
            )));
        }
        let length = self.buffer.len() as u32;
        self.buffer[..4].copy_from_slice(&length.to_le_bytes());
        Ok(self.buffer)
    }
}

/// Incoming frame walker
struct Cursor<'a> {
    payload: &'a [u8],
    position: usize,
    tag: u32,
}

impl<'a> Cursor<'a> {
    fn new(frame: &'a [u8]) -> GrindResult<Self> {
        if frame.len() < 8 || frame.len() > MAX_MESSAGE_SIZE {
            return Err(GrindError::protocol(format!(
                "frame of {} bytes out of bounds",
                frame.len()
            )));
        }
        let declared = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        if declared != frame.len() {
            return Err(GrindError::protocol(format!(
                "frame length {declared} does not match the {} bytes received",
                frame.len()
            )));
        }
        let tag = u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
        Ok(Self {
            payload: &frame[8..],
            position: 0,
            tag,
        })
    }

    fn take(&mut self, count: usize) -> GrindResult<&'a [u8]> {
        if self.position + count > self.payload.len() {
            return Err(GrindError::protocol("frame payload truncated"));
        }
        let bytes = &self.payload[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    fn take_u64(&mut self) -> GrindResult<u64> {
        let bytes = self.take(8)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(word))
    }

    fn take_f64(&mut self) -> GrindResult<f64> {
        Ok(f64::from_bits(self.take_u64()?))
    }

    fn take_str(&mut self) -> GrindResult<String> {
        let length = self.take_u64()? as usize;
        let bytes = self.take(length)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| GrindError::protocol("string field is not valid UTF-8"))
    }

    fn take_opt_str(&mut self) -> GrindResult<Option<String>> {
        let text = self.take_str()?;
        Ok(if text.is_empty() { None } else { Some(text) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(request: Request) {
        let bytes = request.encode().unwrap();
        let declared = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        assert_eq!(declared, bytes.len());
        assert_eq!(Request::decode(&bytes).unwrap(), request);
    }

    #[test]
    fn requests_round_trip() {
        round_trip(Request::TerminateWorker);
        round_trip(Request::TerminateServer);
        round_trip(Request::TerminateOnLastConnection);
        round_trip(Request::LibraryName);
        round_trip(Request::OnMainInit { num_threads: 8 });
        round_trip(Request::OnMainDestroy);
        round_trip(Request::OnThreadInit { thread_id: 3 });
        round_trip(Request::OnThreadDestroy { thread_id: 3 });
        round_trip(Request::NumEdges);
        round_trip(Request::NumVertices);
        round_trip(Request::IsDirected);
        round_trip(Request::HasVertex { vertex: 42 });
        round_trip(Request::HasEdge {
            source: 1,
            destination: 2,
        });
        round_trip(Request::GetWeight {
            source: 1,
            destination: 2,
        });
        round_trip(Request::AddVertex { vertex: 7 });
        round_trip(Request::RemoveVertex { vertex: 7 });
        round_trip(Request::AddEdge {
            source: 1,
            destination: 2,
            weight: 3.5,
        });
        round_trip(Request::RemoveEdge {
            source: 1,
            destination: 2,
        });
        round_trip(Request::Load {
            path: "/tmp/graph.el".into(),
        });
        round_trip(Request::Bfs {
            root: 1,
            output: Some("/tmp/bfs.out".into()),
        });
        round_trip(Request::Bfs {
            root: 1,
            output: None,
        });
        round_trip(Request::Pagerank {
            iterations: 10,
            damping: 0.85,
            output: None,
        });
        round_trip(Request::Wcc { output: None });
        round_trip(Request::Cdlp {
            max_iterations: 10,
            output: None,
        });
        round_trip(Request::Lcc { output: None });
        round_trip(Request::Sssp {
            root: 9,
            output: None,
        });
        round_trip(Request::DumpClient);
    }

    #[test]
    fn responses_round_trip() {
        let cases = [
            (Response::Ok(ResponsePayload::None), PayloadKind::None),
            (Response::Ok(ResponsePayload::Bool(true)), PayloadKind::Bool),
            (Response::Ok(ResponsePayload::U64(99)), PayloadKind::U64),
            (Response::Ok(ResponsePayload::F64(2.5)), PayloadKind::F64),
            (
                Response::Ok(ResponsePayload::Text("memory".into())),
                PayloadKind::Text,
            ),
            (Response::NotSupported, PayloadKind::Bool),
            (
                Response::Error {
                    message: "boom".into(),
                },
                PayloadKind::U64,
            ),
        ];
        for (response, kind) in cases {
            let bytes = response.encode().unwrap();
            assert_eq!(Response::decode(&bytes, kind).unwrap(), response);
        }
    }

    #[test]
    fn unknown_tag_is_a_protocol_error() {
        let mut bytes = Request::NumEdges.encode().unwrap();
        bytes[4..8].copy_from_slice(&999u32.to_le_bytes());
        assert!(matches!(
            Request::decode(&bytes),
            Err(GrindError::Protocol { .. })
        ));
    }

    #[test]
    fn length_mismatch_is_a_protocol_error() {
        let mut bytes = Request::HasVertex { vertex: 1 }.encode().unwrap();
        bytes[0..4].copy_from_slice(&3u32.to_le_bytes());
        assert!(matches!(
            Request::decode(&bytes),
            Err(GrindError::Protocol { .. })
        ));
    }

    #[test]
    fn truncated_payload_is_a_protocol_error() {
        let bytes = Request::HasEdge {
            source: 1,
            destination: 2,
        }
        .encode()
        .unwrap();
        let mut short = bytes[..16].to_vec();
        short[0..4].copy_from_slice(&16u32.to_le_bytes());
        assert!(matches!(
            Request::decode(&short),
            Err(GrindError::Protocol { .. })
        ));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let request = Request::Load {
            path: "x".repeat(MAX_MESSAGE_SIZE),
        };
        assert!(matches!(
            request.encode(),
            Err(GrindError::Protocol { .. })
        ));
    }
}
