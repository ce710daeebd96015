//! Blocking RPC client
//!
//! The remote counterpart of the server: frames one request, reads one
//! response. A `NOT_SUPPORTED` status surfaces as `GrindError::NotSupported`
//! and an `ERROR` status as `GrindError::Library`, so remote engines look
//! exactly like local ones to calling code.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use grind_core::{GrindError, GrindResult};

use crate::message::{Request, Response, ResponsePayload, MAX_MESSAGE_SIZE};

pub struct RpcClient {
    stream: TcpStream,
}

impl RpcClient {
    pub fn connect(address: impl ToSocketAddrs) -> GrindResult<Self> {
        let stream = TcpStream::connect(address)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// One request/response exchange on the wire
    fn call(&mut self, request: Request) -> GrindResult<Response> {
        let kind = request.response_payload_kind();
        self.stream.write_all(&request.encode()?)?;

        let mut length = [0u8; 4];
        self.stream.read_exact(&mut length)?;
        let frame_length = u32::from_le_bytes(length) as usize;
        if !(8..=MAX_MESSAGE_SIZE).contains(&frame_length) {
            return Err(GrindError::protocol(format!(
                "response frame length {frame_length} out of bounds"
            )));
        }
        let mut frame = vec![0u8; frame_length];
        frame[..4].copy_from_slice(&length);
        self.stream.read_exact(&mut frame[4..])?;
        Response::decode(&frame, kind)
    }

    fn expect_ok(
        &mut self,
        operation: &'static str,
        request: Request,
    ) -> GrindResult<ResponsePayload> {
        match self.call(request)? {
            Response::Ok(payload) => Ok(payload),
            Response::NotSupported => Err(GrindError::NotSupported { operation }),
            Response::Error { message } => Err(GrindError::Library { message }),
        }
    }

    fn expect_bool(&mut self, operation: &'static str, request: Request) -> GrindResult<bool> {
        match self.expect_ok(operation, request)? {
            ResponsePayload::Bool(value) => Ok(value),
            other => Err(unexpected(operation, &other)),
        }
    }

    fn expect_u64(&mut self, operation: &'static str, request: Request) -> GrindResult<u64> {
        match self.expect_ok(operation, request)? {
            ResponsePayload::U64(value) => Ok(value),
            other => Err(unexpected(operation, &other)),
        }
    }

    fn expect_text(&mut self, operation: &'static str, request: Request) -> GrindResult<String> {
        match self.expect_ok(operation, request)? {
            ResponsePayload::Text(text) => Ok(text),
            other => Err(unexpected(operation, &other)),
        }
    }

    fn expect_unit(&mut self, operation: &'static str, request: Request) -> GrindResult<()> {
        self.expect_ok(operation, request).map(|_| ())
    }

    // Control

    /// Close this connection on the server side
    pub fn terminate_worker(&mut self) -> GrindResult<()> {
        self.expect_unit("TERMINATE_WORKER", Request::TerminateWorker)
    }

    /// Stop the whole server
    pub fn terminate_server(&mut self) -> GrindResult<()> {
        self.expect_unit("TERMINATE_SERVER", Request::TerminateServer)
    }

    /// Put the server in drain mode: exit once the last connection closes
    pub fn terminate_on_last_connection(&mut self) -> GrindResult<()> {
        self.expect_unit(
            "TERMINATE_ON_LAST_CONNECTION",
            Request::TerminateOnLastConnection,
        )
    }

    pub fn library_name(&mut self) -> GrindResult<String> {
        self.expect_text("LIBRARY_NAME", Request::LibraryName)
    }

    // Lifecycle

    pub fn on_main_init(&mut self, num_threads: u64) -> GrindResult<()> {
        self.expect_unit("ON_MAIN_INIT", Request::OnMainInit { num_threads })
    }

    pub fn on_main_destroy(&mut self) -> GrindResult<()> {
        self.expect_unit("ON_MAIN_DESTROY", Request::OnMainDestroy)
    }

    pub fn on_thread_init(&mut self, thread_id: u64) -> GrindResult<()> {
        self.expect_unit("ON_THREAD_INIT", Request::OnThreadInit { thread_id })
    }

    pub fn on_thread_destroy(&mut self, thread_id: u64) -> GrindResult<()> {
        self.expect_unit("ON_THREAD_DESTROY", Request::OnThreadDestroy { thread_id })
    }

    // Queries

    pub fn num_edges(&mut self) -> GrindResult<u64> {
        self.expect_u64("NUM_EDGES", Request::NumEdges)
    }

    pub fn num_vertices(&mut self) -> GrindResult<u64> {
        self.expect_u64("NUM_VERTICES", Request::NumVertices)
    }

    pub fn is_directed(&mut self) -> GrindResult<bool> {
        self.expect_bool("IS_DIRECTED", Request::IsDirected)
    }

    pub fn has_vertex(&mut self, vertex: u64) -> GrindResult<bool> {
        self.expect_bool("HAS_VERTEX", Request::HasVertex { vertex })
    }

    pub fn has_edge(&mut self, source: u64, destination: u64) -> GrindResult<bool> {
        self.expect_bool(
            "HAS_EDGE",
            Request::HasEdge {
                source,
                destination,
            },
        )
    }

    pub fn get_weight(&mut self, source: u64, destination: u64) -> GrindResult<f64> {
        match self.expect_ok(
            "GET_WEIGHT",
            Request::GetWeight {
                source,
                destination,
            },
        )? {
            ResponsePayload::F64(value) => Ok(value),
            other => Err(unexpected("GET_WEIGHT", &other)),
        }
    }

    // Mutations

    pub fn add_vertex(&mut self, vertex: u64) -> GrindResult<bool> {
        self.expect_bool("ADD_VERTEX", Request::AddVertex { vertex })
    }

    pub fn remove_vertex(&mut self, vertex: u64) -> GrindResult<bool> {
        self.expect_bool("REMOVE_VERTEX", Request::RemoveVertex { vertex })
    }

    pub fn add_edge(&mut self, source: u64, destination: u64, weight: f64) -> GrindResult<bool> {
        self.expect_bool(
            "ADD_EDGE",
            Request::AddEdge {
                source,
                destination,
                weight,
            },
        )
    }

    pub fn remove_edge(&mut self, source: u64, destination: u64) -> GrindResult<bool> {
        self.expect_bool(
            "REMOVE_EDGE",
            Request::RemoveEdge {
                source,
                destination,
            },
        )
    }

    pub fn load(&mut self, path: impl Into<String>) -> GrindResult<()> {
        self.expect_unit("LOAD", Request::Load { path: path.into() })
    }

    // Analytics

    pub fn bfs(&mut self, root: u64, output: Option<String>) -> GrindResult<()> {
        self.expect_unit("BFS", Request::Bfs { root, output })
    }

    pub fn pagerank(
        &mut self,
        iterations: u64,
        damping: f64,
        output: Option<String>,
    ) -> GrindResult<()> {
        self.expect_unit(
            "PAGERANK",
            Request::Pagerank {
                iterations,
                damping,
                output,
            },
        )
    }

    pub fn wcc(&mut self, output: Option<String>) -> GrindResult<()> {
        self.expect_unit("WCC", Request::Wcc { output })
    }

    pub fn cdlp(&mut self, max_iterations: u64, output: Option<String>) -> GrindResult<()> {
        self.expect_unit(
            "CDLP",
            Request::Cdlp {
                max_iterations,
                output,
            },
        )
    }

    pub fn lcc(&mut self, output: Option<String>) -> GrindResult<()> {
        self.expect_unit("LCC", Request::Lcc { output })
    }

    pub fn sssp(&mut self, root: u64, output: Option<String>) -> GrindResult<()> {
        self.expect_unit("SSSP", Request::Sssp { root, output })
    }

    // Diagnostics

    pub fn dump(&mut self) -> GrindResult<String> {
        self.expect_text("DUMP_CLIENT", Request::DumpClient)
    }
}

fn unexpected(operation: &'static str, payload: &ResponsePayload) -> GrindError {
    GrindError::protocol(format!(
        "unexpected payload {payload:?} in the {operation} response"
    ))
}
