//! TCP server exposing a graph library over the wire protocol
//!
//! One accept loop, one handler thread per connection. The listener is
//! non-blocking and polled on a short tick so the stop flag and the
//! drain-on-last-connection condition are observed within a second.
//! Handler threads are tracked; shutting the server down closes every
//! handler socket and joins the threads, so no handler outlives the loop.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use grind_core::{Edge, GraphLibrary, GrindError, GrindResult, WeightedEdge};
use tracing::{info, warn};

use crate::message::{Request, Response, ResponsePayload, MAX_MESSAGE_SIZE};

/// Default RPC port when the settings carry none
pub const DEFAULT_PORT: u16 = 18286;

/// Accept-loop tick; stop and drain are checked at least this often
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct Server {
    library: Arc<dyn GraphLibrary>,
    library_name: String,
    listener: TcpListener,
    port: u16,
    stop: Arc<AtomicBool>,
    terminate_on_last_connection: Arc<AtomicBool>,
    active_connections: Arc<AtomicUsize>,
}

impl Server {
    /// Bind the listening socket; address reuse is on so quick restarts
    /// do not trip over `EADDRINUSE`.
    pub fn bind(
        library: Arc<dyn GraphLibrary>,
        library_name: impl Into<String>,
        port: u16,
    ) -> GrindResult<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        listener.set_nonblocking(true)?;
        let port = listener.local_addr()?.port();
        info!(port, "server listening");
        Ok(Self {
            library,
            library_name: library_name.into(),
            listener,
            port,
            stop: Arc::new(AtomicBool::new(false)),
            terminate_on_last_connection: Arc::new(AtomicBool::new(false)),
            active_connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Port actually bound; differs from the requested one only for 0
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Shared stop flag, the handle the signal bridge flips
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Accept connections until the stop flag is set or, in drain mode,
    /// the last connection closes. Consumes the server; joins every
    /// handler before returning.
    pub fn main_loop(self) -> GrindResult<()> {
        let mut handlers: Vec<(JoinHandle<()>, TcpStream)> = Vec::new();

        while !self.stop.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    info!(%peer, "connection received");
                    stream.set_nonblocking(false)?;
                    let socket = stream.try_clone()?;
                    let handler = ConnectionHandler {
                        stream,
                        library: Arc::clone(&self.library),
                        library_name: self.library_name.clone(),
                        server_stop: Arc::clone(&self.stop),
                        terminate_on_last_connection: Arc::clone(
                            &self.terminate_on_last_connection,
                        ),
                        active_connections: Arc::clone(&self.active_connections),
                    };
                    handlers.push((thread::spawn(move || handler.execute()), socket));
                }
                Err(error) if error.kind() == ErrorKind::WouldBlock => {
                    if self.terminate_on_last_connection.load(Ordering::Relaxed)
                        && self.active_connections.load(Ordering::Relaxed) == 0
                    {
                        break;
                    }
                    handlers.retain(|(thread, _)| !thread.is_finished());
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(error) => {
                    if self.stop.load(Ordering::Relaxed) {
                        break;
                    }
                    return Err(error.into());
                }
            }
        }

        // Unblock handlers stuck in a read, then join them all.
        for (thread, socket) in handlers {
            let _ = socket.shutdown(Shutdown::Both);
            let _ = thread.join();
        }
        info!("connection loop terminated");
        Ok(())
    }
}

struct ConnectionHandler {
    stream: TcpStream,
    library: Arc<dyn GraphLibrary>,
    library_name: String,
    server_stop: Arc<AtomicBool>,
    terminate_on_last_connection: Arc<AtomicBool>,
    active_connections: Arc<AtomicUsize>,
}

impl ConnectionHandler {
    fn execute(mut self) {
        let active = self.active_connections.fetch_add(1, Ordering::SeqCst) + 1;
        info!(active_connections = active, "connection opened");

        loop {
            match self.serve_one() {
                Ok(true) => {}
                Ok(false) => break,
                Err(error) => {
                    warn!(%error, "closing connection");
                    break;
                }
            }
        }

        let active = self.active_connections.fetch_sub(1, Ordering::SeqCst) - 1;
        info!(active_connections = active, "connection terminated");
    }

    /// Serve one request/response exchange; `Ok(false)` ends the session
    fn serve_one(&mut self) -> GrindResult<bool> {
        let mut length = [0u8; 4];
        match self.stream.read_exact(&mut length) {
            Ok(()) => {}
            // Peer closed without a TERMINATE_WORKER message.
            Err(error) if error.kind() == ErrorKind::UnexpectedEof => return Ok(false),
            Err(error) => return Err(error.into()),
        }

        let frame_length = u32::from_le_bytes(length) as usize;
        if !(8..=MAX_MESSAGE_SIZE).contains(&frame_length) {
            return Err(GrindError::protocol(format!(
                "frame length {frame_length} out of bounds"
            )));
        }
        let mut frame = vec![0u8; frame_length];
        frame[..4].copy_from_slice(&length);
        self.stream
            .read_exact(&mut frame[4..])
            .map_err(GrindError::Io)?;

        let request = Request::decode(&frame)?;
        let (response, keep_going) = self.dispatch(request);
        self.stream.write_all(&response.encode()?)?;
        Ok(keep_going)
    }

    fn dispatch(&self, request: Request) -> (Response, bool) {
        let library = self.library.as_ref();
        match request {
            Request::TerminateWorker => (ok(), false),
            Request::TerminateServer => {
                self.server_stop.store(true, Ordering::Relaxed);
                (ok(), false)
            }
            Request::TerminateOnLastConnection => {
                self.terminate_on_last_connection
                    .store(true, Ordering::Relaxed);
                (ok(), true)
            }
            Request::LibraryName => (
                Response::Ok(ResponsePayload::Text(self.library_name.clone())),
                true,
            ),
            Request::OnMainInit { num_threads } => {
                library.on_main_init(num_threads as usize);
                (ok(), true)
            }
            Request::OnMainDestroy => {
                library.on_main_destroy();
                (ok(), true)
            }
            Request::OnThreadInit { thread_id } => {
                library.on_thread_init(thread_id as usize);
                (ok(), true)
            }
            Request::OnThreadDestroy { thread_id } => {
                library.on_thread_destroy(thread_id as usize);
                (ok(), true)
            }
            Request::NumEdges => (Response::Ok(ResponsePayload::U64(library.num_edges())), true),
            Request::NumVertices => (
                Response::Ok(ResponsePayload::U64(library.num_vertices())),
                true,
            ),
            Request::IsDirected => (
                Response::Ok(ResponsePayload::Bool(library.is_directed())),
                true,
            ),
            Request::HasVertex { vertex } => (
                Response::Ok(ResponsePayload::Bool(library.has_vertex(vertex))),
                true,
            ),
            Request::HasEdge {
                source,
                destination,
            } => (
                Response::Ok(ResponsePayload::Bool(library.has_edge(source, destination))),
                true,
            ),
            Request::GetWeight {
                source,
                destination,
            } => (
                Response::Ok(ResponsePayload::F64(library.get_weight(source, destination))),
                true,
            ),
            Request::AddVertex { vertex } => {
                (self.update(|u| u.add_vertex(vertex).map(bool_payload)), true)
            }
            Request::RemoveVertex { vertex } => (
                self.update(|u| u.remove_vertex(vertex).map(bool_payload)),
                true,
            ),
            Request::AddEdge {
                source,
                destination,
                weight,
            } => (
                self.update(|u| {
                    u.add_edge(WeightedEdge::new(source, destination, weight))
                        .map(bool_payload)
                }),
                true,
            ),
            Request::RemoveEdge {
                source,
                destination,
            } => (
                self.update(|u| {
                    u.remove_edge(Edge::new(source, destination)).map(bool_payload)
                }),
                true,
            ),
            Request::Load { path } => {
                let response = match library.loader() {
                    Some(loader) => as_response(loader.load(Path::new(&path)).map(none_payload)),
                    None => not_supported("LOAD"),
                };
                (response, true)
            }
            Request::Bfs { root, output } => (
                self.analytics("BFS", |a| a.bfs(root, opt_path(&output))),
                true,
            ),
            Request::Pagerank {
                iterations,
                damping,
                output,
            } => (
                self.analytics("PAGERANK", |a| {
                    a.pagerank(iterations, damping, opt_path(&output))
                }),
                true,
            ),
            Request::Wcc { output } => {
                (self.analytics("WCC", |a| a.wcc(opt_path(&output))), true)
            }
            Request::Cdlp {
                max_iterations,
                output,
            } => (
                self.analytics("CDLP", |a| a.cdlp(max_iterations, opt_path(&output))),
                true,
            ),
            Request::Lcc { output } => {
                (self.analytics("LCC", |a| a.lcc(opt_path(&output))), true)
            }
            Request::Sssp { root, output } => (
                self.analytics("SSSP", |a| a.sssp(root, opt_path(&output))),
                true,
            ),
            Request::DumpClient => (
                Response::Ok(ResponsePayload::Text(library.dump())),
                true,
            ),
        }
    }

    fn update(
        &self,
        operation: impl FnOnce(&dyn grind_core::UpdateOps) -> GrindResult<ResponsePayload>,
    ) -> Response {
        match self.library.updates() {
            Some(updates) => as_response(operation(updates)),
            None => not_supported("update"),
        }
    }

    fn analytics(
        &self,
        name: &'static str,
        operation: impl FnOnce(&dyn grind_core::AnalyticsOps) -> GrindResult<()>,
    ) -> Response {
        match self.library.analytics() {
            Some(analytics) => as_response(operation(analytics).map(none_payload)),
            None => not_supported(name),
        }
    }
}

fn ok() -> Response {
    Response::Ok(ResponsePayload::None)
}

fn bool_payload(value: bool) -> ResponsePayload {
    ResponsePayload::Bool(value)
}

fn none_payload(_: ()) -> ResponsePayload {
    ResponsePayload::None
}

fn opt_path(output: &Option<String>) -> Option<&Path> {
    output.as_deref().map(Path::new)
}

fn not_supported(operation: &str) -> Response {
    info!(operation, "operation not supported by the current library");
    Response::NotSupported
}

/// Recoverable library failures travel back as `ERROR` with the message
fn as_response(result: GrindResult<ResponsePayload>) -> Response {
    match result {
        Ok(payload) => Response::Ok(payload),
        Err(error) => Response::Error {
            message: error.to_string(),
        },
    }
}
