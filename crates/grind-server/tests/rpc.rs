//! Client/server round trips over real sockets

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use grind_core::{GraphLibrary, GrindError, GrindResult, MemoryGraph};
use grind_server::{RpcClient, Server};
use grind_test_harness::{FailingLibrary, ReadOnlyLibrary};

fn spawn_server(
    library: Arc<dyn GraphLibrary>,
) -> (u16, Arc<AtomicBool>, JoinHandle<GrindResult<()>>) {
    let server = Server::bind(library, "memory", 0).unwrap();
    let port = server.port();
    let stop = server.stop_flag();
    let handle = std::thread::spawn(move || server.main_loop());
    (port, stop, handle)
}

fn connect(port: u16) -> RpcClient {
    RpcClient::connect(("127.0.0.1", port)).unwrap()
}

#[test]
fn lifecycle_sequence_round_trips() {
    let (port, _stop, handle) = spawn_server(Arc::new(MemoryGraph::new()));
    let mut client = connect(port);

    client.on_main_init(1).unwrap();
    client.on_thread_init(0).unwrap();
    assert!(client.add_vertex(42).unwrap());
    assert!(client.has_vertex(42).unwrap());
    client.on_thread_destroy(0).unwrap();
    client.on_main_destroy().unwrap();

    client.terminate_server().unwrap();
    handle.join().unwrap().unwrap();
}

#[test]
fn queries_and_mutations_round_trip() {
    let (port, _stop, handle) = spawn_server(Arc::new(MemoryGraph::new()));
    let mut client = connect(port);

    client.on_main_init(1).unwrap();
    client.on_thread_init(0).unwrap();
    assert!(client.add_vertex(1).unwrap());
    assert!(client.add_vertex(2).unwrap());
    assert!(client.add_edge(1, 2, 3.5).unwrap());
    assert!(client.has_edge(2, 1).unwrap());
    assert_eq!(client.get_weight(1, 2).unwrap(), 3.5);
    assert_eq!(client.num_edges().unwrap(), 1);
    assert_eq!(client.num_vertices().unwrap(), 2);
    assert!(!client.is_directed().unwrap());
    assert_eq!(client.library_name().unwrap(), "memory");
    assert!(client.dump().unwrap().contains("vertices"));
    assert!(client.remove_edge(1, 2).unwrap());
    assert_eq!(client.num_edges().unwrap(), 0);

    client.terminate_server().unwrap();
    handle.join().unwrap().unwrap();
}

#[test]
fn query_only_library_reports_not_supported() {
    let (port, _stop, handle) =
        spawn_server(Arc::new(ReadOnlyLibrary::new(MemoryGraph::new())));
    let mut client = connect(port);

    // The base tier still answers.
    assert_eq!(client.num_edges().unwrap(), 0);

    let error = client.add_edge(1, 2, 3.5).unwrap_err();
    assert!(matches!(error, GrindError::NotSupported { .. }), "{error}");
    let error = client.bfs(1, None).unwrap_err();
    assert!(matches!(error, GrindError::NotSupported { .. }), "{error}");
    let error = client.load("/tmp/graph.el").unwrap_err();
    assert!(matches!(error, GrindError::NotSupported { .. }), "{error}");

    client.terminate_server().unwrap();
    handle.join().unwrap().unwrap();
}

#[test]
fn library_failures_become_error_responses() {
    let library = Arc::new(FailingLibrary::new(MemoryGraph::new(), "injected failure"));
    let (port, _stop, handle) = spawn_server(library);
    let mut client = connect(port);

    let error = client.add_vertex(1).unwrap_err();
    match error {
        GrindError::Library { message } => assert!(message.contains("injected failure")),
        other => panic!("expected a library error, got {other}"),
    }

    client.terminate_server().unwrap();
    handle.join().unwrap().unwrap();
}

#[test]
fn drain_mode_exits_after_last_connection() {
    let (port, _stop, handle) = spawn_server(Arc::new(MemoryGraph::new()));
    let mut first = connect(port);
    let mut second = connect(port);

    first.terminate_on_last_connection().unwrap();
    first.terminate_worker().unwrap();

    // The second connection keeps the server alive.
    assert_eq!(second.library_name().unwrap(), "memory");
    second.terminate_worker().unwrap();

    let started = Instant::now();
    handle.join().unwrap().unwrap();
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "server took {:?} to drain",
        started.elapsed()
    );
}

#[test]
fn stop_flag_shuts_down_within_the_poll_interval() {
    let (port, stop, handle) = spawn_server(Arc::new(MemoryGraph::new()));
    let mut client = connect(port);
    assert_eq!(client.library_name().unwrap(), "memory");

    stop.store(true, Ordering::Relaxed);
    let started = Instant::now();
    handle.join().unwrap().unwrap();
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "server took {:?} to stop",
        started.elapsed()
    );

    // The in-flight connection was closed and no new ones are accepted.
    assert!(client.library_name().is_err());
    if let Ok(mut stream) = TcpStream::connect(("127.0.0.1", port)) {
        // A lingering connect may succeed at the TCP level, but the server
        // side is gone: the next read must fail or return EOF.
        stream
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();
        let mut byte = [0u8; 1];
        assert!(matches!(stream.read(&mut byte), Ok(0) | Err(_)));
    }
}

#[test]
fn malformed_frame_closes_the_connection() {
    let (port, _stop, handle) = spawn_server(Arc::new(MemoryGraph::new()));

    let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    // Declared frame length below the 8-byte minimum.
    stream.write_all(&3u32.to_le_bytes()).unwrap();

    let mut byte = [0u8; 1];
    assert!(matches!(stream.read(&mut byte), Ok(0) | Err(_)));

    let mut client = connect(port);
    client.terminate_server().unwrap();
    handle.join().unwrap().unwrap();
}
