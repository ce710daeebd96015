//! RPC server binary
//!
//! Exposes a registered library implementation on a TCP port.
//!
//! ```bash
//! grind-server [port] [library]
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - log level (default: info)
//! - `GRIND_PORT` - listening port, overridden by the first argument
//! - `GRIND_LIBRARY` - library name, overridden by the second argument
//!
//! SIGINT and SIGTERM trigger a graceful shutdown: the accept loop stops,
//! in-flight connections are closed and joined. Exit code 0 on a clean
//! shutdown, non-zero on an initialization failure.

use std::env;

use grind_server::{Server, SignalBridge, DEFAULT_PORT};
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(true).init();

    let mut args = env::args().skip(1);
    let port = args
        .next()
        .or_else(|| env::var("GRIND_PORT").ok())
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let library_name = args
        .next()
        .or_else(|| env::var("GRIND_LIBRARY").ok())
        .unwrap_or_else(|| "memory".to_string());

    let library = match grind_core::library_by_name(&library_name) {
        Ok(library) => library,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    };

    let server = match Server::bind(library, &library_name, port) {
        Ok(server) => server,
        Err(error) => {
            eprintln!("cannot start the server on port {port}: {error}");
            std::process::exit(1);
        }
    };

    let bridge = match SignalBridge::register(server.stop_flag()) {
        Ok(bridge) => bridge,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    };

    if let Err(error) = server.main_loop() {
        eprintln!("server error: {error}");
        std::process::exit(1);
    }
    drop(bridge);
}
