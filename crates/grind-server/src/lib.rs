//! Network RPC surface for a graph library
//!
//! A length-framed binary protocol over TCP exposes the full library
//! contract to remote drivers: lifecycle brackets, read queries, updates,
//! bulk loading and the analytics kernels. One thread serves each
//! connection; the accept loop polls so it stays responsive to the stop
//! flag, which the signal bridge flips on SIGINT/SIGTERM.
//!
//! Frame layout, little-endian: `u32` total length (including itself),
//! `u32` type tag, then fixed-width fields; strings are u64-length
//! prefixed. See [`message`] for the codec.

pub mod client;
pub mod message;
pub mod server;
pub mod signal;

pub use client::RpcClient;
pub use message::{PayloadKind, Request, Response, ResponsePayload, MAX_MESSAGE_SIZE};
pub use server::{Server, DEFAULT_PORT};
pub use signal::SignalBridge;
