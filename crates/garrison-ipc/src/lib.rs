//! Garrison IPC - protocol types and Unix socket transport

pub mod client;
pub mod protocol;
pub mod server;

pub use client::IpcClient;
pub use protocol::{Event, ItemKind, NotifyStatus, Request, Response, ServerSummary};
pub use server::{IpcConnection, IpcServer};
