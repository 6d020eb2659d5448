//! Async tasks
//!
//! Run tasks are spawned by the command processor; the socket task is the
//! daemon's only long-lived task.

pub mod server;

pub use server::{bind_socket, server_task};
