//! Kiln Command Channel Protocol
//!
//! This crate defines the protocol between the kiln controller daemon and
//! its local clients (the web layer, `kilnctl`). The controller listens on
//! a Unix domain stream socket; each request and each reply is one line.
//!
//! # Protocol Overview
//!
//! ```text
//! client                                   controller
//!   │ {"command":"start","job_id":7,...}\n     │
//!   │ ───────────────────────────────────────▶ │
//!   │ {"response":"ok","command":"start"}\n    │
//!   │ ◀─────────────────────────────────────── │
//!   │ {"command":"ping"}\n                     │
//!   │ ───────────────────────────────────────▶ │
//!   │ PONG\n                                   │
//!   │ ◀─────────────────────────────────────── │
//! ```
//!
//! Requests are JSON objects with a case-insensitive `command` field.
//! Replies are JSON objects tagged by `response`, except the liveness
//! reply which is the bare token `PONG`.

#![deny(unsafe_code)]

pub mod line;
pub mod messages;

pub use line::{LineError, LineParser, MAX_LINE_LEN};
pub use messages::{
    Command, CommandKind, ErrorKind, ProtocolError, Reading, Response, StartRequest,
    StatusReport, PONG,
};
