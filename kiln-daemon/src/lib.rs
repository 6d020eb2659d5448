//! Kiln controller daemon
//!
//! Ties the core logic to real (or simulated) hardware and exposes it on a
//! Unix command socket:
//!
//! ```text
//!  kilnctl / job store
//!          │ newline-delimited JSON
//!          ▼
//!  ┌──────────────┐   ┌──────────────────┐   ┌────────────┐
//!  │ server task  │──►│ CommandProcessor │──►│ run task   │
//!  └──────────────┘   └──────────────────┘   │ Controller │
//!                       │ reclaim   ▲ status └────────────┘
//!                       ▼           │ RunHandle   │ lease
//!                     SharedHeater ◄──────────────┘
//! ```

#![deny(unsafe_code)]

pub mod channels;
pub mod client;
pub mod config;
pub mod controller;
pub mod hardware;
pub mod processor;
pub mod tasks;
pub mod telemetry;
