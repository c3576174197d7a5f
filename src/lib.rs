//! Flowtalk is a terminal client for conversational flows hosted on a remote
//! flow-execution service.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the turn lifecycle: building run requests, initiating a
//!   flow run, consuming the event stream, pacing output, and guaranteeing a
//!   single completion per turn.
//! - [`api`] defines the wire payloads exchanged with the flow service.
//! - [`cli`] parses command-line arguments and drives turns for the `say`,
//!   `chat`, and `flows` commands.
//! - [`utils`] holds URL helpers and logging setup.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
