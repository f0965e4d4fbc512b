//! headright: exact share allocation across original owners, heirs and conveyances.
//!
//! Layers, innermost first:
//! - [`domain`]: rational arithmetic and the share forest engine (no I/O)
//! - [`application`]: ledger sessions, undo history, the on-disk document
//! - [`infrastructure`]: filesystem and prompt boundaries, service wiring
//! - [`cli`]: argument parsing, dispatch and terminal output

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
