//! Persistence for per-user analysis conversations and session state,
//! backed by an embedded `SQLite` database, with a thin HTTP front end.

#![deny(warnings)]
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(unused_variables)]
#![deny(unused_must_use)]
#![deny(nonstandard_style)]
#![forbid(unsafe_op_in_unsafe_fn)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used, clippy::panic))]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::redundant_clone)]
#![deny(clippy::too_many_arguments)]
#![allow(clippy::module_name_repetitions)]

/// Runtime configuration (paths, ports, environment overrides).
pub mod config;
/// HTTP server and API routes.
#[allow(clippy::missing_errors_doc, clippy::unused_async)]
pub mod server;
/// Entry helpers to start the server process.
pub mod start_server;
/// `SQLite` persistence: schema, store handle and repositories.
pub mod store;
