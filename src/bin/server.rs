//! Conversation store HTTP server.
//! Run with: cargo run --bin conversation-store-server

use std::process::ExitCode;

use conversation_store::start_server;

fn main() -> ExitCode {
    start_server::run()
}
