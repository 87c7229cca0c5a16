//! Standalone `leopard` engine server

use chipper_engines::LeopardEngine;
use chipper_server::start_from_program_init;
use std::process::ExitCode;

fn main() -> ExitCode {
    start_from_program_init(LeopardEngine::new())
}
