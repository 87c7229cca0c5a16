//! Standalone `vosk` engine server

use chipper_engines::VoskEngine;
use chipper_server::start_from_program_init;
use std::process::ExitCode;

fn main() -> ExitCode {
    start_from_program_init(VoskEngine::new())
}
