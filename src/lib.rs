// openframe: local OpenFrame environments on k3d.
//
// The binary in `main.rs` parses the command line and hands over to
// `commands`; everything it calls lives here so integration tests can drive
// the same types.

// Logging macros; declared first so every other module can use them.
#[macro_use]
pub mod logger;

pub mod cli;
pub mod commands;
pub mod installers;
pub mod libs;
pub mod schemas;
