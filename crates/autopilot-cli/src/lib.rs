//! Autopilot CLI — drive the inquiry-to-quote workflow from the terminal.
//!
//! The binary (`src/main.rs`) only parses arguments; the command
//! implementations live here so integration tests can call them directly.

pub mod commands;
