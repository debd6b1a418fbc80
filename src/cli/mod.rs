//! CLI module for proxemo
//!
//! Provides command-line interface for:
//! - evaluate: Run the engine once over a session state file
//! - expand: Expand one capability descriptor

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{evaluate, expand, run, run_command, run_session};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_descriptor, read_state, write_error, write_response, SessionState};
