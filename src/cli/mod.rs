//! CLI module for chronoset
//!
//! Provides command-line interface for:
//! - init: Write a configuration and create the data directory
//! - post / comment: Versioning operations and queries
//! - version: One revision with its audit fields
//! - verify: Timeline invariant check

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, CommentAction, PostAction, VersionTarget};
pub use commands::{boot, execute, init, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{error_envelope, ok_envelope, write_error, write_response};
