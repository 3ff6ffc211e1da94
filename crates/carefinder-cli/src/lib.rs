//! Carefinder CLI library.
//!
//! Logging setup, terminal styling and output formatting shared by the
//! `carefinder-cli` subcommands.

pub mod logging;
pub mod output;
pub mod terminal;
