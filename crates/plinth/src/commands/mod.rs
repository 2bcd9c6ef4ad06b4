//! Subcommand implementations.

pub mod build;
pub mod dev;
pub mod grid;
pub mod task;
pub mod watch;
