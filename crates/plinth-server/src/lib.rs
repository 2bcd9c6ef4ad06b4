//! Development server with live reload for plinth builds.
//!
//! Serves the output directory, injects a live-reload client into HTML
//! responses, watches the project's source directories and re-runs the
//! affected pipeline tasks on change.

pub mod server;
pub mod watcher;
pub mod websocket;

pub use server::{inject_script, DevServer, DevServerConfig, ServerError};
pub use watcher::{FileWatcher, WatchError};
pub use websocket::{ReloadHub, ReloadMessage};
