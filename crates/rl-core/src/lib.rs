pub mod config;
pub mod diff;
pub mod error;
pub mod file;
pub mod hunks;
pub mod persist;
pub mod session;
pub mod source;
pub mod watcher;

pub mod types;

pub use crate::config::SessionConfig;
pub use crate::error::RedlineError;
pub use crate::session::Session;
pub use crate::source::{ChangeSource, ExplicitSource, VcsSource};
