use std::path::{Path, PathBuf};
use std::time::Duration;

pub const STATE_FILE_NAME: &str = ".redline.json";
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;
pub const DEFAULT_POLL_MS: u64 = 1000;
pub const DEFAULT_CONTEXT_LINES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Directory relative paths are resolved against.
    pub root: PathBuf,
    pub state_path: PathBuf,
    pub debounce: Duration,
    pub poll_interval: Duration,
    pub context_lines: usize,
}

impl SessionConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let state_path = root.join(STATE_FILE_NAME);
        Self {
            root,
            state_path,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_MS),
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }

    #[must_use]
    pub fn with_state_path(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.state_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        self
    }

    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
