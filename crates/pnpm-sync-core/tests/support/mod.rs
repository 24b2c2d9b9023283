//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use pnpm_sync_core::events::SyncEvent;

/// Write a file, creating parent directories as needed.
pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs should succeed");
    }
    fs::write(path, contents).expect("write should succeed");
}

/// Collects emitted events for later assertions.
#[derive(Default)]
pub struct EventLog {
    events: RefCell<Vec<SyncEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: &SyncEvent) {
        self.events.borrow_mut().push(event.clone());
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(|event| event.kind()).collect()
    }
}

#[cfg(unix)]
pub fn inode(path: &Path) -> u64 {
    use std::os::unix::fs::MetadataExt;
    fs::metadata(path)
        .expect("metadata should succeed")
        .ino()
}
