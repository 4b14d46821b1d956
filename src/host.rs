//! Process-level effects the orchestrator needs.
//!
//! Booting changes the working directory and reads the environment. Both go
//! through [`Host`] so the orchestrator can run against a fake in tests.

use std::path::{Path, PathBuf};

use crate::env::EnvSnapshot;
use crate::error::BootError;

pub trait Host {
    fn current_dir(&self) -> Result<PathBuf, BootError>;

    fn set_current_dir(&mut self, dir: &Path) -> Result<(), BootError>;

    /// Snapshot of the environment variables visible to the process.
    fn vars(&self) -> EnvSnapshot;
}

/// The real process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl Host for SystemHost {
    fn current_dir(&self) -> Result<PathBuf, BootError> {
        std::env::current_dir().map_err(|e| BootError::IoError {
            path: PathBuf::from("."),
            source: e,
        })
    }

    fn set_current_dir(&mut self, dir: &Path) -> Result<(), BootError> {
        tracing::debug!(dir = %dir.display(), "changing working directory");
        std::env::set_current_dir(dir).map_err(|e| BootError::IoError {
            path: dir.to_path_buf(),
            source: e,
        })
    }

    fn vars(&self) -> EnvSnapshot {
        EnvSnapshot::from_process()
    }
}
