//! Configuration structures for mica.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage configuration for a mica instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for data files.
    pub data_dir: PathBuf,
    /// Buffer pool size in number of frames.
    pub buffer_pool_frames: usize,
    /// Enable fsync after page writes.
    pub fsync_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            buffer_pool_frames: 1024, // 8 MB with 8 KB pages
            fsync_enabled: true,
        }
    }
}

impl StorageConfig {
    /// Returns the total buffer pool size in bytes.
    pub fn buffer_pool_size_bytes(&self) -> usize {
        self.buffer_pool_frames * crate::page::PAGE_SIZE
    }

    /// Checks for values the engine cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.buffer_pool_frames == 0 {
            return Err(crate::error::MicaError::ConfigError(
                "buffer_pool_frames must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
