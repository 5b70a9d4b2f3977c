//! Error types for mica.

use crate::page::PageNo;
use thiserror::Error;

/// Result type alias using MicaError.
pub type Result<T> = std::result::Result<T, MicaError>;

/// Errors that can occur in mica operations.
#[derive(Debug, Error)]
pub enum MicaError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Buffer pool errors
    #[error("buffer pool exceeded, all frames are pinned")]
    BufferExceeded,

    #[error("page {page_no} of {file} is not pinned")]
    PageNotPinned { file: String, page_no: PageNo },

    #[error("page {page_no} of {file} is still pinned")]
    PagePinned { file: String, page_no: PageNo },

    #[error("invalid frame {frame_no} attributed to {file}")]
    BadBuffer { file: String, frame_no: u32 },

    // Page table errors
    #[error("no page table entry for page {page_no} of {file}")]
    HashNotFound { file: String, page_no: PageNo },

    #[error("page table entry for page {page_no} of {file} already present")]
    HashAlreadyPresent { file: String, page_no: PageNo },

    // Storage errors
    #[error("page {page_no} does not exist in {file}")]
    PageNotFound { file: String, page_no: PageNo },

    // Configuration errors
    #[error("configuration error: {0}")]
    ConfigError(String),
}
