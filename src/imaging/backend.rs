//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the black-box boundary around pixel work:
//! bytes in, dimensions or encoded bytes out. Nothing behind it knows about
//! vaults, registries or file paths, so any implementation satisfying the two
//! operations is substitutable.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): pure Rust, statically
//! linked.

use super::params::ResizeParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Sync` so one backend can serve rayon's worker pool.
pub trait ImageBackend: Sync {
    /// Read the pixel dimensions of an encoded image.
    fn identify(&self, source: &[u8]) -> Result<Dimensions, BackendError>;

    /// Decode, resize to exactly `params.width × params.height`, and encode.
    fn resize(&self, source: &[u8], params: &ResizeParams) -> Result<Vec<u8>, BackendError>;
}
