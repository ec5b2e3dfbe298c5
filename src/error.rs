//! Error kinds raised by grid planning, compositing and capture sessions.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error produced by a rendering backend or exporter.
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that end a capture session (or prevent one from starting).
#[derive(Debug, Error)]
pub enum CaptureError {
    /// A configuration value makes capture impossible (e.g. a zero-sized tile).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The rendering backend failed to produce the tile at this grid index.
    #[error("capture failed at tile ({index_x}, {index_y}): {source}")]
    CaptureFailed {
        index_x: u32,
        index_y: u32,
        #[source]
        source: BackendError,
    },

    /// A tile copy reached outside its source or destination buffer.
    /// Only reachable through a planner or sequencer bug.
    #[error("region {width}x{height} at ({x}, {y}) exceeds {bounds_width}x{bounds_height}")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        bounds_width: u32,
        bounds_height: u32,
    },

    /// Creating the output directory or writing the output file failed.
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: BackendError,
    },
}

impl CaptureError {
    /// Returns the failing tile index for `CaptureFailed`.
    pub fn failed_tile(&self) -> Option<(u32, u32)> {
        match self {
            CaptureError::CaptureFailed {
                index_x, index_y, ..
            } => Some((*index_x, *index_y)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_failed_display() {
        let err = CaptureError::CaptureFailed {
            index_x: 1,
            index_y: 0,
            source: "device unavailable".into(),
        };
        assert_eq!(
            err.to_string(),
            "capture failed at tile (1, 0): device unavailable"
        );
        assert_eq!(err.failed_tile(), Some((1, 0)));
    }

    #[test]
    fn test_io_display_includes_path() {
        let err = CaptureError::Io {
            path: PathBuf::from("out/level_.png"),
            source: std::io::Error::other("disk full").into(),
        };
        assert!(err.to_string().contains("out/level_.png"));
        assert!(err.failed_tile().is_none());
    }
}
