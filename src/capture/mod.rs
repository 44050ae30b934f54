//! Capture sources.
//!
//! The camera and its snapshot API live outside the core; this module
//! defines the boundary and ships the collaborators the daemon needs:
//! - `stub://` synthetic camera (tests, model-less runs)
//! - local image file or directory replay
//! - HTTP snapshot cameras (feature: capture-http)
//!
//! A snapshot is a temp file on disk. The scheduler owns its lifecycle:
//! sources create the artifact, `CapturedFrame::release` removes it after
//! the cycle, and stop/reset paths release anything still pending.

mod file;
#[cfg(feature = "capture-http")]
mod http;
mod stub;

use std::io::Write;
use std::path::{Path, PathBuf};

pub use file::FileReplaySource;
#[cfg(feature = "capture-http")]
pub use http::HttpSnapshotSource;
pub use stub::StubCamera;

use crate::config::CaptureSettings;
use crate::error::PipelineError;

/// One captured frame, backed by a file on disk.
#[derive(Debug)]
pub struct CapturedFrame {
    path: PathBuf,
    /// Temp artifacts are deleted on release; replayed source files are not.
    owns_artifact: bool,
}

impl CapturedFrame {
    /// Wrap an existing file without taking ownership (replay sources).
    pub fn borrowed(path: PathBuf) -> Self {
        Self {
            path,
            owns_artifact: false,
        }
    }

    /// Write snapshot bytes to a fresh temp file owned by this frame.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PipelineError> {
        let mut file = tempfile::Builder::new()
            .prefix("framewatch-")
            .suffix(".jpg")
            .tempfile()
            .map_err(|e| PipelineError::capture(format!("failed to create temp file: {}", e)))?;
        file.write_all(bytes)
            .map_err(|e| PipelineError::capture(format!("failed to write snapshot: {}", e)))?;
        let (_, path) = file
            .keep()
            .map_err(|e| PipelineError::capture(format!("failed to keep temp file: {}", e)))?;
        Ok(Self {
            path,
            owns_artifact: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot back for preprocessing.
    pub fn bytes(&self) -> Result<Vec<u8>, PipelineError> {
        std::fs::read(&self.path).map_err(|e| {
            PipelineError::capture(format!("failed to read {}: {}", self.path.display(), e))
        })
    }

    /// Remove the temp artifact. Failure is reported, never fatal; the
    /// caller logs it and moves on.
    pub fn release(self) -> Result<(), PipelineError> {
        if !self.owns_artifact {
            return Ok(());
        }
        std::fs::remove_file(&self.path).map_err(|source| PipelineError::ResourceCleanup {
            path: self.path.clone(),
            source,
        })
    }
}

/// Snapshot-producing capture device boundary.
///
/// The scheduler serializes `snapshot` calls through a dedicated worker;
/// implementations do not need to be re-entrant.
pub trait CaptureSource: Send {
    fn name(&self) -> &'static str;

    /// Optional connection setup before the first snapshot.
    fn connect(&mut self) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Capture a frame and hand its artifact to the caller.
    fn snapshot(&mut self) -> Result<CapturedFrame, PipelineError>;
}

/// Build a capture source from its config spec.
///
/// `stub://...` is the synthetic camera; `http(s)://...` requires the
/// `capture-http` feature; anything else is a local file or directory.
pub fn open_source(settings: &CaptureSettings) -> Result<Box<dyn CaptureSource>, PipelineError> {
    let spec = settings.source.trim();
    if spec.is_empty() {
        return Err(PipelineError::capture("capture source is empty"));
    }
    if spec.starts_with("stub://") {
        return Ok(Box::new(StubCamera::new()));
    }
    if spec.starts_with("http://") || spec.starts_with("https://") {
        #[cfg(feature = "capture-http")]
        {
            return Ok(Box::new(HttpSnapshotSource::new(spec.to_string())));
        }
        #[cfg(not(feature = "capture-http"))]
        {
            return Err(PipelineError::capture(
                "http capture requires the capture-http feature",
            ));
        }
    }
    if spec.contains("://") {
        return Err(PipelineError::capture(format!(
            "unsupported capture scheme in '{}'",
            spec
        )));
    }
    Ok(Box::new(FileReplaySource::new(PathBuf::from(spec))?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_frame_release_removes_artifact() {
        let frame = CapturedFrame::from_bytes(b"jpegish").expect("temp frame");
        let path = frame.path().to_path_buf();
        assert!(path.exists());

        frame.release().expect("release");
        assert!(!path.exists());
    }

    #[test]
    fn borrowed_frame_release_keeps_file() {
        let file = tempfile::NamedTempFile::new().expect("temp");
        let path = file.path().to_path_buf();

        let frame = CapturedFrame::borrowed(path.clone());
        frame.release().expect("release");
        assert!(path.exists());
    }

    #[test]
    fn open_source_rejects_unknown_scheme() {
        let settings = CaptureSettings {
            source: "rtsp://camera".to_string(),
            target_fps: 2,
        };
        assert!(open_source(&settings).is_err());
    }

    #[test]
    fn open_source_builds_stub_camera() {
        let settings = CaptureSettings {
            source: "stub://camera".to_string(),
            target_fps: 2,
        };
        let source = open_source(&settings).expect("stub source");
        assert_eq!(source.name(), "stub");
    }
}
