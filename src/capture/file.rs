use std::path::PathBuf;

use super::{CaptureSource, CapturedFrame};
use crate::error::PipelineError;

const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "JPG"];

/// Replay a single image file, or cycle through a directory of images in
/// sorted order. Replayed files are borrowed, never deleted.
pub struct FileReplaySource {
    frames: Vec<PathBuf>,
    cursor: usize,
}

impl FileReplaySource {
    pub fn new(path: PathBuf) -> Result<Self, PipelineError> {
        let frames = if path.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(&path)
                .map_err(|e| {
                    PipelineError::capture(format!(
                        "failed to read frame directory {}: {}",
                        path.display(),
                        e
                    ))
                })?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    p.extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext))
                })
                .collect();
            entries.sort();
            entries
        } else if path.is_file() {
            vec![path.clone()]
        } else {
            return Err(PipelineError::capture(format!(
                "capture path {} does not exist",
                path.display()
            )));
        };

        if frames.is_empty() {
            return Err(PipelineError::capture(format!(
                "no image files found under {}",
                path.display()
            )));
        }

        Ok(Self { frames, cursor: 0 })
    }
}

impl CaptureSource for FileReplaySource {
    fn name(&self) -> &'static str {
        "file"
    }

    fn snapshot(&mut self) -> Result<CapturedFrame, PipelineError> {
        let path = self.frames[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.frames.len();
        Ok(CapturedFrame::borrowed(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn cycles_through_directory_in_sorted_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        for name in ["b.jpg", "a.jpg", "notes.txt"] {
            let mut f = std::fs::File::create(dir.path().join(name)).expect("create");
            f.write_all(b"x").expect("write");
        }

        let mut source = FileReplaySource::new(dir.path().to_path_buf()).expect("source");
        let first = source.snapshot().expect("snapshot");
        let second = source.snapshot().expect("snapshot");
        let third = source.snapshot().expect("snapshot");

        assert!(first.path().ends_with("a.jpg"));
        assert!(second.path().ends_with("b.jpg"));
        assert!(third.path().ends_with("a.jpg"));
    }

    #[test]
    fn missing_path_is_a_capture_error() {
        let err = FileReplaySource::new(PathBuf::from("/nonexistent/frames")).unwrap_err();
        assert!(matches!(err, PipelineError::Capture(_)));
    }
}
