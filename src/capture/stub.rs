use image::{Rgb, RgbImage};
use rand::Rng;

use super::{CaptureSource, CapturedFrame};
use crate::error::PipelineError;

const STUB_WIDTH: u32 = 320;
const STUB_HEIGHT: u32 = 240;

/// Synthetic camera: renders a noisy scene with a bright square that moves
/// between snapshots, encodes it as JPEG, and hands back a temp artifact
/// exactly like a real snapshot API would.
pub struct StubCamera {
    frame_count: u64,
}

impl StubCamera {
    pub fn new() -> Self {
        Self { frame_count: 0 }
    }

    fn render(&self) -> RgbImage {
        let mut rng = rand::thread_rng();
        let mut img = RgbImage::from_fn(STUB_WIDTH, STUB_HEIGHT, |_, _| {
            let v: u8 = rng.gen_range(20..60);
            Rgb([v, v, v])
        });

        // A 40px target that walks across the frame.
        let step = (self.frame_count % 24) as u32;
        let x0 = (step * 10) % (STUB_WIDTH - 40);
        let y0 = (step * 7) % (STUB_HEIGHT - 40);
        for y in y0..y0 + 40 {
            for x in x0..x0 + 40 {
                img.put_pixel(x, y, Rgb([230, 200, 40]));
            }
        }
        img
    }
}

impl Default for StubCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for StubCamera {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn snapshot(&mut self) -> Result<CapturedFrame, PipelineError> {
        self.frame_count += 1;
        let img = self.render();

        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Jpeg,
        )
        .map_err(|e| PipelineError::capture(format!("failed to encode stub frame: {}", e)))?;

        CapturedFrame::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_snapshot_is_a_decodable_image() {
        let mut camera = StubCamera::new();
        let frame = camera.snapshot().expect("snapshot");

        let bytes = frame.bytes().expect("read snapshot");
        let decoded = image::load_from_memory(&bytes).expect("decode snapshot");
        assert_eq!(decoded.width(), STUB_WIDTH);
        assert_eq!(decoded.height(), STUB_HEIGHT);

        frame.release().expect("release");
    }
}
