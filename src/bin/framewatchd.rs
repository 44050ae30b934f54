//! framewatchd - continuous detection daemon
//!
//! 1. Loads configuration (file + env) and the class-label table
//! 2. Builds the inference backend (ONNX via tract, or the stub)
//! 3. Runs the capture/inference pipeline until interrupted
//! 4. Logs every published detection set, one line per box

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use framewatch::pipeline::DetectionSink;
use framewatch::{build_backend, DetectionSession, DetectionSet, FramewatchConfig};

#[derive(Parser, Debug)]
#[command(name = "framewatchd", about = "Continuous object-detection daemon")]
struct Args {
    /// Config file (JSON). Falls back to the FRAMEWATCH_CONFIG env var.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the capture source spec (stub://camera, a path, or a URL).
    #[arg(long)]
    source: Option<String>,

    /// Override the confidence threshold used for display filtering.
    #[arg(long)]
    threshold: Option<f32>,

    /// Exit after this many published frames (0 = run until interrupted).
    #[arg(long, default_value_t = 0)]
    frames: u64,
}

/// Logs published sets the way the on-device debug console did: one line
/// per detection with an above/below-threshold marker.
struct LogSink {
    threshold: f32,
    frames_seen: u64,
    frame_limit: u64,
    done: Arc<AtomicBool>,
}

impl DetectionSink for LogSink {
    fn publish(&mut self, set: Arc<DetectionSet>) {
        let shown = set
            .detections
            .iter()
            .filter(|d| d.confidence >= self.threshold)
            .count();
        log::info!(
            "published frame #{}: showing {}/{} detections ({}x{})",
            set.frame_index,
            shown,
            set.len(),
            set.original_width,
            set.original_height
        );
        for (i, det) in set.detections.iter().enumerate() {
            let marker = if det.confidence >= self.threshold {
                "keep"
            } else {
                "below"
            };
            log::info!(
                "  [{}] {} conf={:.1}% bbox=({:.1}, {:.1}, {:.1}, {:.1}) size={:.0}x{:.0} [{}]",
                i,
                det.class_name,
                det.confidence * 100.0,
                det.bbox.x1,
                det.bbox.y1,
                det.bbox.x2,
                det.bbox.y2,
                det.bbox.width(),
                det.bbox.height(),
                marker
            );
        }

        self.frames_seen += 1;
        if self.frame_limit > 0 && self.frames_seen >= self.frame_limit {
            self.done.store(true, Ordering::SeqCst);
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config =
        FramewatchConfig::load_with(args.config.as_deref()).context("load configuration")?;
    if let Some(source) = args.source {
        config.capture.source = source;
    }
    if let Some(threshold) = args.threshold {
        config.model.confidence_threshold = threshold.clamp(0.0, 1.0);
    }

    log::info!(
        "framewatchd starting: source={} input_size={} threshold={:.2}",
        config.capture.source,
        config.model.input_size,
        config.model.confidence_threshold
    );

    // Model-load failures are fatal here, before the loop starts.
    let backend = build_backend(&config).context("build inference backend")?;

    let done = Arc::new(AtomicBool::new(false));
    let sink = LogSink {
        threshold: config.model.confidence_threshold,
        frames_seen: 0,
        frame_limit: args.frames,
        done: done.clone(),
    };

    let mut session = DetectionSession::new(&config, backend, Box::new(sink))
        .context("assemble detection session")?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
        })
        .context("install signal handler")?;
    }

    session.start();
    while !interrupted.load(Ordering::SeqCst) && !done.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    log::info!("shutting down");
    session.stop();
    Ok(())
}
