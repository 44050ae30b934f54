//! detect_image - one-shot detection on an image file
//!
//! Runs the same preprocess -> infer -> decode path as the live pipeline
//! against a single image, then prints the detections (text or JSON).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use framewatch::{
    build_backend, FramewatchConfig, LabelTable, ModelInput, OutputDecoder,
};

#[derive(Parser, Debug)]
#[command(name = "detect_image", about = "One-shot object detection on an image")]
struct Args {
    /// Image file (JPEG or PNG).
    image: PathBuf,

    /// Config file (JSON). Falls back to the FRAMEWATCH_CONFIG env var.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Confidence threshold for the printed results.
    #[arg(long)]
    threshold: Option<f32>,

    /// Emit the detections as JSON instead of text lines.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config =
        FramewatchConfig::load_with(args.config.as_deref()).context("load configuration")?;
    let threshold = args
        .threshold
        .unwrap_or(config.model.confidence_threshold)
        .clamp(0.0, 1.0);

    let labels = match &config.model_settings.label_path {
        Some(path) => LabelTable::load(path).context("load label file")?,
        None => LabelTable::new(config.model_settings.labels.clone()),
    };
    let decoder = OutputDecoder::new(config.decoder.clone(), labels);
    let mut backend = build_backend(&config).context("build inference backend")?;

    let pre = framewatch::preprocess_file(&args.image, &config.model)
        .with_context(|| format!("preprocess {}", args.image.display()))?;

    let input = ModelInput::from_preprocess(&pre, config.model.input_size);
    let outputs = backend.run(&input).context("run inference")?;
    let set = decoder
        .decode(&outputs, &pre, 0)
        .context("decode model output")?;

    let shown: Vec<_> = set
        .detections
        .iter()
        .filter(|d| d.confidence >= threshold)
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
    } else {
        println!(
            "{}x{}: {}/{} detections at threshold {:.2}",
            set.original_width,
            set.original_height,
            shown.len(),
            set.len(),
            threshold
        );
        for det in shown {
            println!(
                "  {} conf={:.1}% bbox=({:.1}, {:.1}, {:.1}, {:.1})",
                det.class_name,
                det.confidence * 100.0,
                det.bbox.x1,
                det.bbox.y1,
                det.bbox.x2,
                det.bbox.y2
            );
        }
    }
    Ok(())
}
