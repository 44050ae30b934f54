use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_INPUT_SIZE: u32 = 320;
const DEFAULT_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const DEFAULT_STD: [f32; 3] = [0.229, 0.224, 0.225];
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_PRE_NMS_SCORE_FLOOR: f32 = 0.3;
const DEFAULT_NMS_IOU_THRESHOLD: f32 = 0.5;
const DEFAULT_NUM_ANCHORS: usize = 2125;
const DEFAULT_NUM_CLASSES: usize = 2;
const DEFAULT_BOXES_TENSOR: &str = "boxes";
const DEFAULT_SCORES_TENSOR: &str = "scores";
const DEFAULT_RECORDS_TENSOR: &str = "multiclass_nms3_0.tmp_0";
const DEFAULT_VALID_COUNT_TENSOR: &str = "multiclass_nms3_0.tmp_2";
const DEFAULT_CAPTURE_SOURCE: &str = "stub://camera";
const DEFAULT_TARGET_FPS: u32 = 2;

#[derive(Debug, Deserialize, Default)]
struct FramewatchConfigFile {
    model: Option<ModelConfigFile>,
    decoder: Option<DecoderConfigFile>,
    capture: Option<CaptureConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    input_size: Option<u32>,
    mean: Option<[f32; 3]>,
    std: Option<[f32; 3]>,
    confidence_threshold: Option<f32>,
    model_paths: Option<Vec<String>>,
    label_path: Option<String>,
    labels: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct DecoderConfigFile {
    variant: Option<String>,
    num_anchors: Option<usize>,
    num_classes: Option<usize>,
    pre_nms_score_floor: Option<f32>,
    nms_iou_threshold: Option<f32>,
    boxes_tensor: Option<String>,
    scores_tensor: Option<String>,
    records_tensor: Option<String>,
    valid_count_tensor: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    source: Option<String>,
    target_fps: Option<u32>,
}

/// Per-model normalization and input-shape parameters.
///
/// Owned by the session; `confidence_threshold` is the only field mutated
/// after startup (threshold-change requests from the UI boundary).
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub input_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub confidence_threshold: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            mean: DEFAULT_MEAN,
            std: DEFAULT_STD,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Which post-processing the model performs on-device.
///
/// Selected once at configuration time; never re-detected per frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelVariant {
    /// Model emits raw per-anchor boxes and scores; the decoder rescales
    /// and runs per-class NMS itself.
    RawAnchor { num_anchors: usize, num_classes: usize },
    /// Model emits an already-suppressed `[class_id, conf, x1, y1, x2, y2]`
    /// record list plus a valid count.
    PreSuppressed,
}

/// Decoder settings: variant, suppression thresholds, tensor names.
///
/// The thresholds here are fixed per model. The user-facing confidence
/// threshold lives in `ModelConfig` and is applied by the refilter step.
#[derive(Debug, Clone)]
pub struct DecoderSettings {
    pub variant: ModelVariant,
    pub pre_nms_score_floor: f32,
    pub nms_iou_threshold: f32,
    pub boxes_tensor: String,
    pub scores_tensor: String,
    pub records_tensor: String,
    pub valid_count_tensor: String,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            variant: ModelVariant::RawAnchor {
                num_anchors: DEFAULT_NUM_ANCHORS,
                num_classes: DEFAULT_NUM_CLASSES,
            },
            pre_nms_score_floor: DEFAULT_PRE_NMS_SCORE_FLOOR,
            nms_iou_threshold: DEFAULT_NMS_IOU_THRESHOLD,
            boxes_tensor: DEFAULT_BOXES_TENSOR.to_string(),
            scores_tensor: DEFAULT_SCORES_TENSOR.to_string(),
            records_tensor: DEFAULT_RECORDS_TENSOR.to_string(),
            valid_count_tensor: DEFAULT_VALID_COUNT_TENSOR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelSettings {
    /// Candidate model file locations, tried in order.
    pub model_paths: Vec<String>,
    pub label_path: Option<PathBuf>,
    /// Inline label fallback when no label file is configured.
    pub labels: Vec<String>,
}

impl ModelSettings {
    /// First existing candidate path, or an error naming everything tried.
    pub fn resolve_model_path(&self) -> Result<PathBuf> {
        for candidate in &self.model_paths {
            let path = Path::new(candidate);
            if path.exists() {
                return Ok(path.to_path_buf());
            }
        }
        Err(anyhow!(
            "model file not found; tried: [{}]",
            self.model_paths.join(", ")
        ))
    }
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Source spec: `stub://...`, a filesystem path, or (with the
    /// `capture-http` feature) an http(s) snapshot URL.
    pub source: String,
    pub target_fps: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            source: DEFAULT_CAPTURE_SOURCE.to_string(),
            target_fps: DEFAULT_TARGET_FPS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FramewatchConfig {
    pub model: ModelConfig,
    pub model_settings: ModelSettings,
    pub decoder: DecoderSettings,
    pub capture: CaptureSettings,
}

impl FramewatchConfig {
    /// Load from the file named by `FRAMEWATCH_CONFIG` (JSON), then apply
    /// env overrides, then validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FRAMEWATCH_CONFIG").ok();
        Self::load_with(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit config path (CLI override), same env-override
    /// and validation pass as `load`.
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: FramewatchConfigFile) -> Result<Self> {
        let model_file = file.model.unwrap_or_default();
        let decoder_file = file.decoder.unwrap_or_default();
        let capture_file = file.capture.unwrap_or_default();

        let model = ModelConfig {
            input_size: model_file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
            mean: model_file.mean.unwrap_or(DEFAULT_MEAN),
            std: model_file.std.unwrap_or(DEFAULT_STD),
            confidence_threshold: model_file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
        };

        let variant = match decoder_file.variant.as_deref() {
            None | Some("raw_anchor") => ModelVariant::RawAnchor {
                num_anchors: decoder_file.num_anchors.unwrap_or(DEFAULT_NUM_ANCHORS),
                num_classes: decoder_file.num_classes.unwrap_or(DEFAULT_NUM_CLASSES),
            },
            Some("pre_suppressed") => ModelVariant::PreSuppressed,
            Some(other) => {
                return Err(anyhow!(
                    "unknown decoder variant '{}'; expected raw_anchor or pre_suppressed",
                    other
                ))
            }
        };

        let decoder = DecoderSettings {
            variant,
            pre_nms_score_floor: decoder_file
                .pre_nms_score_floor
                .unwrap_or(DEFAULT_PRE_NMS_SCORE_FLOOR),
            nms_iou_threshold: decoder_file
                .nms_iou_threshold
                .unwrap_or(DEFAULT_NMS_IOU_THRESHOLD),
            boxes_tensor: decoder_file
                .boxes_tensor
                .unwrap_or_else(|| DEFAULT_BOXES_TENSOR.to_string()),
            scores_tensor: decoder_file
                .scores_tensor
                .unwrap_or_else(|| DEFAULT_SCORES_TENSOR.to_string()),
            records_tensor: decoder_file
                .records_tensor
                .unwrap_or_else(|| DEFAULT_RECORDS_TENSOR.to_string()),
            valid_count_tensor: decoder_file
                .valid_count_tensor
                .unwrap_or_else(|| DEFAULT_VALID_COUNT_TENSOR.to_string()),
        };

        let model_settings = ModelSettings {
            model_paths: model_file.model_paths.unwrap_or_default(),
            label_path: model_file.label_path.map(PathBuf::from),
            labels: model_file.labels.unwrap_or_default(),
        };

        let capture = CaptureSettings {
            source: capture_file
                .source
                .unwrap_or_else(|| DEFAULT_CAPTURE_SOURCE.to_string()),
            target_fps: capture_file.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
        };

        Ok(Self {
            model,
            model_settings,
            decoder,
            capture,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("FRAMEWATCH_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model_settings.model_paths = vec![path];
            }
        }
        if let Ok(path) = std::env::var("FRAMEWATCH_LABEL_PATH") {
            if !path.trim().is_empty() {
                self.model_settings.label_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(source) = std::env::var("FRAMEWATCH_CAPTURE_SOURCE") {
            if !source.trim().is_empty() {
                self.capture.source = source;
            }
        }
        if let Ok(fps) = std::env::var("FRAMEWATCH_TARGET_FPS") {
            let fps: u32 = fps
                .parse()
                .map_err(|_| anyhow!("FRAMEWATCH_TARGET_FPS must be an integer"))?;
            self.capture.target_fps = fps;
        }
        if let Ok(threshold) = std::env::var("FRAMEWATCH_CONFIDENCE_THRESHOLD") {
            let threshold: f32 = threshold
                .parse()
                .map_err(|_| anyhow!("FRAMEWATCH_CONFIDENCE_THRESHOLD must be a float"))?;
            self.model.confidence_threshold = threshold;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.model.input_size == 0 {
            return Err(anyhow!("input_size must be greater than zero"));
        }
        for (c, std) in self.model.std.iter().enumerate() {
            if *std <= 0.0 {
                return Err(anyhow!("std[{}] must be positive, got {}", c, std));
            }
        }
        if !(0.0..=1.0).contains(&self.model.confidence_threshold) {
            return Err(anyhow!(
                "confidence_threshold must be within [0, 1], got {}",
                self.model.confidence_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.decoder.pre_nms_score_floor) {
            return Err(anyhow!(
                "pre_nms_score_floor must be within [0, 1], got {}",
                self.decoder.pre_nms_score_floor
            ));
        }
        if !(0.0..=1.0).contains(&self.decoder.nms_iou_threshold) {
            return Err(anyhow!(
                "nms_iou_threshold must be within [0, 1], got {}",
                self.decoder.nms_iou_threshold
            ));
        }
        if let ModelVariant::RawAnchor {
            num_anchors,
            num_classes,
        } = self.decoder.variant
        {
            if num_anchors == 0 || num_classes == 0 {
                return Err(anyhow!(
                    "raw_anchor variant requires non-zero num_anchors and num_classes"
                ));
            }
        }
        Ok(())
    }
}

impl Default for FramewatchConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            model_settings: ModelSettings::default(),
            decoder: DecoderSettings::default(),
            capture: CaptureSettings::default(),
        }
    }
}

fn read_config_file(path: &Path) -> Result<FramewatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
