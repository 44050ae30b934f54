//! Detection session: the explicit context object for one camera/model
//! pair.
//!
//! Owns the model config, label table, decoder, detection cache and the
//! pipeline scheduler. No ambient/static state: multiple sessions can
//! coexist, and tests construct throwaway sessions freely.

use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};

use crate::cache::DetectionCache;
use crate::capture::{self, CaptureSource};
use crate::config::{FramewatchConfig, ModelConfig, ModelVariant};
use crate::detect::{Detection, DetectionSet, InferenceBackend, OutputDecoder, StubBackend};
use crate::error::PipelineError;
use crate::labels::LabelTable;
use crate::pipeline::{DetectionSink, PipelineScheduler};

pub struct DetectionSession {
    config: Arc<RwLock<ModelConfig>>,
    cache: Arc<DetectionCache>,
    scheduler: PipelineScheduler,
}

impl DetectionSession {
    /// Assemble a session from configuration plus the two boundary
    /// collaborators. Fails (before any loop starts) when labels cannot be
    /// read or the capture source spec is invalid; backend construction
    /// errors are the caller's, via `build_backend`.
    pub fn new(
        config: &FramewatchConfig,
        backend: Box<dyn InferenceBackend>,
        sink: Box<dyn DetectionSink>,
    ) -> Result<Self> {
        let source = capture::open_source(&config.capture).context("open capture source")?;
        Self::with_source(config, source, backend, sink)
    }

    /// Like `new`, with an explicit capture source (tests inject fakes).
    pub fn with_source(
        config: &FramewatchConfig,
        source: Box<dyn CaptureSource>,
        backend: Box<dyn InferenceBackend>,
        sink: Box<dyn DetectionSink>,
    ) -> Result<Self> {
        let labels = load_labels(config)?;
        log::info!(
            "session: variant={:?} input_size={} labels={} backend={}",
            config.decoder.variant,
            config.model.input_size,
            labels.len(),
            backend.name()
        );

        let decoder = OutputDecoder::new(config.decoder.clone(), labels);
        let model_config = Arc::new(RwLock::new(config.model.clone()));
        let cache = Arc::new(DetectionCache::new());

        let scheduler = PipelineScheduler::new(
            model_config.clone(),
            cache.clone(),
            config.capture.target_fps,
            source,
            backend,
            decoder,
            sink,
        );

        Ok(Self {
            config: model_config,
            cache,
            scheduler,
        })
    }

    pub fn start(&mut self) {
        self.scheduler.start();
    }

    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Update the user-facing confidence threshold and immediately refilter
    /// the cached set. No preprocessing or inference is re-run.
    pub fn set_confidence_threshold(&self, threshold: f32) -> Vec<Detection> {
        let threshold = threshold.clamp(0.0, 1.0);
        {
            let mut config = self.config.write().unwrap_or_else(|e| e.into_inner());
            config.confidence_threshold = threshold;
        }
        let filtered = self.cache.apply_threshold(threshold);
        log::info!(
            "threshold set to {:.0}%, showing {}/{} detections",
            threshold * 100.0,
            filtered.len(),
            self.cache.latest().len()
        );
        filtered
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.config
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .confidence_threshold
    }

    /// Cached detections at the current threshold.
    pub fn current_detections(&self) -> Vec<Detection> {
        self.cache.apply_threshold(self.confidence_threshold())
    }

    /// Full unfiltered set from the last completed cycle, with frame
    /// dimensions for the renderer.
    pub fn latest(&self) -> Arc<DetectionSet> {
        self.cache.latest()
    }

    pub fn cache(&self) -> Arc<DetectionCache> {
        self.cache.clone()
    }
}

/// Build the inference backend the configuration asks for.
///
/// With `backend-tract` and a resolvable model path this loads the ONNX
/// model; load failures surface here, before `start()`. Otherwise it
/// falls back to the synthetic stub so the pipeline can run model-less.
pub fn build_backend(config: &FramewatchConfig) -> Result<Box<dyn InferenceBackend>, PipelineError> {
    #[cfg(feature = "backend-tract")]
    {
        if !config.model_settings.model_paths.is_empty() {
            let path = config
                .model_settings
                .resolve_model_path()
                .map_err(|e| PipelineError::ModelLoad(e.to_string()))?;
            let (aux_inputs, output_names) = match config.decoder.variant {
                ModelVariant::RawAnchor { .. } => (
                    false,
                    vec![
                        config.decoder.boxes_tensor.clone(),
                        config.decoder.scores_tensor.clone(),
                    ],
                ),
                ModelVariant::PreSuppressed => (
                    true,
                    vec![
                        config.decoder.records_tensor.clone(),
                        config.decoder.valid_count_tensor.clone(),
                    ],
                ),
            };
            log::info!("loading ONNX model from {}", path.display());
            let backend = crate::detect::TractBackend::new(
                path,
                config.model.input_size,
                aux_inputs,
                output_names,
            )?;
            return Ok(Box::new(backend));
        }
        log::warn!("no model path configured; using stub backend");
    }

    match config.decoder.variant {
        ModelVariant::RawAnchor {
            num_anchors,
            num_classes,
        } => Ok(Box::new(StubBackend::synthetic(num_anchors, num_classes))),
        ModelVariant::PreSuppressed => {
            // Valid-count zero: the stub reports "nothing detected" without
            // tripping the missing-output path every cycle.
            let mut outputs = crate::detect::ModelOutputs::new();
            outputs.insert(
                config.decoder.records_tensor.clone(),
                crate::detect::TensorData::new(Vec::new(), vec![0, 6]),
            );
            outputs.insert(
                config.decoder.valid_count_tensor.clone(),
                crate::detect::TensorData::new(vec![0.0], vec![1]),
            );
            Ok(Box::new(StubBackend::canned(outputs)))
        }
    }
}

fn load_labels(config: &FramewatchConfig) -> Result<LabelTable> {
    match &config.model_settings.label_path {
        Some(path) => LabelTable::load(path).context("load label file"),
        None => Ok(LabelTable::new(config.model_settings.labels.clone())),
    }
}
