//! Capture/inference pipeline scheduler.
//!
//! Drives the continuous capture -> preprocess -> infer -> decode cycle.
//! A dedicated capture worker owns the `CaptureSource` and serves snapshot
//! requests over channels; the loop thread awaits the frame captured during
//! the *previous* iteration, immediately pre-starts the next capture, and
//! only then runs the (slow) inference step. Capture latency for frame N+1
//! thus overlaps inference for frame N, while model invocations stay
//! strictly serialized.
//!
//! Failure policy: a bad frame aborts its own cycle only. The scheduler
//! logs, drains the pre-started capture so the next cycle starts from a
//! clean slate, and keeps looping. `stop()` is cooperative: the flag is
//! observed at the top of the next iteration, and any pending capture is
//! awaited and released, never abandoned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, sync_channel, Receiver, Sender, SyncSender};
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::cache::DetectionCache;
use crate::capture::{CaptureSource, CapturedFrame};
use crate::config::ModelConfig;
use crate::detect::{DetectionSet, InferenceBackend, ModelInput, OutputDecoder};
use crate::error::PipelineError;
use crate::preprocess;

/// Renderer boundary: receives every published detection set, in capture
/// order.
pub trait DetectionSink: Send {
    fn publish(&mut self, set: Arc<DetectionSet>);
}

/// Sink that forwards published sets into a channel.
pub struct ChannelSink {
    tx: Sender<Arc<DetectionSet>>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<Arc<DetectionSet>>) {
        let (tx, rx) = channel();
        (Self { tx }, rx)
    }
}

impl DetectionSink for ChannelSink {
    fn publish(&mut self, set: Arc<DetectionSet>) {
        // A gone receiver just means nobody is rendering; keep looping.
        let _ = self.tx.send(set);
    }
}

/// Sink that drops everything (cache-only consumers).
pub struct NullSink;

impl DetectionSink for NullSink {
    fn publish(&mut self, _set: Arc<DetectionSet>) {}
}

// ----------------------------------------------------------------------------
// Capture worker: owns the source, serves one snapshot per request
// ----------------------------------------------------------------------------

/// Handle for one outstanding snapshot request.
struct PendingCapture {
    started_at: Instant,
}

struct CaptureWorker {
    request_tx: SyncSender<()>,
    response_rx: Receiver<Result<CapturedFrame, PipelineError>>,
    handle: JoinHandle<Box<dyn CaptureSource>>,
}

impl CaptureWorker {
    fn spawn(mut source: Box<dyn CaptureSource>) -> Self {
        // Bound of 1: at most one capture may be pre-started ahead of the
        // cycle that will consume it.
        let (request_tx, request_rx) = sync_channel::<()>(1);
        let (response_tx, response_rx) = channel();
        let handle = std::thread::spawn(move || {
            while request_rx.recv().is_ok() {
                if response_tx.send(source.snapshot()).is_err() {
                    break;
                }
            }
            source
        });
        Self {
            request_tx,
            response_rx,
            handle,
        }
    }

    /// Fire-and-forget: start the next snapshot.
    fn begin(&self) -> Result<PendingCapture, PipelineError> {
        self.request_tx
            .send(())
            .map_err(|_| PipelineError::capture("capture worker exited"))?;
        Ok(PendingCapture {
            started_at: Instant::now(),
        })
    }

    /// Await a previously started snapshot.
    fn await_frame(&self, pending: PendingCapture) -> Result<CapturedFrame, PipelineError> {
        let frame = self
            .response_rx
            .recv()
            .map_err(|_| PipelineError::capture("capture worker exited"))??;
        log::trace!(
            "snapshot ready after {}ms",
            pending.started_at.elapsed().as_millis()
        );
        Ok(frame)
    }

    /// Await a pending capture we no longer want and release its artifact.
    fn discard(&self, pending: PendingCapture) {
        match self.await_frame(pending) {
            Ok(frame) => release_artifact(frame),
            Err(e) => log::warn!("discarded capture had failed: {}", e),
        }
    }

    fn shutdown(self) -> Option<Box<dyn CaptureSource>> {
        let Self {
            request_tx,
            response_rx,
            handle,
        } = self;
        // Closing the request channel ends the worker loop.
        drop(request_tx);
        drop(response_rx);
        handle.join().ok()
    }
}

fn release_artifact(frame: CapturedFrame) {
    if let Err(e) = frame.release() {
        log::warn!("{}", e);
    }
}

// ----------------------------------------------------------------------------
// Scheduler
// ----------------------------------------------------------------------------

/// Everything the loop thread needs exclusive ownership of. Handed back
/// when the loop exits so the pipeline can be restarted.
struct EngineParts {
    source: Box<dyn CaptureSource>,
    backend: Box<dyn InferenceBackend>,
    decoder: OutputDecoder,
    sink: Box<dyn DetectionSink>,
}

/// Per-cycle timing breakdown, logged the way the on-device debug console
/// reported it.
struct CycleStats {
    snapshot: Duration,
    preprocess: Duration,
    inference: Duration,
    detections: usize,
}

pub struct PipelineScheduler {
    config: Arc<RwLock<ModelConfig>>,
    cache: Arc<DetectionCache>,
    target_fps: u32,
    running: Arc<AtomicBool>,
    parts: Option<EngineParts>,
    loop_handle: Option<JoinHandle<Option<EngineParts>>>,
}

impl PipelineScheduler {
    pub fn new(
        config: Arc<RwLock<ModelConfig>>,
        cache: Arc<DetectionCache>,
        target_fps: u32,
        source: Box<dyn CaptureSource>,
        backend: Box<dyn InferenceBackend>,
        decoder: OutputDecoder,
        sink: Box<dyn DetectionSink>,
    ) -> Self {
        Self {
            config,
            cache,
            target_fps,
            running: Arc::new(AtomicBool::new(false)),
            parts: Some(EngineParts {
                source,
                backend,
                decoder,
                sink,
            }),
            loop_handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Begin the continuous detection loop. No-op when already running.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            log::debug!("start() ignored: pipeline already running");
            return;
        }
        let Some(parts) = self.parts.take() else {
            // Loop thread still winding down from a previous stop.
            self.running.store(false, Ordering::SeqCst);
            log::warn!("start() ignored: pipeline still shutting down");
            return;
        };

        let running = self.running.clone();
        let config = self.config.clone();
        let cache = self.cache.clone();
        let interval = frame_interval(self.target_fps);

        self.loop_handle = Some(std::thread::spawn(move || {
            run_loop(parts, running, config, cache, interval)
        }));
        log::info!("pipeline started");
    }

    /// Request a cooperative stop and wait for the loop to wind down. The
    /// pending pre-started capture is awaited and released, and the cache
    /// is cleared.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let Some(handle) = self.loop_handle.take() else {
            return;
        };
        match handle.join() {
            Ok(Some(parts)) => self.parts = Some(parts),
            Ok(None) => log::error!("capture worker lost; pipeline cannot be restarted"),
            Err(_) => log::error!("pipeline loop panicked; cannot be restarted"),
        }
        self.cache.clear();
        log::info!("pipeline stopped");
    }
}

impl Drop for PipelineScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    mut parts: EngineParts,
    running: Arc<AtomicBool>,
    config: Arc<RwLock<ModelConfig>>,
    cache: Arc<DetectionCache>,
    interval: Duration,
) -> Option<EngineParts> {
    if let Err(e) = parts.source.connect() {
        log::error!("capture source failed to connect: {}", e);
        running.store(false, Ordering::SeqCst);
        return Some(parts);
    }
    if let Err(e) = parts.backend.warm_up() {
        log::warn!("backend warm-up failed: {}", e);
    }

    let worker = CaptureWorker::spawn(parts.source);
    let mut pending: Option<PendingCapture> = None;
    let mut frame_counter: u64 = 0;

    while running.load(Ordering::SeqCst) {
        let cycle_start = Instant::now();
        match run_cycle(
            &worker,
            &mut pending,
            &mut parts.backend,
            &parts.decoder,
            &mut parts.sink,
            &config,
            &cache,
            frame_counter,
        ) {
            Ok(stats) => {
                let total = cycle_start.elapsed();
                log::info!(
                    "frame #{}: {} detections | snap={}ms pre={}ms infer={}ms total={}ms (~{} fps)",
                    frame_counter,
                    stats.detections,
                    stats.snapshot.as_millis(),
                    stats.preprocess.as_millis(),
                    stats.inference.as_millis(),
                    total.as_millis(),
                    fps_estimate(total),
                );
            }
            Err(e) => {
                // A single bad frame never stops the stream. Reset the
                // pre-started capture rather than carrying a possibly
                // corrupt handle into the next cycle.
                log::warn!("cycle #{} failed: {}", frame_counter, e);
                if let Some(p) = pending.take() {
                    worker.discard(p);
                }
            }
        }
        frame_counter += 1;

        if let Some(rest) = interval.checked_sub(cycle_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    // Wind-down: never abandon the pre-started capture or its temp file.
    if let Some(p) = pending.take() {
        worker.discard(p);
    }
    parts.source = worker.shutdown()?;
    Some(parts)
}

#[allow(clippy::too_many_arguments)]
fn run_cycle(
    worker: &CaptureWorker,
    pending: &mut Option<PendingCapture>,
    backend: &mut Box<dyn InferenceBackend>,
    decoder: &OutputDecoder,
    sink: &mut Box<dyn DetectionSink>,
    config: &Arc<RwLock<ModelConfig>>,
    cache: &Arc<DetectionCache>,
    frame_counter: u64,
) -> Result<CycleStats, PipelineError> {
    let started = Instant::now();

    // Await the capture pre-started last iteration, or start one now.
    let frame = match pending.take() {
        Some(p) => worker.await_frame(p)?,
        None => {
            let p = worker.begin()?;
            worker.await_frame(p)?
        }
    };
    let snapshot_time = started.elapsed();

    // Pre-start the next capture so it overlaps the inference below.
    *pending = Some(worker.begin()?);

    let result = process_frame(&frame, backend, decoder, config, frame_counter);

    // The snapshot artifact is transient either way; failing to remove it
    // is logged, never fatal.
    release_artifact(frame);

    let (set, preprocess_time, inference_time) = result?;
    let detections = set.len();

    cache.set_latest(set);
    sink.publish(cache.latest());

    Ok(CycleStats {
        snapshot: snapshot_time,
        preprocess: preprocess_time,
        inference: inference_time,
        detections,
    })
}

fn process_frame(
    frame: &CapturedFrame,
    backend: &mut Box<dyn InferenceBackend>,
    decoder: &OutputDecoder,
    config: &Arc<RwLock<ModelConfig>>,
    frame_counter: u64,
) -> Result<(DetectionSet, Duration, Duration), PipelineError> {
    let model_config = config.read().unwrap_or_else(|e| e.into_inner()).clone();

    let pre_start = Instant::now();
    let pre = preprocess::preprocess_file(frame.path(), &model_config)?;
    let preprocess_time = pre_start.elapsed();

    let infer_start = Instant::now();
    let input = ModelInput::from_preprocess(&pre, model_config.input_size);
    let outputs = backend.run(&input)?;

    let set = match decoder.decode(&outputs, &pre, frame_counter) {
        Ok(set) => set,
        // Absent output tensor degrades to an empty result, not a failure.
        Err(e) if e.is_missing_output() => {
            log::warn!("{}; publishing empty detection set", e);
            DetectionSet {
                detections: Vec::new(),
                original_width: pre.original_width,
                original_height: pre.original_height,
                frame_index: frame_counter,
            }
        }
        Err(e) => return Err(e),
    };
    let inference_time = infer_start.elapsed();

    Ok((set, preprocess_time, inference_time))
}

fn frame_interval(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::from_millis(0)
    } else {
        Duration::from_millis((1000 / target_fps).max(1) as u64)
    }
}

fn fps_estimate(cycle: Duration) -> u64 {
    let ms = cycle.as_millis().max(1) as u64;
    1000 / ms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_interval_handles_zero_fps() {
        assert_eq!(frame_interval(0), Duration::from_millis(0));
        assert_eq!(frame_interval(2), Duration::from_millis(500));
        assert_eq!(frame_interval(2000), Duration::from_millis(1));
    }

    #[test]
    fn channel_sink_forwards_sets() {
        let (mut sink, rx) = ChannelSink::new();
        sink.publish(Arc::new(DetectionSet::default()));
        assert!(rx.try_recv().is_ok());
    }
}
