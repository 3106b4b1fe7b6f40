//! Debounced background preview rendering.
//!
//! The [`PreviewScheduler`] is owned by the thread that handles user input.
//! Every parameter change is passed to [`request`](PreviewScheduler::request),
//! which only remembers the newest request and (re)arms a debounce timer. Once
//! the input has been quiet for the debounce delay,
//! [`poll`](PreviewScheduler::poll) hands the newest request to the render
//! worker. Finished renders travel back over a channel and are applied on the
//! owning thread, newest only: a result whose sequence number is not the most
//! recently submitted one is dropped.
//!
//! Clock values are passed in explicitly so tests and event loops drive time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use decal_core::logging::targets;
use decal_core::{Debouncer, Worker};
use decal_render::{LayoutEngine, RenderError, RenderRequest};
use image::RgbaImage;
use image::imageops::{self, FilterType};

use crate::error::ExportResult;

/// Quiet period before a changed preview is rendered.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

/// Panel edges below this are treated as not laid out yet.
const MIN_PANEL_EDGE: u32 = 200;
/// Assumed panel edge before layout.
const FALLBACK_PANEL_EDGE: u32 = 500;
/// Smallest displayed preview edge.
const MIN_DISPLAY_EDGE: u32 = 100;

/// Edge length at which a `canvas_size` preview is shown in a panel of
/// `panel` (width, height) pixels.
///
/// The preview is never enlarged beyond the canvas, and never shrunk below
/// 100 pixels.
pub fn display_size(canvas_size: u32, panel: (u32, u32)) -> u32 {
    let edge = |v: u32| if v < MIN_PANEL_EDGE { FALLBACK_PANEL_EDGE } else { v };
    let available = edge(panel.0).min(edge(panel.1));
    let scale = (f64::from(available) / f64::from(canvas_size)).min(1.0);
    ((f64::from(canvas_size) * scale).floor() as u32).max(MIN_DISPLAY_EDGE)
}

/// The color image composited over the checkerboard and scaled to
/// `display` pixels.
pub fn compose_preview(engine: &LayoutEngine, color: &RgbaImage, display: u32) -> RgbaImage {
    let size = color.width();
    let mut composed = engine.checkerboard(size);
    imageops::overlay(&mut composed, color, 0, 0);
    if display == size {
        composed
    } else {
        imageops::resize(&composed, display, display, FilterType::Lanczos3)
    }
}

/// Orders submitted renders so only the newest result is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceGate {
    latest_submitted: u64,
    last_applied: u64,
}

impl SequenceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the sequence number for a new submission.
    pub fn next(&mut self) -> u64 {
        self.latest_submitted += 1;
        self.latest_submitted
    }

    pub fn latest_submitted(&self) -> u64 {
        self.latest_submitted
    }

    pub fn last_applied(&self) -> u64 {
        self.last_applied
    }

    /// Whether a result for `sequence` may replace the current preview.
    pub fn should_apply(&self, sequence: u64) -> bool {
        sequence == self.latest_submitted && sequence > self.last_applied
    }

    pub fn mark_applied(&mut self, sequence: u64) {
        self.last_applied = self.last_applied.max(sequence);
    }
}

/// What the scheduler is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewState {
    Idle,
    /// A change is waiting out the debounce delay.
    Pending,
    /// Renders are queued or running on the worker.
    Rendering,
}

/// A rendered, display-ready preview.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub sequence: u64,
    pub request: RenderRequest,
    /// Checkerboard composite, `display_size` pixels square.
    pub image: RgbaImage,
    pub display_size: u32,
    pub used_fallback_font: bool,
    pub rendered_in: Duration,
}

/// Counters kept by the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewStats {
    /// Renders handed to the worker.
    pub submitted: u64,
    /// Results that became the current preview.
    pub applied: u64,
    /// Results dropped, or renders skipped, because a newer request existed.
    pub stale: u64,
    /// Renders that failed.
    pub failed: u64,
}

enum Outcome {
    Frame(PreviewFrame),
    Skipped,
    Failed(RenderError),
}

struct Finished {
    sequence: u64,
    outcome: Outcome,
}

/// Debounces preview requests and renders the newest on a worker.
pub struct PreviewScheduler {
    engine: Arc<LayoutEngine>,
    worker: Arc<Worker>,
    debounce: Debouncer,
    pending: Option<(RenderRequest, (u32, u32))>,
    gate: SequenceGate,
    /// Newest submitted sequence, readable from the worker.
    latest: Arc<AtomicU64>,
    in_flight: usize,
    tx: Sender<Finished>,
    rx: Receiver<Finished>,
    current: Option<PreviewFrame>,
    stats: PreviewStats,
}

impl PreviewScheduler {
    pub fn new(engine: Arc<LayoutEngine>, worker: Arc<Worker>, debounce: Duration) -> Self {
        let (tx, rx) = unbounded();
        Self {
            engine,
            worker,
            debounce: Debouncer::new(debounce),
            pending: None,
            gate: SequenceGate::new(),
            latest: Arc::new(AtomicU64::new(0)),
            in_flight: 0,
            tx,
            rx,
            current: None,
            stats: PreviewStats::default(),
        }
    }

    /// Record a parameter change. Replaces any request still waiting out the
    /// debounce delay and restarts the delay from `now`.
    pub fn request(&mut self, request: RenderRequest, panel: (u32, u32), now: Instant) {
        self.pending = Some((request, panel));
        self.debounce.trigger(now);
    }

    /// Submit the pending request if the debounce delay has elapsed, then
    /// apply finished renders.
    ///
    /// Returns `true` if a new frame became current.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.debounce.fire_if_due(now) {
            self.submit_pending();
        }
        self.drain()
    }

    /// Submit the pending request immediately, skipping the rest of the
    /// debounce delay.
    pub fn flush(&mut self) {
        self.debounce.cancel();
        self.submit_pending();
    }

    /// Block until a new frame is applied, driving the debounce timer with
    /// the real clock. Returns `false` on timeout or when nothing is left to
    /// wait for.
    pub fn wait_for_frame(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if self.poll(now) {
                return true;
            }
            if now >= deadline {
                return false;
            }
            let remaining = deadline - now;
            if let Some(until_fire) = self.debounce.time_until_fire(now) {
                std::thread::sleep(until_fire.min(remaining));
                continue;
            }
            if self.in_flight == 0 {
                return false;
            }
            match self.rx.recv_timeout(remaining) {
                Ok(finished) => {
                    if self.finish(finished) {
                        return true;
                    }
                }
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    pub fn state(&self) -> PreviewState {
        if self.debounce.is_pending() {
            PreviewState::Pending
        } else if self.in_flight > 0 {
            PreviewState::Rendering
        } else {
            PreviewState::Idle
        }
    }

    /// Time until the debounce delay elapses, `None` when nothing is pending.
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        self.debounce.time_until_fire(now)
    }

    /// The newest applied preview.
    pub fn current(&self) -> Option<&PreviewFrame> {
        self.current.as_ref()
    }

    pub fn stats(&self) -> PreviewStats {
        self.stats
    }

    fn submit_pending(&mut self) {
        let Some((request, panel)) = self.pending.take() else {
            return;
        };
        let sequence = self.gate.next();
        self.latest.store(sequence, Ordering::Release);

        let engine = Arc::clone(&self.engine);
        let latest = Arc::clone(&self.latest);
        let tx = self.tx.clone();
        let submitted = self.worker.send(move || {
            let outcome = if latest.load(Ordering::Acquire) != sequence {
                Outcome::Skipped
            } else {
                render_frame(&engine, sequence, request, panel)
            };
            let _ = tx.send(Finished { sequence, outcome });
        });

        match submitted {
            Ok(()) => {
                self.in_flight += 1;
                self.stats.submitted += 1;
                tracing::debug!(target: targets::PREVIEW, sequence, "preview submitted");
            }
            Err(e) => {
                self.stats.failed += 1;
                tracing::error!(target: targets::PREVIEW, sequence, error = %e, "preview not submitted");
            }
        }
    }

    fn drain(&mut self) -> bool {
        let mut applied = false;
        while let Ok(finished) = self.rx.try_recv() {
            applied |= self.finish(finished);
        }
        applied
    }

    fn finish(&mut self, finished: Finished) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        let sequence = finished.sequence;
        match finished.outcome {
            Outcome::Frame(frame) if self.gate.should_apply(sequence) => {
                self.gate.mark_applied(sequence);
                self.stats.applied += 1;
                tracing::debug!(
                    target: targets::PREVIEW,
                    sequence,
                    rendered_ms = frame.rendered_in.as_secs_f64() * 1000.0,
                    "preview applied"
                );
                self.current = Some(frame);
                true
            }
            Outcome::Frame(_) | Outcome::Skipped => {
                self.stats.stale += 1;
                tracing::trace!(
                    target: targets::PREVIEW,
                    sequence,
                    latest = self.gate.latest_submitted(),
                    "stale preview dropped"
                );
                false
            }
            Outcome::Failed(e) => {
                self.stats.failed += 1;
                tracing::error!(target: targets::PREVIEW, sequence, error = %e, "preview render failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for PreviewScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewScheduler")
            .field("state", &self.state())
            .field("gate", &self.gate)
            .field("in_flight", &self.in_flight)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn render_frame(
    engine: &LayoutEngine,
    sequence: u64,
    request: RenderRequest,
    panel: (u32, u32),
) -> Outcome {
    let start = Instant::now();
    match engine.render(&request) {
        Ok(rendered) => {
            let display = display_size(request.canvas_size, panel);
            let image = compose_preview(engine, &rendered.color, display);
            Outcome::Frame(PreviewFrame {
                sequence,
                request,
                image,
                display_size: display,
                used_fallback_font: rendered.used_fallback_font,
                rendered_in: start.elapsed(),
            })
        }
        Err(e) => Outcome::Failed(e),
    }
}

/// Render `request` once, synchronously, as the preview panel would show it.
pub fn render_preview(
    engine: &LayoutEngine,
    request: &RenderRequest,
    panel: (u32, u32),
) -> ExportResult<RgbaImage> {
    let rendered = engine.render(request)?;
    let display = display_size(request.canvas_size, panel);
    Ok(compose_preview(engine, &rendered.color, display))
}
