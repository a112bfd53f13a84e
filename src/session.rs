// ============================================================================
// FILL SESSION — single-flight guard around the working image and history
// ============================================================================
//
// State machine:  Idle --accept--> Running --complete | timeout--> Idle
//
// All shared state (current image, history, the running fill) sits behind one
// mutex. Each accepted request gets a ticket; whichever of the worker or the
// watchdog settles that ticket first wins, the other becomes a no-op.
//
// Lock order is sink, then session. Snapshots are recorded while the sink is
// held; settling never touches the sink.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::components::HistoryStack;
use crate::error::FillError;
use crate::ops::color_metric::to_threshold;
use crate::ops::{FillAnimation, FillEvent, FillOutcome, flood_fill};
use crate::raster::{Color, Connectivity, PixelBuffer, RasterImage};
use crate::settings::FillSettings;

/// One fill request in image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FillRequest {
    pub x: i64,
    pub y: i64,
    pub color: Color,
    /// 0-100
    pub tolerance: u8,
}

impl FillRequest {
    pub fn new(x: i64, y: i64, color: Color, tolerance: u8) -> Self {
        Self {
            x,
            y,
            color,
            tolerance: tolerance.min(100),
        }
    }

    pub fn threshold(&self) -> u8 {
        to_threshold(self.tolerance)
    }

    /// History label for this request.
    pub fn describe(&self) -> String {
        format!("Fill {} at ({}, {})", self.color, self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillSessionState {
    Idle,
    Running,
}

/// Result of a synchronous fill.
#[derive(Clone, Debug)]
pub struct FillReport {
    /// The filled image, or the unmodified one on any no-op or rejection.
    pub image: RasterImage,
    pub outcome: FillOutcome,
}

struct ActiveFill {
    ticket: u64,
    request: FillRequest,
    start: RasterImage,
    /// Most recent snapshot from the animated worker.
    latest: Option<RasterImage>,
}

struct SessionShared {
    image: RasterImage,
    history: HistoryStack,
    active: Option<ActiveFill>,
    next_ticket: u64,
}

enum Commit {
    Image(RasterImage),
    Latest,
    Nothing,
}

/// Owner of one editable image. Clones share the same session.
#[derive(Clone)]
pub struct FillSession {
    shared: Arc<Mutex<SessionShared>>,
    settings: FillSettings,
}

impl FillSession {
    pub fn new(image: RasterImage, settings: FillSettings) -> Self {
        let history = HistoryStack::with_initial(image.clone(), settings.max_history);
        Self {
            shared: Arc::new(Mutex::new(SessionShared {
                image,
                history,
                active: None,
                next_ticket: 1,
            })),
            settings,
        }
    }

    pub fn settings(&self) -> &FillSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, SessionShared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> FillSessionState {
        if self.lock().active.is_some() {
            FillSessionState::Running
        } else {
            FillSessionState::Idle
        }
    }

    pub fn current_image(&self) -> RasterImage {
        self.lock().image.clone()
    }

    pub fn can_undo(&self) -> bool {
        self.lock().history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.lock().history.can_redo()
    }

    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    /// History labels, oldest first.
    pub fn history_descriptions(&self) -> Vec<String> {
        self.lock().history.descriptions()
    }

    /// Step back one history entry. Refused while a fill is running.
    pub fn undo(&self) -> Option<RasterImage> {
        let mut shared = self.lock();
        if shared.active.is_some() {
            return None;
        }
        let image = shared.history.undo()?;
        shared.image = image.clone();
        Some(image)
    }

    /// Step forward one history entry. Refused while a fill is running.
    pub fn redo(&self) -> Option<RasterImage> {
        let mut shared = self.lock();
        if shared.active.is_some() {
            return None;
        }
        let image = shared.history.redo()?;
        shared.image = image.clone();
        Some(image)
    }

    /// Return to the image the session was opened with.
    pub fn reset(&self) -> Option<RasterImage> {
        let mut shared = self.lock();
        if shared.active.is_some() {
            return None;
        }
        let image = shared.history.reset()?;
        shared.image = image.clone();
        Some(image)
    }

    // ------------------------------------------------------------------------
    // Ticket lifecycle
    // ------------------------------------------------------------------------

    /// Idle -> Running. Returns the ticket and the image to fill.
    fn begin(&self, request: FillRequest) -> Result<(u64, RasterImage), FillError> {
        let mut shared = self.lock();
        if shared.active.is_some() {
            log_warn!("{} rejected: a fill is already running", request.describe());
            return Err(FillError::AlreadyRunning);
        }
        let ticket = shared.next_ticket;
        shared.next_ticket += 1;
        let start = shared.image.clone();
        shared.active = Some(ActiveFill {
            ticket,
            request,
            start: start.clone(),
            latest: None,
        });
        log_info!(fill = ticket; "accepted {}", request.describe());
        Ok((ticket, start))
    }

    /// Remember `snapshot` as the newest state of `ticket`. Returns `false` once
    /// the ticket is settled.
    fn record_progress(&self, ticket: u64, snapshot: &RasterImage) -> bool {
        let mut shared = self.lock();
        match shared.active.as_mut() {
            Some(active) if active.ticket == ticket => {
                active.latest = Some(snapshot.clone());
                true
            }
            _ => false,
        }
    }

    /// Running -> Idle for `ticket`. Returns `false` if that ticket was already
    /// settled.
    fn settle(&self, ticket: u64, commit: Commit) -> bool {
        let mut shared = self.lock();
        let active = match shared.active.take() {
            Some(a) if a.ticket == ticket => a,
            other => {
                shared.active = other;
                return false;
            }
        };
        let image = match commit {
            Commit::Image(image) => Some(image),
            Commit::Latest => active.latest,
            Commit::Nothing => None,
        };
        if let Some(image) = image
            && !image.same_pixels(&active.start)
        {
            shared.history.push_labeled(image.clone(), active.request.describe());
            shared.image = image;
        }
        true
    }

    // ------------------------------------------------------------------------
    // Synchronous fill
    // ------------------------------------------------------------------------

    /// Run a fill on the caller's thread.
    pub fn fill(&self, request: FillRequest) -> FillReport {
        let (ticket, source) = match self.begin(request) {
            Ok(v) => v,
            Err(e) => {
                return FillReport {
                    image: self.current_image(),
                    outcome: FillOutcome::Rejected(e),
                };
            }
        };

        let (image, outcome) = run_sync(&source, &request, self.settings.sync_connectivity);
        let commit = if outcome.changed_image() {
            Commit::Image(image.clone())
        } else {
            Commit::Nothing
        };
        self.settle(ticket, commit);
        log_info!(fill = ticket; "{}: {}", request.describe(), outcome);
        FillReport { image, outcome }
    }

    // ------------------------------------------------------------------------
    // Animated fill
    // ------------------------------------------------------------------------

    /// Run a fill on a worker, reporting each batch snapshot to `on_progress`
    /// and the result to `on_complete`.
    ///
    /// Callbacks run on worker threads, never concurrently, and in emission
    /// order. `on_complete` fires exactly once, including for rejected
    /// requests (which first receive the unchanged image as their only
    /// snapshot).
    pub fn fill_animated<P, C>(&self, request: FillRequest, on_progress: P, on_complete: C)
    where
        P: FnMut(RasterImage) + Send + 'static,
        C: FnOnce(FillOutcome) + Send + 'static,
    {
        let sink = Arc::new(EventSink::new(Box::new(on_progress), Box::new(on_complete)));

        let (ticket, source) = match self.begin(request) {
            Ok(v) => v,
            Err(e) => {
                sink.progress(self.current_image(), |_| true);
                sink.complete(FillOutcome::Rejected(e));
                return;
            }
        };

        let deadline = self.settings.timeout_for(source.width(), source.height());
        let (done_tx, done_rx) = mpsc::channel::<()>();

        // Watchdog: forces the session idle if the worker never reports back
        {
            let session = self.clone();
            let sink = sink.clone();
            std::thread::spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = done_rx.recv_timeout(deadline) {
                    if session.settle(ticket, Commit::Latest) {
                        log_warn!(
                            fill = ticket;
                            "{} timed out after {} ms; committed latest snapshot",
                            request.describe(),
                            deadline.as_millis()
                        );
                        sink.complete(FillOutcome::TimedOut);
                    }
                }
            });
        }

        let session = self.clone();
        let connectivity = self.settings.animated_connectivity;
        let batch_limit = self.settings.batch_limit;
        rayon::spawn(move || {
            let result = catch_unwind(AssertUnwindSafe(|| {
                drive_animation(&session, &sink, ticket, &source, &request, connectivity, batch_limit)
            }));
            match result {
                Ok((last, outcome)) => {
                    let commit = match last {
                        Some(image) if outcome.changed_image() => Commit::Image(image),
                        _ => Commit::Nothing,
                    };
                    if session.settle(ticket, commit) {
                        log_info!(fill = ticket; "{} (animated): {}", request.describe(), outcome);
                        sink.complete(outcome);
                    }
                }
                Err(panic_info) => {
                    let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "unknown panic payload".to_string()
                    };
                    log_err!(fill = ticket; "{} worker panicked: {}", request.describe(), msg);
                    if session.settle(ticket, Commit::Nothing) {
                        sink.complete(FillOutcome::Rejected(FillError::WorkerPanicked));
                    }
                }
            }
            let _ = done_tx.send(());
        });
    }

    /// [`fill_animated`](Self::fill_animated) delivered as a channel. The
    /// stream ends with exactly one `FillEvent::Completed`.
    pub fn fill_animated_channel(&self, request: FillRequest) -> mpsc::Receiver<FillEvent> {
        let (tx, rx) = mpsc::channel();
        let progress_tx = tx.clone();
        self.fill_animated(
            request,
            move |image| {
                let _ = progress_tx.send(FillEvent::Progress(image));
            },
            move |outcome| {
                let _ = tx.send(FillEvent::Completed(outcome));
            },
        );
        rx
    }
}

fn run_sync(
    source: &RasterImage,
    request: &FillRequest,
    connectivity: Connectivity,
) -> (RasterImage, FillOutcome) {
    let mut buffer = match PixelBuffer::from_image(source) {
        Ok(b) => b,
        Err(e) => return (source.clone(), FillOutcome::Rejected(e)),
    };
    let stats = match flood_fill(
        &mut buffer,
        request.x,
        request.y,
        request.color,
        request.threshold(),
        connectivity,
    ) {
        Ok(stats) => stats,
        Err(e) => return (source.clone(), FillOutcome::Rejected(e)),
    };
    if let Some(reason) = stats.skipped {
        return (source.clone(), FillOutcome::Unchanged(reason));
    }
    match buffer.into_image() {
        Ok(image) => (image, FillOutcome::Filled { pixels: stats.filled }),
        Err(e) => (source.clone(), FillOutcome::Rejected(e)),
    }
}

/// Pump the animation, forwarding snapshots. Returns the last snapshot and the
/// traversal's own outcome.
fn drive_animation(
    session: &FillSession,
    sink: &EventSink,
    ticket: u64,
    source: &RasterImage,
    request: &FillRequest,
    connectivity: Connectivity,
    batch_limit: usize,
) -> (Option<RasterImage>, FillOutcome) {
    let animation = FillAnimation::new(
        source,
        request.x,
        request.y,
        request.color,
        request.threshold(),
        connectivity,
        batch_limit,
    );
    let mut last = None;
    let mut outcome = None;
    for event in animation {
        match event {
            FillEvent::Progress(snapshot) => {
                // recorded under the sink lock so a timeout cannot commit an
                // older state than the consumer last saw
                sink.progress(snapshot.clone(), |s| session.record_progress(ticket, s));
                last = Some(snapshot);
            }
            FillEvent::Completed(o) => outcome = Some(o),
        }
    }
    (last, outcome.unwrap_or(FillOutcome::Rejected(FillError::InvalidSource)))
}

// ============================================================================
// EVENT SINK — serializes consumer callbacks across worker and watchdog
// ============================================================================

type ProgressFn = Box<dyn FnMut(RasterImage) + Send>;
type CompleteFn = Box<dyn FnOnce(FillOutcome) + Send>;

struct SinkState {
    on_progress: ProgressFn,
    /// `None` once completion has been delivered.
    on_complete: Option<CompleteFn>,
}

struct EventSink {
    state: Mutex<SinkState>,
}

impl EventSink {
    fn new(on_progress: ProgressFn, on_complete: CompleteFn) -> Self {
        Self {
            state: Mutex::new(SinkState {
                on_progress,
                on_complete: Some(on_complete),
            }),
        }
    }

    /// Deliver `image` unless completion already fired or `accept` refuses it.
    /// `accept` runs while the sink is locked.
    fn progress(&self, image: RasterImage, accept: impl FnOnce(&RasterImage) -> bool) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.on_complete.is_none() || !accept(&image) {
            return;
        }
        (state.on_progress)(image);
    }

    fn complete(&self, outcome: FillOutcome) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(on_complete) = state.on_complete.take() {
            on_complete(outcome);
        }
    }
}
