use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt as _};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::barrier::ImageBarrier;
use crate::errors::{BuildError, FrameParseError, ImageLoadError};
use crate::event::StreamEvent;
use crate::progress::ProgressSink;
use crate::preview::PreviewSurface;
use crate::transport::{SseDecoder, SseFrame, decode_frame};

const DEFAULT_IMAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle used to request cancellation of a running build.
#[derive(Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    /// Creates a handle and the signal it controls.
    pub fn pair() -> (Self, AbortSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, AbortSignal { rx })
    }

    /// Requests cancellation. The build ends with `BuildError::Cancelled` at
    /// its next suspension point.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    /// Another signal observing this handle.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving side of an [`AbortHandle`].
#[derive(Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation has been requested.
    pub async fn aborted(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Handle dropped without aborting.
                futures::future::pending::<()>().await;
            }
        }
    }
}

/// Lifecycle of an assembler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssemblerState {
    Idle,
    Streaming,
    Completed,
    Aborted(BuildError),
}

/// Tunables for [`StreamAssembler`].
#[derive(Clone, Debug)]
pub struct AssemblerOptions {
    /// Upper bound on a single image load before it counts as failed.
    pub image_timeout: Duration,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            image_timeout: DEFAULT_IMAGE_TIMEOUT,
        }
    }
}

impl AssemblerOptions {
    pub fn image_timeout(mut self, timeout: Duration) -> Self {
        self.image_timeout = timeout;
        self
    }
}

/// Summary of a completed `consume` call, including recoverable problems.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConsumeReport {
    /// Events dispatched, not counting malformed frames.
    pub events: usize,
    pub frame_errors: Vec<FrameParseError>,
    pub image_failures: Vec<ImageLoadError>,
}

/// Turns a build response stream into ordered progress-log and preview
/// updates.
///
/// One `consume` runs at a time; a concurrent call is rejected with
/// [`BuildError::Busy`].
pub struct StreamAssembler {
    preview: Arc<dyn PreviewSurface>,
    log: Arc<dyn ProgressSink>,
    options: AssemblerOptions,
    barrier: Mutex<ImageBarrier>,
    state: watch::Sender<AssemblerState>,
}

impl StreamAssembler {
    pub fn new(preview: Arc<dyn PreviewSurface>, log: Arc<dyn ProgressSink>) -> Self {
        Self::with_options(preview, log, AssemblerOptions::default())
    }

    pub fn with_options(
        preview: Arc<dyn PreviewSurface>,
        log: Arc<dyn ProgressSink>,
        options: AssemblerOptions,
    ) -> Self {
        let barrier = Mutex::new(ImageBarrier::new(options.image_timeout));
        let (state, _) = watch::channel(AssemblerState::Idle);
        Self {
            preview,
            log,
            options,
            barrier,
            state,
        }
    }

    pub fn state(&self) -> AssemblerState {
        self.state.borrow().clone()
    }

    /// Starts a new message group so this build's output stays separate from
    /// earlier builds. Call once per submission, before `consume`.
    pub fn reset_group(&self) -> Result<(), BuildError> {
        if self.barrier.try_lock().is_err() {
            return Err(BuildError::Busy);
        }
        self.log.start_group();
        Ok(())
    }

    /// Reads `bytes` to the end, dispatching every event in arrival order.
    ///
    /// Malformed frames and failed images are reported in the returned
    /// [`ConsumeReport`]; an `error` event, a read failure or cancellation end
    /// the call with an error.
    pub async fn consume<S, B, E>(
        &self,
        bytes: S,
        mut abort: AbortSignal,
    ) -> Result<ConsumeReport, BuildError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: fmt::Display,
    {
        let Ok(mut barrier) = self.barrier.try_lock() else {
            return Err(BuildError::Busy);
        };
        *barrier = ImageBarrier::new(self.options.image_timeout);

        let build_id = uuid::Uuid::new_v4();
        let phase = StreamingPhase::enter(&self.state);
        info!(build_id = %build_id, "consuming build stream");

        let outcome = self
            .drive(build_id, bytes, &mut barrier, &mut abort)
            .await;
        match &outcome {
            Ok(report) => info!(
                build_id = %build_id,
                events = report.events,
                frame_errors = report.frame_errors.len(),
                image_failures = report.image_failures.len(),
                "build stream completed"
            ),
            Err(err) => warn!(build_id = %build_id, error = %err, "build stream aborted"),
        }
        phase.finish(&outcome);
        outcome
    }

    async fn drive<S, B, E>(
        &self,
        build_id: uuid::Uuid,
        bytes: S,
        barrier: &mut ImageBarrier,
        abort: &mut AbortSignal,
    ) -> Result<ConsumeReport, BuildError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: fmt::Display,
    {
        let mut bytes = std::pin::pin!(bytes);
        let mut decoder = SseDecoder::default();
        let mut report = ConsumeReport::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = abort.aborted() => return Err(BuildError::Cancelled),
                next = bytes.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    for frame in decoder.push_chunk(chunk.as_ref()) {
                        self.handle_frame(build_id, &frame, barrier, abort, &mut report)
                            .await?;
                    }
                }
                Some(Err(e)) => {
                    return Err(BuildError::transport(format!(
                        "build stream read failed: {e}"
                    )));
                }
                None => break,
            }
        }

        if let Some(frame) = decoder.finish() {
            self.handle_frame(build_id, &frame, barrier, abort, &mut report)
                .await?;
        }
        self.settle_barrier(barrier, abort, &mut report).await?;
        Ok(report)
    }

    async fn handle_frame(
        &self,
        build_id: uuid::Uuid,
        frame: &SseFrame,
        barrier: &mut ImageBarrier,
        abort: &mut AbortSignal,
        report: &mut ConsumeReport,
    ) -> Result<(), BuildError> {
        match decode_frame(frame) {
            None => Ok(()),
            Some(Ok(event)) => self.dispatch(build_id, event, barrier, abort, report).await,
            Some(Err(err)) => {
                warn!(build_id = %build_id, error = %err, "skipping malformed frame");
                report.frame_errors.push(err);
                Ok(())
            }
        }
    }

    async fn dispatch(
        &self,
        build_id: uuid::Uuid,
        event: StreamEvent,
        barrier: &mut ImageBarrier,
        abort: &mut AbortSignal,
        report: &mut ConsumeReport,
    ) -> Result<(), BuildError> {
        report.events += 1;
        debug!(build_id = %build_id, kind = event.kind(), seq = report.events, "dispatching event");

        match event {
            StreamEvent::Error { message } => {
                return Err(BuildError::ServerReported(message));
            }
            StreamEvent::Info { remaining_requests } => {
                self.settle_barrier(barrier, abort, report).await?;
                self.log.append_line(&format!(
                    "You have {remaining_requests} requests remaining"
                ));
            }
            StreamEvent::Progress { message, percent } => {
                self.settle_barrier(barrier, abort, report).await?;
                match percent {
                    Some(p) => self.log.append_line(&format!("{message} ({p:.0}%)")),
                    None => self.log.append_line(&message),
                }
            }
            StreamEvent::Warning { message } => {
                self.settle_barrier(barrier, abort, report).await?;
                self.log.append_line(&format!("Warning: {message}"));
            }
            StreamEvent::SectionComplete { html_content } => {
                self.settle_barrier(barrier, abort, report).await?;
                self.preview.replace_content(&html_content);
            }
            StreamEvent::ComponentComplete { html_content } => {
                self.settle_barrier(barrier, abort, report).await?;
                self.preview.replace_content(&html_content);
                self.log.append_line("Component build complete!");
            }
            StreamEvent::Image { description, url } => {
                self.settle_barrier(barrier, abort, report).await?;
                let load = self.log.append_image(&description, &url);
                let replaced = barrier.install(url, load).await;
                self.record_image_outcome(replaced, report);
                self.settle_barrier(barrier, abort, report).await?;
            }
            StreamEvent::Unknown { kind } => {
                debug!(build_id = %build_id, kind = %kind, "ignoring unknown event type");
            }
        }
        Ok(())
    }

    /// Waits for the outstanding image, turning a failed load into a log line.
    async fn settle_barrier(
        &self,
        barrier: &mut ImageBarrier,
        abort: &mut AbortSignal,
        report: &mut ConsumeReport,
    ) -> Result<(), BuildError> {
        if !barrier.is_pending() {
            return Ok(());
        }
        let outcome = tokio::select! {
            biased;
            _ = abort.aborted() => return Err(BuildError::Cancelled),
            outcome = barrier.wait() => outcome,
        };
        self.record_image_outcome(outcome, report);
        Ok(())
    }

    fn record_image_outcome(
        &self,
        outcome: Option<Result<(), ImageLoadError>>,
        report: &mut ConsumeReport,
    ) {
        if let Some(Err(err)) = outcome {
            warn!(url = %err.url(), error = %err, "image failed to load");
            self.log.image_failed(&err);
            self.log
                .append_line(&format!("Image failed to load: {}", err.url()));
            report.image_failures.push(err);
        }
    }
}

/// Marks the assembler `Streaming` and records how the run ended, including
/// when the `consume` future is dropped midway.
struct StreamingPhase<'a> {
    state: &'a watch::Sender<AssemblerState>,
    finished: bool,
}

impl<'a> StreamingPhase<'a> {
    fn enter(state: &'a watch::Sender<AssemblerState>) -> Self {
        state.send_replace(AssemblerState::Streaming);
        Self {
            state,
            finished: false,
        }
    }

    fn finish(mut self, outcome: &Result<ConsumeReport, BuildError>) {
        self.finished = true;
        self.state.send_replace(match outcome {
            Ok(_) => AssemblerState::Completed,
            Err(err) => AssemblerState::Aborted(err.clone()),
        });
    }
}

impl Drop for StreamingPhase<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.state
                .send_replace(AssemblerState::Aborted(BuildError::Cancelled));
        }
    }
}
