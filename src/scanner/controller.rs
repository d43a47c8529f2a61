use std::sync::Arc;

use chrono::Utc;
use tokio::{
    sync::{broadcast, Mutex},
    time::{self, Instant, MissedTickBehavior},
};

use crate::{
    camera::{Camera, CameraSession, FacingMode, FrameSource, StreamRequest},
    config::ScannerConfig,
    decode::Decoder,
    reporter::ScanReporter,
};

use super::{
    events::{ScannerEvent, ScannerSnapshot},
    scheduler::{Scheduler, TaskKind},
    state::{Effect, ScannerError, ScannerInput, ScannerState},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const EVENT_CAPACITY: usize = 64;

/// State, the bound stream and the timers share one lock so every
/// transition and its effects are applied atomically.
struct Core {
    state: ScannerState,
    session: CameraSession,
    scheduler: Scheduler,
}

struct Inner {
    core: Mutex<Core>,
    camera: Arc<dyn Camera>,
    decoder: Arc<dyn Decoder>,
    reporter: Arc<dyn ScanReporter>,
    config: ScannerConfig,
    events: broadcast::Sender<ScannerEvent>,
}

#[derive(Debug, Clone, Copy)]
struct OpenRequest {
    facing: FacingMode,
    attempt: u64,
}

/// Drives the QR scanner: camera lifecycle, decode loop and scan cooldown.
///
/// Cheap to clone. Timer tasks hold clones, so call [`ScannerController::shutdown`]
/// on teardown to release the camera and stop them.
#[derive(Clone)]
pub struct ScannerController {
    inner: Arc<Inner>,
}

impl ScannerController {
    pub fn new(
        config: ScannerConfig,
        camera: Arc<dyn Camera>,
        decoder: Arc<dyn Decoder>,
        reporter: Arc<dyn ScanReporter>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = ScannerState::new(config.initial_facing, config.cooldown_secs);

        Self {
            inner: Arc::new(Inner {
                core: Mutex::new(Core {
                    state,
                    session: CameraSession::new(),
                    scheduler: Scheduler::new(),
                }),
                camera,
                decoder,
                reporter,
                config,
                events,
            }),
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScannerEvent> {
        self.inner.events.subscribe()
    }

    pub async fn snapshot(&self) -> ScannerSnapshot {
        let core = self.inner.core.lock().await;
        ScannerSnapshot::from(&core.state)
    }

    /// Timer classes that currently have a live task.
    pub async fn pending_timers(&self) -> Vec<TaskKind> {
        self.inner.core.lock().await.scheduler.pending()
    }

    pub async fn camera_active(&self) -> bool {
        self.inner.core.lock().await.session.is_active()
    }

    /// Open the camera with the stored facing mode and start decoding.
    /// Camera failures are returned and also published as events; they are
    /// not retried.
    pub async fn start(&self) -> Result<ScannerSnapshot, ScannerError> {
        for request in self.dispatch(ScannerInput::Start).await? {
            self.open_camera(request).await?;
        }
        Ok(self.snapshot().await)
    }

    /// Release the camera and cancel every timer. Idempotent.
    pub async fn stop(&self) {
        self.fire(ScannerInput::Stop).await;
        log_info!("scanner stopped");
    }

    /// Start/stop button. Unavailable while a result is loading or during cooldown.
    pub async fn toggle(&self) -> Result<ScannerSnapshot, ScannerError> {
        let snapshot = self.snapshot().await;
        if !snapshot.scanning {
            return self.start().await;
        }
        if snapshot.loading {
            return Err(ScannerError::Busy);
        }
        if snapshot.cooldown_remaining > 0 {
            return Err(ScannerError::CoolingDown {
                remaining: snapshot.cooldown_remaining,
            });
        }
        self.stop().await;
        Ok(self.snapshot().await)
    }

    /// Flip between front and rear camera. While scanning the current stream
    /// is released first and the new one opened after the settle delay.
    pub async fn switch_facing(&self) -> ScannerSnapshot {
        self.fire(ScannerInput::SwitchFacing).await;
        self.snapshot().await
    }

    pub async fn set_disabled(&self, disabled: bool) {
        self.fire(ScannerInput::SetDisabled(disabled)).await;
    }

    pub async fn set_loading(&self, loading: bool) {
        self.fire(ScannerInput::SetLoading(loading)).await;
    }

    /// Replace the running countdown with a server-supplied one.
    pub async fn apply_cooldown_override(&self, seconds: u32) {
        let session = self.inner.core.lock().await.state.session();
        self.fire(ScannerInput::CooldownOverride { session, seconds }).await;
    }

    pub async fn shutdown(&self) {
        self.stop().await;
    }

    async fn dispatch(&self, input: ScannerInput) -> Result<Vec<OpenRequest>, ScannerError> {
        let mut core = self.inner.core.lock().await;
        let effects = core.state.reduce(input)?;
        let opens = self.apply_effects(&mut core, effects, None);
        self.emit_state(&core.state);
        Ok(opens)
    }

    /// Dispatch from a task; rejections are only logged.
    async fn fire(&self, input: ScannerInput) -> Vec<OpenRequest> {
        match self.dispatch(input).await {
            Ok(opens) => opens,
            Err(err) => {
                log_warn!("scanner input rejected: {err}");
                Vec::new()
            }
        }
    }

    fn apply_effects(
        &self,
        core: &mut Core,
        effects: Vec<Effect>,
        mut stream: Option<Box<dyn FrameSource>>,
    ) -> Vec<OpenRequest> {
        let mut opens = Vec::new();

        for effect in effects {
            match effect {
                Effect::OpenCamera { facing, attempt } => {
                    opens.push(OpenRequest { facing, attempt })
                }
                Effect::AdoptStream => {
                    if let Some(stream) = stream.take() {
                        let facing = core.state.facing();
                        core.session.install(stream, facing);
                    }
                }
                Effect::DiscardStream => {
                    if let Some(mut stream) = stream.take() {
                        log_info!("discarding camera stream for a superseded request");
                        stream.stop();
                    }
                }
                Effect::ReleaseCamera => {
                    if let Some(facing) = core.session.facing() {
                        log_debug!("releasing {}", facing.label());
                    }
                    core.session.release();
                }
                Effect::Schedule { kind, token } => self.schedule(&mut core.scheduler, kind, token),
                Effect::Cancel(kind) => {
                    if let Some(token) = core.scheduler.token(kind) {
                        log_debug!("cancelling {kind:?} timer {token}");
                    }
                    core.scheduler.cancel(kind);
                }
                Effect::EmitPayload(payload) => self.emit_payload(payload, core.state.session()),
                Effect::ReportError(error) => {
                    log_error!("camera unavailable: {error}");
                    let _ = self.inner.events.send(ScannerEvent::CameraFailed {
                        kind: error.kind().to_string(),
                        message: error.to_string(),
                    });
                }
            }
        }

        if let Some(mut stream) = stream {
            stream.stop();
        }

        opens
    }

    fn schedule(&self, scheduler: &mut Scheduler, kind: TaskKind, token: u64) {
        let controller = self.clone();
        match kind {
            TaskKind::DecodeTick => {
                scheduler.schedule(kind, token, controller.run_decode_loop(token))
            }
            TaskKind::CooldownTick => {
                scheduler.schedule(kind, token, controller.run_cooldown(token))
            }
            TaskKind::SwitchSettle => {
                scheduler.schedule(kind, token, controller.run_switch_settle(token))
            }
            TaskKind::PostDecodePause => {
                let pause = self.inner.config.post_decode_pause();
                scheduler.schedule(kind, token, async move {
                    time::sleep(pause).await;
                    controller.fire(ScannerInput::PauseElapsed { token }).await;
                })
            }
        }
    }

    async fn run_decode_loop(self, token: u64) {
        let period = self.inner.config.decode_interval();
        let verbose = self.inner.config.verbose;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        log_debug!("decode loop {token} armed");

        loop {
            ticker.tick().await;

            let frame = {
                let mut core = self.inner.core.lock().await;
                if !core.state.decode_allowed(token) {
                    break;
                }
                core.session.next_frame()
            };

            let Some(frame) = frame else {
                if verbose {
                    log_debug!("decode loop {token}: stream has no frame buffered");
                }
                continue;
            };

            let Some(payload) = self.inner.decoder.decode(&frame) else {
                if verbose {
                    log_debug!(
                        "decode loop {token}: no code in {}x{} frame",
                        frame.width(),
                        frame.height()
                    );
                }
                continue;
            };

            log_info!("decoded payload on loop {token} ({} bytes)", payload.len());
            self.fire(ScannerInput::PayloadDecoded { token, payload }).await;
        }

        log_debug!("decode loop {token} exited");
    }

    async fn run_cooldown(self, token: u64) {
        let period = self.inner.config.cooldown_tick();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            {
                let core = self.inner.core.lock().await;
                if core.state.timer_token(TaskKind::CooldownTick) != Some(token) {
                    break;
                }
            }
            self.fire(ScannerInput::CooldownTick { token }).await;
        }
    }

    async fn run_switch_settle(self, token: u64) {
        time::sleep(self.inner.config.switch_settle()).await;
        for request in self.fire(ScannerInput::SwitchSettled { token }).await {
            self.spawn_open(request);
        }
    }

    /// Open on a task of its own. The settle task is cancellable, and a
    /// stream that arrives after a stop or a newer switch must still reach
    /// `CameraOpened` to be stopped.
    fn spawn_open(&self, request: OpenRequest) {
        let controller = self.clone();
        tokio::spawn(async move {
            if let Err(err) = controller.open_camera(request).await {
                log_warn!("camera switch failed: {err}");
            }
        });
    }

    async fn open_camera(&self, request: OpenRequest) -> Result<(), ScannerError> {
        let stream_request = StreamRequest::new(request.facing, &self.inner.config);
        log_info!(
            "requesting {} at {}x{} (attempt {})",
            request.facing.label(),
            stream_request.ideal_width,
            stream_request.ideal_height,
            request.attempt
        );

        match self.inner.camera.open(stream_request).await {
            Ok(stream) => {
                let mut core = self.inner.core.lock().await;
                let effects = core
                    .state
                    .reduce(ScannerInput::CameraOpened {
                        attempt: request.attempt,
                    })
                    .unwrap_or_else(|_| vec![Effect::DiscardStream]);
                let opens = self.apply_effects(&mut core, effects, Some(stream));
                if !opens.is_empty() {
                    log_warn!(
                        "ignoring {} camera request(s) raised by stream binding",
                        opens.len()
                    );
                }
                self.emit_state(&core.state);
                Ok(())
            }
            Err(error) => {
                log_warn!("camera open failed (attempt {}): {error}", request.attempt);
                self.dispatch(ScannerInput::CameraFailed {
                    attempt: request.attempt,
                    error: error.clone(),
                })
                .await?;
                Err(error.into())
            }
        }
    }

    fn emit_payload(&self, payload: String, session: u64) {
        let _ = self.inner.events.send(ScannerEvent::Scanned {
            payload: payload.clone(),
            at: Utc::now(),
        });

        let controller = self.clone();
        tokio::spawn(async move {
            match controller.inner.reporter.report(&payload).await {
                Ok(response) => {
                    if let Some(seconds) = response.cooldown_seconds {
                        log_info!("server requested a {seconds}s cooldown");
                        controller
                            .fire(ScannerInput::CooldownOverride { session, seconds })
                            .await;
                    }
                }
                Err(err) => log_warn!("scan report failed: {err:?}"),
            }
        });
    }

    fn emit_state(&self, state: &ScannerState) {
        let _ = self.inner.events.send(ScannerEvent::StateChanged {
            state: ScannerSnapshot::from(state),
        });
    }
}
