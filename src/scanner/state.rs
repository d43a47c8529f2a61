use thiserror::Error;

use crate::camera::{CameraError, FacingMode};

use super::cooldown::Cooldown;
use super::scheduler::TaskKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScannerError {
    #[error("camera switch in progress")]
    SwitchInProgress,
    #[error("scan result is still being processed")]
    Busy,
    #[error("wait {remaining}s before the next scan")]
    CoolingDown { remaining: u32 },
    #[error(transparent)]
    Camera(#[from] CameraError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraPhase {
    Off,
    /// A stream was requested; `attempt` identifies the request.
    Opening { attempt: u64 },
    Live { attempt: u64 },
}

/// Everything that can move the scanner state machine.
///
/// Timer-originated inputs carry the token the timer was scheduled with so a
/// late callback from a cancelled timer is recognised and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScannerInput {
    Start,
    Stop,
    SwitchFacing,
    SetDisabled(bool),
    SetLoading(bool),
    CameraOpened { attempt: u64 },
    CameraFailed { attempt: u64, error: CameraError },
    PayloadDecoded { token: u64, payload: String },
    CooldownTick { token: u64 },
    PauseElapsed { token: u64 },
    SwitchSettled { token: u64 },
    /// Server-side cooldown, only honoured for the session it was issued in.
    CooldownOverride { session: u64, seconds: u32 },
}

/// Side effects requested by [`ScannerState::reduce`], executed by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    OpenCamera { facing: FacingMode, attempt: u64 },
    /// Bind the stream that just opened.
    AdoptStream,
    /// Stop the stream that just opened; its request was superseded.
    DiscardStream,
    ReleaseCamera,
    Schedule { kind: TaskKind, token: u64 },
    Cancel(TaskKind),
    EmitPayload(String),
    ReportError(CameraError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TimerSlots {
    decode: Option<u64>,
    cooldown: Option<u64>,
    settle: Option<u64>,
    pause: Option<u64>,
}

impl TimerSlots {
    fn slot(&mut self, kind: TaskKind) -> &mut Option<u64> {
        match kind {
            TaskKind::DecodeTick => &mut self.decode,
            TaskKind::CooldownTick => &mut self.cooldown,
            TaskKind::SwitchSettle => &mut self.settle,
            TaskKind::PostDecodePause => &mut self.pause,
        }
    }

    fn get(&self, kind: TaskKind) -> Option<u64> {
        match kind {
            TaskKind::DecodeTick => self.decode,
            TaskKind::CooldownTick => self.cooldown,
            TaskKind::SwitchSettle => self.settle,
            TaskKind::PostDecodePause => self.pause,
        }
    }
}

/// The scanner as a plain record. All transitions go through [`ScannerState::reduce`].
#[derive(Debug, Clone)]
pub struct ScannerState {
    camera: CameraPhase,
    facing: FacingMode,
    /// Target of an in-progress camera switch.
    pending_facing: Option<FacingMode>,
    has_permission: bool,
    disabled: bool,
    loading: bool,
    cooldown: Cooldown,
    error: Option<CameraError>,
    /// Bumped on every stop; late reporter answers from an older session are ignored.
    session: u64,
    timers: TimerSlots,
    next_token: u64,
    scan_cooldown_secs: u32,
}

impl ScannerState {
    pub fn new(facing: FacingMode, scan_cooldown_secs: u32) -> Self {
        Self {
            camera: CameraPhase::Off,
            facing,
            pending_facing: None,
            has_permission: false,
            disabled: false,
            loading: false,
            cooldown: Cooldown::Idle,
            error: None,
            session: 0,
            timers: TimerSlots::default(),
            next_token: 0,
            scan_cooldown_secs,
        }
    }

    pub fn camera(&self) -> CameraPhase {
        self.camera
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self.camera, CameraPhase::Live { .. })
    }

    pub fn is_switching(&self) -> bool {
        self.pending_facing.is_some()
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn has_permission(&self) -> bool {
        self.has_permission
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn cooldown(&self) -> Cooldown {
        self.cooldown
    }

    pub fn error(&self) -> Option<&CameraError> {
        self.error.as_ref()
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    /// Token of the timer of `kind` the state currently expects to hear from.
    pub fn timer_token(&self, kind: TaskKind) -> Option<u64> {
        self.timers.get(kind)
    }

    /// Whether the decode loop may sample at all.
    pub fn decode_eligible(&self) -> bool {
        self.is_scanning() && !self.disabled && !self.cooldown.is_active()
    }

    /// Whether the decode loop scheduled with `token` may take this tick.
    pub fn decode_allowed(&self, token: u64) -> bool {
        self.timers.decode == Some(token) && self.decode_eligible()
    }

    /// Start/stop toggle availability, as shown to the user.
    pub fn can_toggle(&self) -> bool {
        !self.loading && !self.cooldown.is_active() && !self.is_switching()
    }

    /// Apply one input. Rejected user operations return an error and leave
    /// the state untouched; stale timer or camera inputs are no-ops.
    pub fn reduce(&mut self, input: ScannerInput) -> Result<Vec<Effect>, ScannerError> {
        let effects = match input {
            ScannerInput::Start => return self.start(),
            ScannerInput::Stop => self.stop(),
            ScannerInput::SwitchFacing => self.switch_facing(),
            ScannerInput::SetDisabled(disabled) => {
                self.disabled = disabled;
                if disabled {
                    self.cancel_timer(TaskKind::DecodeTick).into_iter().collect()
                } else {
                    self.resume_decoding()
                }
            }
            ScannerInput::SetLoading(loading) => {
                self.loading = loading;
                Vec::new()
            }
            ScannerInput::CameraOpened { attempt } => self.camera_opened(attempt),
            ScannerInput::CameraFailed { attempt, error } => self.camera_failed(attempt, error),
            ScannerInput::PayloadDecoded { token, payload } => self.payload_decoded(token, payload),
            ScannerInput::CooldownTick { token } => self.cooldown_tick(token),
            ScannerInput::PauseElapsed { token } => {
                if !self.take_timer(TaskKind::PostDecodePause, token) {
                    return Ok(Vec::new());
                }
                self.resume_decoding()
            }
            ScannerInput::SwitchSettled { token } => self.switch_settled(token),
            ScannerInput::CooldownOverride { session, seconds } => {
                self.cooldown_override(session, seconds)
            }
        };
        Ok(effects)
    }

    fn start(&mut self) -> Result<Vec<Effect>, ScannerError> {
        if self.is_switching() {
            return Err(ScannerError::SwitchInProgress);
        }
        if self.camera != CameraPhase::Off {
            return Ok(Vec::new());
        }
        if self.loading {
            return Err(ScannerError::Busy);
        }
        if let Cooldown::Active(remaining) = self.cooldown {
            return Err(ScannerError::CoolingDown { remaining });
        }

        self.error = None;
        Ok(vec![self.request_camera()])
    }

    fn stop(&mut self) -> Vec<Effect> {
        self.session += 1;
        self.camera = CameraPhase::Off;
        self.pending_facing = None;
        self.has_permission = false;
        self.cooldown = Cooldown::Idle;
        self.timers = TimerSlots::default();

        let mut effects: Vec<Effect> = TaskKind::ALL.into_iter().map(Effect::Cancel).collect();
        effects.push(Effect::ReleaseCamera);
        effects
    }

    fn switch_facing(&mut self) -> Vec<Effect> {
        if let Some(pending) = self.pending_facing {
            // Second switch inside the settle window: retarget and restart the wait.
            // An open already issued by the first settle is superseded.
            self.pending_facing = Some(pending.opposite());
            self.camera = CameraPhase::Off;
            return vec![self.schedule(TaskKind::SwitchSettle)];
        }

        if self.camera == CameraPhase::Off {
            self.facing = self.facing.opposite();
            return Vec::new();
        }

        self.pending_facing = Some(self.facing.opposite());
        self.camera = CameraPhase::Off;
        self.has_permission = false;

        let mut effects: Vec<Effect> =
            self.cancel_timer(TaskKind::DecodeTick).into_iter().collect();
        effects.push(Effect::ReleaseCamera);
        effects.push(self.schedule(TaskKind::SwitchSettle));
        effects
    }

    fn switch_settled(&mut self, token: u64) -> Vec<Effect> {
        if !self.take_timer(TaskKind::SwitchSettle, token) {
            return Vec::new();
        }
        let Some(target) = self.pending_facing else {
            return Vec::new();
        };
        self.facing = target;
        vec![self.request_camera()]
    }

    fn camera_opened(&mut self, attempt: u64) -> Vec<Effect> {
        if self.camera != (CameraPhase::Opening { attempt }) {
            return vec![Effect::DiscardStream];
        }

        self.camera = CameraPhase::Live { attempt };
        self.pending_facing = None;
        self.has_permission = true;
        self.error = None;

        let mut effects = vec![Effect::AdoptStream];
        effects.extend(self.resume_decoding());
        effects
    }

    fn camera_failed(&mut self, attempt: u64, error: CameraError) -> Vec<Effect> {
        if self.camera != (CameraPhase::Opening { attempt }) {
            return Vec::new();
        }

        self.camera = CameraPhase::Off;
        self.pending_facing = None;
        self.has_permission = false;
        self.error = Some(error.clone());

        let mut effects: Vec<Effect> =
            self.cancel_timer(TaskKind::DecodeTick).into_iter().collect();
        effects.push(Effect::ReportError(error));
        effects
    }

    fn payload_decoded(&mut self, token: u64, payload: String) -> Vec<Effect> {
        if !self.decode_allowed(token) {
            return Vec::new();
        }

        self.cooldown = Cooldown::arm(self.scan_cooldown_secs);
        let mut effects: Vec<Effect> =
            self.cancel_timer(TaskKind::DecodeTick).into_iter().collect();
        effects.push(Effect::EmitPayload(payload));
        if self.cooldown.is_active() {
            effects.push(self.schedule(TaskKind::CooldownTick));
        }
        effects.push(self.schedule(TaskKind::PostDecodePause));
        effects
    }

    fn cooldown_tick(&mut self, token: u64) -> Vec<Effect> {
        if self.timers.cooldown != Some(token) {
            return Vec::new();
        }
        if !self.cooldown.tick() && self.cooldown.is_active() {
            return Vec::new();
        }

        let mut effects: Vec<Effect> =
            self.cancel_timer(TaskKind::CooldownTick).into_iter().collect();
        effects.extend(self.resume_decoding());
        effects
    }

    fn cooldown_override(&mut self, session: u64, seconds: u32) -> Vec<Effect> {
        if session != self.session || seconds == 0 {
            return Vec::new();
        }

        self.cooldown = Cooldown::arm(seconds);
        let mut effects: Vec<Effect> =
            self.cancel_timer(TaskKind::DecodeTick).into_iter().collect();
        effects.push(self.schedule(TaskKind::CooldownTick));
        effects
    }

    fn request_camera(&mut self) -> Effect {
        let attempt = self.next_token();
        self.camera = CameraPhase::Opening { attempt };
        Effect::OpenCamera {
            facing: self.facing,
            attempt,
        }
    }

    /// Re-arm the decode loop if it is eligible and not already running.
    fn resume_decoding(&mut self) -> Vec<Effect> {
        if !self.decode_eligible() || self.timers.decode.is_some() {
            return Vec::new();
        }
        vec![self.schedule(TaskKind::DecodeTick)]
    }

    fn schedule(&mut self, kind: TaskKind) -> Effect {
        let token = self.next_token();
        *self.timers.slot(kind) = Some(token);
        Effect::Schedule { kind, token }
    }

    fn cancel_timer(&mut self, kind: TaskKind) -> Option<Effect> {
        self.timers.slot(kind).take().map(|_| Effect::Cancel(kind))
    }

    /// Clear a one-shot slot if `token` is the live one.
    fn take_timer(&mut self, kind: TaskKind, token: u64) -> bool {
        let slot = self.timers.slot(kind);
        if *slot == Some(token) {
            *slot = None;
            true
        } else {
            false
        }
    }

    fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }
}
