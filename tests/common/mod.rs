#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use checkin_scanner::{
    Camera, CameraError, Decoder, FacingMode, Frame, FrameSource, ScanReporter, ScanResponse,
    ScannerConfig, ScannerController, StreamRequest,
};
use tokio::sync::watch;

pub struct FakeCamera {
    pub fail_with: Mutex<Option<CameraError>>,
    /// Facing mode of each request, with the number of live streams at that moment.
    pub requests: Mutex<Vec<(FacingMode, usize)>>,
    pub live: Arc<AtomicUsize>,
    pub max_live: Arc<AtomicUsize>,
    pub frames_ready: Arc<AtomicBool>,
    /// While `false`, `open` waits before handing out its stream.
    gate: watch::Sender<bool>,
}

impl FakeCamera {
    pub fn new() -> Arc<Self> {
        let (gate, _) = watch::channel(true);
        Arc::new(Self {
            fail_with: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            live: Arc::new(AtomicUsize::new(0)),
            max_live: Arc::new(AtomicUsize::new(0)),
            frames_ready: Arc::new(AtomicBool::new(true)),
            gate,
        })
    }

    /// Make later `open` calls wait until [`FakeCamera::release_opens`].
    pub fn hold_opens(&self) {
        self.gate.send_replace(false);
    }

    pub fn release_opens(&self) {
        self.gate.send_replace(true);
    }

    pub fn failing(error: CameraError) -> Arc<Self> {
        let camera = Self::new();
        *camera.fail_with.lock().unwrap() = Some(error);
        camera
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<FacingMode> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(facing, _)| *facing)
            .collect()
    }

    pub fn live_at_requests(&self) -> Vec<usize> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, live)| *live)
            .collect()
    }
}

#[async_trait]
impl Camera for FakeCamera {
    async fn open(&self, request: StreamRequest) -> Result<Box<dyn FrameSource>, CameraError> {
        self.requests
            .lock()
            .unwrap()
            .push((request.facing, self.live()));

        let mut gate = self.gate.subscribe();
        gate.wait_for(|open| *open).await.unwrap();

        let failure = self.fail_with.lock().unwrap().clone();
        if let Some(error) = failure {
            return Err(error);
        }

        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);

        Ok(Box::new(FakeStream {
            live: self.live.clone(),
            frames_ready: self.frames_ready.clone(),
            stopped: false,
        }))
    }
}

struct FakeStream {
    live: Arc<AtomicUsize>,
    frames_ready: Arc<AtomicBool>,
    stopped: bool,
}

impl FrameSource for FakeStream {
    fn next_frame(&mut self) -> Option<Frame> {
        if self.stopped || !self.frames_ready.load(Ordering::SeqCst) {
            return None;
        }
        Some(Frame::blank(8, 8))
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Finds `payload` in every frame while it is set.
#[derive(Default)]
pub struct FakeDecoder {
    pub payload: Mutex<Option<String>>,
    pub calls: AtomicUsize,
}

impl FakeDecoder {
    pub fn finding(payload: &str) -> Arc<Self> {
        let decoder = Self::default();
        *decoder.payload.lock().unwrap() = Some(payload.to_string());
        Arc::new(decoder)
    }

    pub fn blind() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Decoder for FakeDecoder {
    fn decode(&self, _frame: &Frame) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payload.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct FakeReporter {
    pub payloads: Mutex<Vec<String>>,
    pub cooldown_seconds: Mutex<Option<u32>>,
    pub failing: AtomicBool,
}

impl FakeReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_cooldown(seconds: u32) -> Arc<Self> {
        let reporter = Self::default();
        *reporter.cooldown_seconds.lock().unwrap() = Some(seconds);
        Arc::new(reporter)
    }

    /// Records payloads but answers every report with an error.
    pub fn failing() -> Arc<Self> {
        let reporter = Self::default();
        reporter.failing.store(true, Ordering::SeqCst);
        Arc::new(reporter)
    }

    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScanReporter for FakeReporter {
    async fn report(&self, payload: &str) -> Result<ScanResponse> {
        self.payloads.lock().unwrap().push(payload.to_string());
        if self.failing.load(Ordering::SeqCst) {
            bail!("check-in service unavailable");
        }
        let cooldown_seconds = *self.cooldown_seconds.lock().unwrap();
        Ok(ScanResponse {
            cooldown_seconds,
            ..ScanResponse::default()
        })
    }
}

pub fn controller(
    camera: &Arc<FakeCamera>,
    decoder: &Arc<FakeDecoder>,
    reporter: &Arc<FakeReporter>,
) -> ScannerController {
    checkin_scanner::init_logging();
    ScannerController::new(
        ScannerConfig::default(),
        camera.clone(),
        decoder.clone(),
        reporter.clone(),
    )
}
