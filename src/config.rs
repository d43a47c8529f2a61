use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::camera::FacingMode;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Timings and camera hints for the scanner. Every field has a default, so a
/// partial JSON file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScannerConfig {
    /// Decode loop sampling period.
    pub decode_interval_ms: u64,
    /// Cooldown armed after a local successful decode.
    pub cooldown_secs: u32,
    /// Period of the cooldown countdown.
    pub cooldown_tick_ms: u64,
    /// Delay before the loop tries to re-arm after a decode.
    pub post_decode_pause_ms: u64,
    /// Time given to the hardware to release the device when switching cameras.
    pub switch_settle_ms: u64,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub initial_facing: FacingMode,
    /// Log every decode tick.
    pub verbose: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            decode_interval_ms: 100,
            cooldown_secs: 5,
            cooldown_tick_ms: 1000,
            post_decode_pause_ms: 1000,
            switch_settle_ms: 300,
            ideal_width: 640,
            ideal_height: 480,
            initial_facing: FacingMode::Environment,
            verbose: false,
        }
    }
}

impl ScannerConfig {
    /// Read the config from a JSON file. A missing file yields the defaults;
    /// an unparseable one is logged and also yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scanner config from {}", path.display()))?;

        Ok(serde_json::from_str(&contents).unwrap_or_else(|err| {
            log_warn!(
                "Ignoring malformed scanner config {}: {err}",
                path.display()
            );
            Self::default()
        }))
    }

    /// Apply `SCANNER_DEBUG=1|true`.
    pub fn with_env_overrides(self) -> Self {
        let value = std::env::var("SCANNER_DEBUG").ok();
        self.with_debug_flag(value.as_deref())
    }

    fn with_debug_flag(mut self, value: Option<&str>) -> Self {
        let debug_mode =
            value.map_or(false, |value| value == "1" || value.eq_ignore_ascii_case("true"));
        if debug_mode {
            self.verbose = true;
        }
        self
    }

    pub fn decode_interval(&self) -> Duration {
        Duration::from_millis(self.decode_interval_ms.max(1))
    }

    pub fn cooldown_tick(&self) -> Duration {
        Duration::from_millis(self.cooldown_tick_ms.max(1))
    }

    pub fn post_decode_pause(&self) -> Duration {
        Duration::from_millis(self.post_decode_pause_ms)
    }

    pub fn switch_settle(&self) -> Duration {
        Duration::from_millis(self.switch_settle_ms)
    }
}
