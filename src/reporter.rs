use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Receives each decoded payload, typically to post it to the time-tracking
/// backend. Called once per accepted scan, off the scanner's lock.
#[async_trait]
pub trait ScanReporter: Send + Sync {
    async fn report(&self, payload: &str) -> Result<ScanResponse>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanAction {
    CheckIn,
    CheckOut,
}

/// Body of a successful scan registration. Only `cooldown_seconds` matters to
/// the scanner; the rest is for display.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanResponse {
    #[serde(default)]
    pub action: Option<ScanAction>,
    #[serde(default)]
    pub employee: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub cooldown_seconds: Option<u32>,
}

impl ScanResponse {
    pub fn with_cooldown(seconds: u32) -> Self {
        Self {
            cooldown_seconds: Some(seconds),
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

/// How the backend judged a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Recorded(ScanResponse),
    /// The employee scanned again too soon (HTTP 429).
    CoolingDown { message: String },
    /// The code belongs to another company (HTTP 403).
    Unauthorized { message: String },
    Failed { message: String },
}

impl ScanOutcome {
    pub fn from_http(status: u16, body: &str) -> Self {
        if (200..300).contains(&status) {
            return match serde_json::from_str::<ScanResponse>(body) {
                Ok(response) => ScanOutcome::Recorded(response),
                Err(err) => ScanOutcome::Failed {
                    message: format!("unreadable scan response: {err}"),
                },
            };
        }

        let detail = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|body| body.detail);

        match status {
            429 => ScanOutcome::CoolingDown {
                message: detail.unwrap_or_else(|| "Wait before the next scan".to_string()),
            },
            403 => ScanOutcome::Unauthorized {
                message: "This QR code does not belong to your company".to_string(),
            },
            _ => ScanOutcome::Failed {
                message: detail.unwrap_or_else(|| "QR code scan failed".to_string()),
            },
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, ScanOutcome::Recorded(_))
    }

    /// Cooldown the scanner should apply, if the backend asked for one.
    pub fn cooldown_override(&self) -> Option<u32> {
        match self {
            ScanOutcome::Recorded(response) => response.cooldown_seconds.filter(|secs| *secs > 0),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ScanOutcome::Recorded(response) => response.message.as_deref(),
            ScanOutcome::CoolingDown { message }
            | ScanOutcome::Unauthorized { message }
            | ScanOutcome::Failed { message } => Some(message),
        }
    }
}
