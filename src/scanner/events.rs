use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::camera::FacingMode;

use super::state::ScannerState;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScannerSnapshot {
    pub scanning: bool,
    pub has_permission: bool,
    pub facing: FacingMode,
    pub switching: bool,
    pub cooldown_remaining: u32,
    pub disabled: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub can_toggle: bool,
}

impl From<&ScannerState> for ScannerSnapshot {
    fn from(state: &ScannerState) -> Self {
        Self {
            scanning: state.is_scanning(),
            has_permission: state.has_permission(),
            facing: state.facing(),
            switching: state.is_switching(),
            cooldown_remaining: state.cooldown().remaining(),
            disabled: state.is_disabled(),
            loading: state.is_loading(),
            error: state.error().map(ToString::to_string),
            can_toggle: state.can_toggle(),
        }
    }
}

impl ScannerSnapshot {
    pub fn status_line(&self) -> String {
        if self.cooldown_remaining > 0 {
            format!("Waiting {}s before the next scan", self.cooldown_remaining)
        } else if self.scanning {
            "Camera active - point it at a QR code".to_string()
        } else {
            "Press the button to turn on the camera".to_string()
        }
    }

    pub fn toggle_label(&self) -> String {
        if self.loading {
            "Processing...".to_string()
        } else if self.cooldown_remaining > 0 {
            format!("Wait {}s", self.cooldown_remaining)
        } else if self.scanning {
            "Stop scanning".to_string()
        } else {
            "Start scanning".to_string()
        }
    }
}

/// Broadcast to subscribers of [`super::ScannerController::subscribe`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScannerEvent {
    StateChanged {
        state: ScannerSnapshot,
    },
    Scanned {
        payload: String,
        at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    CameraFailed {
        kind: String,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::state::ScannerInput;

    #[test]
    fn texts_follow_scanner_state() {
        let mut state = ScannerState::new(FacingMode::Environment, 5);
        let idle = ScannerSnapshot::from(&state);
        assert_eq!(idle.toggle_label(), "Start scanning");
        assert!(idle.status_line().starts_with("Press"));
        assert!(idle.can_toggle);

        state
            .reduce(ScannerInput::CooldownOverride {
                session: state.session(),
                seconds: 4,
            })
            .unwrap();
        let cooling = ScannerSnapshot::from(&state);
        assert_eq!(cooling.toggle_label(), "Wait 4s");
        assert_eq!(cooling.status_line(), "Waiting 4s before the next scan");
        assert!(!cooling.can_toggle);

        state.reduce(ScannerInput::SetLoading(true)).unwrap();
        assert_eq!(ScannerSnapshot::from(&state).toggle_label(), "Processing...");
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = ScannerEvent::CameraFailed {
            kind: "notFound".into(),
            message: "No camera".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "cameraFailed");
        assert_eq!(json["kind"], "notFound");

        let state = ScannerState::new(FacingMode::User, 5);
        let json = serde_json::to_value(ScannerEvent::StateChanged {
            state: ScannerSnapshot::from(&state),
        })
        .unwrap();
        assert_eq!(json["state"]["facing"], "user");
        assert_eq!(json["state"]["cooldownRemaining"], 0);
    }
}
