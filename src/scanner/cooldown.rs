use serde::{Deserialize, Serialize};

/// Countdown between accepted scans.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Cooldown {
    /// Decoding may run.
    #[default]
    Idle,
    /// Decoding is suppressed for this many more seconds. Never zero.
    Active(u32),
}

impl Cooldown {
    /// `Active(seconds)`, or `Idle` for zero.
    pub fn arm(seconds: u32) -> Self {
        if seconds == 0 {
            Cooldown::Idle
        } else {
            Cooldown::Active(seconds)
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Cooldown::Active(_))
    }

    pub fn remaining(&self) -> u32 {
        match self {
            Cooldown::Idle => 0,
            Cooldown::Active(seconds) => *seconds,
        }
    }

    /// Count down one second. Returns `true` on the tick that reaches zero;
    /// later ticks on an idle cooldown return `false`.
    pub fn tick(&mut self) -> bool {
        match *self {
            Cooldown::Idle => false,
            Cooldown::Active(seconds) if seconds <= 1 => {
                *self = Cooldown::Idle;
                true
            }
            Cooldown::Active(seconds) => {
                *self = Cooldown::Active(seconds - 1);
                false
            }
        }
    }
}
