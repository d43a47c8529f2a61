pub mod controller;
pub mod cooldown;
pub mod events;
pub mod scheduler;
pub mod state;

pub use controller::ScannerController;
pub use cooldown::Cooldown;
pub use events::{ScannerEvent, ScannerSnapshot};
pub use scheduler::{Scheduler, TaskKind};
pub use state::{CameraPhase, Effect, ScannerError, ScannerInput, ScannerState};
