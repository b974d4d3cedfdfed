pub mod alarm;
pub mod authorization;
pub mod config;
pub mod controller;
pub mod debounce;
mod door_state;
pub mod error;
pub mod gpio;
pub mod http;
pub mod indicator;
pub mod message;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod mqtt;
pub mod router;

use std::time::Instant;

pub use authorization::Authority;
pub use controller::{Controller, ControllerConfig};
pub use door_state::{AccessState, DoorState};
pub use indicator::IndicatorState;

#[macro_export]
macro_rules! term_on_err {
    ($expr:expr, $term:expr) => {
        match $expr {
            std::result::Result::Ok(val) => val,
            std::result::Result::Err(err) => {
                log::error!("setting term due to error: {}", err);
                $term.store(true, std::sync::atomic::Ordering::SeqCst);
                break;
            }
        }
    };
}

/// A copy of the controller's state for readers outside the main loop.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub access: AccessState,
    pub authorized: bool,
    pub indicator: IndicatorState,
    pub alarm_sounding: bool,
    pub open_since: Option<Instant>,
    pub last_intrusion_at: Option<Instant>,
    pub attempts: u32,
}

impl Snapshot {
    pub fn door_state(&self) -> DoorState {
        self.access.door_state()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Snapshot {
            access: AccessState::DoorClosed,
            authorized: false,
            indicator: IndicatorState::Off,
            alarm_sounding: false,
            open_since: None,
            last_intrusion_at: None,
            attempts: 0,
        }
    }
}
