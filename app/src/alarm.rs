use std::time::{Duration, Instant};

use log::{debug, info};

pub const DEFAULT_ALARM_DURATION: Duration = Duration::from_secs(5);
pub const DEFAULT_BLINK_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AlarmState {
    Idle,
    Sounding {
        next_toggle_at: Instant,
        end_at: Instant,
        lit: bool,
    },
}

/// Outcome of [`AlarmSequencer::trigger`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AlarmRun {
    /// A new run began; the caller sends the one intrusion notification.
    Started { end_at: Instant },
    /// A run was already in progress and is left untouched.
    AlreadySounding,
}

/// Timed alarm blink pattern, advanced by [`tick`](AlarmSequencer::tick)
/// from the main loop instead of sleeping.
#[derive(Debug, Clone)]
pub struct AlarmSequencer {
    duration: Duration,
    half_period: Duration,
    state: AlarmState,
}

impl AlarmSequencer {
    pub fn new(duration: Duration, blink_period: Duration) -> Self {
        AlarmSequencer {
            duration,
            half_period: (blink_period / 2).max(Duration::from_millis(1)),
            state: AlarmState::Idle,
        }
    }

    pub fn trigger(&mut self, now: Instant) -> AlarmRun {
        if let AlarmState::Sounding { .. } = self.state {
            debug!("alarm already sounding, ignoring trigger");
            return AlarmRun::AlreadySounding;
        }

        let end_at = now + self.duration;
        self.state = AlarmState::Sounding {
            next_toggle_at: now + self.half_period,
            end_at,
            lit: true,
        };
        info!("alarm sounding for {:?}", self.duration);
        AlarmRun::Started { end_at }
    }

    /// Advance the blink pattern to `now`.
    ///
    /// Returns the alarm output whenever it changes: `Some(Some(lit))` while
    /// sounding, `Some(None)` once the run has finished.
    pub fn tick(&mut self, now: Instant) -> Option<Option<bool>> {
        match self.state {
            AlarmState::Idle => None,
            AlarmState::Sounding { end_at, .. } if now >= end_at => {
                info!("alarm finished");
                self.state = AlarmState::Idle;
                Some(None)
            }
            AlarmState::Sounding {
                mut next_toggle_at,
                end_at,
                lit,
            } => {
                let mut new_lit = lit;
                while now >= next_toggle_at {
                    new_lit = !new_lit;
                    next_toggle_at += self.half_period;
                }
                self.state = AlarmState::Sounding {
                    next_toggle_at,
                    end_at,
                    lit: new_lit,
                };
                if new_lit != lit {
                    Some(Some(new_lit))
                } else {
                    None
                }
            }
        }
    }

    /// Stop a running alarm. Returns whether one was running.
    pub fn cancel(&mut self) -> bool {
        let was_sounding = self.is_sounding();
        if was_sounding {
            info!("alarm cancelled");
        }
        self.state = AlarmState::Idle;
        was_sounding
    }

    pub fn is_sounding(&self) -> bool {
        matches!(self.state, AlarmState::Sounding { .. })
    }

    /// Current blink level, `None` when idle.
    pub fn output(&self) -> Option<bool> {
        match self.state {
            AlarmState::Idle => None,
            AlarmState::Sounding { lit, .. } => Some(lit),
        }
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }
}

impl Default for AlarmSequencer {
    fn default() -> Self {
        AlarmSequencer::new(DEFAULT_ALARM_DURATION, DEFAULT_BLINK_PERIOD)
    }
}
