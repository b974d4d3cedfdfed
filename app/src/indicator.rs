use std::fmt;

/// What the two-LED indicator is showing, as set by the controller.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IndicatorState {
    Off,
    Granted,
    Denied,
}

impl fmt::Display for IndicatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorState::Off => f.write_str("off"),
            IndicatorState::Granted => f.write_str("granted"),
            IndicatorState::Denied => f.write_str("denied"),
        }
    }
}

/// Output side of the controller. Writes cannot fail.
pub trait Indicator {
    fn show(&mut self, state: IndicatorState);

    /// `None` while no alarm is sounding, otherwise the current blink level.
    fn set_alarm(&mut self, blink: Option<bool>);
}

/// Physical levels of the `(granted, denied)` LEDs.
///
/// A sounding alarm blinks the denied LED, except while access is shown as
/// granted so the two are never lit together.
pub fn led_levels(state: IndicatorState, blink: Option<bool>) -> (bool, bool) {
    match state {
        IndicatorState::Granted => (true, false),
        IndicatorState::Denied => (false, blink.unwrap_or(true)),
        IndicatorState::Off => (false, blink.unwrap_or(false)),
    }
}
