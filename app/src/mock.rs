//! In-memory router and indicator for running the controller without a
//! broker or GPIO.

use std::collections::VecDeque;

use crate::error::TransportError;
use crate::indicator::{led_levels, Indicator, IndicatorState};
use crate::message::Notification;
use crate::router::MessageRouter;

#[derive(Debug, Default)]
pub struct MockRouter {
    incoming: VecDeque<Vec<u8>>,
    published: Vec<String>,
    offline: bool,
}

impl MockRouter {
    pub fn new() -> Self {
        MockRouter::default()
    }

    /// Queue an inbound payload for the next drain.
    pub fn push(&mut self, payload: &str) {
        self.incoming.push_back(payload.as_bytes().to_vec());
    }

    pub fn push_bytes(&mut self, payload: &[u8]) {
        self.incoming.push_back(payload.to_vec());
    }

    /// While offline every publish fails.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    pub fn published(&self) -> &[String] {
        &self.published
    }

    pub fn count(&self, payload: &str) -> usize {
        self.published.iter().filter(|p| *p == payload).count()
    }
}

impl MessageRouter for MockRouter {
    fn poll_incoming(&mut self) -> Option<Vec<u8>> {
        self.incoming.pop_front()
    }

    fn publish(&mut self, notification: &Notification) -> Result<(), TransportError> {
        if self.offline {
            return Err(TransportError::Disconnected);
        }
        self.published.push(notification.encode());
        Ok(())
    }
}

/// Records LED levels the way the GPIO indicator would drive them.
#[derive(Debug)]
pub struct MockIndicator {
    state: IndicatorState,
    alarm: Option<bool>,
    history: Vec<(bool, bool)>,
}

impl MockIndicator {
    pub fn new() -> Self {
        MockIndicator {
            state: IndicatorState::Off,
            alarm: None,
            history: Vec::new(),
        }
    }

    /// Current `(granted, denied)` LED levels.
    pub fn leds(&self) -> (bool, bool) {
        led_levels(self.state, self.alarm)
    }

    /// Every `(granted, denied)` pair written so far.
    pub fn history(&self) -> &[(bool, bool)] {
        &self.history
    }

    fn record(&mut self) {
        let levels = self.leds();
        self.history.push(levels);
    }
}

impl Default for MockIndicator {
    fn default() -> Self {
        MockIndicator::new()
    }
}

impl Indicator for MockIndicator {
    fn show(&mut self, state: IndicatorState) {
        self.state = state;
        self.record();
    }

    fn set_alarm(&mut self, blink: Option<bool>) {
        self.alarm = blink;
        self.record();
    }
}
