//! Turns raw door sensor samples into open/close edges.
//!
//! With the default of one sample this is plain edge detection against the
//! previous reading. Noisy sensors can require `n` agreeing samples before a
//! level change is accepted.

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Edge {
    Opened,
    Closed,
}

#[derive(Debug, Clone)]
pub struct Debouncer {
    last_door_open: bool,
    required: u32,
    agreeing: u32,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::with_samples(1)
    }

    /// A debouncer that needs `samples` consecutive readings of a new level
    /// before reporting the edge. Zero is treated as one.
    pub fn with_samples(samples: u32) -> Self {
        Debouncer {
            last_door_open: false,
            required: samples.max(1),
            agreeing: 0,
        }
    }

    pub fn poll(&mut self, raw: bool) -> Option<Edge> {
        if raw == self.last_door_open {
            self.agreeing = 0;
            return None;
        }

        self.agreeing += 1;
        if self.agreeing < self.required {
            return None;
        }

        self.agreeing = 0;
        self.last_door_open = raw;
        if raw {
            Some(Edge::Opened)
        } else {
            Some(Edge::Closed)
        }
    }

    pub fn is_open(&self) -> bool {
        self.last_door_open
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Debouncer::new()
    }
}
