use std::fmt;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DoorState {
    Closed,
    Open,
}

impl DoorState {
    pub fn is_open(self) -> bool {
        self == DoorState::Open
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoorState::Open => f.write_str("Open"),
            DoorState::Closed => f.write_str("Closed"),
        }
    }
}

/// Where the access decision for the current door episode stands.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AccessState {
    DoorClosed,
    DoorOpenPendingDecision,
    DoorOpenAuthorized,
    DoorOpenUnauthorized,
}

impl AccessState {
    pub fn door_state(self) -> DoorState {
        match self {
            AccessState::DoorClosed => DoorState::Closed,
            _ => DoorState::Open,
        }
    }
}

impl fmt::Display for AccessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessState::DoorClosed => f.write_str("Closed"),
            AccessState::DoorOpenPendingDecision => f.write_str("Pending"),
            AccessState::DoorOpenAuthorized => f.write_str("Authorized"),
            AccessState::DoorOpenUnauthorized => f.write_str("Unauthorized"),
        }
    }
}
