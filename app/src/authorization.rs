use log::{info, warn};

use crate::indicator::IndicatorState;
use crate::message::PendingCommand;

/// Who decides whether an opening without a prior grant is allowed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Authority {
    /// Only `access` messages from the messaging channel authorize an opening.
    External,
    /// Openings without a prior grant are decided by [`fallback_decide`].
    Fallback,
}

/// The identity a grant was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grantee {
    pub user_id: String,
    pub lock_id: String,
}

/// What applying a command asks of the rest of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEffect {
    /// Authorization changed; show this indicator.
    Indicator(IndicatorState),
    /// Authorization cleared and any running alarm must stop.
    Reset,
    /// No authorization effect, handled by the controller.
    Forward(PendingCommand),
    /// The command was not meant for this device.
    Ignored,
}

/// The authorization flag for the current door-open episode.
#[derive(Debug, Clone)]
pub struct AuthorizationStore {
    local_lock_id: Option<String>,
    authorized: bool,
    grantee: Option<Grantee>,
}

impl AuthorizationStore {
    pub fn new(local_lock_id: Option<String>) -> Self {
        AuthorizationStore {
            local_lock_id,
            authorized: false,
            grantee: None,
        }
    }

    pub fn on_command(&mut self, cmd: PendingCommand) -> CommandEffect {
        match cmd {
            PendingCommand::Grant { lock_id, user_id } => {
                if let Some(local) = &self.local_lock_id {
                    if *local != lock_id {
                        warn!("ignoring grant for lock {} (this is {})", lock_id, local);
                        return CommandEffect::Ignored;
                    }
                }
                info!("access granted for user {} on lock {}", user_id, lock_id);
                self.authorized = true;
                self.grantee = Some(Grantee { user_id, lock_id });
                CommandEffect::Indicator(IndicatorState::Granted)
            }
            PendingCommand::Deny { user_id } => {
                info!("access denied for user {}", user_id);
                self.authorized = false;
                self.grantee = None;
                CommandEffect::Indicator(IndicatorState::Denied)
            }
            PendingCommand::Reset => {
                info!("resetting authorization");
                self.authorized = false;
                self.grantee = None;
                CommandEffect::Reset
            }
            cmd @ PendingCommand::Intrusion { .. } | cmd @ PendingCommand::StatusQuery => {
                CommandEffect::Forward(cmd)
            }
        }
    }

    /// Authorization never survives the door closing.
    pub fn on_door_closed(&mut self) {
        self.authorized = false;
        self.grantee = None;
    }

    /// Record a grant made by the fallback policy.
    pub fn grant_locally(&mut self, grantee: Grantee) {
        self.authorized = true;
        self.grantee = Some(grantee);
    }

    pub fn is_authorized(&self) -> bool {
        self.authorized
    }

    pub fn grantee(&self) -> Option<&Grantee> {
        self.grantee.as_ref()
    }
}

/// Placeholder policy for when no external authority is wired in: every odd
/// attempt (1st, 3rd, ...) is let through, every even one is refused.
///
/// This is not a credential check.
pub fn fallback_decide(attempt_index: u32) -> bool {
    attempt_index % 2 == 1
}
