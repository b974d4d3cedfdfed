//! Wire format of the messaging channel.
//!
//! Both directions use short UTF-8 strings with `/` separated fields, e.g.
//! `access/L1/U1` inbound and `access_granted/U1/roomX/L1` outbound.

use std::fmt;
use std::str::{from_utf8, FromStr};

use crate::error::DecodeError;

const DEFAULT_USER: &str = "unknown";

/// A command received from the messaging channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCommand {
    Grant { lock_id: String, user_id: String },
    Deny { user_id: String },
    Intrusion { info: String },
    StatusQuery,
    Reset,
}

impl PendingCommand {
    pub fn decode(payload: &[u8]) -> Result<PendingCommand, DecodeError> {
        let text = from_utf8(payload).map_err(|_| DecodeError::Utf8)?;
        text.parse()
    }
}

impl FromStr for PendingCommand {
    type Err = DecodeError;

    fn from_str(payload: &str) -> Result<Self, Self::Err> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }

        let (command, rest) = match payload.find('/') {
            Some(idx) => (payload[..idx].trim(), Some(&payload[idx + 1..])),
            None => (payload, None),
        };
        let mut fields = rest
            .map(|rest| rest.split('/').map(str::trim).collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter();

        match command {
            "access" => {
                let lock_id = required(fields.next(), "access", "lock id")?;
                let user_id = required(fields.next(), "access", "user id")?;
                Ok(PendingCommand::Grant { lock_id, user_id })
            }
            "noaccess" => {
                let _lock = fields.next();
                let user_id = fields
                    .next()
                    .filter(|user| !user.is_empty())
                    .unwrap_or(DEFAULT_USER)
                    .to_string();
                Ok(PendingCommand::Deny { user_id })
            }
            "intrusion" => {
                let info = rest.map(str::trim).unwrap_or_default();
                if info.is_empty() {
                    return Err(DecodeError::MissingField {
                        command: "intrusion",
                        field: "info",
                    });
                }
                Ok(PendingCommand::Intrusion {
                    info: info.to_string(),
                })
            }
            "status" => Ok(PendingCommand::StatusQuery),
            "reset" => Ok(PendingCommand::Reset),
            other => Err(DecodeError::UnknownCommand(other.to_string())),
        }
    }
}

fn required(
    field: Option<&str>,
    command: &'static str,
    name: &'static str,
) -> Result<String, DecodeError> {
    match field {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(DecodeError::MissingField {
            command,
            field: name,
        }),
    }
}

/// A message published by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    AccessGranted { user_id: String, lock_id: String },
    AccessDenied { user_id: String, lock_id: String },
    Intrusion,
    StatusResponse,
    ResetAcknowledged,
}

impl Notification {
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::AccessGranted { user_id, lock_id } => {
                write!(f, "access_granted/{}/roomX/{}", user_id, lock_id)
            }
            Notification::AccessDenied { user_id, lock_id } => {
                write!(f, "access_denied/{}/roomX/{}", user_id, lock_id)
            }
            Notification::Intrusion => f.write_str("intrusion/door_opened_without_permission"),
            Notification::StatusResponse => f.write_str("status_response/device_alive"),
            Notification::ResetAcknowledged => f.write_str("reset_acknowledged"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(payload: &str) -> Result<PendingCommand, DecodeError> {
        PendingCommand::decode(payload.as_bytes())
    }

    #[test]
    fn grant() {
        assert_eq!(
            decode("access/L1/U1"),
            Ok(PendingCommand::Grant {
                lock_id: "L1".to_string(),
                user_id: "U1".to_string()
            })
        );
        assert_eq!(
            decode(" access / L1 / U1 \n"),
            Ok(PendingCommand::Grant {
                lock_id: "L1".to_string(),
                user_id: "U1".to_string()
            })
        );
    }

    #[test]
    fn grant_needs_both_ids() {
        assert_eq!(
            decode("access/L1"),
            Err(DecodeError::MissingField {
                command: "access",
                field: "user id"
            })
        );
        assert_eq!(
            decode("access//U1"),
            Err(DecodeError::MissingField {
                command: "access",
                field: "lock id"
            })
        );
    }

    #[test]
    fn deny_defaults_user() {
        assert_eq!(
            decode("noaccess/L1/U7"),
            Ok(PendingCommand::Deny {
                user_id: "U7".to_string()
            })
        );
        assert_eq!(
            decode("noaccess/L1"),
            Ok(PendingCommand::Deny {
                user_id: "unknown".to_string()
            })
        );
        assert_eq!(
            decode("noaccess"),
            Ok(PendingCommand::Deny {
                user_id: "unknown".to_string()
            })
        );
    }

    #[test]
    fn intrusion_keeps_remainder() {
        assert_eq!(
            decode("intrusion/back door/camera 2"),
            Ok(PendingCommand::Intrusion {
                info: "back door/camera 2".to_string()
            })
        );
        assert!(decode("intrusion").is_err());
    }

    #[test]
    fn bare_commands() {
        assert_eq!(decode("status"), Ok(PendingCommand::StatusQuery));
        assert_eq!(decode("status/anything"), Ok(PendingCommand::StatusQuery));
        assert_eq!(decode("reset"), Ok(PendingCommand::Reset));
    }

    #[test]
    fn malformed() {
        assert_eq!(
            decode("garbage"),
            Err(DecodeError::UnknownCommand("garbage".to_string()))
        );
        assert_eq!(
            decode("access_granted/U1/roomX/L1"),
            Err(DecodeError::UnknownCommand("access_granted".to_string()))
        );
        assert_eq!(decode("   "), Err(DecodeError::Empty));
        assert_eq!(
            PendingCommand::decode(&[0x72, 0xff, 0x73]),
            Err(DecodeError::Utf8)
        );
    }

    #[test]
    fn outbound_format() {
        let granted = Notification::AccessGranted {
            user_id: "U1".to_string(),
            lock_id: "L1".to_string(),
        };
        assert_eq!(granted.encode(), "access_granted/U1/roomX/L1");
        assert_eq!(
            Notification::Intrusion.encode(),
            "intrusion/door_opened_without_permission"
        );
        assert_eq!(
            Notification::StatusResponse.encode(),
            "status_response/device_alive"
        );
        assert_eq!(Notification::ResetAcknowledged.encode(), "reset_acknowledged");
    }
}
