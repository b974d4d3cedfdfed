use log::debug;

use crate::error::TransportError;
use crate::message::Notification;

/// The messaging channel as seen by the controller.
///
/// Implementations own the transport: connecting, reconnecting and
/// subscribing all happen behind this trait.
pub trait MessageRouter {
    /// Next raw inbound payload, if one is waiting. Never blocks.
    fn poll_incoming(&mut self) -> Option<Vec<u8>>;

    fn publish(&mut self, notification: &Notification) -> Result<(), TransportError>;
}

/// Router used when no messaging channel is configured.
#[derive(Debug, Default)]
pub struct NullRouter;

impl MessageRouter for NullRouter {
    fn poll_incoming(&mut self) -> Option<Vec<u8>> {
        None
    }

    fn publish(&mut self, notification: &Notification) -> Result<(), TransportError> {
        debug!("no messaging channel, dropping {}", notification);
        Ok(())
    }
}
