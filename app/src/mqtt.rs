//! MQTT transport for the [`MessageRouter`] seam.
//!
//! `rumqttc` drives the connection from a dedicated thread. Inbound
//! publishes on the command topic are forwarded over a channel and only
//! consumed when the main loop drains it. Reconnecting is left to the
//! `rumqttc` event loop: after an error the thread waits and polls again,
//! and the command topic is resubscribed on every `ConnAck`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use log::{debug, error, info};
use rumqttc::{Client, Event, MqttOptions, Packet, QoS};

use crate::config::MqttConfig;
use crate::error::TransportError;
use crate::message::Notification;
use crate::router::MessageRouter;
use crate::term_on_err;

const REQUEST_CAPACITY: usize = 16;

pub struct MqttRouter {
    client: Client,
    event_topic: String,
    incoming: mpsc::Receiver<Vec<u8>>,
}

impl MqttRouter {
    /// Start the connection thread. Connecting happens in the background, so
    /// this does not fail when the broker is unreachable.
    pub fn connect(
        config: &MqttConfig,
        client_id: &str,
        term: Arc<AtomicBool>,
    ) -> (MqttRouter, JoinHandle<()>) {
        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options.set_keep_alive(config.keep_alive);
        if let Some(username) = &config.username {
            let password = config.password.clone().unwrap_or_default();
            options.set_credentials(username.clone(), password);
        }

        let (client, mut connection) = Client::new(options, REQUEST_CAPACITY);
        let (tx, rx) = mpsc::channel();
        let subscriber = Subscriber {
            client: client.clone(),
            topic: config.command_topic.clone(),
        };
        let command_topic = config.command_topic.clone();
        let reconnect_delay = config.reconnect_delay;
        info!("connecting to mqtt broker {}:{}", config.host, config.port);

        let thread = thread::spawn(move || {
            let mut subscriber = subscriber;
            for notification in connection.iter() {
                if term.load(Ordering::Relaxed) {
                    break;
                }
                match notification {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("connected to mqtt broker");
                        if let Err(err) = subscriber.subscribe() {
                            error!("{}", err);
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        if is_command(&publish.topic, &command_topic) {
                            term_on_err!(tx.send(publish.payload.to_vec()), &term);
                        } else {
                            debug!("ignoring publish on {}", publish.topic);
                        }
                    }
                    Ok(event) => debug!("mqtt event {:?}", event),
                    Err(err) => {
                        error!("mqtt connection error: {}", err);
                        thread::sleep(reconnect_delay);
                    }
                }
            }
            info!("mqtt thread exiting");
        });

        let router = MqttRouter {
            client,
            event_topic: config.event_topic.clone(),
            incoming: rx,
        };
        (router, thread)
    }

    /// Ask the event loop to disconnect so the connection thread can finish.
    pub fn disconnect(&mut self) {
        if let Err(err) = self.client.disconnect() {
            debug!("mqtt disconnect: {}", err);
        }
    }
}

impl MessageRouter for MqttRouter {
    fn poll_incoming(&mut self) -> Option<Vec<u8>> {
        match self.incoming.try_recv() {
            Ok(payload) => Some(payload),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => None,
        }
    }

    fn publish(&mut self, notification: &Notification) -> Result<(), TransportError> {
        self.client
            .try_publish(
                self.event_topic.clone(),
                QoS::AtLeastOnce,
                false,
                notification.encode(),
            )
            .map_err(|source| TransportError::Publish {
                topic: self.event_topic.clone(),
                source,
            })
    }
}

/// The command topic may be a filter such as `fastapi/topic/#`.
fn is_command(topic: &str, command_filter: &str) -> bool {
    rumqttc::matches(topic, command_filter)
}

struct Subscriber {
    client: Client,
    topic: String,
}

impl Subscriber {
    fn subscribe(&mut self) -> Result<(), TransportError> {
        self.client
            .try_subscribe(self.topic.clone(), QoS::AtLeastOnce)
            .map_err(|source| TransportError::Subscribe {
                topic: self.topic.clone(),
                source,
            })?;
        info!("subscribed to {}", self.topic);
        Ok(())
    }
}
