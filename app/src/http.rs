use std::borrow::Cow;
use std::error::Error;
use std::net::ToSocketAddrs;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use json::object;
use tiny_http::Response;

use crate::{AccessState, Snapshot};

const HTML: &str = include_str!("home.html");

pub struct Server(tiny_http::Server);

impl Server {
    pub fn new<A>(addr: A) -> Result<Server, Box<dyn Error + Send + Sync + 'static>>
    where
        A: ToSocketAddrs,
    {
        tiny_http::Server::http(addr).map(Server)
    }

    pub fn handle_requests(&self, state: Arc<RwLock<Snapshot>>) {
        let json = "Content-type: application/json; charset=utf-8"
            .parse::<tiny_http::Header>()
            .unwrap();
        let html_content = "Content-type: text/html; charset=utf-8"
            .parse::<tiny_http::Header>()
            .unwrap();
        for request in self.0.incoming_requests() {
            let current_state = match state.read() {
                Ok(state) => *state,
                Err(_) => {
                    let _ = request.respond(
                        Response::from_string("State unavailable").with_status_code(500),
                    );
                    continue;
                }
            };
            let now = Instant::now();
            let response = match request.url() {
                "/" => {
                    let html = HTML
                        .replace("$doorstate$", &door_status(&current_state, now))
                        .replace("$alarm$", alarm_status(&current_state));
                    Response::from_string(html).with_header(html_content.clone())
                }
                "/door.json" => {
                    let body = json::stringify_pretty(door_json(&current_state, now), 2);
                    Response::from_string(body).with_header(json.clone())
                }
                _ => Response::from_string("Not found").with_status_code(404),
            };

            // Ignoring I/O errors that occur here so that we don't take down the process if there
            // is an issue sending the response.
            let _ = request.respond(response);
        }
    }

    pub fn shutdown(&self) {
        self.0.unblock();
    }
}

fn door_status(state: &Snapshot, now: Instant) -> String {
    match state.access {
        AccessState::DoorClosed => String::from("🟢 Closed"),
        access => {
            let duration = state
                .open_since
                .map(|opened| {
                    let duration = now.duration_since(opened);
                    let formatter = timeago::Formatter::new();
                    Cow::from(formatter.convert(duration))
                })
                .unwrap_or_else(|| Cow::from("at an unknown time"));
            let marker = match access {
                AccessState::DoorOpenAuthorized => "🔵",
                _ => "🔴",
            };
            format!("{} Opened {} ({})", marker, duration, access)
        }
    }
}

fn alarm_status(state: &Snapshot) -> &'static str {
    if state.alarm_sounding {
        "🚨 Sounding"
    } else {
        "Idle"
    }
}

fn door_json(state: &Snapshot, now: Instant) -> json::JsonValue {
    object! {
        state: state.door_state().to_string(),
        access: state.access.to_string(),
        authorized: state.authorized,
        indicator: state.indicator.to_string(),
        alarm: state.alarm_sounding,
        attempts: state.attempts,
        open_for: state.open_since.map(|opened| now.duration_since(opened).as_secs()),
        secs_since_intrusion: state.last_intrusion_at.map(|at| now.duration_since(at).as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn json_for_closed_door() {
        let now = Instant::now();
        let value = door_json(&Snapshot::default(), now);
        assert_eq!(value["state"], "Closed");
        assert_eq!(value["access"], "Closed");
        assert_eq!(value["authorized"], false);
        assert_eq!(value["alarm"], false);
        assert!(value["open_for"].is_null());
        assert!(value["secs_since_intrusion"].is_null());
    }

    #[test]
    fn json_for_intrusion() {
        let opened = Instant::now();
        let now = opened + Duration::from_secs(3);
        let snapshot = Snapshot {
            access: AccessState::DoorOpenUnauthorized,
            indicator: crate::IndicatorState::Denied,
            alarm_sounding: true,
            open_since: Some(opened),
            last_intrusion_at: Some(opened),
            attempts: 2,
            ..Snapshot::default()
        };
        let value = door_json(&snapshot, now);
        assert_eq!(value["state"], "Open");
        assert_eq!(value["access"], "Unauthorized");
        assert_eq!(value["indicator"], "denied");
        assert_eq!(value["alarm"], true);
        assert_eq!(value["open_for"], 3);
        assert_eq!(value["secs_since_intrusion"], 3);
        assert_eq!(value["attempts"], 2);
    }

    #[test]
    fn status_text() {
        let opened = Instant::now();
        let snapshot = Snapshot {
            access: AccessState::DoorOpenAuthorized,
            open_since: Some(opened),
            ..Snapshot::default()
        };
        let text = door_status(&snapshot, opened + Duration::from_secs(120));
        assert!(text.starts_with("🔵 Opened"), "{}", text);
        assert!(text.ends_with("(Authorized)"), "{}", text);
        assert_eq!(door_status(&Snapshot::default(), opened), "🟢 Closed");
    }
}
