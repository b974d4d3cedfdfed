//! The access decision state machine.
//!
//! ```text
//!            Opened (authorized)
//! DoorClosed ─────────────────────▶ DoorOpenAuthorized ◀─┐
//!    │   ▲                                 ▲             │ Grant
//!    │   └──────── Closed ─────────────────┼─────────┐   │
//!    │ Opened (no grant, fallback)         │ granted │   │
//!    ▼                                     │         │   │
//! DoorOpenPendingDecision ─────────────────┘         │   │
//!    │ denied                                        │   │
//!    ▼                                               │   │
//! DoorOpenUnauthorized ──────────────────────────────┴───┘
//!      (alarm triggered on entry from an Opened edge)
//! ```
//!
//! With an external authority an opening without a prior grant goes straight
//! to `DoorOpenUnauthorized`.

use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::alarm::{
    AlarmRun, AlarmSequencer, AlarmState, DEFAULT_ALARM_DURATION, DEFAULT_BLINK_PERIOD,
};
use crate::authorization::{
    fallback_decide, Authority, AuthorizationStore, CommandEffect, Grantee,
};
use crate::debounce::{Debouncer, Edge};
use crate::door_state::AccessState;
use crate::indicator::{Indicator, IndicatorState};
use crate::message::{Notification, PendingCommand};
use crate::router::MessageRouter;
use crate::Snapshot;

const FALLBACK_USER: &str = "local";
const UNKNOWN_USER: &str = "unknown";

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub authority: Authority,
    /// Identifies this device in notifications when no lock id is set.
    pub client_id: String,
    /// Grants for other locks are ignored when set.
    pub lock_id: Option<String>,
    pub debounce_samples: u32,
    pub alarm_duration: Duration,
    pub blink_period: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            authority: Authority::External,
            client_id: String::from("esp32micro"),
            lock_id: None,
            debounce_samples: 1,
            alarm_duration: DEFAULT_ALARM_DURATION,
            blink_period: DEFAULT_BLINK_PERIOD,
        }
    }
}

pub struct Controller<R, I> {
    authority: Authority,
    local_lock_id: String,
    debouncer: Debouncer,
    store: AuthorizationStore,
    alarm: AlarmSequencer,
    state: AccessState,
    indicator_state: IndicatorState,
    attempts: u32,
    open_since: Option<Instant>,
    last_intrusion_at: Option<Instant>,
    router: R,
    indicator: I,
}

impl<R, I> Controller<R, I>
where
    R: MessageRouter,
    I: Indicator,
{
    pub fn new(config: ControllerConfig, router: R, mut indicator: I) -> Self {
        indicator.show(IndicatorState::Off);
        indicator.set_alarm(None);
        let local_lock_id = config
            .lock_id
            .clone()
            .unwrap_or_else(|| config.client_id.clone());

        Controller {
            authority: config.authority,
            local_lock_id,
            debouncer: Debouncer::with_samples(config.debounce_samples),
            store: AuthorizationStore::new(config.lock_id),
            alarm: AlarmSequencer::new(config.alarm_duration, config.blink_period),
            state: AccessState::DoorClosed,
            indicator_state: IndicatorState::Off,
            attempts: 0,
            open_since: None,
            last_intrusion_at: None,
            router,
            indicator,
        }
    }

    /// One pass of the main loop: drain inbound messages, process the sensor
    /// sample, then advance the alarm.
    pub fn tick(&mut self, now: Instant, raw_door_open: bool) {
        self.drain_incoming();
        if let Some(edge) = self.debouncer.poll(raw_door_open) {
            self.on_edge(edge, now);
        }
        self.advance_alarm(now);
    }

    pub fn drain_incoming(&mut self) {
        while let Some(payload) = self.router.poll_incoming() {
            self.handle_payload(&payload);
        }
    }

    /// Malformed payloads are logged and dropped.
    pub fn handle_payload(&mut self, payload: &[u8]) {
        match PendingCommand::decode(payload) {
            Ok(cmd) => self.handle_command(cmd),
            Err(err) => warn!(
                "dropping message {:?}: {}",
                String::from_utf8_lossy(payload),
                err
            ),
        }
    }

    pub fn handle_command(&mut self, cmd: PendingCommand) {
        debug!("command {:?} in state {}", cmd, self.state);
        let door_open = self.state.door_state().is_open();

        match self.store.on_command(cmd) {
            CommandEffect::Indicator(state) => {
                self.show(state);
                if door_open {
                    self.follow_authorization();
                    if state == IndicatorState::Granted {
                        self.publish_granted();
                    }
                }
            }
            CommandEffect::Reset => {
                if self.alarm.cancel() {
                    self.indicator.set_alarm(None);
                }
                self.show(IndicatorState::Off);
                if door_open {
                    self.follow_authorization();
                }
                self.publish(Notification::ResetAcknowledged);
            }
            CommandEffect::Forward(PendingCommand::StatusQuery) => {
                info!("status requested");
                self.publish(Notification::StatusResponse);
            }
            CommandEffect::Forward(PendingCommand::Intrusion { info }) => {
                warn!("intrusion reported: {}", info);
                // an authorized open door keeps its granted indicator
                if self.state != AccessState::DoorOpenAuthorized {
                    self.show(IndicatorState::Denied);
                }
            }
            CommandEffect::Forward(cmd) => debug!("nothing to do for {:?}", cmd),
            CommandEffect::Ignored => {}
        }
    }

    pub fn on_edge(&mut self, edge: Edge, now: Instant) {
        match edge {
            Edge::Opened => {
                info!("door opened");
                self.open_since = Some(now);
                if self.store.is_authorized() {
                    self.enter_authorized();
                    return;
                }
                match self.authority {
                    Authority::External => self.enter_unauthorized(now, UNKNOWN_USER),
                    Authority::Fallback => {
                        self.state = AccessState::DoorOpenPendingDecision;
                        self.attempts = self.attempts.wrapping_add(1);
                        let granted = fallback_decide(self.attempts);
                        debug!("fallback attempt {} granted: {}", self.attempts, granted);
                        if granted {
                            self.store.grant_locally(Grantee {
                                user_id: FALLBACK_USER.to_string(),
                                lock_id: self.local_lock_id.clone(),
                            });
                            self.enter_authorized();
                        } else {
                            self.enter_unauthorized(now, FALLBACK_USER);
                        }
                    }
                }
            }
            Edge::Closed => {
                match self.state {
                    AccessState::DoorOpenAuthorized => info!("door closed after valid access"),
                    _ => info!("door closed"),
                }
                self.store.on_door_closed();
                self.state = AccessState::DoorClosed;
                self.open_since = None;
                self.show(IndicatorState::Off);
            }
        }
    }

    pub fn advance_alarm(&mut self, now: Instant) {
        if let Some(output) = self.alarm.tick(now) {
            self.indicator.set_alarm(output);
        }
    }

    /// Switch every output off, e.g. before exiting.
    pub fn shutdown(&mut self) {
        self.alarm.cancel();
        self.indicator.set_alarm(None);
        self.show(IndicatorState::Off);
    }

    fn enter_authorized(&mut self) {
        self.state = AccessState::DoorOpenAuthorized;
        self.show(IndicatorState::Granted);
        self.publish_granted();
    }

    fn enter_unauthorized(&mut self, now: Instant, user_id: &str) {
        self.state = AccessState::DoorOpenUnauthorized;
        self.show(IndicatorState::Denied);
        self.publish(Notification::AccessDenied {
            user_id: user_id.to_string(),
            lock_id: self.local_lock_id.clone(),
        });

        match self.alarm.trigger(now) {
            AlarmRun::Started { .. } => {
                warn!("door opened without permission");
                self.last_intrusion_at = Some(now);
                self.indicator.set_alarm(self.alarm.output());
                self.publish(Notification::Intrusion);
            }
            AlarmRun::AlreadySounding => {}
        }
    }

    fn follow_authorization(&mut self) {
        self.state = if self.store.is_authorized() {
            AccessState::DoorOpenAuthorized
        } else {
            AccessState::DoorOpenUnauthorized
        };
    }

    fn publish_granted(&mut self) {
        let (user_id, lock_id) = match self.store.grantee() {
            Some(grantee) => (grantee.user_id.clone(), grantee.lock_id.clone()),
            None => (UNKNOWN_USER.to_string(), self.local_lock_id.clone()),
        };
        self.publish(Notification::AccessGranted { user_id, lock_id });
    }

    fn show(&mut self, state: IndicatorState) {
        self.indicator_state = state;
        self.indicator.show(state);
    }

    fn publish(&mut self, notification: Notification) {
        match self.router.publish(&notification) {
            Ok(()) => info!("sent {}", notification),
            Err(err) => warn!("unable to send {}: {}", notification, err),
        }
    }

    pub fn state(&self) -> AccessState {
        self.state
    }

    pub fn is_authorized(&self) -> bool {
        self.store.is_authorized()
    }

    pub fn indicator_state(&self) -> IndicatorState {
        self.indicator_state
    }

    pub fn alarm_state(&self) -> AlarmState {
        self.alarm.state()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn router(&self) -> &R {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut R {
        &mut self.router
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            access: self.state,
            authorized: self.store.is_authorized(),
            indicator: self.indicator_state,
            alarm_sounding: self.alarm.is_sounding(),
            open_since: self.open_since,
            last_intrusion_at: self.last_intrusion_at,
            attempts: self.attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockIndicator, MockRouter};

    fn controller(authority: Authority) -> Controller<MockRouter, MockIndicator> {
        let config = ControllerConfig {
            authority,
            ..ControllerConfig::default()
        };
        Controller::new(config, MockRouter::new(), MockIndicator::new())
    }

    #[test]
    fn starts_closed_and_dark() {
        let controller = controller(Authority::External);
        assert_eq!(controller.state(), AccessState::DoorClosed);
        assert_eq!(controller.indicator().leds(), (false, false));
        assert!(controller.router().published().is_empty());
    }

    #[test]
    fn external_authority_alarms_on_ungranted_open() {
        let now = Instant::now();
        let mut controller = controller(Authority::External);
        controller.tick(now, true);

        assert_eq!(controller.state(), AccessState::DoorOpenUnauthorized);
        assert_eq!(controller.indicator_state(), IndicatorState::Denied);
        assert!(controller.alarm.is_sounding());
        assert_eq!(
            controller.router().published(),
            vec![
                "access_denied/unknown/roomX/esp32micro",
                "intrusion/door_opened_without_permission"
            ]
        );
    }

    #[test]
    fn grant_while_open_is_published_immediately() {
        let now = Instant::now();
        let mut controller = controller(Authority::External);
        controller.tick(now, true);
        controller.router_mut().push("access/L1/U1");
        controller.tick(now + Duration::from_millis(100), true);

        assert_eq!(controller.state(), AccessState::DoorOpenAuthorized);
        assert_eq!(controller.indicator_state(), IndicatorState::Granted);
        assert_eq!(
            controller.router().published().last().map(String::as_str),
            Some("access_granted/U1/roomX/L1")
        );
        // the alarm is not aborted by a grant
        assert!(controller.alarm.is_sounding());
    }

    #[test]
    fn deny_while_authorized_does_not_alarm() {
        let now = Instant::now();
        let mut controller = controller(Authority::External);
        controller.router_mut().push("access/L1/U1");
        controller.tick(now, true);
        assert_eq!(controller.state(), AccessState::DoorOpenAuthorized);

        controller.router_mut().push("noaccess/L1/U1");
        controller.tick(now + Duration::from_millis(100), true);
        assert_eq!(controller.state(), AccessState::DoorOpenUnauthorized);
        assert_eq!(controller.indicator_state(), IndicatorState::Denied);
        assert!(!controller.alarm.is_sounding());
    }

    #[test]
    fn status_query_is_answered() {
        let now = Instant::now();
        let mut controller = controller(Authority::External);
        controller.router_mut().push("status");
        controller.tick(now, false);
        assert_eq!(
            controller.router().published(),
            vec!["status_response/device_alive"]
        );
        assert_eq!(controller.state(), AccessState::DoorClosed);
    }

    #[test]
    fn intrusion_report_shows_denied() {
        let now = Instant::now();
        let mut controller = controller(Authority::External);
        controller.router_mut().push("intrusion/window");
        controller.tick(now, false);
        assert_eq!(controller.indicator_state(), IndicatorState::Denied);
        assert!(!controller.is_authorized());
        assert!(controller.router().published().is_empty());
    }

    #[test]
    fn intrusion_report_keeps_granted_indicator_while_authorized() {
        let now = Instant::now();
        let mut controller = controller(Authority::External);
        controller.router_mut().push("access/L1/U1");
        controller.tick(now, true);
        assert_eq!(controller.state(), AccessState::DoorOpenAuthorized);

        controller.router_mut().push("intrusion/window");
        controller.tick(now + Duration::from_millis(100), true);
        assert_eq!(controller.state(), AccessState::DoorOpenAuthorized);
        assert_eq!(controller.indicator_state(), IndicatorState::Granted);
        assert_eq!(controller.indicator().leds(), (true, false));
        assert_eq!(controller.snapshot().indicator, IndicatorState::Granted);
    }

    #[test]
    fn fallback_attempt_counter_wraps() {
        let now = Instant::now();
        let mut controller = controller(Authority::Fallback);
        controller.attempts = u32::MAX - 1;

        // u32::MAX is odd
        controller.tick(now, true);
        assert_eq!(controller.attempts(), u32::MAX);
        assert_eq!(controller.state(), AccessState::DoorOpenAuthorized);
        controller.tick(now + Duration::from_millis(100), false);

        // wraps to 0, which is even
        controller.tick(now + Duration::from_millis(200), true);
        assert_eq!(controller.attempts(), 0);
        assert_eq!(controller.state(), AccessState::DoorOpenUnauthorized);
        assert!(controller.alarm.is_sounding());
    }

    #[test]
    fn publish_failures_do_not_stop_the_controller() {
        let now = Instant::now();
        let mut controller = controller(Authority::External);
        controller.router_mut().set_offline(true);
        controller.router_mut().push("access/L1/U1");
        controller.tick(now, true);

        assert_eq!(controller.state(), AccessState::DoorOpenAuthorized);
        assert_eq!(controller.indicator().leds(), (true, false));
        assert!(controller.router().published().is_empty());
    }
}
