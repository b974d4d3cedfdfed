//! JSON configuration file.
//!
//! Every key is optional. A missing file at the default location means "use
//! the defaults", which runs the controller with the local fallback policy
//! and no messaging channel.

use std::fs;
use std::io;
use std::time::Duration;

use json::JsonValue;
use log::LevelFilter;

use crate::alarm::{DEFAULT_ALARM_DURATION, DEFAULT_BLINK_PERIOD};
use crate::authorization::Authority;
use crate::controller::ControllerConfig;
use crate::error::ConfigError;

pub const DEFAULT_PATH: &str = "/etc/door-access.json";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub command_topic: String,
    pub event_topic: String,
    pub keep_alive: Duration,
    pub reconnect_delay: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GpioConfig {
    pub door_pin: u8,
    pub granted_led_pin: u8,
    pub denied_led_pin: u8,
    /// Sensor reads high when the door is open.
    pub door_open_high: bool,
}

impl Default for GpioConfig {
    fn default() -> Self {
        GpioConfig {
            door_pin: 27,
            granted_led_pin: 25,
            denied_led_pin: 26,
            door_open_high: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timing {
    pub poll_interval: Duration,
    pub alarm_duration: Duration,
    pub blink_period: Duration,
    pub debounce_samples: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            poll_interval: DEFAULT_POLL_INTERVAL,
            alarm_duration: DEFAULT_ALARM_DURATION,
            blink_period: DEFAULT_BLINK_PERIOD,
            debounce_samples: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub log_level: LevelFilter,
    pub authority: Authority,
    pub client_id: String,
    pub lock_id: Option<String>,
    pub mqtt: Option<MqttConfig>,
    pub gpio: GpioConfig,
    pub timing: Timing,
    pub http_addr: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: LevelFilter::Info,
            authority: Authority::Fallback,
            client_id: String::from("esp32micro"),
            lock_id: None,
            mqtt: None,
            gpio: GpioConfig::default(),
            timing: Timing::default(),
            http_addr: None,
        }
    }
}

impl Config {
    /// Load from `path`, or from [`DEFAULT_PATH`] when none is given.
    ///
    /// Only a missing file at the default location falls back to defaults; an
    /// explicitly named file has to exist.
    pub fn load(path: Option<&str>) -> Result<Config, ConfigError> {
        match path {
            Some(path) => Config::read(path, false),
            None => Config::read(DEFAULT_PATH, true),
        }
    }

    fn read(path: &str, missing_is_default: bool) -> Result<Config, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => Config::parse(&text, path),
            Err(err) if err.kind() == io::ErrorKind::NotFound && missing_is_default => {
                Ok(Config::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_string(),
                source,
            }),
        }
    }

    pub fn parse(text: &str, path: &str) -> Result<Config, ConfigError> {
        let root = json::parse(text).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        if !root.is_object() {
            return Err(wrong_type("(root)", "object"));
        }

        let defaults = Config::default();
        let log_level = match string(&root, "log_level", "log_level")? {
            Some(level) => level.parse::<LevelFilter>().map_err(|_| ConfigError::InvalidValue {
                key: String::from("log_level"),
                value: level,
            })?,
            None => defaults.log_level,
        };

        let device = section(&root, "device")?;
        let client_id = string(device, "client_id", "device.client_id")?
            .unwrap_or(defaults.client_id);
        let lock_id = string(device, "lock_id", "device.lock_id")?;

        let mqtt = parse_mqtt(&root)?;
        let authority = match string(&root, "authority", "authority")?.as_deref() {
            Some("external") => Authority::External,
            Some("fallback") => Authority::Fallback,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: String::from("authority"),
                    value: other.to_string(),
                })
            }
            None if mqtt.is_some() => Authority::External,
            None => Authority::Fallback,
        };
        if authority == Authority::External && mqtt.is_none() {
            return Err(ConfigError::MissingMessaging);
        }

        let gpio = parse_gpio(&root)?;
        let timing = parse_timing(&root)?;
        let http = section(&root, "http")?;
        let http_addr = string(http, "addr", "http.addr")?;

        Ok(Config {
            log_level,
            authority,
            client_id,
            lock_id,
            mqtt,
            gpio,
            timing,
            http_addr,
        })
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            authority: self.authority,
            client_id: self.client_id.clone(),
            lock_id: self.lock_id.clone(),
            debounce_samples: self.timing.debounce_samples,
            alarm_duration: self.timing.alarm_duration,
            blink_period: self.timing.blink_period,
        }
    }
}

fn parse_mqtt(root: &JsonValue) -> Result<Option<MqttConfig>, ConfigError> {
    let mqtt = &root["mqtt"];
    if mqtt.is_null() {
        return Ok(None);
    }
    if !mqtt.is_object() {
        return Err(wrong_type("mqtt", "object"));
    }

    let host = match string(mqtt, "host", "mqtt.host")? {
        Some(host) if !host.is_empty() => host,
        _ => return Err(ConfigError::MissingMessaging),
    };
    let port = match number(mqtt, "port", "mqtt.port")? {
        Some(port) if port <= u64::from(u16::MAX) => port as u16,
        Some(port) => {
            return Err(ConfigError::InvalidValue {
                key: String::from("mqtt.port"),
                value: port.to_string(),
            })
        }
        None => 1883,
    };

    Ok(Some(MqttConfig {
        host,
        port,
        username: string(mqtt, "username", "mqtt.username")?,
        password: string(mqtt, "password", "mqtt.password")?,
        command_topic: string(mqtt, "command_topic", "mqtt.command_topic")?
            .unwrap_or_else(|| String::from("fastapi/topic/command")),
        event_topic: string(mqtt, "event_topic", "mqtt.event_topic")?
            .unwrap_or_else(|| String::from("fastapi/topic")),
        keep_alive: Duration::from_secs(positive(
            mqtt,
            "keep_alive_secs",
            "mqtt.keep_alive_secs",
            30,
        )?),
        reconnect_delay: Duration::from_millis(positive(
            mqtt,
            "reconnect_delay_ms",
            "mqtt.reconnect_delay_ms",
            2000,
        )?),
    }))
}

fn parse_gpio(root: &JsonValue) -> Result<GpioConfig, ConfigError> {
    let gpio = section(root, "gpio")?;
    let defaults = GpioConfig::default();
    let door_open_high = match string(gpio, "door_open_level", "gpio.door_open_level")?.as_deref()
    {
        Some("high") | None => true,
        Some("low") => false,
        Some(other) => {
            return Err(ConfigError::InvalidValue {
                key: String::from("gpio.door_open_level"),
                value: other.to_string(),
            })
        }
    };

    Ok(GpioConfig {
        door_pin: pin(gpio, "door_pin", defaults.door_pin)?,
        granted_led_pin: pin(gpio, "granted_led_pin", defaults.granted_led_pin)?,
        denied_led_pin: pin(gpio, "denied_led_pin", defaults.denied_led_pin)?,
        door_open_high,
    })
}

fn parse_timing(root: &JsonValue) -> Result<Timing, ConfigError> {
    let timing = section(root, "timing")?;
    let defaults = Timing::default();
    let millis = |key: &str, default: Duration| -> Result<Duration, ConfigError> {
        let dotted = format!("timing.{}", key);
        positive(timing, key, &dotted, default.as_millis() as u64).map(Duration::from_millis)
    };

    let debounce_samples = positive(
        timing,
        "debounce_samples",
        "timing.debounce_samples",
        u64::from(defaults.debounce_samples),
    )?;
    if debounce_samples > u64::from(u32::MAX) {
        return Err(ConfigError::InvalidValue {
            key: String::from("timing.debounce_samples"),
            value: debounce_samples.to_string(),
        });
    }

    Ok(Timing {
        poll_interval: millis("poll_interval_ms", defaults.poll_interval)?,
        alarm_duration: millis("alarm_duration_ms", defaults.alarm_duration)?,
        blink_period: millis("blink_period_ms", defaults.blink_period)?,
        debounce_samples: debounce_samples as u32,
    })
}

/// A nested object, or `Null` when absent.
fn section<'a>(root: &'a JsonValue, key: &str) -> Result<&'a JsonValue, ConfigError> {
    let value = &root[key];
    if value.is_null() || value.is_object() {
        Ok(value)
    } else {
        Err(wrong_type(key, "object"))
    }
}

fn string(value: &JsonValue, key: &str, dotted: &str) -> Result<Option<String>, ConfigError> {
    let value = &value[key];
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_str()
        .map(|s| Some(s.to_string()))
        .ok_or_else(|| wrong_type(dotted, "string"))
}

fn number(value: &JsonValue, key: &str, dotted: &str) -> Result<Option<u64>, ConfigError> {
    let value = &value[key];
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_u64()
        .map(Some)
        .ok_or_else(|| wrong_type(dotted, "non-negative integer"))
}

fn positive(value: &JsonValue, key: &str, dotted: &str, default: u64) -> Result<u64, ConfigError> {
    match number(value, key, dotted)? {
        Some(0) => Err(ConfigError::Zero {
            key: dotted.to_string(),
        }),
        Some(n) => Ok(n),
        None => Ok(default),
    }
}

fn pin(gpio: &JsonValue, key: &str, default: u8) -> Result<u8, ConfigError> {
    let dotted = format!("gpio.{}", key);
    match number(gpio, key, &dotted)? {
        Some(n) if n <= u64::from(u8::MAX) => Ok(n as u8),
        Some(n) => Err(ConfigError::InvalidValue {
            key: dotted,
            value: n.to_string(),
        }),
        None => Ok(default),
    }
}

fn wrong_type(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::WrongType {
        key: key.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_all_defaults() {
        let config = Config::parse("{}", "test.json").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.authority, Authority::Fallback);
        assert_eq!(config.timing.poll_interval, Duration::from_millis(100));
        assert_eq!(config.timing.alarm_duration, Duration::from_secs(5));
    }

    #[test]
    fn full_file() {
        let text = r#"{
            "log_level": "debug",
            "device": { "client_id": "door-1", "lock_id": "L1" },
            "mqtt": {
                "host": "192.168.168.29",
                "port": 1884,
                "username": "door",
                "password": "secret",
                "command_topic": "doors/1/cmd",
                "event_topic": "doors/1/events",
                "keep_alive_secs": 10,
                "reconnect_delay_ms": 500
            },
            "gpio": { "door_pin": 15, "granted_led_pin": 4, "denied_led_pin": 2, "door_open_level": "low" },
            "timing": { "poll_interval_ms": 50, "alarm_duration_ms": 10000, "blink_period_ms": 800, "debounce_samples": 3 },
            "http": { "addr": "0.0.0.0:8888" }
        }"#;
        let config = Config::parse(text, "test.json").unwrap();
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert_eq!(config.authority, Authority::External);
        assert_eq!(config.client_id, "door-1");
        assert_eq!(config.lock_id.as_deref(), Some("L1"));

        let mqtt = config.mqtt.as_ref().unwrap();
        assert_eq!(mqtt.host, "192.168.168.29");
        assert_eq!(mqtt.port, 1884);
        assert_eq!(mqtt.username.as_deref(), Some("door"));
        assert_eq!(mqtt.command_topic, "doors/1/cmd");
        assert_eq!(mqtt.keep_alive, Duration::from_secs(10));
        assert_eq!(mqtt.reconnect_delay, Duration::from_millis(500));

        assert_eq!(
            config.gpio,
            GpioConfig {
                door_pin: 15,
                granted_led_pin: 4,
                denied_led_pin: 2,
                door_open_high: false,
            }
        );
        assert_eq!(config.timing.debounce_samples, 3);
        assert_eq!(config.timing.blink_period, Duration::from_millis(800));
        assert_eq!(config.http_addr.as_deref(), Some("0.0.0.0:8888"));

        let controller = config.controller_config();
        assert_eq!(controller.alarm_duration, Duration::from_secs(10));
        assert_eq!(controller.lock_id.as_deref(), Some("L1"));
    }

    #[test]
    fn mqtt_defaults() {
        let config = Config::parse(r#"{ "mqtt": { "host": "broker" } }"#, "t").unwrap();
        let mqtt = config.mqtt.unwrap();
        assert_eq!(mqtt.port, 1883);
        assert_eq!(mqtt.command_topic, "fastapi/topic/command");
        assert_eq!(mqtt.event_topic, "fastapi/topic");
        assert_eq!(mqtt.username, None);
    }

    #[test]
    fn fallback_can_be_forced_with_a_broker() {
        let text = r#"{ "authority": "fallback", "mqtt": { "host": "broker" } }"#;
        let config = Config::parse(text, "t").unwrap();
        assert_eq!(config.authority, Authority::Fallback);
        assert!(config.mqtt.is_some());
    }

    #[test]
    fn external_authority_needs_messaging() {
        match Config::parse(r#"{ "authority": "external" }"#, "t") {
            Err(ConfigError::MissingMessaging) => {}
            other => panic!("unexpected {:?}", other),
        }
        match Config::parse(r#"{ "mqtt": { "port": 1883 } }"#, "t") {
            Err(ConfigError::MissingMessaging) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::parse(r#"{ "timing": { "poll_interval_ms": 0 } }"#, "t"),
            Err(ConfigError::Zero { .. })
        ));
        assert!(matches!(
            Config::parse(r#"{ "authority": "maybe" }"#, "t"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            Config::parse(r#"{ "log_level": "loud" }"#, "t"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            Config::parse(r#"{ "gpio": { "door_pin": 300 } }"#, "t"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            Config::parse(r#"{ "gpio": { "door_pin": "27" } }"#, "t"),
            Err(ConfigError::WrongType { .. })
        ));
        assert!(matches!(
            Config::parse(r#"{ "timing": 5 }"#, "t"),
            Err(ConfigError::WrongType { .. })
        ));
        assert!(matches!(
            Config::parse("[1, 2]", "t"),
            Err(ConfigError::WrongType { .. })
        ));
        assert!(matches!(
            Config::parse("{ nope", "t"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        assert!(matches!(
            Config::load(Some("/nonexistent/door-access.json")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn missing_default_file_yields_defaults() {
        let config = Config::read("/nonexistent/door-access.json", true).unwrap();
        assert_eq!(config.client_id, "esp32micro");
        assert!(config.mqtt.is_none());
    }
}
