use thiserror::Error;

/// An inbound payload that could not be turned into a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("payload is empty")]
    Empty,
    #[error("payload is not valid UTF-8")]
    Utf8,
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("`{command}` is missing its {field}")]
    MissingField {
        command: &'static str,
        field: &'static str,
    },
}

/// Failure talking to the messaging broker.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unable to subscribe to {topic}: {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: rumqttc::ClientError,
    },
    #[error("unable to publish to {topic}: {source}")]
    Publish {
        topic: String,
        #[source]
        source: rumqttc::ClientError,
    },
    #[error("connection to the broker has shut down")]
    Disconnected,
}

/// Startup configuration problems. These are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: json::Error,
    },
    #[error("`{key}` has the wrong type, expected {expected}")]
    WrongType { key: String, expected: &'static str },
    #[error("`{key}` has invalid value `{value}`")]
    InvalidValue { key: String, value: String },
    #[error("`{key}` must be greater than zero")]
    Zero { key: String },
    #[error("external authority requires an `mqtt` section with a host")]
    MissingMessaging,
}
