use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    NotInRange(String),
    UnknownActivity(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::UnknownActivity(e) => write!(f, "Unknown activity: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::TomlError(err.to_string())
    }
}

/// Failures reported by the session platform (discovery, activation, transport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    NotEligible,
    Refused(String),
    SessionUnavailable,
    ChannelClosed,
    Io(String),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformError::NotEligible => write!(f, "Device is not eligible for group sessions"),
            PlatformError::Refused(e) => write!(f, "Platform refused the request: {}", e),
            PlatformError::SessionUnavailable => write!(f, "Session is no longer available"),
            PlatformError::ChannelClosed => write!(f, "Session channel is closed"),
            PlatformError::Io(e) => write!(f, "Platform IO error: {}", e),
        }
    }
}

impl std::error::Error for PlatformError {}

/// Recoverable failures surfaced to the delegate through `report_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupActivityError {
    ActivationFailed(PlatformError),
    NotConnected,
    ChannelOpenFailed(PlatformError),
    TransportFailed(PlatformError),
    MessageTooLarge { size: usize, limit: usize },
    MalformedMessage(String),
    Encoding(String),
}

impl fmt::Display for GroupActivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupActivityError::ActivationFailed(e) => write!(f, "Activation failed: {}", e),
            GroupActivityError::NotConnected => {
                write!(f, "Not connected to a group session, message dropped")
            }
            GroupActivityError::ChannelOpenFailed(e) => {
                write!(f, "Unable to open the session channel: {}", e)
            }
            GroupActivityError::TransportFailed(e) => write!(f, "Message transport failed: {}", e),
            GroupActivityError::MessageTooLarge { size, limit } => write!(
                f,
                "Message of {} bytes exceeds the {} bytes limit",
                size, limit
            ),
            GroupActivityError::MalformedMessage(e) => write!(f, "Malformed inbound message: {}", e),
            GroupActivityError::Encoding(e) => write!(f, "Message encoding failed: {}", e),
        }
    }
}

impl std::error::Error for GroupActivityError {}

/// Errors produced while encoding or decoding a wire envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    TypeMismatch { expected: String, found: String },
    Malformed(String),
    Encode(String),
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeError::TypeMismatch { expected, found } => write!(
                f,
                "Envelope carries message type `{}` but `{}` was expected",
                found, expected
            ),
            EnvelopeError::Malformed(e) => write!(f, "Malformed envelope: {}", e),
            EnvelopeError::Encode(e) => write!(f, "Envelope encoding error: {}", e),
        }
    }
}

impl std::error::Error for EnvelopeError {}

/// A caller misconfigured the handler (wrong message type on the channel,
/// missing activity identifier). These are never reported through the
/// delegate: the handler stops with a panic carrying this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    UnexpectedMessageType { expected: String, found: String },
    MissingActivityIdentifier,
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractViolation::UnexpectedMessageType { expected, found } => write!(
                f,
                "Received a `{}` message on a channel registered for `{}`",
                found, expected
            ),
            ContractViolation::MissingActivityIdentifier => {
                write!(f, "Group activity identifier is not defined")
            }
        }
    }
}

impl std::error::Error for ContractViolation {}

impl ContractViolation {
    /// Halts the current lane of execution.
    pub fn raise(self) -> ! {
        panic!("group activity contract violation: {}", self)
    }
}

/// Failures of the loopback demo run by the binary.
#[derive(Debug)]
pub enum DemoError {
    Config(ConfigError),
    CallbackLane(std::io::Error),
    Timeout(String),
}

impl fmt::Display for DemoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemoError::Config(e) => write!(f, "Configuration error: {}", e),
            DemoError::CallbackLane(e) => write!(f, "Unable to start a callback thread: {}", e),
            DemoError::Timeout(e) => write!(f, "Timed out waiting for {}", e),
        }
    }
}

impl std::error::Error for DemoError {}

impl From<ConfigError> for DemoError {
    fn from(err: ConfigError) -> Self {
        DemoError::Config(err)
    }
}
