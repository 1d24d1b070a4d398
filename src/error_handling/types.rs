use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    BadIPFormatting(String),
    NotInRange(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::BadIPFormatting(e) => write!(f, "IP formatting error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Normalized outcome of a failed gateway call.
///
/// Every failure path of the gateway resolves to exactly one of these
/// variants; raw transport errors never reach the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// Target failed the dotted-quad(:port) check, nothing was sent
    InvalidAddress(String),
    /// Local throttling: the per-minute ceiling is already reached
    RateExceeded,
    /// The caller-supplied deadline elapsed and the transport was aborted
    Timeout,
    /// Device answered 401, the cached credential has been cleared
    Unauthenticated,
    /// Device answered 429
    Throttled,
    /// DNS or connection level failure
    TransportFailure(String),
    /// Body could not be interpreted as expected
    MalformedResponse(String),
    /// Request body could not be encoded; nothing was sent
    InvalidRequest(String),
    /// Non-2xx answer an endpoint wrapper could not use. The gateway itself passes
    /// such statuses through; only typed endpoint calls produce this.
    UnexpectedStatus(u16),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::InvalidAddress(a) => write!(f, "Invalid address: {}", a),
            GatewayError::RateExceeded => write!(f, "Rate limit exceeded, please wait"),
            GatewayError::Timeout => write!(f, "Request timeout"),
            GatewayError::Unauthenticated => write!(f, "Authentication required"),
            GatewayError::Throttled => write!(f, "Device is throttling requests"),
            GatewayError::TransportFailure(e) => write!(f, "Transport failure: {}", e),
            GatewayError::MalformedResponse(e) => write!(f, "Malformed response: {}", e),
            GatewayError::InvalidRequest(e) => write!(f, "Invalid request: {}", e),
            GatewayError::UnexpectedStatus(s) => write!(f, "Unexpected HTTP status {}", s),
        }
    }
}

impl std::error::Error for GatewayError {}

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    ConnectionFailed,
    WriteFailed,
    ReadFailed,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ConnectionFailed => write!(f, "Storage connection failed"),
            StorageError::WriteFailed => write!(f, "Storage write failed"),
            StorageError::ReadFailed => write!(f, "Storage read failed"),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug)]
pub enum TelemetryError {
    ConnectFailed(String),
    ReceiveFailed(String),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::ConnectFailed(e) => write!(f, "Telemetry connect failed: {}", e),
            TelemetryError::ReceiveFailed(e) => write!(f, "Telemetry receive failed: {}", e),
        }
    }
}

impl std::error::Error for TelemetryError {}

#[derive(Debug, PartialEq)]
pub enum CameraError {
    InvalidCamera(i64),
    NotConfigured(u8),
    PoweredOff(u8),
    Gateway(GatewayError),
    Storage(StorageError),
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::InvalidCamera(id) => write!(f, "Invalid camera ID: {}", id),
            CameraError::NotConfigured(id) => write!(f, "Camera {} not configured", id),
            CameraError::PoweredOff(id) => {
                write!(f, "Camera {} is powered OFF, turn it on first", id)
            }
            CameraError::Gateway(e) => write!(f, "Camera gateway error: {}", e),
            CameraError::Storage(e) => write!(f, "Camera storage error: {}", e),
        }
    }
}

impl std::error::Error for CameraError {}

impl From<GatewayError> for CameraError {
    fn from(err: GatewayError) -> Self {
        CameraError::Gateway(err)
    }
}

impl From<StorageError> for CameraError {
    fn from(err: StorageError) -> Self {
        CameraError::Storage(err)
    }
}

/// Wi-Fi provisioning failure: rejected locally, or by the device.
#[derive(Debug, PartialEq)]
pub enum SetupError {
    Invalid(String),
    Gateway(GatewayError),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::Invalid(e) => write!(f, "Invalid Wi-Fi configuration: {}", e),
            SetupError::Gateway(e) => write!(f, "Configuration failed: {}", e),
        }
    }
}

impl std::error::Error for SetupError {}

impl From<GatewayError> for SetupError {
    fn from(err: GatewayError) -> Self {
        SetupError::Gateway(err)
    }
}

/// Failure to assemble the dashboard at start-up.
#[derive(Debug)]
pub enum StartupError {
    Config(ConfigError),
    Storage(StorageError),
    Gateway(GatewayError),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::Config(e) => write!(f, "Configuration error: {}", e),
            StartupError::Storage(e) => write!(f, "Storage error: {}", e),
            StartupError::Gateway(e) => write!(f, "Gateway error: {}", e),
        }
    }
}

impl std::error::Error for StartupError {}

impl From<ConfigError> for StartupError {
    fn from(err: ConfigError) -> Self {
        StartupError::Config(err)
    }
}

impl From<StorageError> for StartupError {
    fn from(err: StorageError) -> Self {
        StartupError::Storage(err)
    }
}

impl From<GatewayError> for StartupError {
    fn from(err: GatewayError) -> Self {
        StartupError::Gateway(err)
    }
}
