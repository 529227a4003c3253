//! Error handling for the pc_meter crate.

/// A specialized `Result` type for pc_meter operations.
pub type Result<T> = std::result::Result<T, SystemError>;

/// The main error type for pc_meter operations.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port enumeration or transport failed
    #[error("Serial error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// No serial port matched the discovery keywords
    #[error("No matching serial device found ({available} port(s) available)")]
    DeviceNotFound { available: usize },

    /// The serial port could not be opened
    #[error("Failed to connect to {port}: {source}")]
    Connection {
        port: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// A metric could not be collected
    #[error("Sensor error: {0}")]
    Sensor(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic system error
    #[error("System error: {0}")]
    System(String),
}

impl SystemError {
    /// Create a new connection error for the given port
    pub fn connection_error(port: impl Into<String>, source: tokio_serial::Error) -> Self {
        Self::Connection {
            port: port.into(),
            source,
        }
    }

    /// Create a new sensor error
    pub fn sensor_error(msg: impl Into<String>) -> Self {
        Self::Sensor(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new generic system error
    #[allow(clippy::self_named_constructors)]
    pub fn system_error(msg: impl Into<String>) -> Self {
        Self::System(msg.into())
    }

    /// Whether this error ends the program rather than a single loop iteration.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::DeviceNotFound { .. } | Self::Connection { .. } | Self::Config(_)
        )
    }
}
