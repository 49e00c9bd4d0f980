use thiserror::Error;

/// Unified error type for the printer console client.
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected status {status} from {path}")]
    Status { path: String, status: u16 },

    #[error("Login failed: no auth cookie received (wrong password?)")]
    Auth,

    #[error("Protocol drift: {0}")]
    ProtocolDrift(String),

    #[error("Serial for certificate id '{id}' is malformed: '{raw}'")]
    SerialFormat { id: String, raw: String },

    #[error("Unsupported key: only RSA private keys are supported")]
    UnsupportedKey,

    #[error("Invalid key or certificate material: {0}")]
    Material(String),

    #[error("Could not deduce the new certificate id ({} new ids: [{}])", .new_ids.len(), .new_ids.join(", "))]
    AmbiguousResult { new_ids: Vec<String> },

    #[error("Certificate id '{0}' is not a valid deletion target")]
    InvalidIdentifier(String),

    #[error("Certificate id '{0}' still exists after delete")]
    DeletionNotConfirmed(String),

    #[error("Active certificate could not be resolved: {}", .0.join("; "))]
    Resolution(Vec<String>),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConsoleError {
    /// Wrap any network-level failure.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        ConsoleError::Transport(err.to_string())
    }

    /// Stable short label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ConsoleError::Transport(_) | ConsoleError::Status { .. } => "transport",
            ConsoleError::Auth => "auth",
            ConsoleError::ProtocolDrift(_) | ConsoleError::SerialFormat { .. } => "protocol_drift",
            ConsoleError::UnsupportedKey => "unsupported_key",
            ConsoleError::Material(_) => "material",
            ConsoleError::AmbiguousResult { .. } => "ambiguous_result",
            ConsoleError::InvalidIdentifier(_) => "invalid_identifier",
            ConsoleError::DeletionNotConfirmed(_) => "deletion_not_confirmed",
            ConsoleError::Resolution(_) => "resolution",
            ConsoleError::Config(_) => "config",
            ConsoleError::Io(_) => "io",
        }
    }

    /// True when the console returned markup this client no longer understands.
    pub fn is_protocol_drift(&self) -> bool {
        self.kind() == "protocol_drift"
    }
}

pub type Result<T, E = ConsoleError> = std::result::Result<T, E>;
