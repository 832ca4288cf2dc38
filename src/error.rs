//! Error types for MeatMonsters
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for responder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Process configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,

    // Connection errors (3xx)
    ConnectionFailed = 300,
    ConnectionTimeout = 301,
    ConnectionLost = 303,

    // Protocol errors (4xx)
    ProtocolMalformed = 401,

    // Persona errors (5xx)
    PersonaConfigMalformed = 500,
    PersonaInvalidPattern = 501,
    PersonaAssetNotFound = 502,
    PersonaAssetEmpty = 503,
    PersonaDuplicateName = 504,
    PersonasDirNotFound = 505,

    // Dispatch errors (6xx)
    DispatchUnknownAction = 600,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // IO errors
            300..=399 => 30, // Connection errors
            400..=499 => 40, // Protocol errors
            500..=599 => 50, // Persona errors
            600..=699 => 60, // Dispatch errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Process Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    // ─────────────────────────────────────────────────────────────
    // Connection Errors
    // ─────────────────────────────────────────────────────────────

    /// Connection failed
    #[error("Failed to connect to {url}: {message}")]
    ConnectionFailed { url: String, message: String },

    /// Connection timeout
    #[error("Connection to {url} timed out after {timeout_secs}s")]
    ConnectionTimeout { url: String, timeout_secs: u64 },

    /// Connection lost
    #[error("Lost connection to chat transport: {message}")]
    ConnectionLost { message: String },

    /// Generic connection error
    #[error("Connection error: {0}")]
    Connection(String),

    // ─────────────────────────────────────────────────────────────
    // Protocol Errors
    // ─────────────────────────────────────────────────────────────

    /// Malformed frame
    #[error("Malformed chat frame: {message}")]
    ProtocolMalformed { message: String },

    /// Generic protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),

    // ─────────────────────────────────────────────────────────────
    // Persona Errors
    // ─────────────────────────────────────────────────────────────

    /// Persona configuration is missing required fields or is invalid
    #[error("Malformed persona config '{persona}': {reason}")]
    ConfigMalformed { persona: String, reason: String },

    /// A trigger pattern failed to compile
    #[error("Invalid trigger pattern '{pattern}' for {persona}/{action}: {source}")]
    InvalidPattern {
        persona: String,
        action: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The text resource of an action is missing
    #[error("Asset not found for {persona}/{action}: {path}")]
    AssetNotFound {
        persona: String,
        action: String,
        path: PathBuf,
    },

    /// The text resource exists but holds no usable reply
    #[error("Asset for {persona}/{action} has no replies: {path}")]
    AssetEmpty {
        persona: String,
        action: String,
        path: PathBuf,
    },

    /// Two persona directories declare the same name
    #[error("Duplicate persona name '{name}' in {first} and {second}")]
    DuplicatePersonaName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// The personas root directory does not exist
    #[error("Personas directory not found: {path}")]
    PersonasDirNotFound { path: PathBuf },

    // ─────────────────────────────────────────────────────────────
    // Dispatch Errors
    // ─────────────────────────────────────────────────────────────

    /// Action requested from a persona that never registered it
    #[error("Persona '{persona}' has no action '{action}'")]
    UnknownAction { persona: String, action: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Toml(_) => ErrorCode::ConfigParseError,
            Error::WebSocket(_) => ErrorCode::ConnectionFailed,

            Error::ConnectionFailed { .. } => ErrorCode::ConnectionFailed,
            Error::ConnectionTimeout { .. } => ErrorCode::ConnectionTimeout,
            Error::ConnectionLost { .. } => ErrorCode::ConnectionLost,
            Error::Connection(_) => ErrorCode::ConnectionFailed,

            Error::ProtocolMalformed { .. } => ErrorCode::ProtocolMalformed,
            Error::Protocol(_) => ErrorCode::ProtocolMalformed,

            Error::ConfigMalformed { .. } => ErrorCode::PersonaConfigMalformed,
            Error::InvalidPattern { .. } => ErrorCode::PersonaInvalidPattern,
            Error::AssetNotFound { .. } => ErrorCode::PersonaAssetNotFound,
            Error::AssetEmpty { .. } => ErrorCode::PersonaAssetEmpty,
            Error::DuplicatePersonaName { .. } => ErrorCode::PersonaDuplicateName,
            Error::PersonasDirNotFound { .. } => ErrorCode::PersonasDirNotFound,

            Error::UnknownAction { .. } => ErrorCode::DispatchUnknownAction,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'meatmonsters config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'meatmonsters config validate' to see details."
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values."
            ),

            Error::ConnectionFailed { .. } => Some(
                "Check your network connection and verify the transport address is correct."
            ),
            Error::ConnectionTimeout { .. } => Some(
                "The chat server may be down or unreachable. Check your firewall settings."
            ),
            Error::ConnectionLost { .. } => Some(
                "The chat server stayed unreachable. Check the address or raise transport.max_reconnect_attempts."
            ),

            Error::ConfigMalformed { .. } => Some(
                "Each persona directory needs a persona.toml or attributes.json with 'name' and 'actions'."
            ),
            Error::InvalidPattern { .. } => Some(
                "Fix the trigger regex. Lookaround and backreferences are not supported."
            ),
            Error::AssetNotFound { .. } => Some(
                "Every action needs a '<action>.txt' file with one reply per line."
            ),
            Error::AssetEmpty { .. } => Some(
                "Add at least one non-blank reply line to the action's text file."
            ),
            Error::DuplicatePersonaName { .. } => Some(
                "Persona names must be unique. Rename one of the personas."
            ),
            Error::PersonasDirNotFound { .. } => Some(
                "Set [personas] dir in the config or pass --personas to point at your persona directory."
            ),

            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let code = self.code();
        let suggestion = self.suggestion();

        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            code.as_str(),
            self
        );

        if let Some(hint) = suggestion {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound { path: path.into() }
    }

    /// Create a config validation error
    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a malformed persona config error
    pub fn config_malformed(persona: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ConfigMalformed {
            persona: persona.into(),
            reason: reason.into(),
        }
    }

    /// Create a connection failed error
    pub fn connection_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConnectionFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an unknown action error
    pub fn unknown_action(persona: impl Into<String>, action: impl Into<String>) -> Self {
        Error::UnknownAction {
            persona: persona.into(),
            action: action.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
