use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Severity of a structured invalid-value error, as reported to NETCONF-style callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorSeverity {
    #[default]
    Error,
    Warning,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Error => f.write_str("error"),
            ErrorSeverity::Warning => f.write_str("warning"),
        }
    }
}

/// Layer an error is attributed to (RFC 6241 `error-type`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorType {
    Transport,
    Rpc,
    Protocol,
    #[default]
    Application,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorType::Transport => f.write_str("transport"),
            ErrorType::Rpc => f.write_str("rpc"),
            ErrorType::Protocol => f.write_str("protocol"),
            ErrorType::Application => f.write_str("application"),
        }
    }
}

/// Structured payload of an invalid-value error.
///
/// Restrictions (range, length, pattern) may declare their own `error-app-tag`
/// and `error-message`; when they do, those replace the generated defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidValue {
    pub severity: ErrorSeverity,
    pub error_type: ErrorType,
    pub error_tag: String,
    pub app_tag: Option<String>,
    pub message: String,
    pub info: Vec<(String, String)>,
}

impl InvalidValue {
    pub const INVALID_VALUE_TAG: &'static str = "invalid-value";

    /// An application-level `invalid-value` error with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            severity: ErrorSeverity::Error,
            error_type: ErrorType::Application,
            error_tag: Self::INVALID_VALUE_TAG.to_string(),
            app_tag: None,
            message: message.into(),
            info: Vec::new(),
        }
    }

    /// Apply the schema-declared `error-app-tag` / `error-message`, if any
    pub fn with_declared(mut self, app_tag: Option<&str>, message: Option<&str>) -> Self {
        if let Some(tag) = app_tag {
            self.app_tag = Some(tag.to_string());
        }
        if let Some(message) = message {
            self.message = message.to_string();
        }
        self
    }

    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for InvalidValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Main codec error type covering value decoding, tree parsing and tree writing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// A value violates a restriction; carries the structured NETCONF payload
    #[error("{0}")]
    InvalidValue(Box<InvalidValue>),

    /// Text that is not a lexical representation of the expected type
    #[error("{0}")]
    InvalidArgument(String),

    /// The token stream is not well-formed XML
    #[error("Malformed XML at position {position}: {message}")]
    MalformedStream { position: u64, message: String },

    /// The document does not fit the schema
    #[error("{0}")]
    SchemaMismatch(String),

    /// The output sink rejected an event
    #[error("Write error: {0}")]
    Write(String),
}

impl CodecError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        CodecError::InvalidArgument(message.into())
    }

    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        CodecError::SchemaMismatch(message.into())
    }

    pub fn malformed(position: u64, message: impl Into<String>) -> Self {
        CodecError::MalformedStream {
            position,
            message: message.into(),
        }
    }

    /// Structured payload, when this is an invalid-value error
    pub fn invalid_value(&self) -> Option<&InvalidValue> {
        match self {
            CodecError::InvalidValue(value) => Some(value),
            _ => None,
        }
    }

    /// Short category name used in reports
    pub fn kind_name(&self) -> &'static str {
        match self {
            CodecError::InvalidValue(_) => "invalid-value",
            CodecError::InvalidArgument(_) => "invalid-argument",
            CodecError::MalformedStream { .. } => "malformed",
            CodecError::SchemaMismatch(_) => "schema-mismatch",
            CodecError::Write(_) => "write",
        }
    }

    /// True for errors raised while decoding or validating a single value
    pub fn is_value_error(&self) -> bool {
        matches!(
            self,
            CodecError::InvalidValue(_) | CodecError::InvalidArgument(_)
        )
    }
}

impl From<InvalidValue> for CodecError {
    fn from(value: InvalidValue) -> Self {
        CodecError::InvalidValue(Box::new(value))
    }
}

/// Errors raised while loading a resolved schema description
#[derive(Error, Debug)]
pub enum SchemaLoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Unsupported schema file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid schema {path}: {details}")]
    Invalid { path: PathBuf, details: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, CodecError>;

/// Schema loading result type alias
pub type SchemaLoadResult<T> = std::result::Result<T, SchemaLoadError>;
