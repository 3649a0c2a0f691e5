//! Errors raised while loading and checking provider configuration

use std::fmt;
use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why a configuration could not be used
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse '{path}' (line {}, column {}): {message}",
            .line.unwrap_or(0), .column.unwrap_or(0))]
    ParseError {
        path: String,
        line: Option<usize>,
        column: Option<usize>,
        message: String,
    },

    #[error(transparent)]
    ValidationError(#[from] ValidationError),

    #[error("environment variable '{var}' referenced by the config is not set")]
    EnvVarNotFound { var: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

/// A rejected field, addressed by its path inside the document
///
/// Paths look like `providers[1].vertex.project_id`; programmatic configs use
/// the provider name as the root segment.
#[derive(Debug, Error)]
pub struct ValidationError {
    pub field_path: String,
    pub kind: ValidationErrorKind,
    pub context: Option<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field_path, self.kind)?;
        if let Some(context) = &self.context {
            write!(f, " ({})", context)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationErrorKind {
    #[error("missing or empty")]
    RequiredFieldMissing,

    #[error("out of range: {message}")]
    OutOfRange { message: String },

    #[error("malformed: {message}")]
    InvalidFormat { message: String },

    #[error("'{value}' is used more than once")]
    DuplicateValue { value: String },

    #[error("not allowed here: {message}")]
    Incompatible { message: String },

    #[error("bad endpoint URL: {message}")]
    InvalidUrl { message: String },

    #[error("config version {actual} is not supported (expected {expected})")]
    InvalidVersion { expected: String, actual: String },
}

impl ValidationError {
    pub fn new(field_path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            field_path: field_path.into(),
            kind,
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn required(field_path: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::RequiredFieldMissing)
    }

    pub fn out_of_range(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::OutOfRange { message: message.into() })
    }

    pub fn invalid_format(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::InvalidFormat { message: message.into() })
    }

    pub fn incompatible(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::Incompatible { message: message.into() })
    }

    pub fn duplicate(field_path: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::DuplicateValue { value: value.into() })
    }

    pub fn invalid_url(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::InvalidUrl { message: message.into() })
    }

    pub fn invalid_version(expected: &str, actual: &str) -> Self {
        Self::new(
            "version",
            ValidationErrorKind::InvalidVersion {
                expected: expected.to_string(),
                actual: actual.to_string(),
            },
        )
    }

    /// The provider entry this error points into, if any
    pub fn provider_index(&self) -> Option<usize> {
        let rest = self.field_path.strip_prefix("providers[")?;
        rest[..rest.find(']')?].parse().ok()
    }
}
