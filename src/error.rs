//! Error types for the billstack reconciler.
//!
//! Construction-time errors (tree and validation) are programming errors in a
//! stack declaration and surface immediately. Remote errors are split into the
//! expected "not found" class, which drives create-versus-update branching,
//! and every other failure, which is recorded per manifest entry.

use std::path::PathBuf;
use thiserror::Error;

use crate::construct::ResourceKind;

/// The main error type for billstack.
#[derive(Debug, Error)]
pub enum BillstackError {
    /// Construct tree errors.
    #[error("Construct error: {0}")]
    Construct(#[from] ConstructError),

    /// Resource property validation errors.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Definition file and settings errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// State store errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Remote billing provider errors.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Construct tree errors.
#[derive(Debug, Error)]
pub enum ConstructError {
    /// A construct id was empty or whitespace.
    #[error("Construct id must not be empty")]
    EmptyIdentifier,

    /// A sibling with the same id already exists.
    #[error("There is already a construct with id '{id}' in scope '{scope}'")]
    DuplicateIdentifier {
        /// Path of the owning scope.
        scope: String,
        /// The duplicated id.
        id: String,
    },

    /// A resource was declared outside of any stack.
    #[error("Resource '{path}' must be defined within a Stack")]
    MissingStackAncestor {
        /// Path the resource would have had.
        path: String,
    },
}

/// Resource property validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Neither `amount_off` nor `percent_off` was set on a coupon.
    #[error("Coupon '{resource}' requires either amount_off or percent_off")]
    AmountOrPercentRequired {
        /// Path of the coupon.
        resource: String,
    },

    /// Both `amount_off` and `percent_off` were set on a coupon.
    #[error("Coupon '{resource}' cannot set both amount_off and percent_off")]
    AmountAndPercentExclusive {
        /// Path of the coupon.
        resource: String,
    },

    /// A repeating coupon did not set `duration_in_months`.
    #[error("Coupon '{resource}' has a repeating duration but no duration_in_months")]
    DurationInMonthsRequired {
        /// Path of the coupon.
        resource: String,
    },

    /// A coupon with `amount_off` did not set a currency.
    #[error("Coupon '{resource}' sets amount_off without a currency")]
    CurrencyRequired {
        /// Path of the coupon.
        resource: String,
    },

    /// Any other invalid field.
    #[error("Invalid field '{field}' on '{resource}': {message}")]
    InvalidField {
        /// Path of the resource.
        resource: String,
        /// Field name.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Definition file and settings errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The definition file was not found.
    #[error("Definition file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The definition file could not be parsed.
    #[error("Failed to parse definition: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// A required environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// The definition is structurally invalid.
    #[error("Invalid definition: {message}")]
    InvalidDefinition {
        /// Description of the problem.
        message: String,
    },
}

/// State store errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// The state file could not be read or parsed.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// The state file carries an unknown version.
    #[error("State version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected state version.
        expected: u32,
        /// Found state version.
        found: u64,
    },

    /// The state could not be serialized.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// The state could not be written to disk.
    #[error("Failed to write state: {message}")]
    WriteFailed {
        /// Description of the write failure.
        message: String,
    },
}

/// Remote billing provider errors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The remote object does not exist.
    #[error("No such {kind}: '{id}'")]
    NotFound {
        /// Kind of the object.
        kind: ResourceKind,
        /// Id that was looked up.
        id: String,
        /// Remote error code.
        code: String,
    },

    /// Authentication failed.
    #[error("Stripe authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Stripe API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Remote error code, when present.
        code: Option<String>,
        /// Error message from the API.
        message: String,
    },

    /// Rate limited.
    #[error("Stripe API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("Network error communicating with Stripe: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid response from Stripe API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// The provider cannot perform this operation for this kind.
    #[error("Operation '{operation}' is not supported for {kind}")]
    Unsupported {
        /// Operation name.
        operation: &'static str,
        /// Kind it was attempted on.
        kind: ResourceKind,
    },
}

/// Result type alias for billstack operations.
pub type Result<T> = std::result::Result<T, BillstackError>;

impl BillstackError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this is a remote "resource not found" error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Provider(ProviderError::NotFound { .. }))
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Provider(
                ProviderError::RateLimited { .. } | ProviderError::NetworkError { .. }
            )
        )
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Provider(ProviderError::RateLimited { retry_after_secs }) => {
                Some(*retry_after_secs)
            }
            Self::Provider(ProviderError::NetworkError { .. }) => Some(1),
            _ => None,
        }
    }
}

impl ValidationError {
    /// Creates an invalid field error.
    #[must_use]
    pub fn invalid_field(
        resource: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            resource: resource.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

impl StateError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Creates a write error with the given message.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }
}

impl ProviderError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            code,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}
