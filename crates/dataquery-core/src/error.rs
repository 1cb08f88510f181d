//! Unified error types for DataQuery.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator. Descriptor validation errors carry
//! the name of the descriptor that produced them so registration failures
//! can be diagnosed without re-running anything.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// A query method name does not follow the naming grammar.
    MalformedDescriptor,
    /// A field is not part of the entity's schema mapping.
    UnknownField,
    /// A sort field is not part of the entity's schema mapping.
    UnknownSortField,
    /// A template placeholder has no matching argument.
    UnboundParameter,
    /// An argument has no matching template placeholder.
    UnusedParameter,
    /// A lock mode was requested outside of a transaction.
    NoActiveTransaction,
    /// A single-result query returned more than one row.
    IncorrectResultSize,
    /// A store-level failure that is safe for the caller to retry.
    TransientFailure,
    /// A fatal store error (constraint violation, connection loss, ...).
    Database,
    /// The requested resource was not found.
    NotFound,
    /// Input validation failed.
    Validation,
    /// A row could not be mapped into the requested result type.
    Mapping,
    /// The store cannot execute the requested statement.
    Unsupported,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedDescriptor => write!(f, "MALFORMED_DESCRIPTOR"),
            Self::UnknownField => write!(f, "UNKNOWN_FIELD"),
            Self::UnknownSortField => write!(f, "UNKNOWN_SORT_FIELD"),
            Self::UnboundParameter => write!(f, "UNBOUND_PARAMETER"),
            Self::UnusedParameter => write!(f, "UNUSED_PARAMETER"),
            Self::NoActiveTransaction => write!(f, "NO_ACTIVE_TRANSACTION"),
            Self::IncorrectResultSize => write!(f, "INCORRECT_RESULT_SIZE"),
            Self::TransientFailure => write!(f, "TRANSIENT_FAILURE"),
            Self::Database => write!(f, "DATABASE"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Mapping => write!(f, "MAPPING"),
            Self::Unsupported => write!(f, "UNSUPPORTED"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified error used throughout DataQuery.
#[derive(Debug, Error)]
#[error("{kind}: {message}{}", descriptor_suffix(.descriptor))]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Name of the query descriptor that produced the error, if any.
    pub descriptor: Option<String>,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

fn descriptor_suffix(descriptor: &Option<String>) -> String {
    match descriptor {
        Some(name) => format!(" (in descriptor '{name}')"),
        None => String::new(),
    }
}

impl AppError {
    /// Create a new error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            descriptor: None,
            source: None,
        }
    }

    /// Create a new error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            descriptor: None,
            source: Some(Box::new(source)),
        }
    }

    /// Attach the descriptor name, keeping an already attached one.
    pub fn in_descriptor(mut self, name: impl Into<String>) -> Self {
        if self.descriptor.is_none() {
            self.descriptor = Some(name.into());
        }
        self
    }

    /// Whether the caller may retry the operation.
    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::TransientFailure
    }

    /// Create a malformed-descriptor error.
    pub fn malformed_descriptor(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedDescriptor, message)
    }

    /// Create an unknown-field error.
    pub fn unknown_field(entity: &str, field: &str) -> Self {
        Self::new(
            ErrorKind::UnknownField,
            format!("entity '{entity}' has no field '{field}'"),
        )
    }

    /// Create an unknown-sort-field error.
    pub fn unknown_sort_field(entity: &str, field: &str) -> Self {
        Self::new(
            ErrorKind::UnknownSortField,
            format!("cannot sort '{entity}' by unknown field '{field}'"),
        )
    }

    /// Create an unbound-parameter error.
    pub fn unbound_parameter(name: &str) -> Self {
        Self::new(
            ErrorKind::UnboundParameter,
            format!("placeholder ':{name}' has no bound argument"),
        )
    }

    /// Create an unused-parameter error.
    pub fn unused_parameter(name: &str) -> Self {
        Self::new(
            ErrorKind::UnusedParameter,
            format!("argument '{name}' has no matching placeholder"),
        )
    }

    /// Create a no-active-transaction error.
    pub fn no_active_transaction(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoActiveTransaction, message)
    }

    /// Create an incorrect-result-size error.
    pub fn incorrect_result_size(expected: usize, actual: usize) -> Self {
        Self::new(
            ErrorKind::IncorrectResultSize,
            format!("expected at most {expected} row(s), got {actual}"),
        )
    }

    /// Create a transient store error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientFailure, message)
    }

    /// Create a fatal database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a row-mapping error.
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Mapping, message)
    }

    /// Create an unsupported-statement error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            descriptor: self.descriptor.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Invalid configuration: {err}"),
            err,
        )
    }
}

/// SQLSTATE codes that signal a retryable condition.
#[cfg(feature = "sqlx")]
const TRANSIENT_SQLSTATES: &[&str] = &[
    // serialization_failure
    "40001",
    // deadlock_detected
    "40P01",
    // lock_not_available
    "55P03",
    // query_canceled (statement_timeout, lock_timeout)
    "57014",
];

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => ErrorKind::TransientFailure,
            sqlx::Error::Database(db_err) => match db_err.code() {
                Some(code) if TRANSIENT_SQLSTATES.iter().any(|s| *s == code) => {
                    ErrorKind::TransientFailure
                }
                _ => ErrorKind::Database,
            },
            sqlx::Error::RowNotFound => ErrorKind::NotFound,
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => ErrorKind::Mapping,
            _ => ErrorKind::Database,
        };
        Self::with_source(kind, format!("Store error: {err}"), err)
    }
}
