use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for docref operations.
///
/// The first group mirrors the failure taxonomy of the reference subsystem
/// (configuration, upstream fetch, propagation, bulk refresh); the rest covers
/// the document, store and dispatch plumbing around it.
///
/// # Examples
///
/// ```rust,ignore
/// use docref::errors::{DocrefError, ErrorKind, DocrefResult};
///
/// fn example() -> DocrefResult<()> {
///     Err(DocrefError::new("no descriptor for 'ownerId'", ErrorKind::ConfigurationError))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Reference subsystem
    /// Service or descriptor configuration is invalid (e.g. expand on an undeclared reference)
    ConfigurationError,
    /// A value has a shape the operation cannot work with (e.g. a mixed id array)
    InvalidDataType,
    /// Fetching a referenced document through the dispatcher failed
    UpstreamFetchFailed,
    /// A propagated cache update failed; only ever reported on the failure channel
    PropagationError,
    /// A bulk write could not be issued at all
    BulkWriteError,

    // Document and id errors
    /// The operation is not valid in the current context
    InvalidOperation,
    /// The provided id is invalid
    InvalidId,
    /// The requested document was not found
    NotFound,
    /// Document failed validation
    ValidationError,
    /// Invalid field name or path
    InvalidFieldName,
    /// Error during filter evaluation
    FilterError,
    /// A unique constraint was violated
    UniqueConstraintViolation,

    // Dispatch errors
    /// No handler is subscribed for the dispatched event
    HandlerNotFound,
    /// A handler returned a payload of an unexpected shape or failed outright
    DispatchError,
    /// Error while publishing to or handling an event listener
    EventError,

    // Store errors
    /// Error from the storage backend
    BackendError,

    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ConfigurationError => write!(f, "Configuration error"),
            ErrorKind::InvalidDataType => write!(f, "Invalid data type"),
            ErrorKind::UpstreamFetchFailed => write!(f, "Upstream fetch failed"),
            ErrorKind::PropagationError => write!(f, "Propagation error"),
            ErrorKind::BulkWriteError => write!(f, "Bulk write error"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::InvalidId => write!(f, "Invalid ID"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::InvalidFieldName => write!(f, "Invalid field name"),
            ErrorKind::FilterError => write!(f, "Filter error"),
            ErrorKind::UniqueConstraintViolation => write!(f, "Unique constraint violation"),
            ErrorKind::HandlerNotFound => write!(f, "Handler not found"),
            ErrorKind::DispatchError => write!(f, "Dispatch error"),
            ErrorKind::EventError => write!(f, "Event error"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// The crate-wide error type.
///
/// `DocrefError` carries a message, an [ErrorKind], an optional cause and the
/// backtrace captured where it was created. Causes chain, so an upstream fetch
/// failure keeps the store error that produced it.
///
/// # Examples
///
/// ```rust,ignore
/// use docref::errors::{DocrefError, ErrorKind};
///
/// let cause = DocrefError::new("collection offline", ErrorKind::BackendError);
/// let err = DocrefError::new_with_cause(
///     "failed to fetch Category",
///     ErrorKind::UpstreamFetchFailed,
///     cause,
/// );
/// assert!(err.cause().is_some());
/// ```
#[derive(Clone)]
pub struct DocrefError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<DocrefError>>,
    backtrace: Arc<Backtrace>,
}

impl DocrefError {
    /// Creates a new `DocrefError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        DocrefError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    /// Creates a new `DocrefError` that wraps `cause`.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: DocrefError) -> Self {
        DocrefError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&DocrefError> {
        self.cause.as_deref()
    }

    /// Walks the cause chain and returns the innermost error.
    pub fn root_cause(&self) -> &DocrefError {
        let mut current = self;
        while let Some(cause) = current.cause() {
            current = cause;
        }
        current
    }
}

impl Display for DocrefError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for DocrefError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace),
        }
    }
}

impl Error for DocrefError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for docref operations.
pub type DocrefResult<T> = Result<T, DocrefError>;

impl From<std::fmt::Error> for DocrefError {
    fn from(err: std::fmt::Error) -> Self {
        DocrefError::new(
            &format!("Formatting error: {}", err),
            ErrorKind::InternalError,
        )
    }
}

impl From<String> for DocrefError {
    fn from(msg: String) -> Self {
        DocrefError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for DocrefError {
    fn from(msg: &str) -> Self {
        DocrefError::new(msg, ErrorKind::InternalError)
    }
}
