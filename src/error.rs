use std::fmt;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Application error type.
///
/// Per-target failures (timeouts, checker exceptions) never appear here:
/// they are contained in the worker that produced them and surface as
/// `Error`-status probe results instead. Only request-level and pool-level
/// failures travel through this type.
#[derive(Debug)]
pub enum AppError {
    /// Query validation failed; no probing was started.
    Validation(ValidationError),
    /// Browser session / page pool failure (pool-level, fatal to the run).
    Browser(BrowserError),
    /// Cache store failure (observed, never fails the enclosing request).
    Cache(CacheError),
    /// Outbound event stream failure (aborts emission only).
    Stream(StreamError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "validation error: {}", e),
            AppError::Browser(e) => write!(f, "browser error: {}", e),
            AppError::Cache(e) => write!(f, "cache error: {}", e),
            AppError::Stream(e) => write!(f, "stream error: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Validation(e) => Some(e),
            AppError::Browser(e) => Some(e),
            AppError::Cache(e) => Some(e),
            AppError::Stream(e) => Some(e),
        }
    }
}

/// Request validation errors.
#[derive(Debug)]
pub enum ValidationError {
    /// One or more required query parameters are missing or empty.
    MissingParameters { missing: Vec<&'static str> },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingParameters { missing } => {
                write!(f, "missing required parameters: {}", missing.join(", "))
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Browser session and page pool errors.
#[derive(Debug)]
pub enum BrowserError {
    /// Launching the browser session failed.
    LaunchFailed { source: BoxedSource },
    /// Creating a new page failed; the session is treated as crashed.
    PageCreationFailed { source: BoxedSource },
    /// The session crashed earlier in the run; not recovered within a run.
    SessionCrashed,
    /// The pool was shut down while a caller was waiting for a handle.
    PoolClosed,
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserError::LaunchFailed { source } => {
                write!(f, "failed to launch browser session: {}", source)
            }
            BrowserError::PageCreationFailed { source } => {
                write!(f, "failed to create page: {}", source)
            }
            BrowserError::SessionCrashed => write!(f, "browser session crashed"),
            BrowserError::PoolClosed => write!(f, "page pool is shut down"),
        }
    }
}

impl std::error::Error for BrowserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BrowserError::LaunchFailed { source }
            | BrowserError::PageCreationFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// Cache store errors. Always logged and swallowed by the cache layer.
#[derive(Debug)]
pub enum CacheError {
    /// The underlying store operation failed.
    Io { op: &'static str, source: BoxedSource },
    /// The store answered with something we cannot interpret.
    BadResponse { detail: String },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io { op, source } => write!(f, "cache {} failed: {}", op, source),
            CacheError::BadResponse { detail } => {
                write!(f, "unexpected cache response: {}", detail)
            }
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            CacheError::BadResponse { .. } => None,
        }
    }
}

/// Outbound event stream errors.
#[derive(Debug)]
pub enum StreamError {
    /// Serializing an event failed.
    Encode { source: serde_json::Error },
    /// Writing to the receiving connection failed (client likely gone).
    Write { source: std::io::Error },
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Encode { source } => write!(f, "failed to encode event: {}", source),
            StreamError::Write { source } => write!(f, "failed to write event: {}", source),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Encode { source } => Some(source),
            StreamError::Write { source } => Some(source),
        }
    }
}

// ========== Conversions from sub-errors ==========

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<BrowserError> for AppError {
    fn from(err: BrowserError) -> Self {
        AppError::Browser(err)
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::Cache(err)
    }
}

impl From<StreamError> for AppError {
    fn from(err: StreamError) -> Self {
        AppError::Stream(err)
    }
}

// ========== Convenience constructors ==========

impl AppError {
    /// Browser launch error wrapping any upstream failure.
    pub fn launch_failed(source: anyhow::Error) -> Self {
        AppError::Browser(BrowserError::LaunchFailed {
            source: source.into(),
        })
    }
}

// ========== Result type alias ==========

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;
