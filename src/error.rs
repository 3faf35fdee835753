//! Error type shared by all client operations.

/// Error type for toorPIA API operations.
#[derive(Debug)]
pub enum Error {
    /// No API key available from argument, environment, or saved credentials
    MissingApiKey,
    /// The server rejected the API key at login
    Authentication(String),
    /// The server rejected the cached session key (401)
    Unauthorized(String),
    /// Bad request or unknown resource (4xx with server message)
    Validation(String),
    /// Other HTTP error with status code
    Http(u16, String),
    /// Network error
    Network(String),
    /// Malformed response body
    Parse(String),
    /// File I/O error
    Io(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MissingApiKey => {
                write!(f, "No API key configured — set TOORPIA_API_KEY or save credentials")
            }
            Error::Authentication(msg) => write!(f, "Authentication failed: {}", msg),
            Error::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            Error::Validation(msg) => write!(f, "{}", msg),
            Error::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            Error::Network(msg) => write!(f, "Network error: {}", msg),
            Error::Parse(msg) => write!(f, "Parse error: {}", msg),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
