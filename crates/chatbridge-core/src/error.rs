//! Error types for chatbridge.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// 4xx from the backend. 401 means the credential expired, 403 means the
    /// provider's browser session expired.
    #[error("ChatGPTResponseClientError: {status} {message}")]
    Client { status: u16, message: String },

    #[error("ChatGPTResponseServerError: {status} {message}")]
    Server { status: u16, message: String },

    #[error("ChatGPTResponseClientError: Request timed out")]
    Timeout,

    #[error("ChatGPTResponseError: Unable to parse response: {0}")]
    Parse(String),

    /// API misuse detected before anything was sent.
    #[error("{0}")]
    Programmer(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Browser surface error: {0}")]
    Surface(String),

    #[error("Credential store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Map a failed HTTP status onto the taxonomy.
    pub fn from_status(status: u16) -> Self {
        match status {
            408 => Error::Timeout,
            500..=599 => Error::Server {
                status,
                message: status_text(status).to_string(),
            },
            _ => Error::Client {
                status,
                message: status_text(status).to_string(),
            },
        }
    }

    /// HTTP status carried by this error, if any. Timeouts report 408.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Client { status, .. } | Error::Server { status, .. } => Some(*status),
            Error::Timeout => Some(408),
            _ => None,
        }
    }

    /// The bearer credential is no longer accepted.
    pub fn is_credential_expired(&self) -> bool {
        self.status_code() == Some(401)
    }

    /// The provider's cookie session behind the embedded browser expired.
    pub fn is_session_expired(&self) -> bool {
        self.status_code() == Some(403)
    }
}

/// Reason phrase for an HTTP status code.
pub fn status_text(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        418 => "I'm a teapot",
        422 => "Unprocessable Entity",
        425 => "Too Early",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        451 => "Unavailable For Legal Reasons",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        507 => "Insufficient Storage",
        511 => "Network Authentication Required",
        _ => "Unknown Error",
    }
}
