use std::fmt;

/// Failure of a backend call. None of these are fatal: callers log and
/// keep local state as it is.
#[derive(Debug)]
pub enum ApiError {
    /// Connection, DNS, TLS or timeout failure
    Transport(String),
    /// Non-2xx response
    Status { code: u16, body: String },
    /// 404 from the analysis endpoint: no analyzer for this task name
    NoAnalyzer(String),
    /// Response body was not the expected JSON
    Decode(String),
}

impl ApiError {
    pub fn is_no_analyzer(&self) -> bool {
        matches!(self, ApiError::NoAnalyzer(_))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Transport(msg) => write!(f, "Request failed: {}", msg),
            ApiError::Status { code, body } => write!(f, "Backend error ({}): {}", code, body),
            ApiError::NoAnalyzer(task) => write!(f, "No analyzer registered for task '{}'", task),
            ApiError::Decode(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}
