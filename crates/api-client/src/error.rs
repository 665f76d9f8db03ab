use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to send the HTTP request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request rejected as unauthorized: {0}")]
    Unauthorized(String),

    #[error("Request forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("The API request returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),

    #[error("Invalid data format from API: {0}")]
    InvalidData(String),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Classifies a non-success response by status code.
    ///
    /// `body` is the raw response text; the platform wraps its reason in
    /// `{"detail": ...}`, anything else is kept verbatim.
    pub fn from_response(status: u16, body: &str) -> Self {
        let detail = crate::responses::ErrorBody::detail_from(body);
        match status {
            401 => ApiError::Unauthorized(detail),
            403 => ApiError::Forbidden(detail),
            404 => ApiError::NotFound(detail),
            _ => ApiError::Status { status, detail },
        }
    }

    /// The HTTP status the server answered with, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            ApiError::Unauthorized(_) => Some(401),
            ApiError::Forbidden(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The server's stated reason for rejecting the request.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized(d) | ApiError::Forbidden(d) | ApiError::NotFound(d) => Some(d),
            ApiError::Status { detail, .. } => Some(detail),
            _ => None,
        }
    }
}
