use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("The identity provider is not configured (auth.url and auth.anon_key are required)")]
    NotConfigured,

    #[error("Failed to reach the identity provider: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Sign-in rejected: {0}")]
    Rejected(String),

    #[error("Unexpected identity provider response: {0}")]
    InvalidResponse(String),

    #[error("Failed to access the session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("The session file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}
