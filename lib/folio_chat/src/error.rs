/// Generic message shown when a failure carries no detail of its own.
pub const GENERIC_FAILURE: &str = "Something went wrong while contacting the assistant.";

/// Message shown when the chat endpoint has not been set up.
pub const SETUP_MESSAGE: &str =
    "The chat assistant is not configured yet. Set FOLIO_CHAT_ENDPOINT to enable it.";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("chat endpoint is not configured")]
    Configuration,
    #[error("{}", describe_service_error(.status, .detail))]
    Service {
        status: Option<u16>,
        detail: Option<String>,
    },
    #[error("chat request was cancelled")]
    Cancelled,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

fn describe_service_error(status: &Option<u16>, detail: &Option<String>) -> String {
    match (status, detail) {
        (Some(status), Some(detail)) => format!("chat service error ({status}): {detail}"),
        (Some(status), None) => format!("chat service error ({status})"),
        (None, Some(detail)) => format!("chat service error: {detail}"),
        (None, None) => "chat service error".to_string(),
    }
}

impl Error {
    /// Builds a service error for a response that carried no usable text.
    pub fn empty_response(status: u16) -> Self {
        Error::Service {
            status: Some(status),
            detail: Some("empty response".to_string()),
        }
    }

    /// The text the UI shows for this failure, or `None` when the failure
    /// should not raise a banner at all (user cancellation).
    pub fn user_message(&self) -> Option<String> {
        match self {
            Error::Cancelled => None,
            Error::Configuration => Some(SETUP_MESSAGE.to_string()),
            other => {
                let message = other.to_string();
                if message.trim().is_empty() {
                    Some(GENERIC_FAILURE.to_string())
                } else {
                    Some(message)
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("storage quota exceeded for `{key}`: {size} bytes over a {quota} byte quota")]
    QuotaExceeded { key: String, size: usize, quota: usize },
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}
