use thiserror::Error;

/// Shown when the backend answered with a non-success status.
pub const UNAVAILABLE_TEXT: &str = "Service temporarily unavailable. Please try again later.";

/// Shown for every other failure (network, malformed reply, dead task).
pub const GENERIC_FAILURE_TEXT: &str = "Sorry, something went wrong. Please try again.";

/// The two failure classes the user can tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Unavailable,
    Generic,
}

impl FailureKind {
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureKind::Unavailable => UNAVAILABLE_TEXT,
            FailureKind::Generic => GENERIC_FAILURE_TEXT,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat request failed with status {status}")]
    Status { status: u16 },

    #[error("chat request could not be completed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("chat reply could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("chat request was interrupted: {0}")]
    Interrupted(String),
}

impl ChatError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ChatError::Status { .. } => FailureKind::Unavailable,
            ChatError::Transport(_) | ChatError::Decode(_) | ChatError::Interrupted(_) => {
                FailureKind::Generic
            }
        }
    }

    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }
}

#[derive(Debug, Error)]
pub enum ResetError {
    #[error("reset request failed with status {status}")]
    Status { status: u16 },

    #[error("reset request could not be completed: {0}")]
    Transport(#[from] reqwest::Error),
}
