pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod state;

// Re-export main types for convenience
pub use backend::{ChatBackend, HttpBackend};
pub use client::{ChatClient, Completion, PendingChat, RequestId};
pub use config::Config;
pub use error::{ChatError, FailureKind, ResetError};
pub use state::{Entry, EntryId, LoadingPlaceholder, Message, Role, Transcript};
