//! Chat subsystem of the portfolio site: a streaming chat client, a
//! session-scoped message store and the controller a front-end binds to.

pub mod client;
pub mod controller;
pub mod decoder;
pub mod diagnostics;
pub mod error;
pub mod message;
pub mod payload;
pub mod store;

pub use client::{ChatClient, ChatService, RequestOptions};
pub use controller::{ChatController, SubmitOutcome, RENDER_WINDOW};
pub use error::{Error, StorageError};
pub use message::{normalize, ChatMessage, ConversationHistory, Role};
pub use store::{FileStorage, MemoryStorage, MessageStore, SessionStorage};

pub type Result<T> = std::result::Result<T, Error>;
