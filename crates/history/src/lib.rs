//! Persistent chat history for Lumen.
//!
//! Chats and their turns live in `.lumen/history.db`. Assistant turns carry
//! the sources their answer was generated from as JSON metadata.

pub mod store;

pub use store::{ChatStore, ChatSummary, StoredMessage};
