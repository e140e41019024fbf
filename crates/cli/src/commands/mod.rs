//! Command handlers for the Lumen CLI.

pub mod ask;
pub mod chats;
pub mod prompts;

pub use ask::AskCommand;
pub use chats::ChatsCommand;
pub use prompts::PromptsCommand;
