//! Chats command handler.

use clap::Args;
use lumen_answer::Role;
use lumen_core::{config::AppConfig, AppError, AppResult};
use lumen_history::{ChatStore, StoredMessage};

/// List chats or show one chat's messages
#[derive(Args, Debug)]
pub struct ChatsCommand {
    /// Print the messages of this chat
    #[arg(long, value_name = "CHAT_ID")]
    pub show: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ChatsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = ChatStore::open(&config.history_path())?;

        match self.show {
            Some(ref chat_id) => self.show_chat(&store, chat_id),
            None => self.list_chats(&store),
        }
    }

    fn list_chats(&self, store: &ChatStore) -> AppResult<()> {
        let chats = store.list_chats()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&chats)?);
            return Ok(());
        }

        if chats.is_empty() {
            println!("No chats yet. Start one with: lumen ask --new-chat \"<question>\"");
            return Ok(());
        }

        for chat in chats {
            println!(
                "{}  {}  {}",
                chat.id,
                chat.created_at.format("%Y-%m-%d %H:%M"),
                chat.title
            );
        }

        Ok(())
    }

    fn show_chat(&self, store: &ChatStore, chat_id: &str) -> AppResult<()> {
        let chat = store
            .get_chat(chat_id)?
            .ok_or_else(|| AppError::Storage(format!("Chat not found: {}", chat_id)))?;
        let messages = store.load_messages(chat_id)?;

        if self.json {
            let output = serde_json::json!({ "chat": chat, "messages": messages });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        println!("# {}\n", chat.title);
        for message in &messages {
            print_message(message);
        }

        Ok(())
    }
}

fn print_message(message: &StoredMessage) {
    match message.role {
        Role::User => println!("User: {}\n", message.content),
        Role::Assistant => {
            println!("Assistant: {}", message.content);

            let sources = message
                .metadata
                .as_ref()
                .and_then(|m| m.get("sources"))
                .and_then(|s| s.as_array());

            if let Some(sources) = sources {
                for (i, source) in sources.iter().enumerate() {
                    let title = source.get("title").and_then(|t| t.as_str()).unwrap_or("");
                    let url = source.get("url").and_then(|u| u.as_str()).unwrap_or("");
                    println!("  [{}] {} - {}", i + 1, title, url);
                }
            }
            println!();
        }
    }
}
