//! SQLite-backed chat history.

use chrono::{DateTime, Utc};
use lumen_answer::{Document, Message, Role};
use lumen_core::{AppError, AppResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;

/// Longest chat title derived from a first question, in characters.
const MAX_TITLE_CHARS: usize = 80;

/// A conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatSummary {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// A persisted turn with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredMessage {
    pub message_id: String,
    pub role: Role,
    pub content: String,

    /// Sources the answer cited, for assistant turns
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

pub struct ChatStore {
    conn: Connection,
}

impl ChatStore {
    /// Open or create the history database at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!("Failed to create history directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Storage(format!("Failed to open history database: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS chats (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id TEXT NOT NULL,
                message_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (chat_id) REFERENCES chats(id)
            );

            CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages(chat_id);
            "#,
        )
        .map_err(|e| AppError::Storage(format!("Failed to create tables: {}", e)))?;

        tracing::debug!("Opened chat history at {:?}", db_path);
        Ok(Self { conn })
    }

    /// Start a chat titled after its first question.
    pub fn create_chat(&self, first_question: &str) -> AppResult<ChatSummary> {
        let chat = ChatSummary {
            id: uuid::Uuid::new_v4().to_string(),
            title: title_from(first_question),
            created_at: Utc::now(),
        };

        self.conn
            .execute(
                "INSERT INTO chats (id, title, created_at) VALUES (?1, ?2, ?3)",
                params![chat.id, chat.title, chat.created_at.to_rfc3339()],
            )
            .map_err(|e| AppError::Storage(format!("Failed to create chat: {}", e)))?;

        tracing::info!(chat = %chat.id, "Created chat");
        Ok(chat)
    }

    pub fn get_chat(&self, chat_id: &str) -> AppResult<Option<ChatSummary>> {
        self.conn
            .query_row(
                "SELECT id, title, created_at FROM chats WHERE id = ?1",
                params![chat_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| AppError::Storage(format!("Failed to load chat: {}", e)))?
            .map(|(id, title, created_at)| {
                Ok(ChatSummary {
                    id,
                    title,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .transpose()
    }

    /// All chats, newest first.
    pub fn list_chats(&self) -> AppResult<Vec<ChatSummary>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, created_at FROM chats ORDER BY created_at DESC, id")
            .map_err(|e| AppError::Storage(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| AppError::Storage(format!("Failed to list chats: {}", e)))?;

        let mut chats = Vec::new();
        for row in rows {
            let (id, title, created_at) =
                row.map_err(|e| AppError::Storage(format!("Failed to read chat: {}", e)))?;
            chats.push(ChatSummary {
                id,
                title,
                created_at: parse_timestamp(&created_at)?,
            });
        }

        Ok(chats)
    }

    /// Turns of a chat in the order they were appended.
    pub fn load_messages(&self, chat_id: &str) -> AppResult<Vec<StoredMessage>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT message_id, role, content, metadata, created_at
                 FROM messages WHERE chat_id = ?1 ORDER BY id",
            )
            .map_err(|e| AppError::Storage(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![chat_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(|e| AppError::Storage(format!("Failed to load messages: {}", e)))?;

        let mut messages = Vec::new();
        for row in rows {
            let (message_id, role, content, metadata, created_at) =
                row.map_err(|e| AppError::Storage(format!("Failed to read message: {}", e)))?;

            let role = Role::parse(&role)
                .ok_or_else(|| AppError::Storage(format!("Unknown message role: {}", role)))?;
            let metadata = metadata
                .map(|json| serde_json::from_str(&json))
                .transpose()?;

            messages.push(StoredMessage {
                message_id,
                role,
                content,
                metadata,
                created_at: parse_timestamp(&created_at)?,
            });
        }

        Ok(messages)
    }

    /// Conversation history of a chat, ready for the answer pipeline.
    pub fn load_history(&self, chat_id: &str) -> AppResult<Vec<Message>> {
        Ok(self
            .load_messages(chat_id)?
            .into_iter()
            .map(|m| Message {
                role: m.role,
                content: m.content,
            })
            .collect())
    }

    /// Append one turn and return its message id.
    pub fn append_message(
        &self,
        chat_id: &str,
        message: &Message,
        metadata: Option<&serde_json::Value>,
    ) -> AppResult<String> {
        insert_message(&self.conn, chat_id, message, metadata)
    }

    /// Store a completed question/answer pair atomically.
    ///
    /// The answer's metadata records the sources it was generated from.
    pub fn record_exchange(
        &mut self,
        chat_id: &str,
        question: &str,
        answer: &str,
        sources: &[Document],
    ) -> AppResult<()> {
        let metadata = serde_json::json!({ "sources": sources });

        let tx = self
            .conn
            .transaction()
            .map_err(|e| AppError::Storage(format!("Failed to begin transaction: {}", e)))?;

        insert_message(&tx, chat_id, &Message::user(question), None)?;
        insert_message(&tx, chat_id, &Message::assistant(answer), Some(&metadata))?;

        tx.commit()
            .map_err(|e| AppError::Storage(format!("Failed to commit exchange: {}", e)))?;

        tracing::debug!(chat = %chat_id, "Recorded exchange with {} sources", sources.len());
        Ok(())
    }
}

fn insert_message(
    conn: &Connection,
    chat_id: &str,
    message: &Message,
    metadata: Option<&serde_json::Value>,
) -> AppResult<String> {
    let message_id = uuid::Uuid::new_v4().to_string();
    let metadata_json = metadata.map(serde_json::to_string).transpose()?;

    conn.execute(
        "INSERT INTO messages (chat_id, message_id, role, content, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            chat_id,
            message_id,
            message.role.as_str(),
            message.content,
            metadata_json,
            Utc::now().to_rfc3339(),
        ],
    )
    .map_err(|e| AppError::Storage(format!("Failed to insert message: {}", e)))?;

    Ok(message_id)
}

fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Storage(format!("Invalid timestamp '{}': {}", value, e)))
}

fn title_from(question: &str) -> String {
    let collapsed = question.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_TITLE_CHARS {
        return collapsed;
    }

    let truncated: String = collapsed.chars().take(MAX_TITLE_CHARS - 3).collect();
    format!("{}...", truncated.trim_end())
}
