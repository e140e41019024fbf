//! Ask command handler.
//!
//! Runs the answer pipeline and renders its events, either as streamed text
//! followed by the sources or as one JSON event per line.

use clap::Args;
use futures::StreamExt;
use lumen_answer::{validate_query, Document, Message, Pipeline, PipelineEvent, PipelineSettings};
use lumen_core::{config::AppConfig, AppError, AppResult};
use lumen_history::ChatStore;
use lumen_llm::{create_client, LlmClient};
use lumen_prompt::{load_prompt, ANSWER_PROMPT_ID, REWRITE_PROMPT_ID};
use lumen_search::WeaviateClient;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Ask a question and stream a cited answer
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub query: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "query")]
    pub file: Option<PathBuf>,

    /// Continue an existing chat
    #[arg(long, value_name = "CHAT_ID", conflicts_with = "new_chat")]
    pub chat: Option<String>,

    /// Start a new chat and record this exchange
    #[arg(long)]
    pub new_chat: bool,

    /// Print protocol events as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// Chat the exchange is recorded in.
struct ChatSession {
    store: ChatStore,
    chat_id: String,
}

/// What the answer stream ended with.
enum Ending {
    Completed,
    Failed(String),
    Interrupted,
    Truncated,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let query = self.get_query()?;
        validate_query(&query)?;
        config.validate()?;

        let pipeline = Arc::new(build_pipeline(config)?);

        let mut session = self.open_session(config, &query)?;
        let history = match &session {
            Some(s) => s.store.load_history(&s.chat_id)?,
            None => Vec::new(),
        };
        tracing::debug!("Loaded {} history messages", history.len());

        let mut events = pipeline.spawn(query.clone(), history)?;
        let mut sources: Vec<Document> = Vec::new();
        let mut answer = String::new();

        let interrupt = tokio::signal::ctrl_c();
        tokio::pin!(interrupt);

        let ending = loop {
            let event = tokio::select! {
                event = events.next() => event,
                _ = &mut interrupt => break Ending::Interrupted,
            };

            let Some(event) = event else {
                break Ending::Truncated;
            };

            if self.json {
                println!("{}", serde_json::to_string(&event)?);
            }

            match event {
                PipelineEvent::Sources(documents) => sources = documents,
                PipelineEvent::AnswerChunk(text) => {
                    if !self.json {
                        print!("{}", text);
                        std::io::stdout().flush().ok();
                    }
                    answer.push_str(&text);
                }
                PipelineEvent::Completed => break Ending::Completed,
                PipelineEvent::Failed(message) => break Ending::Failed(message),
            }
        };

        // Cancels the run if it is still going
        drop(events);

        if !self.json {
            println!();
        }

        match ending {
            Ending::Completed => {
                if !self.json {
                    print_sources(&sources);
                }
                if let Some(session) = session.as_mut() {
                    session
                        .store
                        .record_exchange(&session.chat_id, &query, &answer, &sources)?;
                    if !self.json {
                        eprintln!("Chat: {}", session.chat_id);
                    }
                }
                Ok(())
            }
            Ending::Failed(message) => Err(AppError::Pipeline(message)),
            Ending::Interrupted => Err(AppError::Other("Interrupted".to_string())),
            Ending::Truncated => Err(AppError::Pipeline(
                "Answer stream ended without a result".to_string(),
            )),
        }
    }

    /// Get the question from the argument or file.
    fn get_query(&self) -> AppResult<String> {
        if let Some(ref query) = self.query {
            return Ok(query.clone());
        }

        if let Some(ref path) = self.file {
            return std::fs::read_to_string(path).map_err(|e| {
                AppError::Config(format!("Failed to read question file {:?}: {}", path, e))
            });
        }

        Err(AppError::Config("No question provided".to_string()))
    }

    fn open_session(&self, config: &AppConfig, query: &str) -> AppResult<Option<ChatSession>> {
        if self.chat.is_none() && !self.new_chat {
            return Ok(None);
        }

        let store = ChatStore::open(&config.history_path())?;

        let chat_id = match self.chat {
            Some(ref id) => {
                store
                    .get_chat(id)?
                    .ok_or_else(|| AppError::Storage(format!("Chat not found: {}", id)))?
                    .id
            }
            None => store.create_chat(query)?.id,
        };

        Ok(Some(ChatSession { store, chat_id }))
    }
}

/// Build the pipeline from configuration, honoring prompt overrides.
fn build_pipeline(config: &AppConfig) -> AppResult<Pipeline> {
    let llm = build_llm_client(config)?;
    let search = Arc::new(WeaviateClient::from_config(&config.search)?);

    let rewrite = load_prompt(&config.workspace, REWRITE_PROMPT_ID)?;
    let answer = load_prompt(&config.workspace, ANSWER_PROMPT_ID)?;

    Ok(Pipeline::with_prompts(
        llm,
        search,
        PipelineSettings::from_config(config),
        rewrite,
        answer,
    ))
}

fn build_llm_client(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let provider_config = config.get_provider_config(&config.provider);
    let endpoint = provider_config.as_ref().and_then(|pc| pc.endpoint());
    let timeout = provider_config.as_ref().and_then(|pc| pc.timeout());
    let api_key = config.resolve_api_key(&config.provider);

    create_client(&config.provider, endpoint, api_key.as_deref(), timeout).map_err(AppError::Config)
}

fn print_sources(sources: &[Document]) {
    if sources.is_empty() {
        return;
    }

    println!("\nSources:");
    for (i, doc) in sources.iter().enumerate() {
        println!("  [{}] {} - {}", i + 1, doc.title, doc.url);
    }
}
