//! Prompt system for Lumen.
//!
//! This crate provides structured prompt management with:
//! - Built-in prompts for query rewriting and cited answers
//! - YAML overrides from the workspace
//! - Handlebars template rendering

pub mod builder;
pub mod builtin;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use builtin::{
    ANSWER_PROMPT_ID, NO_RELEVANT_INFORMATION, NO_RETRIEVAL_SENTINEL, REWRITE_PROMPT_ID,
};
pub use loader::{list_prompts, load_prompt};
pub use types::{
    BuiltPrompt, BuiltPromptMetadata, PromptBehavior, PromptDefinition, PromptOutputSpec,
    PromptRole,
};
