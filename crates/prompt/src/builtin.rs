//! Built-in prompt definitions used by the answer pipeline.
//!
//! Workspaces can replace either prompt by dropping a YAML file with the same
//! id into `.lumen/prompts/`.

use crate::types::{PromptBehavior, PromptDefinition, PromptOutputSpec, PromptRole};

/// Prompt that turns a follow-up question into a standalone search query.
pub const REWRITE_PROMPT_ID: &str = "search.rewrite";

/// System prompt for the cited answer.
pub const ANSWER_PROMPT_ID: &str = "search.answer";

/// Literal the rewrite prompt asks for when no retrieval is needed.
pub const NO_RETRIEVAL_SENTINEL: &str = "not_needed";

/// Line the answer prompt falls back to when the context does not help.
pub const NO_RELEVANT_INFORMATION: &str = "I couldn't find any relevant information on this topic. Would you like me to search again or ask something else?";

const REWRITE_TEMPLATE: &str = r#"You rewrite a follow-up question into a standalone question for a hybrid (vector and keyword) search engine whose results are then reranked. Produce the question most likely to retrieve the relevant passages.

Guidelines:
1. Always phrase the output as one clear, concise question.
2. Keep the key concepts and entities of the question.
3. Prefer specific, descriptive terms over general ones.
4. Carry over any context from the conversation the question depends on.
5. Leave out personal pronouns and conversational filler.
6. Use the wording an authoritative source would use for the topic.
7. If the input is a greeting (e.g. "hi", "hello") or a writing task, answer with exactly "not_needed".

Examples:
1. Follow up question: What's the capital of France and how many people live there?
Rephrased: What is the population of Paris, the capital of France?

2. Follow up question: Can you tell me about the history and features of Docker?
Rephrased: What are the key historical milestones and main features of Docker containerization technology?

3. Follow up question: How does climate change affect polar bear populations?
Rephrased: How is climate change impacting Arctic polar bear habitats and population trends?

4. Follow up question: Write a poem about spring.
Rephrased: not_needed

Conversation:
{{chat_history}}

Follow up question: {{query}}
Rephrased question:"#;

const ANSWER_TEMPLATE: &str = r#"You are an assistant that answers questions from search results.

Write an informative, relevant answer based on the provided context, in a neutral and unbiased tone. Do not repeat the context verbatim.

Format the answer in markdown, using bullet points where they help. Make it comprehensive.

Cite sources with [number] notation at the end of each sentence that uses them, where the number is the position of the passage in the context. Quote short, relevant excerpts in quotation marks followed by the citation, for example: "Key information from the source" [number]. Keep excerpts brief; paraphrase when that keeps the point.

When several sources support a statement, cite them together: [number1][number2].

The context below comes from a search engine, is not part of the conversation, and is not visible to the user:

<context>
{{context}}
</context>

If the context is empty or not relevant to the question, respond with exactly: '{{fallback}}'"#;

/// The built-in rewrite prompt.
pub fn rewrite_prompt() -> PromptDefinition {
    PromptDefinition {
        id: REWRITE_PROMPT_ID.to_string(),
        title: "Search query rewriter".to_string(),
        api_version: "1.0".to_string(),
        created_by: "lumen".to_string(),
        role: PromptRole::User,
        behavior: PromptBehavior {
            tone: "neutral".to_string(),
            style: "concise".to_string(),
        },
        variables: vec!["chat_history".to_string(), "query".to_string()],
        template: REWRITE_TEMPLATE.to_string(),
        output: PromptOutputSpec {
            format: "text".to_string(),
        },
    }
}

/// The built-in answer prompt.
pub fn answer_prompt() -> PromptDefinition {
    PromptDefinition {
        id: ANSWER_PROMPT_ID.to_string(),
        title: "Cited answer".to_string(),
        api_version: "1.0".to_string(),
        created_by: "lumen".to_string(),
        role: PromptRole::System,
        behavior: PromptBehavior {
            tone: "informative".to_string(),
            style: "detailed".to_string(),
        },
        variables: vec!["context".to_string(), "fallback".to_string()],
        template: ANSWER_TEMPLATE.to_string(),
        output: PromptOutputSpec {
            format: "markdown".to_string(),
        },
    }
}

/// Look up a built-in prompt by id.
pub fn builtin_prompt(id: &str) -> Option<PromptDefinition> {
    match id {
        REWRITE_PROMPT_ID => Some(rewrite_prompt()),
        ANSWER_PROMPT_ID => Some(answer_prompt()),
        _ => None,
    }
}

/// Ids of all built-in prompts.
pub fn builtin_ids() -> [&'static str; 2] {
    [REWRITE_PROMPT_ID, ANSWER_PROMPT_ID]
}
