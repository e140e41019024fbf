//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition};
use handlebars::Handlebars;
use lumen_core::{AppError, AppResult};
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Variables the definition declares but the caller did not supply are
/// logged and rendered as empty strings.
///
/// # Example
/// ```no_run
/// use lumen_prompt::{build_prompt, builtin::rewrite_prompt};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut vars = HashMap::new();
/// vars.insert("query".to_string(), "What is Rust?".to_string());
/// vars.insert("chat_history".to_string(), String::new());
///
/// let built = build_prompt(&rewrite_prompt(), vars)?;
/// println!("{}", built.content);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    for name in &definition.variables {
        if !variables.contains_key(name) {
            tracing::warn!(prompt = %definition.id, variable = %name, "Prompt variable not provided");
        }
    }

    let rendered = render_template(&definition.template, &variables)?;

    Ok(BuiltPrompt::new(
        definition.role,
        rendered,
        definition.id.clone(),
        variables,
    ))
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text output, never HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{answer_prompt, NO_RELEVANT_INFORMATION};
    use crate::types::{PromptBehavior, PromptOutputSpec, PromptRole};

    fn create_test_definition(template: &str) -> PromptDefinition {
        PromptDefinition {
            id: "test.prompt".to_string(),
            title: "Test".to_string(),
            api_version: "1.0".to_string(),
            created_by: "test".to_string(),
            role: PromptRole::User,
            behavior: PromptBehavior {
                tone: "neutral".to_string(),
                style: "concise".to_string(),
            },
            variables: vec!["query".to_string()],
            template: template.to_string(),
            output: PromptOutputSpec {
                format: "text".to_string(),
            },
        }
    }

    #[test]
    fn test_render_simple_template() {
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), "Hello, world!".to_string());

        let result = render_template("Question: {{query}}", &vars).unwrap();
        assert_eq!(result, "Question: Hello, world!");
    }

    #[test]
    fn test_render_does_not_escape_markup() {
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), "<b>a & b</b> \"quoted\"".to_string());

        let result = render_template("{{query}}", &vars).unwrap();
        assert_eq!(result, "<b>a & b</b> \"quoted\"");
    }

    #[test]
    fn test_build_prompt() {
        let def = create_test_definition("Question: {{query}}");
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), "Test question".to_string());

        let built = build_prompt(&def, vars).unwrap();
        assert_eq!(built.content, "Question: Test question");
        assert_eq!(built.role, PromptRole::User);
        assert_eq!(built.metadata.source_prompt_id, "test.prompt");
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        let def = create_test_definition("Question: [{{query}}]");
        let built = build_prompt(&def, HashMap::new()).unwrap();
        assert_eq!(built.content, "Question: []");
    }

    #[test]
    fn test_invalid_template_is_prompt_error() {
        let def = create_test_definition("{{#if}}");
        let result = build_prompt(&def, HashMap::new());
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_answer_prompt_renders_context_and_fallback() {
        let mut vars = HashMap::new();
        vars.insert("context".to_string(), "1. Rust is fast.".to_string());
        vars.insert("fallback".to_string(), NO_RELEVANT_INFORMATION.to_string());

        let built = build_prompt(&answer_prompt(), vars).unwrap();
        assert!(built.content.contains("<context>\n1. Rust is fast.\n</context>"));
        assert!(built.content.contains(NO_RELEVANT_INFORMATION));
        assert_eq!(built.role, PromptRole::System);
    }
}
