//! Prompts command handler.

use clap::Args;
use lumen_core::{config::AppConfig, AppResult};
use lumen_prompt::{list_prompts, load_prompt};

/// List available prompts
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Print the template of this prompt
    #[arg(long, value_name = "PROMPT_ID")]
    pub show: Option<String>,
}

impl PromptsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        if let Some(ref id) = self.show {
            let prompt = load_prompt(&config.workspace, id)?;
            println!("{}", prompt.template);
            return Ok(());
        }

        for id in list_prompts(&config.workspace)? {
            match load_prompt(&config.workspace, &id) {
                Ok(prompt) => println!("{:<20} {}", id, prompt.title),
                Err(e) => {
                    tracing::warn!("Skipping invalid prompt {}: {}", id, e);
                    println!("{:<20} (invalid)", id);
                }
            }
        }

        Ok(())
    }
}
