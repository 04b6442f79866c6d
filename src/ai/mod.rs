//! The AI side of the pipeline is a single capability: turn a prompt into
//! text. Everything else (prompt layout, plan parsing) lives outside the
//! backends.

use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use crate::{
    errors::ProviderError,
    models::config::{AiBackend, AiConfig},
};

pub mod command;
pub mod placeholder;
pub mod prompts;

pub use command::CommandGenerator;
pub use placeholder::PlaceholderGenerator;

#[async_trait]
pub trait TextGenerator {
    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError>;
    fn name(&self) -> &str;
}

pub fn build_generator(config: &AiConfig) -> Arc<dyn TextGenerator + Send + Sync> {
    match &config.backend {
        AiBackend::Placeholder => Arc::new(PlaceholderGenerator::new()),
        AiBackend::Command(command) => Arc::new(CommandGenerator::new(command.clone())),
    }
}

/// Asks `generator` for a query plan and returns its raw response.
pub async fn request_plan(
    generator: &(dyn TextGenerator + Send + Sync),
    schema_context: &str,
    data_view_state: &str,
    question: &str,
) -> Result<String, ProviderError> {
    debug!("AI request via {}: {}", generator.name(), question);
    debug!("Data view state: {}", data_view_state);

    let prompt = prompts::query_plan_prompt(schema_context, data_view_state, question);
    let response = generator.generate_text(&prompt).await?;

    debug!("AI response:\n{}", response);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_generator() {
        let placeholder = build_generator(&AiConfig::default());
        assert_eq!(placeholder.name(), "placeholder");

        let command = build_generator(&AiConfig {
            backend: AiBackend::Command("ollama run llama3.2".to_string()),
        });
        assert_eq!(command.name(), "command");
    }

    #[tokio::test]
    async fn test_request_plan_uses_prompt() {
        let generator = PlaceholderGenerator::new();
        let response = request_plan(
            &generator,
            "## Current Table: orders",
            "Current table: orders, Page: 1, Limit: 20",
            "latest orders",
        )
        .await
        .unwrap();
        assert!(response.contains("\"tables\":[\"orders\"]"));
    }
}
