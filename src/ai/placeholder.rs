use async_trait::async_trait;
use serde_json::json;

use crate::{errors::ProviderError, models::plan::DEFAULT_PAGE_SIZE};

use super::TextGenerator;

const TABLE_MARKER: &str = "Current table: ";

/// Offline generator used when no AI backend is configured. It always asks
/// for the first page of the current table.
#[derive(Debug, Default, Clone)]
pub struct PlaceholderGenerator;

impl PlaceholderGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextGenerator for PlaceholderGenerator {
    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError> {
        let Some(table) = current_table(prompt) else {
            return Ok(format!(
                "I don't know which table to read.\n```json\n{}\n```",
                json!({ "need_other_tables": true })
            ));
        };

        let plan = json!({
            "tables": [table],
            "select": ["*"],
            "limit": DEFAULT_PAGE_SIZE,
            "page": 1,
            "action": "select",
            "description": format!("First rows of {} (placeholder AI)", table),
        });

        Ok(format!(
            "No AI provider is configured, showing the first rows of {}.\n```json\n{}\n```",
            table, plan
        ))
    }

    fn name(&self) -> &str {
        "placeholder"
    }
}

fn current_table(prompt: &str) -> Option<&str> {
    let start = prompt.rfind(TABLE_MARKER)? + TABLE_MARKER.len();
    let rest = &prompt[start..];
    let end = rest.find([',', '\n']).unwrap_or(rest.len());
    Some(rest[..end].trim()).filter(|table| !table.is_empty())
}
