use crate::{errors::PlanError, models::plan::Plan};

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";

/// Reads a [`Plan`] out of free-form AI output.
pub fn parse_plan(response: &str) -> Result<Plan, PlanError> {
    let json = extract_json(response).ok_or(PlanError::NoJson)?;

    let mut plan: Plan =
        serde_json::from_str(json).map_err(|source| PlanError::MalformedJson {
            source,
            raw: json.to_string(),
        })?;
    plan.apply_defaults();

    Ok(plan)
}

/// Finds the JSON object in `text`.
///
/// A ```` ```json ```` block wins, then any fenced block that starts with `{`,
/// then the first balanced `{...}` span.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(body) = fenced_body(text, JSON_FENCE) {
        return Some(body).filter(|b| !b.is_empty());
    }
    if let Some(body) = fenced_body(text, FENCE) {
        if body.starts_with('{') {
            return Some(body);
        }
    }
    balanced_object(text)
}

fn fenced_body<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let len = text[start..].find(FENCE)?;
    Some(text[start..start + len].trim())
}

fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    None
}
