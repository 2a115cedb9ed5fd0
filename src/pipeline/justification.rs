//! Source excerpts backing extracted values

use super::Components;
use crate::credential::Credential;
use crate::document::{truncate_chars, Justification};
use crate::llm::{response, CompletionRequest};

const SYSTEM_PROMPT: &str = "You are an expert in document analysis. \
Your goal is to find the exact passage in a document that justifies an extracted value. \
Answer ONLY with the exact passage from the document, without explanations or formatting.";

/// Shortest passage accepted from the model
const MIN_PASSAGE_CHARS: usize = 3;

/// Find the passage of `content` supporting `field_value`.
///
/// Never fails: a failed call or a degenerate answer yields the value itself.
pub fn justify(
    components: &Components<'_>,
    content: &str,
    field_name: &str,
    field_value: &str,
    credential: &Credential,
) -> Justification {
    let user_prompt = format!(
        "\nDocument: {}\n\nExtracted field: {}\nExtracted value: {}\n\n\
         Find the exact passage in the document that contains this value.\n\
         Answer ONLY with the exact passage, without explanations.\n",
        truncate_chars(content, components.limits.justification_excerpt_chars),
        field_name,
        field_value
    );

    let request = CompletionRequest::new(user_prompt)
        .with_system(SYSTEM_PROMPT)
        .with_temperature(0.1)
        .with_max_tokens(500);

    match components.gateway.complete(credential, &request) {
        Ok(answer) => {
            let passage = response::trim_quotes(&answer);
            if passage.chars().count() < MIN_PASSAGE_CHARS {
                tracing::debug!("Passage for '{}' too short, using the value", field_name);
                Justification::new(field_value)
            } else {
                Justification::new(passage)
            }
        }
        Err(e) => {
            tracing::warn!("Justification of '{}' failed: {}", field_name, e);
            Justification::new(field_value)
        }
    }
}
