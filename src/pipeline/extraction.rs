//! Per-field value extraction and normalization

use super::Components;
use crate::catalog::CategoryFields;
use crate::credential::Credential;
use crate::document::{truncate_chars, Document};
use crate::llm::CompletionRequest;
use indexmap::IndexMap;

const SYSTEM_PROMPT: &str = "You are an expert in data extraction. \
Your goal is to extract one specific value from a document. \
Answer ONLY with the extracted value, without explanations or formatting. \
If the value is not found, answer 'N/A'.";

/// Answers that mean "not found"
const NOT_FOUND_SENTINELS: [&str; 3] = ["n/a", "non trouvé", "non disponible"];

/// Map a raw model answer to a stored value.
///
/// Sentinels become `None`. With allowed values, an answer that is not an
/// exact member snaps to the first allowed value it contains or is contained
/// in (case-insensitive); otherwise the raw answer is kept.
pub fn normalize_value(raw: &str, allowed_values: &[String]) -> Option<String> {
    let value = raw.trim();
    let lowered = value.to_lowercase();

    if value.is_empty() || NOT_FOUND_SENTINELS.contains(&lowered.as_str()) {
        return None;
    }

    if allowed_values.is_empty() || allowed_values.iter().any(|a| a == value) {
        return Some(value.to_string());
    }

    let snapped = allowed_values.iter().find(|allowed| {
        let allowed = allowed.to_lowercase();
        lowered.contains(&allowed) || allowed.contains(&lowered)
    });

    Some(snapped.map_or_else(|| value.to_string(), Clone::clone))
}

/// Extract every field of `fields` from `document`, in catalog order.
///
/// A failed call leaves that field `None` and moves on to the next one.
/// `field_descriptions` entries take precedence over catalog descriptions.
pub fn extract_fields(
    components: &Components<'_>,
    document: &Document,
    fields: &CategoryFields,
    field_descriptions: &IndexMap<String, String>,
    credential: &Credential,
    instructions: Option<&str>,
) -> IndexMap<String, Option<String>> {
    let excerpt = truncate_chars(&document.content, components.limits.extraction_excerpt_chars);
    let instructions = instructions.unwrap_or("");

    let mut extracted = IndexMap::with_capacity(fields.len());

    for (field_name, spec) in fields {
        let description = field_descriptions
            .get(field_name)
            .map(String::as_str)
            .unwrap_or(&spec.description);
        let allowed = if spec.allowed_values.is_empty() {
            "None".to_string()
        } else {
            spec.allowed_values.join(", ")
        };

        let user_prompt = format!(
            "\nDocument: {title} - {excerpt}\n\n\
             Field to extract: {field_name}\n\
             Description: {description}\n\
             Type: {field_type}\n\
             Allowed values: {allowed}\n\n\
             Instructions: {instructions}\n\n\
             Extract the value for the field \"{field_name}\".\n",
            title = document.title,
            field_type = spec.field_type,
        );

        let request = CompletionRequest::new(user_prompt)
            .with_system(SYSTEM_PROMPT)
            .with_temperature(0.1)
            .with_max_tokens(100);

        let value = match components.gateway.complete(credential, &request) {
            Ok(answer) => normalize_value(&answer, &spec.allowed_values),
            Err(e) => {
                tracing::warn!(
                    document = %document.id,
                    "Extraction of field '{}' failed: {}",
                    field_name,
                    e
                );
                None
            }
        };

        extracted.insert(field_name.clone(), value);
    }

    extracted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sentinels_are_null() {
        for raw in ["n/a", "N/A", " Non trouvé ", "NON DISPONIBLE", "", "   "] {
            assert_eq!(normalize_value(raw, &[]), None, "raw = {:?}", raw);
        }
    }

    #[test]
    fn test_english_not_found_is_kept() {
        assert_eq!(normalize_value("Not found", &[]), Some("Not found".to_string()));
    }

    #[test]
    fn test_raw_value_kept_without_allowed_values() {
        assert_eq!(normalize_value(" 40 EUR ", &[]), Some("40 EUR".to_string()));
    }

    #[test]
    fn test_snaps_to_allowed_value() {
        let allowed = allowed(&["Urgent", "Normal"]);
        assert_eq!(normalize_value("urgent traitement", &allowed), Some("Urgent".to_string()));
        assert_eq!(normalize_value("norm", &allowed), Some("Normal".to_string()));
        assert_eq!(normalize_value("Normal", &allowed), Some("Normal".to_string()));
        assert_eq!(normalize_value("Inconnu", &allowed), Some("Inconnu".to_string()));
    }

    #[test]
    fn test_first_allowed_match_wins() {
        let allowed = allowed(&["Rouge", "Rouge vif"]);
        assert_eq!(normalize_value("rouge vif", &allowed), Some("Rouge".to_string()));
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let allowed = allowed(&["Urgent", "Normal"]);
        for raw in ["urgent traitement", "N/A", "Normal", "autre"] {
            let once = normalize_value(raw, &allowed);
            let twice = once.as_deref().and_then(|v| normalize_value(v, &allowed));
            assert_eq!(once, twice, "raw = {:?}", raw);
        }
    }
}
