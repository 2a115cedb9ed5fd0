//! Short descriptions for catalog fields

use super::Components;
use crate::catalog::FieldType;
use crate::credential::Credential;
use crate::llm::{response, CompletionRequest};
use serde::{Deserialize, Serialize};

/// A field that needs a description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldToDescribe {
    pub category: String,
    pub field_name: String,
    pub field_type: FieldType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescription {
    pub category: String,
    pub field_name: String,
    pub description: String,
}

/// Description used when the model gives nothing usable
pub fn fallback_description(field_type: FieldType, category: &str) -> String {
    format!("{} field for {}", field_type, category)
}

/// Describe each field in order, one call per field
pub fn describe_fields(
    components: &Components<'_>,
    fields: &[FieldToDescribe],
    credential: &Credential,
) -> Vec<FieldDescription> {
    fields
        .iter()
        .map(|field| {
            let prompt = format!(
                "You are an expert in data structuring.\n\n\
                 Write a clear and concise description for the following field:\n\n\
                 Field name: {}\n\
                 Type: {}\n\
                 Category: {}\n\n\
                 Answer ONLY with the field description in at most 10 words. \
                 The description must be clear, precise and explain what the field is for. \
                 No explanation or formatting.",
                field.field_name, field.field_type, field.category
            );

            let request = CompletionRequest::new(prompt)
                .with_temperature(0.1)
                .with_max_tokens(100);

            let description = match components.gateway.complete(credential, &request) {
                Ok(answer) => {
                    let cleaned = response::trim_quotes(&answer);
                    if cleaned.is_empty() {
                        fallback_description(field.field_type, &field.category)
                    } else {
                        cleaned.to_string()
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Describing {}.{} failed: {}",
                        field.category,
                        field.field_name,
                        e
                    );
                    fallback_description(field.field_type, &field.category)
                }
            };

            FieldDescription {
                category: field.category.clone(),
                field_name: field.field_name.clone(),
                description,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_description() {
        assert_eq!(fallback_description(FieldType::Date, "Factures"), "date field for Factures");
    }
}
