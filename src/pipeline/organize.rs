//! Classification of documents into existing categories

use super::Components;
use crate::credential::Credential;
use crate::document::{truncate_chars, Document};
use crate::llm::{response, CompletionRequest};

/// The first category equal to `answer` ignoring case, or related to it by a
/// case-insensitive substring in either direction
pub fn match_category<'a>(answer: &str, categories: &'a [String]) -> Option<&'a str> {
    let answer = answer.to_lowercase();
    if answer.is_empty() {
        return None;
    }

    categories
        .iter()
        .find(|category| {
            let category = category.to_lowercase();
            category == answer || category.contains(&answer) || answer.contains(&category)
        })
        .map(String::as_str)
}

/// Ask the model which of `categories` the document belongs to.
/// `None` when the call fails or the answer matches no category.
pub fn classify(
    components: &Components<'_>,
    document: &Document,
    categories: &[String],
    credential: &Credential,
) -> Option<String> {
    let title = if document.title.trim().is_empty() {
        "Untitled"
    } else {
        document.title.as_str()
    };

    let prompt = format!(
        "You are an expert in document classification.\n\n\
         Here is a document to classify:\n\
         Title: {}\n\
         Content: {}...\n\n\
         Here are the available categories:\n{}\n\n\
         Which category does this document belong to? \
         Answer ONLY with the exact category name, nothing else.",
        title,
        truncate_chars(&document.content, components.limits.organize_excerpt_chars),
        categories.join(", ")
    );

    let request = CompletionRequest::new(prompt)
        .with_temperature(0.1)
        .with_max_tokens(100);

    let answer = match components.gateway.complete(credential, &request) {
        Ok(answer) => answer,
        Err(e) => {
            tracing::warn!(document = %document.id, "Classification failed: {}", e);
            return None;
        }
    };

    let label = response::trim_label(&answer);
    let matched = match_category(label, categories);
    if matched.is_none() {
        tracing::info!(
            document = %document.id,
            "Answer '{}' matches none of the categories, leaving uncategorized",
            label
        );
    }
    matched.map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_ignoring_case() {
        let cats = categories(&["Factures", "Contrats"]);
        assert_eq!(match_category("contrats", &cats), Some("Contrats"));
    }

    #[test]
    fn test_substring_either_direction() {
        let cats = categories(&["Factures médicales", "Contrats"]);
        assert_eq!(match_category("factures", &cats), Some("Factures médicales"));
        assert_eq!(match_category("Contrats de travail", &cats), Some("Contrats"));
    }

    #[test]
    fn test_ambiguous_takes_first_in_order() {
        let cats = categories(&["Factures", "Factures médicales"]);
        assert_eq!(match_category("Factures médicales", &cats), Some("Factures"));

        let reversed = categories(&["Factures médicales", "Factures"]);
        assert_eq!(match_category("Factures médicales", &reversed), Some("Factures médicales"));
    }

    #[test]
    fn test_no_match() {
        let cats = categories(&["Factures", "Contrats"]);
        assert_eq!(match_category("Recettes", &cats), None);
        assert_eq!(match_category("", &cats), None);
    }
}
