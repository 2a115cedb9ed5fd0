//! Field schema proposal for a category
//!
//! With a credential the model proposes the fields; otherwise (or when the
//! model call or its output fails) a fixed domain template is used.

use super::Components;
use crate::catalog::{FieldDescriptor, FieldType};
use crate::credential::Credential;
use crate::document::{truncate_chars, Document};
use crate::llm::{response, CompletionRequest};

const SYSTEM_PROMPT: &str = "You are an expert in data extraction and document structuring. \
Your goal is to propose relevant fields to categorize and structure documents. \
Answer ONLY in JSON, without Markdown or explanations. \
Expected format: [{\"name\": \"field_name\", \"type\": \"text|number|date|boolean\", \"description\": \"Field description\"}]";

/// Inputs for one schema proposal
#[derive(Debug, Clone, Copy)]
pub struct SchemaRequest<'a> {
    pub category: &'a str,
    pub samples: &'a [Document],
    pub field_count: usize,
    pub existing_field_names: &'a [String],
    pub instructions: Option<&'a str>,
}

type Template = [(&'static str, FieldType, &'static str); 7];

const MEDICAL: Template = [
    ("diagnostic", FieldType::Text, "Diagnostic médical"),
    ("traitement", FieldType::Text, "Traitement prescrit"),
    ("date_consultation", FieldType::Date, "Date de consultation"),
    ("medecin", FieldType::Text, "Nom du médecin"),
    ("patient", FieldType::Text, "Informations patient"),
    ("medicaments", FieldType::Text, "Médicaments prescrits"),
    ("symptomes", FieldType::Text, "Symptômes observés"),
];

const LEGAL: Template = [
    ("type_contrat", FieldType::Text, "Type de contrat"),
    ("parties", FieldType::Text, "Parties impliquées"),
    ("date_signature", FieldType::Date, "Date de signature"),
    ("montant", FieldType::Number, "Montant financier"),
    ("duree", FieldType::Text, "Durée du contrat"),
    ("clauses", FieldType::Text, "Clauses importantes"),
    ("juridiction", FieldType::Text, "Juridiction compétente"),
];

const TECHNICAL: Template = [
    ("version", FieldType::Text, "Version du logiciel"),
    ("fonctionnalite", FieldType::Text, "Fonctionnalité décrite"),
    ("langage", FieldType::Text, "Langage de programmation"),
    ("environnement", FieldType::Text, "Environnement d'exécution"),
    ("dependances", FieldType::Text, "Dépendances requises"),
    ("exemple_code", FieldType::Text, "Exemple de code"),
    ("documentation", FieldType::Text, "Lien vers documentation"),
];

const GENERIC: Template = [
    ("titre", FieldType::Text, "Titre du document"),
    ("date_doc", FieldType::Date, "Date du document"),
    ("auteur", FieldType::Text, "Auteur du document"),
    ("type", FieldType::Text, "Type de document"),
    ("contenu_principal", FieldType::Text, "Contenu principal"),
    ("mots_cles", FieldType::Text, "Mots-clés"),
    ("statut", FieldType::Text, "Statut du document"),
];

fn template_for(category: &str) -> &'static Template {
    let lowered = category.to_lowercase();
    let mentions = |needles: &[&str]| needles.iter().any(|n| lowered.contains(n));

    if mentions(&["médical", "medical"]) {
        &MEDICAL
    } else if mentions(&["juridique", "legal"]) {
        &LEGAL
    } else if mentions(&["technique", "technical"]) {
        &TECHNICAL
    } else {
        &GENERIC
    }
}

/// Deterministic fields from the domain templates, followed by any existing
/// field names the template does not already cover
pub fn rule_based_fields(
    category: &str,
    field_count: usize,
    existing_field_names: &[String],
) -> Vec<FieldDescriptor> {
    let mut fields: Vec<FieldDescriptor> = template_for(category)
        .iter()
        .take(field_count)
        .map(|(name, field_type, description)| FieldDescriptor::new(*name, *field_type, *description))
        .collect();

    for name in existing_field_names {
        if !fields.iter().any(|f| &f.name == name) {
            fields.push(FieldDescriptor::new(
                name.clone(),
                FieldType::Text,
                format!("Existing field: {}", name),
            ));
        }
    }

    fields
}

/// Propose fields for a category. Never fails: any problem on the model path
/// degrades to [`rule_based_fields`].
pub fn generate_fields(
    components: &Components<'_>,
    request: &SchemaRequest<'_>,
    credential: Option<&Credential>,
) -> Vec<FieldDescriptor> {
    let Some(credential) = credential else {
        tracing::debug!("No API key, using rule-based fields for '{}'", request.category);
        return rule_based_fields(request.category, request.field_count, request.existing_field_names);
    };

    match model_fields(components, request, credential) {
        Some(fields) => fields,
        None => {
            tracing::warn!(
                "Falling back to rule-based fields for '{}'",
                request.category
            );
            rule_based_fields(request.category, request.field_count, request.existing_field_names)
        }
    }
}

fn model_fields(
    components: &Components<'_>,
    request: &SchemaRequest<'_>,
    credential: &Credential,
) -> Option<Vec<FieldDescriptor>> {
    let limits = components.limits;

    let examples: Vec<String> = request
        .samples
        .iter()
        .take(limits.schema_sample_docs)
        .enumerate()
        .map(|(i, document)| {
            let text = document.text();
            let excerpt = truncate_chars(&text, limits.schema_excerpt_chars);
            let ellipsis = if excerpt.len() < text.len() { "..." } else { "" };
            format!("Document {}: {}{}", i + 1, excerpt, ellipsis)
        })
        .collect();

    let existing: Vec<&str> = request
        .existing_field_names
        .iter()
        .take(limits.schema_existing_fields)
        .map(String::as_str)
        .collect();

    let user_prompt = format!(
        "\nCategory: {category}\nNumber of fields wanted: {count}\n\n\
         Document examples:\n{examples}\n\n\
         Existing fields to reuse if relevant: {existing}\n\n\
         Specific instructions: {instructions}\n\n\
         Propose {count} relevant fields for this category of documents.\n\
         Always include a field 'date_doc' of type 'date'.\n\
         Answer only with the JSON of the fields.\n",
        category = request.category,
        count = request.field_count,
        examples = examples.join("\n"),
        existing = existing.join(", "),
        instructions = request.instructions.filter(|s| !s.trim().is_empty()).unwrap_or("None"),
    );

    let completion = CompletionRequest::new(user_prompt)
        .with_system(SYSTEM_PROMPT)
        .with_temperature(0.2)
        .with_max_tokens(1000);

    let answer = components.gateway.complete(credential, &completion).ok()?;
    let mut fields = parse_field_list(&answer)?;
    fields.truncate(request.field_count);
    Some(fields)
}

/// Parse the model's JSON field list. Entries that are not field objects are
/// dropped; `None` when nothing usable remains.
pub fn parse_field_list(answer: &str) -> Option<Vec<FieldDescriptor>> {
    let body = response::strip_code_fences(answer);
    let items = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Array(items)) => items,
        Ok(_) => {
            tracing::warn!("Field proposal is not a JSON array");
            return None;
        }
        Err(e) => {
            tracing::warn!("Field proposal is not valid JSON: {}", e);
            return None;
        }
    };

    let fields: Vec<FieldDescriptor> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<FieldDescriptor>(item).ok())
        .filter(|field| !field.name.trim().is_empty())
        .collect();

    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(fields: &[FieldDescriptor]) -> Vec<&str> {
        fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_template_selection() {
        assert_eq!(rule_based_fields("Comptes-rendus MÉDICAL", 7, &[])[0].name, "diagnostic");
        assert_eq!(rule_based_fields("Legal notices", 7, &[])[0].name, "type_contrat");
        assert_eq!(rule_based_fields("Doc technique", 7, &[])[0].name, "version");
        assert_eq!(rule_based_fields("Factures", 7, &[])[1].name, "date_doc");
    }

    #[test]
    fn test_truncate_then_append_existing() {
        let existing = vec!["montant".to_string(), "parties".to_string()];
        let fields = rule_based_fields("Contrats juridique", 3, &existing);
        assert_eq!(names(&fields), vec!["type_contrat", "parties", "date_signature", "montant"]);
        assert_eq!(fields[3].field_type, FieldType::Text);
        assert_eq!(fields[3].description, "Existing field: montant");
    }

    #[test]
    fn test_parse_field_list() {
        let answer = "```json\n[{\"name\": \"date_doc\", \"type\": \"date\", \"description\": \"Date\"},\n\
                      {\"name\": \"total\", \"type\": \"currency\", \"description\": \"Total\"}, 42]\n```";
        let fields = parse_field_list(answer).unwrap();
        assert_eq!(names(&fields), vec!["date_doc", "total"]);
        assert_eq!(fields[0].field_type, FieldType::Date);
        assert_eq!(fields[1].field_type, FieldType::Text);
    }

    #[test]
    fn test_parse_field_list_rejects_non_arrays() {
        assert!(parse_field_list("{\"name\": \"x\"}").is_none());
        assert!(parse_field_list("Here are some fields").is_none());
        assert!(parse_field_list("[]").is_none());
    }
}
