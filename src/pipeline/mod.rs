//! Document categorization pipeline
//!
//! [`Pipeline`] is the request-synchronous facade over the store, the
//! vectorizer, the cluster engine and the model gateway. Each operation
//! checks its preconditions before doing any work, isolates per-item
//! failures, and propagates store failures.

mod describe;
mod extraction;
mod justification;
mod naming;
mod organize;
mod schema;

pub use describe::{fallback_description, FieldDescription, FieldToDescribe};
pub use extraction::normalize_value;
pub use naming::NamingError;
pub use organize::match_category;
pub use schema::{parse_field_list, rule_based_fields, SchemaRequest};

use crate::catalog::{Catalog, FieldDescriptor};
use crate::clustering::{Cluster, ClusterEngine};
use crate::config::{Config, LimitsConfig};
use crate::credential::{Credential, CredentialStore};
use crate::document::{Document, Justification};
use crate::embedding::{VectorKind, Vectorizer};
use crate::error::{DocsiftError, Result};
use crate::llm::{MistralClient, ModelGateway, TextGenerator};
use crate::storage::Store;
use indexmap::IndexMap;
use serde::Serialize;

/// What the AI-calling components share
pub struct Components<'a> {
    pub gateway: &'a ModelGateway,
    pub limits: &'a LimitsConfig,
    /// Named in missing-credential errors
    pub credential_env: &'a str,
}

/// One spreadsheet row handed over by the ingestion side
#[derive(Debug, Clone)]
pub struct RowRecord {
    pub title: Option<String>,
    pub content: String,
}

/// Result of a clustering request
#[derive(Debug, Clone, Serialize)]
pub struct ClusteringReport {
    pub clusters: Vec<Cluster>,
    /// Whether the semantic model or the TF-IDF fallback produced the vectors
    pub vector_kind: VectorKind,
    /// False when no credential was available and placeholder names were kept
    pub named: bool,
}

/// Per-category result of bulk schema generation.
///
/// Schema generation falls back to a template instead of failing, so every
/// category gets a result.
#[derive(Debug, Clone, Serialize)]
pub struct CategorySchemaResult {
    pub fields: Vec<FieldDescriptor>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkSchemaReport {
    pub results: IndexMap<String, CategorySchemaResult>,
    pub total_categories: usize,
}

/// Classification result for one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizeOutcome {
    pub document_id: String,
    /// `None` when the document was left uncategorized
    pub category: Option<String>,
}

/// Extraction result for one document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Extracted {
        document_id: String,
        title: String,
        fields: IndexMap<String, Option<String>>,
    },
    Failed {
        document_id: String,
        error: String,
    },
}

impl ExtractionOutcome {
    pub fn document_id(&self) -> &str {
        match self {
            Self::Extracted { document_id, .. } | Self::Failed { document_id, .. } => document_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub outcomes: Vec<ExtractionOutcome>,
    pub total_documents: usize,
    pub processed_documents: usize,
    /// Fields attempted across processed documents, unresolved ones included
    pub total_fields_extracted: usize,
}

/// category → field → description, overriding catalog descriptions
pub type FieldDescriptionOverrides = IndexMap<String, IndexMap<String, String>>;

pub struct Pipeline<S: Store> {
    store: S,
    vectorizer: Vectorizer,
    engine: ClusterEngine,
    gateway: ModelGateway,
    credentials: CredentialStore,
    limits: LimitsConfig,
}

impl<S: Store> Pipeline<S> {
    /// Production wiring: semantic vectorizer and the Mistral client
    pub fn from_config(store: S, config: &Config, api_key_override: Option<String>) -> Result<Self> {
        let credentials = CredentialStore::new(config.llm.api_key_env.clone()).with_override(api_key_override);
        Self::with_generator(store, config, Box::new(MistralClient::new(&config.llm)), credentials)
    }

    /// Wire with any text generator
    pub fn with_generator(
        store: S,
        config: &Config,
        generator: Box<dyn TextGenerator>,
        credentials: CredentialStore,
    ) -> Result<Self> {
        Ok(Self::from_parts(
            store,
            Vectorizer::new(&config.embedding)?,
            ClusterEngine::new(config.clustering.clone()),
            ModelGateway::new(generator, config.llm.max_retries),
            credentials,
            config.limits.clone(),
        ))
    }

    pub fn from_parts(
        store: S,
        vectorizer: Vectorizer,
        engine: ClusterEngine,
        gateway: ModelGateway,
        credentials: CredentialStore,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            store,
            vectorizer,
            engine,
            gateway,
            credentials,
            limits,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn components(&self) -> Components<'_> {
        Components {
            gateway: &self.gateway,
            limits: &self.limits,
            credential_env: self.credentials.env_var(),
        }
    }

    fn credential(&self) -> Option<Credential> {
        self.credentials.get(&self.store)
    }

    fn require_credential(&self) -> Result<Credential> {
        self.credential().ok_or_else(|| DocsiftError::MissingCredential {
            env_var: self.credentials.env_var().to_string(),
        })
    }

    // ---------------------------------------------------------------------
    // Documents
    // ---------------------------------------------------------------------

    /// Register already-extracted text as a document
    pub fn ingest_text(&self, title: &str, content: &str, source_filename: &str) -> Result<Document> {
        let document = Document::new(title, content, source_filename);
        self.store.put(&document)?;
        tracing::info!(id = %document.id, "Ingested '{}'", source_filename);
        Ok(document)
    }

    /// Register spreadsheet rows, one document each. Row numbers start at 1;
    /// rows without a title are called `Row <n>`.
    pub fn ingest_rows(&self, source_filename: &str, rows: &[RowRecord]) -> Result<Vec<Document>> {
        let mut documents = Vec::with_capacity(rows.len());
        for (offset, row) in rows.iter().enumerate() {
            let row_index = offset + 1;
            let title = row
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| format!("Row {}", row_index));
            let document = Document::from_row(title, row.content.clone(), source_filename, row_index);
            self.store.put(&document)?;
            documents.push(document);
        }
        tracing::info!("Ingested {} rows from '{}'", documents.len(), source_filename);
        Ok(documents)
    }

    pub fn documents(&self) -> Result<Vec<Document>> {
        self.store.list()
    }

    pub fn document(&self, id: &str) -> Result<Document> {
        self.store
            .get(id)?
            .ok_or_else(|| DocsiftError::DocumentNotFound { id: id.to_string() })
    }

    /// `ids` in order, or every stored document when `None`
    fn select_documents(&self, ids: Option<&[String]>) -> Result<Vec<Document>> {
        match ids {
            Some(ids) => ids.iter().map(|id| self.document(id)).collect(),
            None => self.store.list(),
        }
    }

    /// Manually set a document's category
    pub fn assign_category(&self, id: &str, category: &str) -> Result<Document> {
        let category = category.trim();
        if category.is_empty() {
            return Err(DocsiftError::EmptyInput {
                what: "category".to_string(),
            });
        }
        let mut document = self.document(id)?;
        document.category = Some(category.to_string());
        self.store.put(&document)?;
        Ok(document)
    }

    /// Replace a stored document wholesale (validation edits)
    pub fn update_document(&self, document: &Document) -> Result<()> {
        if self.store.get(&document.id)?.is_none() {
            return Err(DocsiftError::DocumentNotFound {
                id: document.id.clone(),
            });
        }
        self.store.put(document)
    }

    /// Categorized documents grouped by category, in document order
    pub fn categories(&self) -> Result<IndexMap<String, Vec<Document>>> {
        let mut grouped: IndexMap<String, Vec<Document>> = IndexMap::new();
        for document in self.store.list()? {
            if let Some(category) = document.category.clone() {
                grouped.entry(category).or_default().push(document);
            }
        }
        Ok(grouped)
    }

    // ---------------------------------------------------------------------
    // Clustering
    // ---------------------------------------------------------------------

    /// Cluster the selected documents and, when a credential is available,
    /// name the clusters and persist the names as categories.
    ///
    /// A naming failure comes back as [`DocsiftError::Naming`] carrying the
    /// clusters as far as they were named.
    pub fn cluster_documents(&self, ids: Option<&[String]>, instructions: Option<&str>) -> Result<ClusteringReport> {
        let documents = self.select_documents(ids)?;
        if documents.is_empty() {
            return Err(DocsiftError::EmptyInput {
                what: "documents".to_string(),
            });
        }

        let texts: Vec<String> = documents.iter().map(Document::text).collect();
        let document_ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();

        let vectorized = self.vectorizer.vectorize(&texts);
        let clusters = self.engine.cluster(&vectorized, &document_ids);

        let Some(credential) = self.credential() else {
            tracing::info!("No API key configured, keeping placeholder cluster names");
            return Ok(ClusteringReport {
                clusters,
                vector_kind: vectorized.kind,
                named: false,
            });
        };

        let clusters = naming::name_clusters(
            &self.components(),
            &self.store,
            clusters,
            Some(&credential),
            instructions,
        )?;

        Ok(ClusteringReport {
            clusters,
            vector_kind: vectorized.kind,
            named: true,
        })
    }

    // ---------------------------------------------------------------------
    // Catalog
    // ---------------------------------------------------------------------

    pub fn catalog(&self) -> Result<Catalog> {
        self.store.get_catalog()
    }

    pub fn save_catalog(&self, catalog: &Catalog) -> Result<()> {
        self.store.put_catalog(catalog)?;
        tracing::info!("Saved catalog with {} categories", catalog.categories.len());
        Ok(())
    }

    /// Replace one category's fields in the stored catalog
    pub fn apply_fields(&self, category: &str, fields: &[FieldDescriptor]) -> Result<Catalog> {
        let mut catalog = self.store.get_catalog()?;
        catalog.set_fields(category, fields);
        self.save_catalog(&catalog)?;
        Ok(catalog)
    }

    /// Propose fields for `category` from its documents. Field names already
    /// in the catalog are offered for reuse.
    pub fn generate_fields(
        &self,
        category: &str,
        field_count: Option<usize>,
        instructions: Option<&str>,
    ) -> Result<Vec<FieldDescriptor>> {
        if category.trim().is_empty() {
            return Err(DocsiftError::EmptyInput {
                what: "category".to_string(),
            });
        }

        let samples = self.categories()?.shift_remove(category).unwrap_or_default();
        if samples.is_empty() {
            return Err(DocsiftError::EmptyInput {
                what: format!("documents in category '{}'", category),
            });
        }

        let existing = self.store.get_catalog()?.all_field_names();
        let request = SchemaRequest {
            category,
            samples: &samples,
            field_count: field_count.unwrap_or(self.limits.default_field_count),
            existing_field_names: &existing,
            instructions,
        };

        Ok(schema::generate_fields(&self.components(), &request, self.credential().as_ref()))
    }

    /// Generate fields for every category in turn. Names produced for earlier
    /// categories are offered to later ones.
    pub fn generate_all_fields(&self, field_count: Option<usize>, instructions: Option<&str>) -> Result<BulkSchemaReport> {
        let categories = self.categories()?;
        if categories.is_empty() {
            return Err(DocsiftError::EmptyInput {
                what: "categories".to_string(),
            });
        }

        let field_count = field_count.unwrap_or(self.limits.default_field_count);
        let credential = self.credential();
        let components = self.components();

        let mut existing: Vec<String> = Vec::new();
        let mut results = IndexMap::new();

        for (category, samples) in &categories {
            let request = SchemaRequest {
                category,
                samples,
                field_count,
                existing_field_names: &existing,
                instructions,
            };
            let fields = schema::generate_fields(&components, &request, credential.as_ref());

            for field in &fields {
                if !existing.contains(&field.name) {
                    existing.push(field.name.clone());
                }
            }

            tracing::info!("Generated {} fields for '{}'", fields.len(), category);
            results.insert(
                category.clone(),
                CategorySchemaResult {
                    count: fields.len(),
                    fields,
                },
            );
        }

        Ok(BulkSchemaReport {
            total_categories: categories.len(),
            results,
        })
    }

    /// Describe the given fields without touching the catalog
    pub fn describe_fields(&self, fields: &[FieldToDescribe]) -> Result<Vec<FieldDescription>> {
        let credential = self.require_credential()?;
        if fields.is_empty() {
            return Err(DocsiftError::EmptyInput {
                what: "fields".to_string(),
            });
        }
        Ok(describe::describe_fields(&self.components(), fields, &credential))
    }

    /// Describe every catalog field whose description is blank and save the result
    pub fn describe_missing_fields(&self) -> Result<Vec<FieldDescription>> {
        let mut catalog = self.store.get_catalog()?;
        let missing: Vec<FieldToDescribe> = catalog
            .categories
            .iter()
            .flat_map(|(category, fields)| {
                fields
                    .iter()
                    .filter(|(_, spec)| spec.description.trim().is_empty())
                    .map(move |(name, spec)| FieldToDescribe {
                        category: category.clone(),
                        field_name: name.clone(),
                        field_type: spec.field_type,
                    })
            })
            .collect();

        if missing.is_empty() {
            tracing::info!("Every catalog field already has a description");
            return Ok(Vec::new());
        }

        let descriptions = self.describe_fields(&missing)?;
        for description in &descriptions {
            if let Some(spec) = catalog
                .categories
                .get_mut(&description.category)
                .and_then(|fields| fields.get_mut(&description.field_name))
            {
                spec.description = description.description.clone();
            }
        }
        self.save_catalog(&catalog)?;
        Ok(descriptions)
    }

    // ---------------------------------------------------------------------
    // Organization, extraction, justification
    // ---------------------------------------------------------------------

    /// Classify documents into `categories`, one call per document. Defaults
    /// to every uncategorized document.
    pub fn organize(&self, ids: Option<&[String]>, categories: &[String]) -> Result<Vec<OrganizeOutcome>> {
        let documents = match ids {
            Some(_) => self.select_documents(ids)?,
            None => self
                .store
                .list()?
                .into_iter()
                .filter(|d| d.category.is_none())
                .collect(),
        };

        if documents.is_empty() {
            return Err(DocsiftError::EmptyInput {
                what: "documents to organize".to_string(),
            });
        }
        if categories.is_empty() {
            return Err(DocsiftError::EmptyInput {
                what: "categories".to_string(),
            });
        }
        let credential = self.require_credential()?;
        let components = self.components();

        let mut outcomes = Vec::with_capacity(documents.len());
        for mut document in documents {
            let category = organize::classify(&components, &document, categories, &credential);
            if let Some(category) = &category {
                document.category = Some(category.clone());
                self.store.put(&document)?;
            }
            outcomes.push(OrganizeOutcome {
                document_id: document.id,
                category,
            });
        }

        let placed = outcomes.iter().filter(|o| o.category.is_some()).count();
        tracing::info!("Organized {}/{} documents", placed, outcomes.len());
        Ok(outcomes)
    }

    /// Extract catalog fields for the selected documents (default: all).
    /// Documents whose category has no catalog entry are skipped; each
    /// processed document is saved before the next one starts.
    pub fn extract_batch(
        &self,
        ids: Option<&[String]>,
        field_descriptions: &FieldDescriptionOverrides,
        instructions: Option<&str>,
    ) -> Result<ExtractionReport> {
        let credential = self.require_credential()?;

        let candidates: Vec<std::result::Result<Document, (String, DocsiftError)>> = match ids {
            Some(ids) => ids
                .iter()
                .map(|id| self.document(id).map_err(|e| (id.clone(), e)))
                .collect(),
            None => self.store.list()?.into_iter().map(Ok).collect(),
        };

        if candidates.is_empty() {
            return Err(DocsiftError::EmptyInput {
                what: "documents".to_string(),
            });
        }

        let catalog = self.store.get_catalog()?;
        if catalog.is_empty() {
            return Err(DocsiftError::EmptyInput {
                what: "catalog".to_string(),
            });
        }

        let components = self.components();
        let no_overrides = IndexMap::new();
        let total_documents = candidates.len();
        let mut outcomes = Vec::new();
        let mut processed_documents = 0;
        let mut total_fields_extracted = 0;

        for candidate in candidates {
            let mut document = match candidate {
                Ok(document) => document,
                Err((document_id, e)) => {
                    tracing::warn!("Skipping {}: {}", document_id, e);
                    outcomes.push(ExtractionOutcome::Failed {
                        document_id,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let Some(fields) = document.category.as_deref().and_then(|c| catalog.fields(c)) else {
                tracing::debug!(id = %document.id, "No catalog entry for document category, skipping");
                continue;
            };

            let overrides = document
                .category
                .as_deref()
                .and_then(|c| field_descriptions.get(c))
                .unwrap_or(&no_overrides);

            let extracted =
                extraction::extract_fields(&components, &document, fields, overrides, &credential, instructions);

            total_fields_extracted += extracted.len();
            processed_documents += 1;

            document.extracted_fields = extracted.clone();
            self.store.put(&document)?;

            tracing::info!(
                id = %document.id,
                resolved = extracted.values().filter(|v| v.is_some()).count(),
                "Extracted {} fields",
                extracted.len()
            );

            outcomes.push(ExtractionOutcome::Extracted {
                document_id: document.id,
                title: document.title,
                fields: extracted,
            });
        }

        Ok(ExtractionReport {
            outcomes,
            total_documents,
            processed_documents,
            total_fields_extracted,
        })
    }

    /// Find the passage supporting `field_value`. With a `document_id`, the
    /// justification is also stored on that document.
    pub fn justify(
        &self,
        content: &str,
        field_name: &str,
        field_value: &str,
        document_id: Option<&str>,
    ) -> Result<Justification> {
        let credential = self.require_credential()?;
        for (what, value) in [("document content", content), ("field name", field_name), ("field value", field_value)] {
            if value.trim().is_empty() {
                return Err(DocsiftError::EmptyInput { what: what.to_string() });
            }
        }

        let justification = justification::justify(&self.components(), content, field_name, field_value, &credential);

        if let Some(id) = document_id {
            match self.store.get(id)? {
                Some(mut document) => {
                    document
                        .justifications
                        .insert(field_name.to_string(), justification.clone());
                    self.store.put(&document)?;
                }
                None => tracing::warn!("Document {} not found, justification not stored", id),
            }
        }

        Ok(justification)
    }

    /// Justify a stored document's extracted value and store the result
    pub fn justify_field(&self, document_id: &str, field_name: &str) -> Result<Justification> {
        let document = self.document(document_id)?;
        let value = document
            .extracted_fields
            .get(field_name)
            .cloned()
            .flatten()
            .ok_or_else(|| DocsiftError::FieldNotFound {
                id: document_id.to_string(),
                field: field_name.to_string(),
            })?;

        self.justify(&document.content, field_name, &value, Some(document_id))
    }

    // ---------------------------------------------------------------------
    // Credential and maintenance
    // ---------------------------------------------------------------------

    pub fn store_api_key(&self, key: &str) -> Result<()> {
        self.credentials.set(&self.store, key)?;
        tracing::info!("API key saved");
        Ok(())
    }

    /// Masked form of the configured key, if any
    pub fn masked_api_key(&self) -> Option<String> {
        self.credential().map(|c| c.masked())
    }

    /// Delete every document and the catalog. The API key is kept.
    pub fn reset(&self) -> Result<()> {
        self.store.clear()?;
        self.store.clear_catalog()?;
        tracing::info!("Removed all documents and the catalog");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldSpec, FieldType};
    use crate::llm::{ScriptedGenerator, ServiceError};
    use crate::storage::{CatalogStore, CredentialSlot, Database, DocumentStore};
    use tempfile::TempDir;

    fn pipeline(generator: ScriptedGenerator, api_key: Option<&str>) -> (TempDir, Pipeline<Database>) {
        let temp_dir = TempDir::new().unwrap();
        let database = Database::new(&temp_dir.path().join("test.sqlite")).unwrap();
        let config = Config::default();
        let credentials = CredentialStore::new(String::new()).with_override(api_key.map(str::to_string));

        let pipeline = Pipeline::from_parts(
            database,
            Vectorizer::frequency_only(config.embedding.max_features).unwrap(),
            ClusterEngine::new(config.clustering.clone()),
            ModelGateway::new(Box::new(generator), 0),
            credentials,
            config.limits.clone(),
        );
        (temp_dir, pipeline)
    }

    fn ingest_topics(pipeline: &Pipeline<Database>) -> Vec<Document> {
        vec![
            pipeline
                .ingest_text("Invoice 1", "invoice payment amount due invoice total", "a.txt")
                .unwrap(),
            pipeline
                .ingest_text("Contract 1", "contract clause party signature contract term", "b.txt")
                .unwrap(),
            pipeline
                .ingest_text("Invoice 2", "invoice amount payment total due invoice", "c.txt")
                .unwrap(),
            pipeline
                .ingest_text("Contract 2", "contract party clause term signature contract", "d.txt")
                .unwrap(),
        ]
    }

    fn invoice_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        let mut fields = crate::catalog::CategoryFields::new();
        fields.insert("montant".to_string(), FieldSpec::new(FieldType::Number, "Montant total"));
        fields.insert(
            "priorite".to_string(),
            FieldSpec::new(FieldType::Text, "Priorité").with_allowed_values(["Urgent", "Normal"]),
        );
        catalog.categories.insert("Factures".to_string(), fields);
        catalog
    }

    #[test]
    fn test_ingest_rows_default_titles() {
        let (_dir, pipeline) = pipeline(ScriptedGenerator::new(), None);
        let rows = vec![
            RowRecord {
                title: Some("Alice".to_string()),
                content: "name: Alice".to_string(),
            },
            RowRecord {
                title: None,
                content: "name: Bob".to_string(),
            },
        ];

        let documents = pipeline.ingest_rows("people.csv", &rows).unwrap();
        assert_eq!(documents[0].title, "Alice");
        assert_eq!(documents[1].title, "Row 2");
        assert_eq!(documents[1].row_index, Some(2));
        assert_eq!(pipeline.documents().unwrap().len(), 2);
    }

    #[test]
    fn test_cluster_without_credential_keeps_placeholders() {
        let generator = ScriptedGenerator::new();
        let (_dir, pipeline) = pipeline(generator.clone(), None);
        let documents = ingest_topics(&pipeline);

        let report = pipeline.cluster_documents(None, None).unwrap();
        assert!(!report.named);
        assert_eq!(report.vector_kind, VectorKind::Frequency);

        let mut seen: Vec<String> = report.clusters.iter().flat_map(|c| c.document_ids.clone()).collect();
        seen.sort();
        let mut expected: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
        expected.sort();
        assert_eq!(seen, expected);

        assert_eq!(generator.call_count(), 0);
        assert!(pipeline.documents().unwrap().iter().all(|d| d.category.is_none()));
    }

    #[test]
    fn test_cluster_names_become_categories() {
        let generator = ScriptedGenerator::new()
            .on_prompt("invoice", Ok("\"Invoices\"".to_string()))
            .on_prompt("contract", Ok("Contracts".to_string()));
        let (_dir, pipeline) = pipeline(generator, Some("test-key"));
        ingest_topics(&pipeline);

        let report = pipeline.cluster_documents(None, Some("Short English names")).unwrap();
        assert!(report.named);

        for document in pipeline.documents().unwrap() {
            let expected = if document.title.starts_with("Invoice") {
                "Invoices"
            } else {
                "Contracts"
            };
            assert_eq!(document.category.as_deref(), Some(expected));
        }

        let categories = pipeline.categories().unwrap();
        assert_eq!(categories["Invoices"].len(), 2);
        assert_eq!(categories["Contracts"].len(), 2);
    }

    #[test]
    fn test_cluster_naming_failure_keeps_clusters() {
        let generator = ScriptedGenerator::new().fail(ServiceError::Unauthorized);
        let (_dir, pipeline) = pipeline(generator, Some("bad-key"));
        ingest_topics(&pipeline);

        match pipeline.cluster_documents(None, None) {
            Err(DocsiftError::Naming(error)) => {
                assert!(!error.clusters.is_empty());
                assert!(matches!(error.source, DocsiftError::Service(ServiceError::Unauthorized)));
            }
            other => panic!("expected a naming error, got {:?}", other.map(|r| r.clusters)),
        }
    }

    #[test]
    fn test_cluster_empty_selection() {
        let (_dir, pipeline) = pipeline(ScriptedGenerator::new(), None);
        assert!(matches!(
            pipeline.cluster_documents(None, None),
            Err(DocsiftError::EmptyInput { .. })
        ));
        assert!(matches!(
            pipeline.cluster_documents(Some(&["missing".to_string()]), None),
            Err(DocsiftError::DocumentNotFound { .. })
        ));
    }

    #[test]
    fn test_generate_fields_rule_based_reuses_catalog_names() {
        let (_dir, pipeline) = pipeline(ScriptedGenerator::new(), None);
        let document = pipeline.ingest_text("Facture", "Montant 40 EUR", "f.txt").unwrap();
        pipeline.assign_category(&document.id, "Factures").unwrap();
        pipeline.save_catalog(&invoice_catalog()).unwrap();

        let fields = pipeline.generate_fields("Factures", Some(2), None).unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["titre", "date_doc", "montant", "priorite"]);

        assert!(matches!(
            pipeline.generate_fields("Contrats", None, None),
            Err(DocsiftError::EmptyInput { .. })
        ));
        assert!(matches!(
            pipeline.generate_fields("  ", None, None),
            Err(DocsiftError::EmptyInput { .. })
        ));
    }

    #[test]
    fn test_generate_all_fields_accumulates_names() {
        let (_dir, pipeline) = pipeline(ScriptedGenerator::new(), None);
        let first = pipeline.ingest_text("Facture", "Montant", "f.txt").unwrap();
        let second = pipeline.ingest_text("Contrat", "Clauses", "c.txt").unwrap();
        pipeline.assign_category(&first.id, "Factures").unwrap();
        pipeline.assign_category(&second.id, "Contrats juridique").unwrap();

        let report = pipeline.generate_all_fields(None, None).unwrap();
        assert_eq!(report.total_categories, 2);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.results["Factures"].count, 7);
        // the seven generic names follow the legal template
        assert_eq!(report.results["Contrats juridique"].count, 14);
        assert_eq!(report.results["Contrats juridique"].fields[7].name, "titre");

        let json = serde_json::to_value(&report.results["Factures"]).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["count", "fields"]);
    }

    #[test]
    fn test_extract_batch_skips_uncatalogued_documents() {
        let generator = ScriptedGenerator::new()
            .on_prompt("Field to extract: montant", Ok("40 EUR".to_string()))
            .on_prompt("Field to extract: priorite", Ok("urgent - à traiter".to_string()));
        let (_dir, pipeline) = pipeline(generator.clone(), Some("test-key"));

        let invoice = pipeline.ingest_text("Facture 12", "Total: 40 EUR. Urgent.", "f.txt").unwrap();
        let other = pipeline.ingest_text("Note", "Rien", "n.txt").unwrap();
        pipeline.ingest_text("Brouillon", "Sans catégorie", "b.txt").unwrap();
        pipeline.assign_category(&invoice.id, "Factures").unwrap();
        pipeline.assign_category(&other.id, "Autre").unwrap();
        pipeline.save_catalog(&invoice_catalog()).unwrap();

        let report = pipeline.extract_batch(None, &IndexMap::new(), None).unwrap();
        assert_eq!(report.total_documents, 3);
        assert_eq!(report.processed_documents, 1);
        assert_eq!(report.total_fields_extracted, 2);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(generator.call_count(), 2);

        let stored = pipeline.document(&invoice.id).unwrap();
        assert_eq!(stored.extracted_fields["montant"].as_deref(), Some("40 EUR"));
        assert_eq!(stored.extracted_fields["priorite"].as_deref(), Some("Urgent"));
    }

    #[test]
    fn test_extract_batch_uses_description_overrides() {
        let generator = ScriptedGenerator::new().respond("N/A").respond("Normal");
        let (_dir, pipeline) = pipeline(generator.clone(), Some("test-key"));
        let invoice = pipeline.ingest_text("Facture", "Rien", "f.txt").unwrap();
        pipeline.assign_category(&invoice.id, "Factures").unwrap();
        pipeline.save_catalog(&invoice_catalog()).unwrap();

        let mut overrides = FieldDescriptionOverrides::new();
        overrides.insert(
            "Factures".to_string(),
            IndexMap::from([("montant".to_string(), "Montant TTC en euros".to_string())]),
        );

        let ids = vec![invoice.id.clone(), "missing".to_string()];
        let report = pipeline.extract_batch(Some(&ids), &overrides, None).unwrap();
        assert_eq!(report.total_documents, 2);
        assert!(matches!(report.outcomes[1], ExtractionOutcome::Failed { .. }));

        let calls = generator.calls();
        assert!(calls[0].user_prompt.contains("Description: Montant TTC en euros"));
        assert_eq!(pipeline.document(&invoice.id).unwrap().extracted_fields["montant"], None);
    }

    #[test]
    fn test_extract_batch_preconditions() {
        let (_dir, without_key) = pipeline(ScriptedGenerator::new(), None);
        assert!(matches!(
            without_key.extract_batch(None, &IndexMap::new(), None),
            Err(DocsiftError::MissingCredential { .. })
        ));

        let (_dir, with_key) = pipeline(ScriptedGenerator::new(), Some("test-key"));
        with_key.ingest_text("Doc", "text", "d.txt").unwrap();
        assert!(matches!(
            with_key.extract_batch(None, &IndexMap::new(), None),
            Err(DocsiftError::EmptyInput { .. })
        ));
    }

    #[test]
    fn test_organize_places_matching_documents() {
        let generator = ScriptedGenerator::new().respond("Factures.").respond("Recettes");
        let (_dir, pipeline) = pipeline(generator, Some("test-key"));
        let first = pipeline.ingest_text("Facture", "Montant", "f.txt").unwrap();
        let second = pipeline.ingest_text("Tarte", "Farine", "t.txt").unwrap();

        let categories = vec!["Factures".to_string(), "Contrats".to_string()];
        let outcomes = pipeline.organize(None, &categories).unwrap();
        assert_eq!(
            outcomes,
            vec![
                OrganizeOutcome {
                    document_id: first.id.clone(),
                    category: Some("Factures".to_string()),
                },
                OrganizeOutcome {
                    document_id: second.id.clone(),
                    category: None,
                },
            ]
        );
        assert_eq!(pipeline.document(&second.id).unwrap().category, None);
    }

    #[test]
    fn test_justify_stores_on_document() {
        let generator = ScriptedGenerator::new().respond("\"Total: 40 EUR\"");
        let (_dir, pipeline) = pipeline(generator, Some("test-key"));
        let mut document = pipeline.ingest_text("Facture", "Total: 40 EUR", "f.txt").unwrap();
        document
            .extracted_fields
            .insert("montant".to_string(), Some("40 EUR".to_string()));
        pipeline.update_document(&document).unwrap();

        let justification = pipeline.justify_field(&document.id, "montant").unwrap();
        assert_eq!(justification.passage, "Total: 40 EUR");
        assert_eq!(
            pipeline.document(&document.id).unwrap().justifications["montant"].passage,
            "Total: 40 EUR"
        );

        assert!(matches!(
            pipeline.justify_field(&document.id, "date_doc"),
            Err(DocsiftError::FieldNotFound { .. })
        ));
        assert!(matches!(
            pipeline.justify("Total", "montant", " ", None),
            Err(DocsiftError::EmptyInput { .. })
        ));
    }

    #[test]
    fn test_describe_missing_fields_updates_catalog() {
        let generator = ScriptedGenerator::new().respond("Montant total de la facture");
        let (_dir, pipeline) = pipeline(generator.clone(), Some("test-key"));
        let mut catalog = invoice_catalog();
        catalog.categories["Factures"]["montant"].description.clear();
        pipeline.save_catalog(&catalog).unwrap();

        let descriptions = pipeline.describe_missing_fields().unwrap();
        assert_eq!(descriptions.len(), 1);
        assert_eq!(generator.call_count(), 1);
        assert_eq!(
            pipeline.catalog().unwrap().categories["Factures"]["montant"].description,
            "Montant total de la facture"
        );
    }

    #[test]
    fn test_reset_keeps_api_key() {
        let (_dir, pipeline) = pipeline(ScriptedGenerator::new(), None);
        pipeline.store_api_key("sk-test-1234567890abcdef").unwrap();
        pipeline.ingest_text("Doc", "text", "d.txt").unwrap();
        pipeline.save_catalog(&invoice_catalog()).unwrap();

        pipeline.reset().unwrap();

        assert!(pipeline.store().list().unwrap().is_empty());
        assert!(pipeline.store().get_catalog().unwrap().is_empty());
        assert_eq!(
            pipeline.store().load_credential().unwrap().as_deref(),
            Some("sk-test-1234567890abcdef")
        );
        assert_eq!(pipeline.masked_api_key().as_deref(), Some("sk-test-************cdef"));
    }
}
