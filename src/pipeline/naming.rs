//! Cluster naming via the text-generation service

use super::Components;
use crate::clustering::Cluster;
use crate::credential::Credential;
use crate::document::truncate_chars;
use crate::error::DocsiftError;
use crate::llm::{response, CompletionRequest};
use crate::storage::DocumentStore;
use std::fmt::Write as _;
use thiserror::Error;

const SYSTEM_PROMPT: &str = "You are an expert in document categorization. \
Analyze the following documents and give ONLY the category name \
in 1-4 clear and precise words. \
Answer only with the category name, without explanation.";

/// A naming pass that stopped early
#[derive(Error, Debug)]
#[error("{source}")]
pub struct NamingError {
    #[source]
    pub source: DocsiftError,
    /// Every cluster, named up to the point of failure
    pub clusters: Vec<Cluster>,
}

impl From<NamingError> for DocsiftError {
    fn from(error: NamingError) -> Self {
        DocsiftError::Naming(Box::new(error))
    }
}

/// Name each cluster and write the name onto its member documents.
///
/// Member documents missing from the store are skipped; a cluster with no
/// loadable members keeps its placeholder.
pub fn name_clusters(
    components: &Components<'_>,
    store: &dyn DocumentStore,
    mut clusters: Vec<Cluster>,
    credential: Option<&Credential>,
    instructions: Option<&str>,
) -> Result<Vec<Cluster>, NamingError> {
    let Some(credential) = credential else {
        return Err(NamingError {
            source: DocsiftError::MissingCredential {
                env_var: components.credential_env.to_string(),
            },
            clusters,
        });
    };

    let limits = components.limits;
    let mut system_prompt = SYSTEM_PROMPT.to_string();
    if let Some(instructions) = instructions.map(str::trim).filter(|s| !s.is_empty()) {
        let _ = write!(system_prompt, "\n\nSpecific instructions: {}", instructions);
    }

    for index in 0..clusters.len() {
        let member_ids = clusters[index].document_ids.clone();
        let mut members = Vec::new();
        for id in &member_ids {
            match store.get(id) {
                Ok(Some(document)) => members.push(document),
                Ok(None) => tracing::debug!("Cluster member {} not in store, skipping", id),
                Err(e) => return Err(NamingError { source: e, clusters }),
            }
        }

        if members.is_empty() {
            tracing::debug!(
                "Cluster {} has no stored documents, keeping placeholder",
                clusters[index].cluster_id
            );
            continue;
        }

        let mut samples = String::new();
        for (i, document) in members.iter().take(limits.naming_sample_docs).enumerate() {
            let _ = write!(
                samples,
                "Document {}:\nTitle: {}\nContent: {}...\n\n",
                i + 1,
                document.title,
                truncate_chars(&document.content, limits.naming_excerpt_chars)
            );
        }

        let request = CompletionRequest::new(format!("Documents in the cluster:\n\n{}", samples))
            .with_system(system_prompt.clone())
            .with_temperature(0.2)
            .with_max_tokens(50);

        let answer = match components.gateway.complete(credential, &request) {
            Ok(answer) => answer,
            Err(e) => {
                return Err(NamingError {
                    source: DocsiftError::Service(e),
                    clusters,
                })
            }
        };

        let mut name = response::remove_quote_chars(&answer);
        if name.is_empty() {
            name = Cluster::placeholder_name(clusters[index].cluster_id);
        }

        tracing::info!(
            cluster = clusters[index].cluster_id,
            documents = members.len(),
            "Named cluster '{}'",
            name
        );

        for mut document in members {
            document.category = Some(name.clone());
            if let Err(e) = store.put(&document) {
                clusters[index].name = name;
                return Err(NamingError { source: e, clusters });
            }
        }

        clusters[index].name = name;
    }

    Ok(clusters)
}
