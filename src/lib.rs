//! Docsift - Document clustering and field extraction
//!
//! Groups already-extracted document text into semantic clusters, names the
//! resulting categories, derives a field catalog per category, and extracts
//! and justifies field values through a text-generation service.

pub mod catalog;
pub mod cli;
pub mod clustering;
pub mod config;
pub mod credential;
pub mod document;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod storage;

pub use error::{DocsiftError, Result};
