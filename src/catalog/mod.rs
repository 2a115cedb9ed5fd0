//! Category field schemas
//!
//! The catalog maps each category to the fields extracted from its documents.
//! Category and field order is preserved so prompts and exports stay stable.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Type class of a catalog field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Date,
    Boolean,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
        }
    }

    /// Lenient parse: anything unrecognised is treated as text
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "number" | "numeric" | "integer" | "float" => Self::Number,
            "date" | "datetime" => Self::Date,
            "boolean" | "bool" => Self::Boolean,
            _ => Self::Text,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse_lenient(&raw))
    }
}

/// Schema of one field inside a category
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
}

impl FieldSpec {
    pub fn new(field_type: FieldType, description: impl Into<String>) -> Self {
        Self {
            field_type,
            description: description.into(),
            allowed_values: Vec::new(),
        }
    }

    pub fn with_allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }
}

/// A proposed field, as produced by schema generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub description: String,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type,
            description: description.into(),
        }
    }
}

impl From<&FieldDescriptor> for FieldSpec {
    fn from(descriptor: &FieldDescriptor) -> Self {
        FieldSpec::new(descriptor.field_type, descriptor.description.clone())
    }
}

/// Fields of one category, in declaration order
pub type CategoryFields = IndexMap<String, FieldSpec>;

/// Category name → field schema
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    pub categories: IndexMap<String, CategoryFields>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn fields(&self, category: &str) -> Option<&CategoryFields> {
        self.categories.get(category)
    }

    /// Replace a category's fields with generated descriptors.
    /// Allowed values already configured for a surviving field are kept.
    pub fn set_fields(&mut self, category: &str, descriptors: &[FieldDescriptor]) {
        let previous = self.categories.get(category);
        let fields: CategoryFields = descriptors
            .iter()
            .map(|descriptor| {
                let mut spec = FieldSpec::from(descriptor);
                if let Some(existing) = previous.and_then(|p| p.get(&descriptor.name)) {
                    spec.allowed_values = existing.allowed_values.clone();
                }
                (descriptor.name.clone(), spec)
            })
            .collect();
        self.categories.insert(category.to_string(), fields);
    }

    /// Every field name across all categories, first occurrence order
    pub fn all_field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for fields in self.categories.values() {
            for name in fields.keys() {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }
}
