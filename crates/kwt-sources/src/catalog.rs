//! Category enumeration and per-category keyword vocabularies.

use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;

const EMBEDDED_CATALOG: &str = include_str!("../catalog.yaml");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("parsing keyword catalog: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("keyword catalog lists no categories")]
    Empty,
    #[error("keyword catalog lists category {0:?} more than once")]
    DuplicateCategory(String),
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    #[allow(dead_code)]
    version: u32,
    fallback: Vec<String>,
    categories: Vec<CategoryVocabulary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryVocabulary {
    pub id: String,
    pub keywords: Vec<String>,
}

/// Immutable keyword tables. Built once at startup and shared behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    categories: Vec<CategoryVocabulary>,
    fallback: Vec<String>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_yaml(EMBEDDED_CATALOG)
    }

    pub fn from_yaml(text: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(text)?;
        Self::new(file.categories, file.fallback)
    }

    pub fn new(
        categories: Vec<CategoryVocabulary>,
        fallback: Vec<String>,
    ) -> Result<Self, CatalogError> {
        if categories.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for category in &categories {
            if !seen.insert(category.id.as_str()) {
                return Err(CatalogError::DuplicateCategory(category.id.clone()));
            }
        }
        Ok(Self {
            categories,
            fallback,
        })
    }

    pub fn category_ids(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.id.clone()).collect()
    }

    pub fn contains(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c.id == category)
    }

    /// Vocabulary for `category`; unknown tags get the generic fallback list.
    pub fn keywords_for(&self, category: &str) -> &[String] {
        self.categories
            .iter()
            .find(|c| c.id == category)
            .map(|c| c.keywords.as_slice())
            .unwrap_or(self.fallback.as_slice())
    }
}
