//! Local nutrition knowledge base backed by a JSON file.
//!
//! The file holds an array of documents, each either a plain string or an
//! object with a `text` (or `content`) field. Documents are ranked against
//! the query by name similarity on their declared food name, falling back to
//! the first line of the document.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::lookup::{LookupError, SimilaritySearch, declared_food_name, similarity_ratio};

use super::ConfigError;

/// Candidates scoring below this ratio are never returned.
pub const MIN_SCORE: f64 = 0.3;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDocument {
    Text(String),
    Object {
        #[serde(alias = "content")]
        text: String,
    },
}

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    text: String,
}

/// In-memory similarity search over a document catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogSearch {
    entries: Vec<Entry>,
}

impl CatalogSearch {
    pub fn from_documents<I, S>(documents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = documents
            .into_iter()
            .map(Into::into)
            .filter(|text: &String| !text.trim().is_empty())
            .map(|text| {
                let key = declared_food_name(&text)
                    .or_else(|| text.lines().map(str::trim).find(|l| !l.is_empty()))
                    .unwrap_or_default()
                    .to_lowercase();
                Entry { key, text }
            })
            .collect();
        Self { entries }
    }

    /// Load the catalog from a JSON file.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let init_error = |reason: String| ConfigError::Init {
            client: "search",
            reason,
        };
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| init_error(format!("cannot read {}: {e}", path.display())))?;
        let documents: Vec<RawDocument> = serde_json::from_str(&raw)
            .map_err(|e| init_error(format!("invalid catalog {}: {e}", path.display())))?;
        let catalog = Self::from_documents(documents.into_iter().map(|d| match d {
            RawDocument::Text(text) | RawDocument::Object { text } => text,
        }));
        tracing::info!(path = %path.display(), documents = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SimilaritySearch for CatalogSearch {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<String>, LookupError> {
        let query = query.trim().to_lowercase();
        let mut scored: Vec<(f64, &Entry)> = self
            .entries
            .iter()
            .map(|e| (similarity_ratio(&query, &e.key), e))
            .filter(|(score, _)| *score >= MIN_SCORE)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, e)| e.text.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, kcal: u32) -> String {
        format!("Alimentos (por 100 gramos): {name}\nEnergía (kcal): {kcal}")
    }

    #[tokio::test]
    async fn ranks_by_declared_name() {
        let catalog = CatalogSearch::from_documents([
            doc("Arroz blanco", 354),
            doc("Pechuga de pollo", 120),
            doc("Pollo entero", 215),
        ]);
        let hits = catalog.search("pechuga de pollo", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].contains("Pechuga de pollo"));
        assert!(hits[1].contains("Pollo entero"));
    }

    #[tokio::test]
    async fn unrelated_query_returns_nothing() {
        let catalog = CatalogSearch::from_documents([doc("Arroz blanco", 354)]);
        assert!(catalog.search("xyzzy", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn loads_strings_and_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let body = serde_json::json!([
            doc("Avena", 389),
            {"text": doc("Leche entera", 65)},
            {"content": doc("Plátano", 89)},
            ""
        ]);
        tokio::fs::write(&path, body.to_string()).await.unwrap();

        let catalog = CatalogSearch::load(&path).await.unwrap();
        assert_eq!(catalog.len(), 3);
        let hits = catalog.search("leche", 1).await.unwrap();
        assert!(hits[0].contains("Leche entera"));
    }

    #[tokio::test]
    async fn missing_file_is_an_init_error() {
        let err = CatalogSearch::load(Path::new("/nonexistent/catalog.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Init { client: "search", .. }));
    }
}
