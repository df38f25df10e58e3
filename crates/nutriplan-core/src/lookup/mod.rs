//! Nutrition lookup: resolves ingredient names and weights to calories by
//! querying a knowledge base through two external collaborators.
//!
//! - [`SimilaritySearch`] returns candidate documents for a name.
//! - [`NutritionExtractor`] reads one document into [`NutritionFacts`].
//!
//! [`NutritionLookup`] combines them with candidate disambiguation, bounded
//! concurrency and retry on transient failures.

pub mod resolver;
pub mod select;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::ConfigError;

pub use resolver::{LookupSettings, NutritionLookup, RetryPolicy};
pub use select::{declared_food_name, select_best_candidate, similarity_ratio};

/// Match name reported when the knowledge base has no candidates.
pub const MISSING_MATCH: &str = "MISSING";
/// Match name reported when resolution failed for any other reason.
pub const ERROR_MATCH: &str = "ERROR";

/// Substrings identifying transient infrastructure failures in backend
/// error messages.
pub const TRANSIENT_MARKERS: [&str; 3] = ["Session is closed", "Connection reset", "TimeoutError"];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("TimeoutError: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("{0}")]
    Backend(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LookupError {
    /// Whether retrying the same call might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connection(_) => true,
            Self::Backend(msg) => TRANSIENT_MARKERS.iter().any(|m| msg.contains(m)),
            Self::Config(_) => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An ingredient to resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientQuery {
    pub name: String,
    pub weight_grams: f64,
}

/// Structured data extracted from one knowledge-base document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionFacts {
    pub food_name: String,
    pub calories_100g: f64,
    pub notes: String,
}

/// Outcome of resolving one ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedIngredient {
    pub input_name: String,
    pub matched_name: String,
    pub total_kcal: f64,
    pub notes: String,
}

impl ResolvedIngredient {
    /// True for `MISSING`/`ERROR` sentinels.
    pub fn is_sentinel(&self) -> bool {
        self.matched_name == MISSING_MATCH || self.matched_name == ERROR_MATCH
    }
}

/// Outcome of resolving every ingredient of a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeNutrition {
    pub items: Vec<ResolvedIngredient>,
    pub total_kcal: f64,
    pub warnings: Option<String>,
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Similarity search over the nutrition knowledge base.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Return at most `k` candidate documents, best first. An empty list
    /// means nothing matched.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<String>, LookupError>;
}

/// Extraction of nutrition facts from a candidate document.
#[async_trait]
pub trait NutritionExtractor: Send + Sync {
    async fn extract(&self, ingredient: &str, document: &str)
    -> Result<NutritionFacts, LookupError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn SimilaritySearch, _: &dyn NutritionExtractor) {}
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(LookupError::Timeout("search".into()).is_transient());
        assert!(LookupError::Connection("refused".into()).is_transient());
        assert!(LookupError::Backend("Session is closed".into()).is_transient());
        assert!(LookupError::Backend("read: Connection reset by peer".into()).is_transient());
        assert!(!LookupError::Backend("invalid document".into()).is_transient());
        assert!(
            !LookupError::Config(ConfigError::MissingVars(vec!["X".into()])).is_transient()
        );
    }

    #[test]
    fn timeout_message_carries_marker() {
        let err = LookupError::Timeout("deadline".into());
        assert!(err.to_string().contains("TimeoutError"));
    }
}
