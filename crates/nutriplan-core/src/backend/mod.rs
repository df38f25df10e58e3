//! Concrete service backends and their configuration.
//!
//! The planner only talks to the [`MealGenerator`], [`SimilaritySearch`] and
//! [`NutritionExtractor`] traits. This module supplies real implementations:
//! an OpenAI-compatible chat client for generation and extraction, and a
//! local JSON document catalog for similarity search. Both are wrapped in a
//! [`LazyClient`] so missing credentials surface on first use with a message
//! naming every absent variable.

pub mod catalog;
pub mod lazy;
pub mod openai;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PlannerConfig;
use crate::generation::MealGenerator;
use crate::lookup::{NutritionExtractor, NutritionLookup, SimilaritySearch};

pub use catalog::CatalogSearch;
pub use lazy::LazyClient;
pub use openai::OpenAiCompatibleClient;

// ---------------------------------------------------------------------------
// Environment variables
// ---------------------------------------------------------------------------

pub const LLM_BASE_URL_ENV: &str = "NUTRIPLAN_LLM_BASE_URL";
pub const LLM_MODEL_ENV: &str = "NUTRIPLAN_LLM_MODEL";
pub const EXTRACTION_MODEL_ENV: &str = "NUTRIPLAN_EXTRACTION_MODEL";
pub const LLM_API_KEY_ENV: &str = "NUTRIPLAN_LLM_API_KEY";
pub const CATALOG_PATH_ENV: &str = "NUTRIPLAN_CATALOG_PATH";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_GENERATION_MODEL: &str = "gpt-4o";
pub const DEFAULT_EXTRACTION_MODEL: &str = "gpt-4o-mini";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error(
        "missing configuration: {}. Set these environment variables or run `nutriplan init`.",
        .0.join(", ")
    )]
    MissingVars(Vec<String>),
    #[error("failed to initialize {client}: {reason}")]
    Init { client: &'static str, reason: String },
    #[error("{0} client has no initializer")]
    Uninitialized(&'static str),
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Connection settings for the external services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSettings {
    pub base_url: String,
    pub generation_model: String,
    pub extraction_model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            extraction_model: DEFAULT_EXTRACTION_MODEL.to_string(),
            api_key: None,
            catalog_path: None,
        }
    }
}

impl ServiceSettings {
    /// Defaults overridden by whichever `NUTRIPLAN_*` variables are set.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        if let Some(url) = var(LLM_BASE_URL_ENV) {
            settings.base_url = url;
        }
        if let Some(model) = var(LLM_MODEL_ENV) {
            settings.generation_model = model;
        }
        if let Some(model) = var(EXTRACTION_MODEL_ENV) {
            settings.extraction_model = model;
        }
        settings.api_key = var(LLM_API_KEY_ENV);
        settings.catalog_path = var(CATALOG_PATH_ENV).map(PathBuf::from);
        settings
    }

    /// Names of the required variables that have no value.
    pub fn missing(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.api_key.as_deref().is_none_or(str::is_empty) {
            missing.push(LLM_API_KEY_ENV.to_string());
        }
        if self.catalog_path.is_none() {
            missing.push(CATALOG_PATH_ENV.to_string());
        }
        missing
    }

    /// Fail with every missing variable listed at once.
    pub fn require(&self) -> Result<(), ConfigError> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingVars(missing))
        }
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// The collaborators a planner needs, ready to hand to
/// [`crate::workflow::Planner::new`].
#[derive(Clone)]
pub struct Services {
    pub generator: Arc<dyn MealGenerator>,
    pub lookup: Arc<NutritionLookup>,
}

impl Services {
    /// Build lazily-connecting backends from settings. Nothing is contacted
    /// and no credential is checked until the first call.
    pub fn from_settings(settings: ServiceSettings, config: &PlannerConfig) -> Self {
        let settings = Arc::new(settings);

        let chat = {
            let settings = Arc::clone(&settings);
            Arc::new(LazyClient::lazy("llm", move || {
                let settings = Arc::clone(&settings);
                async move {
                    settings.require()?;
                    Ok::<_, ConfigError>(Arc::new(OpenAiCompatibleClient::new(&settings)?))
                }
            }))
        };

        let generator: Arc<dyn MealGenerator> = Arc::new(LazyGenerator(Arc::clone(&chat)));

        let extractor = {
            let chat = Arc::clone(&chat);
            LazyClient::lazy("extractor", move || {
                let chat = Arc::clone(&chat);
                async move {
                    let client = chat.get().await?;
                    Ok::<_, ConfigError>(client as Arc<dyn NutritionExtractor>)
                }
            })
        };

        let search = {
            let settings = Arc::clone(&settings);
            LazyClient::lazy("search", move || {
                let settings = Arc::clone(&settings);
                async move {
                    settings.require()?;
                    let path = settings
                        .catalog_path
                        .clone()
                        .ok_or_else(|| ConfigError::MissingVars(vec![CATALOG_PATH_ENV.into()]))?;
                    let catalog = CatalogSearch::load(&path).await?;
                    Ok::<_, ConfigError>(Arc::new(catalog) as Arc<dyn SimilaritySearch>)
                }
            })
        };

        let lookup = Arc::new(NutritionLookup::new(search, extractor, config.lookup_settings()));

        Self { generator, lookup }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("lookup", &self.lookup)
            .finish_non_exhaustive()
    }
}

/// Generator that connects the chat client on first use.
struct LazyGenerator(Arc<LazyClient<OpenAiCompatibleClient>>);

#[async_trait::async_trait]
impl MealGenerator for LazyGenerator {
    async fn generate(
        &self,
        request: &crate::generation::MealRequest,
    ) -> anyhow::Result<crate::models::Meal> {
        let client = self.0.get().await?;
        client.generate(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_lists_every_absent_variable() {
        let settings = ServiceSettings::default();
        assert_eq!(
            settings.missing(),
            vec![LLM_API_KEY_ENV.to_string(), CATALOG_PATH_ENV.to_string()]
        );
        let err = settings.require().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(LLM_API_KEY_ENV), "got: {msg}");
        assert!(msg.contains(CATALOG_PATH_ENV), "got: {msg}");
        assert!(msg.contains("nutriplan init"), "got: {msg}");
    }

    #[test]
    fn empty_api_key_counts_as_missing() {
        let settings = ServiceSettings {
            api_key: Some(String::new()),
            catalog_path: Some(PathBuf::from("/tmp/catalog.json")),
            ..ServiceSettings::default()
        };
        assert_eq!(settings.missing(), vec![LLM_API_KEY_ENV.to_string()]);
    }

    #[tokio::test]
    async fn unconfigured_services_fail_fast_on_first_use() {
        let services =
            Services::from_settings(ServiceSettings::default(), &PlannerConfig::default());
        let err = services
            .lookup
            .resolve_recipe(&[crate::lookup::IngredientQuery {
                name: "arroz".into(),
                weight_grams: 100.0,
            }])
            .await
            .unwrap_err();
        assert!(err.to_string().contains(LLM_API_KEY_ENV));
    }
}
