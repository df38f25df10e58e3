use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use tokio::sync::Semaphore;

use crate::backend::LazyClient;
use crate::calculation::round_to;

use super::select::select_best_candidate;
use super::{
    ERROR_MATCH, IngredientQuery, LookupError, MISSING_MATCH, NutritionExtractor,
    RecipeNutrition, ResolvedIngredient, SimilaritySearch,
};

/// Exponential backoff for transient lookup failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay after the zero-based `attempt` failed.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupSettings {
    pub search_permits: usize,
    pub concurrency: usize,
    pub top_k: usize,
    pub retry: RetryPolicy,
}

/// Resolves ingredients to calories through the knowledge base.
///
/// A single instance is meant to be shared by every concurrent generation
/// task: its semaphore caps in-flight similarity searches process-wide.
pub struct NutritionLookup {
    search: LazyClient<dyn SimilaritySearch>,
    extractor: LazyClient<dyn NutritionExtractor>,
    permits: Arc<Semaphore>,
    settings: LookupSettings,
}

impl fmt::Debug for NutritionLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NutritionLookup")
            .field("search", &self.search)
            .field("extractor", &self.extractor)
            .field("available_permits", &self.permits.available_permits())
            .field("settings", &self.settings)
            .finish()
    }
}

enum Attempt {
    Found(ResolvedIngredient),
    NoCandidates,
}

impl NutritionLookup {
    pub fn new(
        search: LazyClient<dyn SimilaritySearch>,
        extractor: LazyClient<dyn NutritionExtractor>,
        settings: LookupSettings,
    ) -> Self {
        Self {
            search,
            extractor,
            permits: Arc::new(Semaphore::new(settings.search_permits.max(1))),
            settings,
        }
    }

    /// Convenience constructor for already-built clients.
    pub fn with_clients(
        search: Arc<dyn SimilaritySearch>,
        extractor: Arc<dyn NutritionExtractor>,
        settings: LookupSettings,
    ) -> Self {
        Self::new(
            LazyClient::ready("search", search),
            LazyClient::ready("extractor", extractor),
            settings,
        )
    }

    /// Resolve every ingredient of a recipe.
    ///
    /// Client configuration problems fail the whole call before any lookup
    /// is issued. Every other failure degrades to a zero-kcal sentinel entry
    /// and is reported in `warnings`; item order matches input order.
    pub async fn resolve_recipe(
        &self,
        ingredients: &[IngredientQuery],
    ) -> Result<RecipeNutrition, LookupError> {
        let search = self.search.get().await?;
        let extractor = self.extractor.get().await?;

        let items: Vec<ResolvedIngredient> = stream::iter(ingredients)
            .map(|query| self.resolve_one(search.as_ref(), extractor.as_ref(), query))
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let total: f64 = items.iter().map(|i| i.total_kcal).sum();
        let warnings: Vec<String> = items
            .iter()
            .filter(|i| i.is_sentinel())
            .map(|i| format!("[{}]: {}", i.input_name, i.notes))
            .collect();

        Ok(RecipeNutrition {
            items,
            total_kcal: round_to(total, 1),
            warnings: (!warnings.is_empty()).then(|| warnings.join(" | ")),
        })
    }

    async fn resolve_one(
        &self,
        search: &dyn SimilaritySearch,
        extractor: &dyn NutritionExtractor,
        query: &IngredientQuery,
    ) -> ResolvedIngredient {
        let retry = self.settings.retry;
        let attempts = retry.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            match self.attempt(search, extractor, query).await {
                Ok(Attempt::Found(item)) => return item,
                Ok(Attempt::NoCandidates) => {
                    return sentinel(query, MISSING_MATCH, "Not found in Knowledge Base.".into());
                }
                Err(e) => {
                    let retry_again = e.is_transient() && attempt + 1 < attempts;
                    tracing::warn!(
                        ingredient = %query.name,
                        attempt = attempt + 1,
                        transient = e.is_transient(),
                        error = %e,
                        "ingredient lookup failed"
                    );
                    last_error = Some(e);
                    if !retry_again {
                        break;
                    }
                    tokio::time::sleep(retry.delay(attempt)).await;
                }
            }
        }

        let reason = last_error.map_or_else(|| "unknown error".to_string(), |e| e.to_string());
        sentinel(query, ERROR_MATCH, format!("Internal exception: {reason}"))
    }

    async fn attempt(
        &self,
        search: &dyn SimilaritySearch,
        extractor: &dyn NutritionExtractor,
        query: &IngredientQuery,
    ) -> Result<Attempt, LookupError> {
        let candidates = {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|e| LookupError::Backend(e.to_string()))?;
            search.search(&query.name, self.settings.top_k).await?
        };

        let Some(best) = select_best_candidate(&query.name, &candidates) else {
            return Ok(Attempt::NoCandidates);
        };

        let facts = extractor.extract(&query.name, &candidates[best]).await?;
        tracing::debug!(
            ingredient = %query.name,
            matched = %facts.food_name,
            calories_100g = facts.calories_100g,
            "resolved ingredient"
        );

        Ok(Attempt::Found(ResolvedIngredient {
            input_name: query.name.clone(),
            matched_name: facts.food_name,
            total_kcal: round_to(facts.calories_100g * query.weight_grams / 100.0, 1),
            notes: facts.notes,
        }))
    }
}

fn sentinel(query: &IngredientQuery, matched: &str, notes: String) -> ResolvedIngredient {
    ResolvedIngredient {
        input_name: query.name.clone(),
        matched_name: matched.to_string(),
        total_kcal: 0.0,
        notes,
    }
}
