use std::sync::Arc;

use crate::backend::ConfigError;
use crate::config::PlannerConfig;
use crate::lookup::{IngredientQuery, NutritionLookup};
use crate::models::{Meal, NutritionalTargets, UserProfile};

use super::prompt::build_meal_prompt;
use super::{GenerationError, MealGenerator, MealOutcome, MealRequest, MealSpec};

/// Relative deviation of `actual` from `target`.
pub(crate) fn deviation(actual: f64, target: f64) -> f64 {
    if target.abs() < f64::EPSILON {
        if actual.abs() < f64::EPSILON { 0.0 } else { f64::INFINITY }
    } else {
        (actual - target).abs() / target.abs()
    }
}

/// Generates single meals that land within tolerance of their budget.
pub struct RecipeGenerator {
    generator: Arc<dyn MealGenerator>,
    lookup: Arc<NutritionLookup>,
    config: PlannerConfig,
}

impl std::fmt::Debug for RecipeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipeGenerator")
            .field("lookup", &self.lookup)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct Candidate {
    meal: Meal,
    error_pct: f64,
    warnings: Option<String>,
}

impl RecipeGenerator {
    pub fn new(
        generator: Arc<dyn MealGenerator>,
        lookup: Arc<NutritionLookup>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            generator,
            lookup,
            config,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Generate one meal for `spec`.
    ///
    /// Each attempt asks the generator for a meal, resolves its ingredients
    /// to obtain authoritative calories, and accepts it if the resolved
    /// total is within tolerance of the target. Accepted and fallback meals
    /// carry the resolved values in both `total_calories` and each
    /// ingredient's `kcal`.
    ///
    /// Only configuration problems are returned as `Err`; every other
    /// failure is reported through [`MealOutcome::error`].
    pub async fn generate(
        &self,
        profile: &UserProfile,
        targets: &NutritionalTargets,
        spec: &MealSpec,
        tolerance: f64,
    ) -> Result<MealOutcome, GenerationError> {
        let attempts = self.config.generation_attempts.max(1);
        let prompt = build_meal_prompt(profile, targets, spec, tolerance);
        let mut best: Option<Candidate> = None;
        let mut last_failure: Option<String> = None;

        for attempt in 1..=attempts {
            let request = MealRequest {
                spec: spec.clone(),
                attempt,
                prompt: prompt.clone(),
            };

            let mut meal = match self.generator.generate(&request).await {
                Ok(meal) => meal,
                Err(e) => {
                    if let Some(config) = e.downcast_ref::<ConfigError>() {
                        return Err(GenerationError::Config(config.clone()));
                    }
                    tracing::warn!(
                        meal_time = %spec.meal_time,
                        attempt,
                        error = %e,
                        "meal generation failed"
                    );
                    last_failure = Some(e.to_string());
                    continue;
                }
            };
            meal.meal_time = spec.meal_time;

            let queries: Vec<IngredientQuery> = meal
                .ingredients
                .iter()
                .map(|i| IngredientQuery {
                    name: i.name.clone(),
                    weight_grams: i.weight_grams,
                })
                .collect();
            let nutrition = self.lookup.resolve_recipe(&queries).await?;

            for (ingredient, resolved) in meal.ingredients.iter_mut().zip(&nutrition.items) {
                ingredient.kcal = resolved.total_kcal;
            }
            meal.total_calories = nutrition.total_kcal;

            let error_pct = deviation(meal.total_calories, spec.target_calories);
            tracing::info!(
                meal_time = %spec.meal_time,
                attempt,
                target = spec.target_calories,
                resolved = meal.total_calories,
                error_pct = error_pct * 100.0,
                "meal attempt resolved"
            );

            if error_pct <= tolerance {
                return Ok(MealOutcome {
                    meal: Some(meal),
                    error: None,
                    lookup_warnings: nutrition.warnings,
                });
            }

            if best.as_ref().is_none_or(|b| error_pct < b.error_pct) {
                best = Some(Candidate {
                    meal,
                    error_pct,
                    warnings: nutrition.warnings,
                });
            }
        }

        Ok(match best {
            Some(candidate) => MealOutcome {
                meal: Some(candidate.meal),
                error: Some(format!(
                    "Failed after {attempts} attempts. Best error: {:.1}%",
                    candidate.error_pct * 100.0
                )),
                lookup_warnings: candidate.warnings,
            },
            None => MealOutcome {
                meal: None,
                error: Some(format!(
                    "Generation failed: {}",
                    last_failure.unwrap_or_else(|| "no attempts were made".to_string())
                )),
                lookup_warnings: None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deviation_is_relative_to_target() {
        assert!((deviation(516.0, 600.0) - 0.14).abs() < 1e-12);
        assert!((deviation(660.0, 600.0) - 0.10).abs() < 1e-12);
        assert_eq!(deviation(0.0, 0.0), 0.0);
        assert!(deviation(10.0, 0.0).is_infinite());
    }
}
