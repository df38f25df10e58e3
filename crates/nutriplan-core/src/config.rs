//! Tunable limits for generation, validation and lookup.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lookup::{LookupSettings, RetryPolicy};

/// Planner-wide limits and tolerances.
///
/// Every field has a default, so a partial TOML table deserializes into a
/// complete config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Relative tolerance for a regular meal's resolved total vs its budget.
    pub meal_tolerance: f64,
    /// Relative tolerance for the budget-closing last meal.
    pub last_meal_tolerance: f64,
    /// Relative tolerance for the day's total vs the target.
    pub global_tolerance: f64,
    /// Per-meal deviation above which a warning notice is raised.
    pub warning_threshold: f64,
    /// Generation attempts per meal before keeping the best one.
    pub generation_attempts: u32,
    /// Validation failures tolerated before escalating to human review.
    pub max_validation_retries: u32,
    /// Concurrent similarity searches allowed across the whole process.
    pub search_permits: usize,
    /// Ingredient resolutions in flight per recipe.
    pub lookup_concurrency: usize,
    /// Candidates requested from similarity search.
    pub search_top_k: usize,
    /// Attempts per ingredient on transient lookup failures.
    pub lookup_attempts: u32,
    /// Backoff before the second lookup attempt; doubles afterwards.
    pub lookup_backoff_ms: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            meal_tolerance: 0.05,
            last_meal_tolerance: 0.02,
            global_tolerance: 0.05,
            warning_threshold: 0.02,
            generation_attempts: 3,
            max_validation_retries: 2,
            search_permits: 2,
            lookup_concurrency: 5,
            search_top_k: 5,
            lookup_attempts: 3,
            lookup_backoff_ms: 500,
        }
    }
}

impl PlannerConfig {
    pub fn lookup_settings(&self) -> LookupSettings {
        LookupSettings {
            search_permits: self.search_permits,
            concurrency: self.lookup_concurrency,
            top_k: self.search_top_k,
            retry: RetryPolicy {
                max_attempts: self.lookup_attempts,
                base_delay: Duration::from_millis(self.lookup_backoff_ms),
            },
        }
    }

    /// Tolerance applied when generating a meal.
    pub fn tolerance_for(&self, is_last: bool) -> f64 {
        if is_last {
            self.last_meal_tolerance
        } else {
            self.meal_tolerance
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: PlannerConfig = toml::from_str("generation_attempts = 5").unwrap();
        assert_eq!(cfg.generation_attempts, 5);
        assert_eq!(cfg.max_validation_retries, 2);
        assert_eq!(cfg.search_permits, 2);
    }

    #[test]
    fn lookup_settings_mirror_config() {
        let cfg = PlannerConfig::default();
        let lookup = cfg.lookup_settings();
        assert_eq!(lookup.concurrency, 5);
        assert_eq!(lookup.retry.max_attempts, 3);
        assert_eq!(lookup.retry.base_delay, Duration::from_millis(500));
    }

    #[test]
    fn last_meal_is_stricter() {
        let cfg = PlannerConfig::default();
        assert!(cfg.tolerance_for(true) < cfg.tolerance_for(false));
    }
}
