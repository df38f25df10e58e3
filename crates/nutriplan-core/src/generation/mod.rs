//! Meal generation under calorie budgets.
//!
//! A [`MealGenerator`] turns a prompt into a structured [`Meal`]. The
//! [`RecipeGenerator`] wraps it in a bounded attempt loop that checks every
//! candidate against the nutrition lookup, and [`generate_batch`] fans a
//! whole day's budget out over it.

pub mod batch;
pub mod prompt;
pub mod recipe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::ConfigError;
use crate::lookup::LookupError;
use crate::models::{Meal, MealTime};

pub use batch::{BatchOutcome, generate_batch, regenerate_meal};
pub use prompt::build_meal_prompt;
pub use recipe::RecipeGenerator;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What to generate for one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealSpec {
    pub meal_time: MealTime,
    pub target_calories: f64,
    /// One-based position of the meal in the day.
    pub position: usize,
    pub total_meals: usize,
    /// The budget-closing meal, held to the stricter tolerance.
    pub is_last: bool,
    /// Calories already used by earlier meals (last meal only).
    pub consumed_calories: f64,
    pub feedback: Option<String>,
}

/// A single call to the external generator.
#[derive(Debug, Clone, PartialEq)]
pub struct MealRequest {
    pub spec: MealSpec,
    /// One-based attempt number.
    pub attempt: u32,
    pub prompt: String,
}

/// Result of generating one meal.
///
/// `meal` is present whenever at least one attempt produced a meal, even if
/// it missed its tolerance; `error` explains what went wrong in that case.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MealOutcome {
    pub meal: Option<Meal>,
    pub error: Option<String>,
    pub lookup_warnings: Option<String>,
}

#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("nutrition lookup failed: {0}")]
    Lookup(LookupError),
}

impl From<LookupError> for GenerationError {
    fn from(e: LookupError) -> Self {
        match e {
            LookupError::Config(c) => Self::Config(c),
            other => Self::Lookup(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Adapter interface for the structured meal generator.
///
/// Implementations must only return shape-valid meals; a reply that cannot
/// be parsed should be re-requested or reported as an error.
#[async_trait]
pub trait MealGenerator: Send + Sync {
    async fn generate(&self, request: &MealRequest) -> anyhow::Result<Meal>;
}

// Compile-time assertion: MealGenerator must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn MealGenerator) {}
};
