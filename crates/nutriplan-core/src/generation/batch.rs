//! Whole-day generation: meals 1..N-1 concurrently, then the last meal
//! against whatever budget they left.

use std::collections::BTreeMap;

use futures::future::join_all;

use crate::calculation::MealBudget;
use crate::models::{Meal, MealTime, NutritionalTargets, UserProfile};

use super::{GenerationError, MealOutcome, MealSpec, RecipeGenerator};

/// Meals and per-slot problems from a batch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// Generated meals in budget order. Slots whose generation produced
    /// nothing are absent.
    pub meals: Vec<Meal>,
    /// Generation errors keyed by slot; a missing key means success.
    pub errors: BTreeMap<MealTime, String>,
    pub lookup_warnings: BTreeMap<MealTime, String>,
}

impl BatchOutcome {
    fn record(&mut self, meal_time: MealTime, outcome: MealOutcome) {
        if let Some(meal) = outcome.meal {
            self.meals.push(meal);
        }
        if let Some(error) = outcome.error {
            self.errors.insert(meal_time, error);
        }
        if let Some(warnings) = outcome.lookup_warnings {
            self.lookup_warnings.insert(meal_time, warnings);
        }
    }
}

/// Generate a meal for every slot of `budget`.
///
/// With a single slot the meal is generated directly under the last-meal
/// tolerance. Otherwise slots 1..N-1 run concurrently, each prompted only
/// with its own budget; the last slot is generated afterwards against
/// `target_calories - consumed`, where `consumed` sums the resolved totals
/// of the meals already produced. A failing slot never cancels its
/// siblings.
pub async fn generate_batch(
    generator: &RecipeGenerator,
    profile: &UserProfile,
    targets: &NutritionalTargets,
    budget: &MealBudget,
) -> Result<BatchOutcome, GenerationError> {
    let config = generator.config();
    let total_meals = budget.len();
    let mut outcome = BatchOutcome::default();

    let Some(last) = budget.last() else {
        return Ok(outcome);
    };

    let leading: Vec<MealSpec> = budget
        .iter()
        .take(total_meals - 1)
        .enumerate()
        .map(|(i, slot)| MealSpec {
            meal_time: slot.meal_time,
            target_calories: slot.calories,
            position: i + 1,
            total_meals,
            is_last: false,
            consumed_calories: 0.0,
            feedback: None,
        })
        .collect();

    tracing::info!(
        total_meals,
        concurrent = leading.len(),
        "generating meal batch"
    );

    let results = join_all(
        leading
            .iter()
            .map(|spec| generator.generate(profile, targets, spec, config.meal_tolerance)),
    )
    .await;

    let mut first_fatal = None;
    for (spec, result) in leading.iter().zip(results) {
        match result {
            Ok(meal_outcome) => outcome.record(spec.meal_time, meal_outcome),
            Err(e) => {
                tracing::error!(meal_time = %spec.meal_time, error = %e, "meal generation aborted");
                first_fatal.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_fatal {
        return Err(e);
    }

    let consumed: f64 = outcome.meals.iter().map(|m| m.total_calories).sum();
    let remaining = if total_meals == 1 {
        last.calories
    } else {
        targets.target_calories - consumed
    };
    let last_spec = MealSpec {
        meal_time: last.meal_time,
        target_calories: remaining,
        position: total_meals,
        total_meals,
        is_last: true,
        consumed_calories: consumed,
        feedback: None,
    };
    tracing::info!(
        meal_time = %last.meal_time,
        consumed,
        remaining,
        "generating budget-closing meal"
    );
    let last_outcome = generator
        .generate(profile, targets, &last_spec, config.last_meal_tolerance)
        .await?;
    outcome.record(last.meal_time, last_outcome);

    Ok(outcome)
}

/// Regenerate the meal for one slot, optionally guided by feedback.
///
/// The slot's own budget is the target and the regular tolerance applies.
/// Returns `None` when the slot is not part of `budget`.
pub async fn regenerate_meal(
    generator: &RecipeGenerator,
    profile: &UserProfile,
    targets: &NutritionalTargets,
    budget: &MealBudget,
    meal_time: MealTime,
    feedback: Option<String>,
) -> Result<Option<MealOutcome>, GenerationError> {
    let (Some(position), Some(calories)) = (budget.position(meal_time), budget.get(meal_time))
    else {
        return Ok(None);
    };
    let spec = MealSpec {
        meal_time,
        target_calories: calories,
        position: position + 1,
        total_meals: budget.len(),
        is_last: false,
        consumed_calories: 0.0,
        feedback,
    };
    tracing::info!(meal_time = %meal_time, target = calories, "regenerating single meal");
    let outcome = generator
        .generate(profile, targets, &spec, generator.config().meal_tolerance)
        .await?;
    Ok(Some(outcome))
}
