//! Deterministic energy and macronutrient calculations.
//!
//! Everything in this module is a pure function of its inputs: no I/O, no
//! randomness, no model calls. The workflow runs it once per session and
//! never mutates the result.

pub mod distribution;

use thiserror::Error;

use crate::models::targets::{KCAL_PER_GRAM_CARBS, KCAL_PER_GRAM_FAT, KCAL_PER_GRAM_PROTEIN};
use crate::models::{
    DietType, Gender, MacroTarget, NutritionalTargets, ProfileError, TargetsError, UserProfile,
};

pub use distribution::{MealBudget, MealSlot, distribute_calories};

/// Fat grams per kilogram of body weight on a normal diet.
const FAT_PER_KG: f64 = 0.9;

/// Fixed keto split as (protein, carbs, fat) fractions of calories.
const KETO_SPLIT: (f64, f64, f64) = (0.25, 0.05, 0.70);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalculationError {
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("number of meals {0} is outside the supported range 1-6")]
    MealCountOutOfRange(u8),
    #[error("total calories {0} must be greater than 500 and less than 10000")]
    TotalCaloriesOutOfRange(f64),
    #[error("calculated targets are inconsistent: {0}")]
    Inconsistent(#[from] TargetsError),
}

/// Round to `decimals` places, half away from zero.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Basal metabolic rate (Mifflin-St Jeor), kcal/day.
pub fn bmr(profile: &UserProfile) -> f64 {
    let base = 10.0 * profile.weight_kg + 6.25 * profile.height_cm - 5.0 * f64::from(profile.age);
    match profile.gender {
        Gender::Male => base + 5.0,
        Gender::Female => base - 161.0,
    }
}

/// Total daily energy expenditure for a given BMR.
pub fn tdee(bmr: f64, profile: &UserProfile) -> f64 {
    bmr * profile.activity_level.multiplier()
}

/// Compute the daily targets for a validated profile.
///
/// Keto plans use a fixed 25/5/70 protein/carbs/fat split of calories.
/// Normal plans index protein and fat to body weight, give carbohydrates
/// whatever calories remain (never below zero), and report percentages
/// derived from the resulting grams.
pub fn compute_targets(profile: &UserProfile) -> Result<NutritionalTargets, CalculationError> {
    profile.validate()?;

    let bmr = bmr(profile);
    let tdee = tdee(bmr, profile);
    let target_calories = (tdee * profile.objective.calorie_factor()).round();

    let (protein, carbs, fat) = match profile.diet_type {
        DietType::Keto => {
            let (p, c, f) = KETO_SPLIT;
            (
                macro_target(target_calories * p / KCAL_PER_GRAM_PROTEIN, p * 100.0),
                macro_target(target_calories * c / KCAL_PER_GRAM_CARBS, c * 100.0),
                macro_target(target_calories * f / KCAL_PER_GRAM_FAT, f * 100.0),
            )
        }
        DietType::Normal => {
            let p_grams = profile.weight_kg * profile.objective.protein_per_kg();
            let f_grams = profile.weight_kg * FAT_PER_KG;
            let remaining =
                target_calories - p_grams * KCAL_PER_GRAM_PROTEIN - f_grams * KCAL_PER_GRAM_FAT;
            let c_grams = (remaining / KCAL_PER_GRAM_CARBS).max(0.0);

            let p_kcal = p_grams * KCAL_PER_GRAM_PROTEIN;
            let c_kcal = c_grams * KCAL_PER_GRAM_CARBS;
            let f_kcal = f_grams * KCAL_PER_GRAM_FAT;
            let total = p_kcal + c_kcal + f_kcal;
            let pct = |kcal: f64| if total > 0.0 { kcal / total * 100.0 } else { 0.0 };

            (
                macro_target(p_grams, pct(p_kcal)),
                macro_target(c_grams, pct(c_kcal)),
                macro_target(f_grams, pct(f_kcal)),
            )
        }
    };

    let targets = NutritionalTargets {
        bmr: round_to(bmr, 2),
        tdee: round_to(tdee, 2),
        target_calories,
        protein,
        carbs,
        fat,
    };
    targets.check_invariants()?;

    tracing::debug!(
        bmr = targets.bmr,
        tdee = targets.tdee,
        target_calories = targets.target_calories,
        "computed nutritional targets"
    );

    Ok(targets)
}

fn macro_target(grams: f64, percentage: f64) -> MacroTarget {
    MacroTarget {
        grams: round_to(grams, 2),
        percentage: round_to(percentage, 2),
    }
}
