use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kilocalories per gram of protein and carbohydrate.
pub const KCAL_PER_GRAM_PROTEIN: f64 = 4.0;
pub const KCAL_PER_GRAM_CARBS: f64 = 4.0;
/// Kilocalories per gram of fat.
pub const KCAL_PER_GRAM_FAT: f64 = 9.0;

/// Grams and share of daily calories for one macronutrient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroTarget {
    pub grams: f64,
    pub percentage: f64,
}

/// Daily energy and macronutrient targets derived from a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionalTargets {
    pub bmr: f64,
    pub tdee: f64,
    pub target_calories: f64,
    pub protein: MacroTarget,
    pub carbs: MacroTarget,
    pub fat: MacroTarget,
}

/// A violated consistency rule on [`NutritionalTargets`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TargetsError {
    #[error("tdee ({tdee}) is lower than bmr ({bmr})")]
    TdeeBelowBmr { bmr: f64, tdee: f64 },
    #[error("macro percentages sum to {0}, expected 100 +/- 1")]
    PercentageSum(f64),
    #[error("{name} grams ({actual}) inconsistent with expected {expected:.2}")]
    GramsMismatch {
        name: &'static str,
        actual: f64,
        expected: f64,
    },
}

impl NutritionalTargets {
    /// Verify the relations every set of targets must satisfy.
    ///
    /// - `tdee >= bmr`
    /// - percentages sum to 100 within one point
    /// - each macro's grams match `target_calories * pct / kcal_per_gram`
    ///   within 2% (or 0.5 g for small values)
    pub fn check_invariants(&self) -> Result<(), TargetsError> {
        if self.tdee < self.bmr {
            return Err(TargetsError::TdeeBelowBmr {
                bmr: self.bmr,
                tdee: self.tdee,
            });
        }

        let sum = self.protein.percentage + self.carbs.percentage + self.fat.percentage;
        if !(99.0..=101.0).contains(&sum) {
            return Err(TargetsError::PercentageSum(sum));
        }

        let checks = [
            ("protein", self.protein, KCAL_PER_GRAM_PROTEIN),
            ("carbs", self.carbs, KCAL_PER_GRAM_CARBS),
            ("fat", self.fat, KCAL_PER_GRAM_FAT),
        ];
        for (name, target, kcal_per_gram) in checks {
            let expected = self.target_calories * target.percentage / 100.0 / kcal_per_gram;
            let tolerance = (expected * 0.02).max(0.5);
            if (target.grams - expected).abs() > tolerance {
                return Err(TargetsError::GramsMismatch {
                    name,
                    actual: target.grams,
                    expected,
                });
            }
        }

        Ok(())
    }
}
