use serde::{Deserialize, Serialize};

use super::meal::Meal;
use super::profile::{DietType, Objective};
use super::targets::NutritionalTargets;

/// Macro breakdown carried on the final plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Macronutrients {
    pub protein_percentage: f64,
    pub protein_grams: f64,
    pub carbs_percentage: f64,
    pub carbs_grams: f64,
    pub fat_percentage: f64,
    pub fat_grams: f64,
}

impl From<&NutritionalTargets> for Macronutrients {
    fn from(t: &NutritionalTargets) -> Self {
        Self {
            protein_percentage: t.protein.percentage,
            protein_grams: t.protein.grams,
            carbs_percentage: t.carbs.percentage,
            carbs_grams: t.carbs.grams,
            fat_percentage: t.fat.percentage,
            fat_grams: t.fat.grams,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingListItem {
    pub food: String,
    pub quantity: String,
}

/// The finished daily plan handed back to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietPlan {
    pub diet_type: String,
    pub total_calories: f64,
    pub macronutrients: Macronutrients,
    pub daily_meals: Vec<Meal>,
    pub shopping_list: Vec<ShoppingListItem>,
    pub day_identifier: u32,
}

/// Human-readable label describing the plan's dietary pattern.
pub fn diet_type_label(diet_type: DietType, objective: Objective) -> &'static str {
    match (diet_type, objective) {
        (DietType::Keto, _) => "Cetogénica",
        (DietType::Normal, Objective::FatLoss | Objective::MuscleGain) => "Alta en Proteína",
        (DietType::Normal, Objective::Maintenance) => "Balanceada",
    }
}
