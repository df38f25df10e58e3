use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Maximum allowed gap (kcal) between a meal's declared total and the sum of
/// its ingredients.
pub const MEAL_TOTAL_TOLERANCE_KCAL: f64 = 0.5;

// ---------------------------------------------------------------------------
// MealTime
// ---------------------------------------------------------------------------

/// Time-of-day slot a meal belongs to.
///
/// Labels are the user-facing Spanish names the budget table is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MealTime {
    #[serde(rename = "Comida Unica (OMAD)")]
    ComidaUnica,
    #[serde(rename = "Brunch")]
    Brunch,
    #[serde(rename = "Desayuno")]
    Desayuno,
    #[serde(rename = "Snack AM")]
    SnackAm,
    #[serde(rename = "Almuerzo")]
    Almuerzo,
    #[serde(rename = "Comida")]
    Comida,
    #[serde(rename = "Snack PM")]
    SnackPm,
    #[serde(rename = "Cena")]
    Cena,
    #[serde(rename = "Recena")]
    Recena,
}

impl MealTime {
    pub fn label(self) -> &'static str {
        match self {
            Self::ComidaUnica => "Comida Unica (OMAD)",
            Self::Brunch => "Brunch",
            Self::Desayuno => "Desayuno",
            Self::SnackAm => "Snack AM",
            Self::Almuerzo => "Almuerzo",
            Self::Comida => "Comida",
            Self::SnackPm => "Snack PM",
            Self::Cena => "Cena",
            Self::Recena => "Recena",
        }
    }
}

impl fmt::Display for MealTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MealTime {
    type Err = MealTimeParseError;

    /// Accepts the display label case-insensitively, plus snake_case aliases
    /// (`snack_am`, `comida_unica`) for command-line use.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        let time = match normalized.as_str() {
            "comida unica (omad)" | "comida unica" | "omad" => Self::ComidaUnica,
            "brunch" => Self::Brunch,
            "desayuno" => Self::Desayuno,
            "snack am" => Self::SnackAm,
            "almuerzo" => Self::Almuerzo,
            "comida" => Self::Comida,
            "snack pm" => Self::SnackPm,
            "cena" => Self::Cena,
            "recena" => Self::Recena,
            _ => return Err(MealTimeParseError(s.to_owned())),
        };
        Ok(time)
    }
}

/// Error returned when parsing an invalid [`MealTime`] string.
#[derive(Debug, Clone)]
pub struct MealTimeParseError(pub String);

impl fmt::Display for MealTimeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid meal time: {:?}", self.0)
    }
}

impl std::error::Error for MealTimeParseError {}

// ---------------------------------------------------------------------------
// Ingredient / Meal
// ---------------------------------------------------------------------------

/// One ingredient line of a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    /// Human-readable amount, e.g. `150g` or `1/2 unidad`.
    pub quantity: String,
    pub weight_grams: f64,
    #[serde(default)]
    pub kcal: f64,
}

impl Ingredient {
    /// Shopping-list form: quantity followed by name (`150g Pechuga de pollo`).
    pub fn shopping_line(&self) -> String {
        format!("{} {}", self.quantity.trim(), self.name.trim())
    }
}

/// A complete recipe for one meal slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub meal_time: MealTime,
    pub title: String,
    pub description: String,
    pub total_calories: f64,
    pub ingredients: Vec<Ingredient>,
    pub preparation: Vec<String>,
    #[serde(default)]
    pub alternative: Option<String>,
}

impl Meal {
    /// Sum of the kcal of every ingredient.
    pub fn ingredient_kcal_sum(&self) -> f64 {
        self.ingredients.iter().map(|i| i.kcal).sum()
    }

    /// Whether the declared total matches the ingredient sum.
    pub fn is_consistent(&self) -> bool {
        (self.total_calories - self.ingredient_kcal_sum()).abs() <= MEAL_TOTAL_TOLERANCE_KCAL
    }
}

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Informational deviation report for a single meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealNotice {
    pub meal_time: MealTime,
    pub severity: Severity,
    pub deviation_pct: f64,
    pub message: String,
}
