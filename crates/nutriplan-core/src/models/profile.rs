use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Biological sex used by the BMR equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Male => "male",
            Self::Female => "female",
        };
        f.write_str(s)
    }
}

impl FromStr for Gender {
    type Err = ProfileParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            other => Err(ProfileParseError::new("gender", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Habitual physical activity, mapped to a TDEE multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    LightlyActive,
    ModeratelyActive,
    VeryActive,
    ExtraActive,
}

impl ActivityLevel {
    /// All levels, from least to most active.
    pub const ALL: [ActivityLevel; 5] = [
        Self::Sedentary,
        Self::LightlyActive,
        Self::ModeratelyActive,
        Self::VeryActive,
        Self::ExtraActive,
    ];

    /// Multiplier applied to BMR to obtain total daily energy expenditure.
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Sedentary => 1.2,
            Self::LightlyActive => 1.375,
            Self::ModeratelyActive => 1.55,
            Self::VeryActive => 1.725,
            Self::ExtraActive => 1.9,
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sedentary => "sedentary",
            Self::LightlyActive => "lightly_active",
            Self::ModeratelyActive => "moderately_active",
            Self::VeryActive => "very_active",
            Self::ExtraActive => "extra_active",
        };
        f.write_str(s)
    }
}

impl FromStr for ActivityLevel {
    type Err = ProfileParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sedentary" => Ok(Self::Sedentary),
            "lightly_active" => Ok(Self::LightlyActive),
            "moderately_active" => Ok(Self::ModeratelyActive),
            "very_active" => Ok(Self::VeryActive),
            "extra_active" => Ok(Self::ExtraActive),
            other => Err(ProfileParseError::new("activity level", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// What the user wants to achieve with the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    FatLoss,
    MuscleGain,
    Maintenance,
}

impl Objective {
    pub const ALL: [Objective; 3] = [Self::FatLoss, Self::MuscleGain, Self::Maintenance];

    /// Factor applied to TDEE to obtain the daily calorie target.
    pub fn calorie_factor(self) -> f64 {
        match self {
            Self::FatLoss => 0.83,
            Self::Maintenance => 1.0,
            Self::MuscleGain => 1.15,
        }
    }

    /// Protein grams per kilogram of body weight on a normal diet.
    pub fn protein_per_kg(self) -> f64 {
        match self {
            Self::FatLoss | Self::MuscleGain => 2.2,
            Self::Maintenance => 1.6,
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FatLoss => "fat_loss",
            Self::MuscleGain => "muscle_gain",
            Self::Maintenance => "maintenance",
        };
        f.write_str(s)
    }
}

impl FromStr for Objective {
    type Err = ProfileParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fat_loss" => Ok(Self::FatLoss),
            "muscle_gain" => Ok(Self::MuscleGain),
            "maintenance" => Ok(Self::Maintenance),
            other => Err(ProfileParseError::new("objective", other)),
        }
    }
}

// ---------------------------------------------------------------------------

/// Dietary pattern constraining the macro split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DietType {
    #[default]
    Normal,
    Keto,
}

impl fmt::Display for DietType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Normal => "normal",
            Self::Keto => "keto",
        };
        f.write_str(s)
    }
}

impl FromStr for DietType {
    type Err = ProfileParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "keto" => Ok(Self::Keto),
            other => Err(ProfileParseError::new("diet type", other)),
        }
    }
}

/// Error returned when parsing an invalid profile enum string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {value:?}")]
pub struct ProfileParseError {
    pub field: &'static str,
    pub value: String,
}

impl ProfileParseError {
    fn new(field: &'static str, value: &str) -> Self {
        Self {
            field,
            value: value.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Valid ranges for the numeric profile fields.
pub const AGE_RANGE: (u32, u32) = (18, 100);
pub const WEIGHT_RANGE_KG: (f64, f64) = (30.0, 300.0);
pub const HEIGHT_RANGE_CM: (f64, f64) = (100.0, 250.0);
pub const MEALS_RANGE: (u8, u8) = (1, 6);

/// A single out-of-range field in a [`UserProfile`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfileError {
    #[error("age {0} is outside the supported range 18-100")]
    Age(u32),
    #[error("weight {0} kg is outside the supported range 30-300")]
    Weight(f64),
    #[error("height {0} cm is outside the supported range 100-250")]
    Height(f64),
    #[error("number of meals {0} is outside the supported range 1-6")]
    MealCount(u8),
    #[error("failed to parse profile: {0}")]
    Parse(String),
}

fn default_meals() -> u8 {
    3
}

/// Everything the planner needs to know about the person being planned for.
///
/// Collected once at the start of a session and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub age: u32,
    pub gender: Gender,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub activity_level: ActivityLevel,
    pub objective: Objective,
    #[serde(default)]
    pub diet_type: DietType,
    #[serde(default)]
    pub excluded_foods: BTreeSet<String>,
    #[serde(default = "default_meals")]
    pub number_of_meals: u8,
}

impl UserProfile {
    /// Check every numeric field against its supported range.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.age < AGE_RANGE.0 || self.age > AGE_RANGE.1 {
            return Err(ProfileError::Age(self.age));
        }
        if !(WEIGHT_RANGE_KG.0..=WEIGHT_RANGE_KG.1).contains(&self.weight_kg) {
            return Err(ProfileError::Weight(self.weight_kg));
        }
        if !(HEIGHT_RANGE_CM.0..=HEIGHT_RANGE_CM.1).contains(&self.height_cm) {
            return Err(ProfileError::Height(self.height_cm));
        }
        if self.number_of_meals < MEALS_RANGE.0 || self.number_of_meals > MEALS_RANGE.1 {
            return Err(ProfileError::MealCount(self.number_of_meals));
        }
        Ok(())
    }

    /// Excluded foods joined for prompts, or `ninguno` when there are none.
    pub fn excluded_foods_label(&self) -> String {
        if self.excluded_foods.is_empty() {
            "ninguno".to_string()
        } else {
            self.excluded_foods
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

/// Parse and validate a profile from TOML text.
pub fn parse_profile_toml(content: &str) -> Result<UserProfile, ProfileError> {
    let profile: UserProfile =
        toml::from_str(content).map_err(|e| ProfileError::Parse(e.to_string()))?;
    profile.validate()?;
    Ok(profile)
}
