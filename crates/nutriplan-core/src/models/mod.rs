//! Domain types shared by every stage of the planner.

pub mod meal;
pub mod plan;
pub mod profile;
pub mod targets;

pub use meal::{Ingredient, Meal, MealNotice, MealTime, MealTimeParseError, Severity};
pub use plan::{DietPlan, Macronutrients, ShoppingListItem, diet_type_label};
pub use profile::{
    ActivityLevel, DietType, Gender, Objective, ProfileError, ProfileParseError, UserProfile,
    parse_profile_toml,
};
pub use targets::{MacroTarget, NutritionalTargets, TargetsError};
