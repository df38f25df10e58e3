//! Human review decisions.
//!
//! When the workflow suspends it hands the caller a [`ReviewRequest`]; the
//! caller resumes it with a [`ReviewPayload`], which is interpreted against
//! the plan's meal budget into a [`ReviewDecision`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calculation::MealBudget;
use crate::models::{Meal, MealNotice, MealTime, NutritionalTargets};

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// The three actions offered to the reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    ChangeMeal,
    RegenerateAll,
}

impl ReviewAction {
    pub const ALL: [ReviewAction; 3] = [Self::Approve, Self::ChangeMeal, Self::RegenerateAll];

    pub fn label(self) -> &'static str {
        match self {
            Self::Approve => "Approve Entire Plan",
            Self::ChangeMeal => "Change Specific Meal",
            Self::RegenerateAll => "Regenerate All Meals",
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::ChangeMeal => write!(f, "change_meal"),
            Self::RegenerateAll => write!(f, "regenerate_all"),
        }
    }
}

impl FromStr for ReviewAction {
    type Err = ReviewActionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "change_meal" => Ok(Self::ChangeMeal),
            "regenerate_all" => Ok(Self::RegenerateAll),
            other => Err(ReviewActionParseError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReviewActionParseError(pub String);

impl fmt::Display for ReviewActionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid review action: {:?}", self.0)
    }
}

impl std::error::Error for ReviewActionParseError {}

// ---------------------------------------------------------------------------
// Payload and decision
// ---------------------------------------------------------------------------

/// Raw resume payload: `{action, meal_time?, feedback?}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPayload {
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

impl ReviewPayload {
    pub fn approve() -> Self {
        Self {
            action: ReviewAction::Approve.to_string(),
            ..Self::default()
        }
    }

    pub fn change_meal(meal_time: impl Into<String>, feedback: impl Into<String>) -> Self {
        Self {
            action: ReviewAction::ChangeMeal.to_string(),
            meal_time: Some(meal_time.into()),
            feedback: Some(feedback.into()),
        }
    }

    pub fn regenerate_all() -> Self {
        Self {
            action: ReviewAction::RegenerateAll.to_string(),
            ..Self::default()
        }
    }
}

/// A validated review decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    ChangeMeal {
        meal_time: MealTime,
        feedback: Option<String>,
    },
    RegenerateAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("change_meal requires a meal_time")]
    MissingMealTime,
    #[error("unknown meal time: {0:?}")]
    UnknownMealTime(String),
    #[error("meal time {0} is not part of this plan")]
    MealNotInPlan(MealTime),
}

impl ReviewDecision {
    /// Interpret a resume payload against the plan's budget.
    ///
    /// Unrecognized actions approve. `change_meal` must name a slot present
    /// in `budget`.
    pub fn from_payload(payload: &ReviewPayload, budget: &MealBudget) -> Result<Self, ReviewError> {
        let action = match payload.action.trim().parse::<ReviewAction>() {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!(error = %e, "unrecognized review action, approving");
                ReviewAction::Approve
            }
        };

        match action {
            ReviewAction::Approve => Ok(Self::Approve),
            ReviewAction::RegenerateAll => Ok(Self::RegenerateAll),
            ReviewAction::ChangeMeal => {
                let raw = payload
                    .meal_time
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or(ReviewError::MissingMealTime)?;
                let meal_time: MealTime = raw
                    .parse()
                    .map_err(|_| ReviewError::UnknownMealTime(raw.to_string()))?;
                if budget.get(meal_time).is_none() {
                    return Err(ReviewError::MealNotInPlan(meal_time));
                }
                let feedback = payload
                    .feedback
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
                Ok(Self::ChangeMeal {
                    meal_time,
                    feedback,
                })
            }
        }
    }

    pub fn action(&self) -> ReviewAction {
        match self {
            Self::Approve => ReviewAction::Approve,
            Self::ChangeMeal { .. } => ReviewAction::ChangeMeal,
            Self::RegenerateAll => ReviewAction::RegenerateAll,
        }
    }
}

// ---------------------------------------------------------------------------
// Review request
// ---------------------------------------------------------------------------

/// One option presented to the reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewOption {
    pub action: ReviewAction,
    pub label: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
}

/// What the reviewer sees while the workflow is suspended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub daily_meals: Vec<Meal>,
    pub nutritional_targets: Option<NutritionalTargets>,
    pub meal_generation_errors: BTreeMap<MealTime, String>,
    pub validation_errors: Vec<String>,
    pub notices: Vec<MealNotice>,
    pub lookup_warnings: BTreeMap<MealTime, String>,
    pub options: Vec<ReviewOption>,
}

/// The fixed option list offered at every review.
pub fn review_options() -> Vec<ReviewOption> {
    ReviewAction::ALL
        .into_iter()
        .map(|action| ReviewOption {
            action,
            label: action.label().to_string(),
            requires: match action {
                ReviewAction::ChangeMeal => vec!["meal_time".into(), "feedback".into()],
                _ => Vec::new(),
            },
        })
        .collect()
}
