//! Workflow state and stage machine.
//!
//! [`WorkflowState`] is the single aggregate threaded through a planning
//! session. It is fully serializable, so a session suspended for review can
//! be written to disk and resumed later by a different process.
//!
//! Stage transitions follow a fixed graph:
//!
//! ```text
//! calculate       -> generate_batch
//! generate_batch  -> validate
//! regenerate_meal -> validate
//! validate        -> regenerate_meal | generate_batch | await_review
//! await_review    -> finalize | regenerate_meal | generate_batch
//! finalize        -> done
//! ```

pub mod orchestrator;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::calculation::{CalculationError, MealBudget};
use crate::generation::GenerationError;
use crate::models::{DietPlan, Meal, MealNotice, MealTime, NutritionalTargets, UserProfile};
use crate::review::{ReviewDecision, ReviewError, ReviewRequest, review_options};

pub use orchestrator::Planner;

// ---------------------------------------------------------------------------
// Phase and stage
// ---------------------------------------------------------------------------

/// Coarse session status, as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Running,
    AwaitingReview,
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::AwaitingReview => write!(f, "awaiting_review"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// The next step the orchestrator will execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Calculate,
    GenerateBatch,
    RegenerateMeal,
    Validate,
    AwaitReview,
    Finalize,
    Done,
}

impl Stage {
    pub fn phase(self) -> Phase {
        match self {
            Self::AwaitReview => Phase::AwaitingReview,
            Self::Done => Phase::Completed,
            _ => Phase::Running,
        }
    }

    /// Check whether `from -> to` is an edge of the stage graph.
    pub fn is_valid_transition(from: Stage, to: Stage) -> bool {
        matches!(
            (from, to),
            (Stage::Calculate, Stage::GenerateBatch)
                | (Stage::GenerateBatch, Stage::Validate)
                | (Stage::RegenerateMeal, Stage::Validate)
                | (Stage::Validate, Stage::RegenerateMeal)
                | (Stage::Validate, Stage::GenerateBatch)
                | (Stage::Validate, Stage::AwaitReview)
                | (Stage::AwaitReview, Stage::Finalize)
                | (Stage::AwaitReview, Stage::RegenerateMeal)
                | (Stage::AwaitReview, Stage::GenerateBatch)
                | (Stage::Finalize, Stage::Done)
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Calculate => write!(f, "calculate"),
            Self::GenerateBatch => write!(f, "generate_batch"),
            Self::RegenerateMeal => write!(f, "regenerate_meal"),
            Self::Validate => write!(f, "validate"),
            Self::AwaitReview => write!(f, "await_review"),
            Self::Finalize => write!(f, "finalize"),
            Self::Done => write!(f, "done"),
        }
    }
}

impl FromStr for Stage {
    type Err = StageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "calculate" => Ok(Self::Calculate),
            "generate_batch" => Ok(Self::GenerateBatch),
            "regenerate_meal" => Ok(Self::RegenerateMeal),
            "validate" => Ok(Self::Validate),
            "await_review" => Ok(Self::AwaitReview),
            "finalize" => Ok(Self::Finalize),
            "done" => Ok(Self::Done),
            other => Err(StageParseError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StageParseError(pub String);

impl fmt::Display for StageParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid workflow stage: {:?}", self.0)
    }
}

impl std::error::Error for StageParseError {}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Calculation(#[from] CalculationError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Review(#[from] ReviewError),
    #[error("invalid workflow transition: {from} -> {to}")]
    InvalidTransition { from: Stage, to: Stage },
    #[error("session is not awaiting review (phase: {0})")]
    NotAwaitingReview(Phase),
    #[error("workflow state is missing {0}")]
    MissingState(&'static str),
    #[error("workflow interrupted")]
    Interrupted,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything a planning session knows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub session_id: Uuid,
    pub phase: Phase,
    pub stage: Stage,
    pub profile: UserProfile,
    pub targets: Option<NutritionalTargets>,
    pub budget: Option<MealBudget>,
    /// Current meals in budget order.
    #[serde(default)]
    pub meals: Vec<Meal>,
    #[serde(default)]
    pub generation_errors: BTreeMap<MealTime, String>,
    #[serde(default)]
    pub lookup_warnings: BTreeMap<MealTime, String>,
    #[serde(default)]
    pub validation_errors: Vec<String>,
    #[serde(default)]
    pub notices: Vec<MealNotice>,
    #[serde(default)]
    pub retry_count: u32,
    /// Routing hint: the only meal to regenerate next.
    pub selected_meal_to_change: Option<MealTime>,
    /// Routing hint: guidance for the regenerated meal.
    pub feedback: Option<String>,
    pub review_decision: Option<ReviewDecision>,
    pub draft_plan: Option<DietPlan>,
    pub final_plan: Option<DietPlan>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    /// Fresh session for `profile`, ready to calculate targets.
    pub fn new(profile: UserProfile) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            phase: Phase::Running,
            stage: Stage::Calculate,
            profile,
            targets: None,
            budget: None,
            meals: Vec::new(),
            generation_errors: BTreeMap::new(),
            lookup_warnings: BTreeMap::new(),
            validation_errors: Vec::new(),
            notices: Vec::new(),
            retry_count: 0,
            selected_meal_to_change: None,
            feedback: None,
            review_decision: None,
            draft_plan: None,
            final_plan: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `to`, enforcing the stage graph.
    pub fn transition(&mut self, to: Stage) -> Result<(), WorkflowError> {
        let from = self.stage;
        if !Stage::is_valid_transition(from, to) {
            return Err(WorkflowError::InvalidTransition { from, to });
        }
        tracing::debug!(session_id = %self.session_id, %from, %to, "workflow transition");
        self.stage = to;
        self.phase = to.phase();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Replace the meal for its slot, keeping budget order. A meal for a
    /// slot not yet present is inserted at its budget position.
    pub fn replace_meal(&mut self, meal: Meal) {
        if let Some(existing) = self.meals.iter_mut().find(|m| m.meal_time == meal.meal_time) {
            *existing = meal;
            return;
        }
        let order = |mt: MealTime| {
            self.budget
                .as_ref()
                .and_then(|b| b.position(mt))
                .unwrap_or(usize::MAX)
        };
        let position = order(meal.meal_time);
        let index = self
            .meals
            .iter()
            .position(|m| order(m.meal_time) > position)
            .unwrap_or(self.meals.len());
        self.meals.insert(index, meal);
    }

    /// Sum of the declared meal totals.
    pub fn total_calories(&self) -> f64 {
        self.meals.iter().map(|m| m.total_calories).sum()
    }

    /// The payload shown to the reviewer.
    pub fn review_request(&self) -> ReviewRequest {
        ReviewRequest {
            daily_meals: self.meals.clone(),
            nutritional_targets: self.targets.clone(),
            meal_generation_errors: self.generation_errors.clone(),
            validation_errors: self.validation_errors.clone(),
            notices: self.notices.clone(),
            lookup_warnings: self.lookup_warnings.clone(),
            options: review_options(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::calculation::distribute_calories;
    use crate::models::{ActivityLevel, DietType, Gender, Objective};

    fn profile() -> UserProfile {
        UserProfile {
            age: 40,
            gender: Gender::Female,
            weight_kg: 65.0,
            height_cm: 168.0,
            activity_level: ActivityLevel::Sedentary,
            objective: Objective::Maintenance,
            diet_type: DietType::Normal,
            excluded_foods: BTreeSet::new(),
            number_of_meals: 3,
        }
    }

    fn meal(meal_time: MealTime, title: &str) -> Meal {
        Meal {
            meal_time,
            title: title.into(),
            description: String::new(),
            total_calories: 500.0,
            ingredients: Vec::new(),
            preparation: Vec::new(),
            alternative: None,
        }
    }

    #[test]
    fn valid_transitions() {
        assert!(Stage::is_valid_transition(Stage::Calculate, Stage::GenerateBatch));
        assert!(Stage::is_valid_transition(Stage::Validate, Stage::RegenerateMeal));
        assert!(Stage::is_valid_transition(Stage::AwaitReview, Stage::Finalize));
        assert!(Stage::is_valid_transition(Stage::Finalize, Stage::Done));
    }

    #[test]
    fn invalid_transitions() {
        assert!(!Stage::is_valid_transition(Stage::Calculate, Stage::Validate));
        assert!(!Stage::is_valid_transition(Stage::GenerateBatch, Stage::AwaitReview));
        assert!(!Stage::is_valid_transition(Stage::Validate, Stage::Finalize));
        assert!(!Stage::is_valid_transition(Stage::Done, Stage::Calculate));
    }

    #[test]
    fn transition_updates_phase() {
        let mut state = WorkflowState::new(profile());
        state.transition(Stage::GenerateBatch).unwrap();
        state.transition(Stage::Validate).unwrap();
        state.transition(Stage::AwaitReview).unwrap();
        assert_eq!(state.phase, Phase::AwaitingReview);
        let err = state.transition(Stage::Done).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
        assert_eq!(state.stage, Stage::AwaitReview);
    }

    #[test]
    fn stage_roundtrips_through_display() {
        for stage in [
            Stage::Calculate,
            Stage::GenerateBatch,
            Stage::RegenerateMeal,
            Stage::Validate,
            Stage::AwaitReview,
            Stage::Finalize,
            Stage::Done,
        ] {
            assert_eq!(stage.to_string().parse::<Stage>().unwrap(), stage);
        }
        assert!("bogus".parse::<Stage>().is_err());
    }

    #[test]
    fn replace_meal_keeps_budget_order() {
        let mut state = WorkflowState::new(profile());
        state.budget = Some(distribute_calories(2000.0, 3).unwrap());
        state.meals = vec![meal(MealTime::Desayuno, "a"), meal(MealTime::Cena, "c")];

        state.replace_meal(meal(MealTime::Comida, "b"));
        let order: Vec<_> = state.meals.iter().map(|m| m.meal_time).collect();
        assert_eq!(order, vec![MealTime::Desayuno, MealTime::Comida, MealTime::Cena]);

        state.replace_meal(meal(MealTime::Cena, "c2"));
        assert_eq!(state.meals.len(), 3);
        assert_eq!(state.meals[2].title, "c2");
    }

    #[test]
    fn state_roundtrips_through_json() {
        let mut state = WorkflowState::new(profile());
        state
            .generation_errors
            .insert(MealTime::Cena, "Generation failed: boom".into());
        state.selected_meal_to_change = Some(MealTime::Cena);
        let json = serde_json::to_string(&state).unwrap();
        let back: WorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
