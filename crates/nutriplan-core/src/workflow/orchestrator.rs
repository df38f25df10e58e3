//! Planner: drives a [`WorkflowState`] through its stages until it needs a
//! human or has a final plan.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::backend::Services;
use crate::calculation::{compute_targets, distribute_calories};
use crate::config::PlannerConfig;
use crate::generation::{MealGenerator, RecipeGenerator, generate_batch, regenerate_meal};
use crate::lookup::NutritionLookup;
use crate::models::UserProfile;
use crate::review::{ReviewDecision, ReviewPayload};
use crate::validation::{PlanSnapshot, Route, assemble_plan, validate};

use super::{Phase, Stage, WorkflowError, WorkflowState};

/// Runs planning sessions against a fixed set of collaborators.
#[derive(Debug)]
pub struct Planner {
    recipes: RecipeGenerator,
}

impl Planner {
    pub fn new(
        generator: Arc<dyn MealGenerator>,
        lookup: Arc<NutritionLookup>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            recipes: RecipeGenerator::new(generator, lookup, config),
        }
    }

    pub fn from_services(services: Services, config: PlannerConfig) -> Self {
        Self::new(services.generator, services.lookup, config)
    }

    pub fn config(&self) -> &PlannerConfig {
        self.recipes.config()
    }

    /// Open a session for `profile` and run it to its first suspension.
    pub async fn start(
        &self,
        profile: UserProfile,
        cancel: CancellationToken,
    ) -> Result<WorkflowState, WorkflowError> {
        let mut state = WorkflowState::new(profile);
        tracing::info!(session_id = %state.session_id, "planning session started");
        self.run(&mut state, cancel).await?;
        Ok(state)
    }

    /// Resume a suspended session with the reviewer's decision.
    ///
    /// A payload that cannot be applied (for example `change_meal` naming a
    /// slot outside the plan) is rejected and leaves `state` untouched.
    pub async fn resume(
        &self,
        state: &mut WorkflowState,
        payload: &ReviewPayload,
        cancel: CancellationToken,
    ) -> Result<Phase, WorkflowError> {
        if state.stage != Stage::AwaitReview {
            return Err(WorkflowError::NotAwaitingReview(state.phase));
        }
        let budget = state
            .budget
            .as_ref()
            .ok_or(WorkflowError::MissingState("meal budget"))?;
        let decision = ReviewDecision::from_payload(payload, budget)?;

        tracing::info!(
            session_id = %state.session_id,
            action = %decision.action(),
            "review decision received"
        );

        match &decision {
            ReviewDecision::Approve => {
                state.selected_meal_to_change = None;
                state.feedback = None;
                state.transition(Stage::Finalize)?;
            }
            ReviewDecision::ChangeMeal {
                meal_time,
                feedback,
            } => {
                state.selected_meal_to_change = Some(*meal_time);
                state.feedback = feedback.clone();
                state.retry_count = 0;
                state.transition(Stage::RegenerateMeal)?;
            }
            ReviewDecision::RegenerateAll => {
                state.selected_meal_to_change = None;
                state.feedback = None;
                state.retry_count = 0;
                state.transition(Stage::GenerateBatch)?;
            }
        }
        state.review_decision = Some(decision);

        self.run(state, cancel).await
    }

    /// Execute stages until the session suspends for review or completes.
    ///
    /// Cancellation is observed between stages and while waiting on
    /// generation; an interrupted session keeps its current stage and can
    /// be run again.
    pub async fn run(
        &self,
        state: &mut WorkflowState,
        cancel: CancellationToken,
    ) -> Result<Phase, WorkflowError> {
        loop {
            if cancel.is_cancelled() {
                tracing::info!(session_id = %state.session_id, stage = %state.stage, "planning interrupted");
                return Err(WorkflowError::Interrupted);
            }

            match state.stage {
                Stage::Calculate => self.calculate(state)?,
                Stage::GenerateBatch => self.generate_all(state, &cancel).await?,
                Stage::RegenerateMeal => self.generate_one(state, &cancel).await?,
                Stage::Validate => self.validate(state)?,
                Stage::Finalize => self.finalize(state)?,
                Stage::AwaitReview => {
                    tracing::info!(
                        session_id = %state.session_id,
                        meals = state.meals.len(),
                        errors = state.validation_errors.len(),
                        "awaiting review"
                    );
                    return Ok(Phase::AwaitingReview);
                }
                Stage::Done => return Ok(Phase::Completed),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    fn calculate(&self, state: &mut WorkflowState) -> Result<(), WorkflowError> {
        let targets = compute_targets(&state.profile)?;
        let budget = distribute_calories(targets.target_calories, state.profile.number_of_meals)?;
        tracing::info!(
            session_id = %state.session_id,
            target_calories = targets.target_calories,
            meals = budget.len(),
            "targets calculated"
        );
        state.targets = Some(targets);
        state.budget = Some(budget);
        state.transition(Stage::GenerateBatch)
    }

    async fn generate_all(
        &self,
        state: &mut WorkflowState,
        cancel: &CancellationToken,
    ) -> Result<(), WorkflowError> {
        let (targets, budget) = match (&state.targets, &state.budget) {
            (Some(t), Some(b)) => (t, b),
            _ => return Err(WorkflowError::MissingState("targets")),
        };
        let batch = cancellable(
            cancel,
            generate_batch(&self.recipes, &state.profile, targets, budget),
        )
        .await??;

        tracing::info!(
            session_id = %state.session_id,
            meals = batch.meals.len(),
            failed = batch.errors.len(),
            "meal batch generated"
        );
        state.meals = batch.meals;
        state.generation_errors = batch.errors;
        state.lookup_warnings = batch.lookup_warnings;
        state.selected_meal_to_change = None;
        state.feedback = None;
        state.transition(Stage::Validate)
    }

    async fn generate_one(
        &self,
        state: &mut WorkflowState,
        cancel: &CancellationToken,
    ) -> Result<(), WorkflowError> {
        let meal_time = state
            .selected_meal_to_change
            .ok_or(WorkflowError::MissingState("meal to regenerate"))?;
        let (targets, budget) = match (&state.targets, &state.budget) {
            (Some(t), Some(b)) => (t, b),
            _ => return Err(WorkflowError::MissingState("targets")),
        };
        let outcome = cancellable(
            cancel,
            regenerate_meal(
                &self.recipes,
                &state.profile,
                targets,
                budget,
                meal_time,
                state.feedback.clone(),
            ),
        )
        .await??
        .ok_or(WorkflowError::MissingState("budget slot for selected meal"))?;

        if let Some(meal) = outcome.meal {
            state.replace_meal(meal);
        }
        match outcome.error {
            Some(error) => {
                tracing::warn!(meal_time = %meal_time, error = %error, "meal regeneration incomplete");
                state.generation_errors.insert(meal_time, error);
            }
            None => {
                state.generation_errors.remove(&meal_time);
            }
        }
        match outcome.lookup_warnings {
            Some(warnings) => {
                state.lookup_warnings.insert(meal_time, warnings);
            }
            None => {
                state.lookup_warnings.remove(&meal_time);
            }
        }
        state.selected_meal_to_change = None;
        state.feedback = None;
        state.transition(Stage::Validate)
    }

    fn validate(&self, state: &mut WorkflowState) -> Result<(), WorkflowError> {
        let snapshot = PlanSnapshot {
            profile: &state.profile,
            targets: state.targets.as_ref(),
            budget: state.budget.as_ref(),
            meals: &state.meals,
        };
        let outcome = validate(&snapshot, state.retry_count, self.config());

        tracing::info!(
            session_id = %state.session_id,
            errors = outcome.errors.len(),
            retry_count = outcome.retry_count,
            route = %outcome.route,
            "validation finished"
        );

        state.validation_errors = outcome.errors;
        state.notices = outcome.notices;
        state.retry_count = outcome.retry_count;
        state.selected_meal_to_change = outcome.selected_meal_to_change;
        state.feedback = outcome.feedback;
        state.draft_plan = outcome.draft_plan;
        state.review_decision = None;

        let next = match outcome.route {
            Route::RegenerateMeal => Stage::RegenerateMeal,
            Route::RegenerateAll => Stage::GenerateBatch,
            Route::Review => Stage::AwaitReview,
        };
        state.transition(next)
    }

    fn finalize(&self, state: &mut WorkflowState) -> Result<(), WorkflowError> {
        let plan = match state.draft_plan.take() {
            Some(plan) => plan,
            None => {
                let targets = state
                    .targets
                    .as_ref()
                    .ok_or(WorkflowError::MissingState("targets"))?;
                tracing::warn!(
                    session_id = %state.session_id,
                    errors = state.validation_errors.len(),
                    "finalizing plan approved despite validation errors"
                );
                assemble_plan(&state.profile, targets, &state.meals)
            }
        };
        tracing::info!(
            session_id = %state.session_id,
            total_calories = plan.total_calories,
            items = plan.shopping_list.len(),
            "plan finalized"
        );
        state.final_plan = Some(plan);
        state.transition(Stage::Done)
    }
}

/// Await `fut` unless `cancel` fires first.
async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, WorkflowError> {
    tokio::select! {
        output = fut => Ok(output),
        _ = cancel.cancelled() => Err(WorkflowError::Interrupted),
    }
}
