//! CLI handlers for `nutriplan plan` subcommands.
//!
//! Implements:
//! - `nutriplan plan start`    -- open a session and run it until review
//! - `nutriplan plan resume`   -- apply a review decision and keep going
//! - `nutriplan plan continue` -- rerun an interrupted session
//! - `nutriplan plan show`     -- print the review summary or final plan
//!
//! A session lives in a JSON state file between invocations.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use nutriplan_core::backend::Services;
use nutriplan_core::models::{DietPlan, Meal};
use nutriplan_core::{Phase, Planner, ReviewPayload, WorkflowError, WorkflowState};

use crate::PlanCommands;
use crate::calc_cmds::read_profile;
use crate::config::NutriplanConfig;

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

/// Dispatch a `PlanCommands` variant to the appropriate handler.
pub async fn run_plan_command(command: PlanCommands, config: NutriplanConfig) -> Result<()> {
    match command {
        PlanCommands::Start {
            profile,
            state,
            force,
        } => {
            let planner = build_planner(config);
            cmd_start(&planner, &profile, &state, force, shutdown_token()).await
        }
        PlanCommands::Resume {
            state,
            action,
            meal_time,
            feedback,
        } => {
            let planner = build_planner(config);
            let payload = ReviewPayload {
                action,
                meal_time,
                feedback,
            };
            cmd_resume(&planner, &state, &payload, shutdown_token()).await
        }
        PlanCommands::Continue { state } => {
            let planner = build_planner(config);
            cmd_continue(&planner, &state, shutdown_token()).await
        }
        PlanCommands::Show { state, json } => cmd_show(&state, json),
    }
}

fn build_planner(config: NutriplanConfig) -> Planner {
    let services = Services::from_settings(config.services, &config.planner);
    Planner::from_services(services, config.planner)
}

/// Cancel on the first Ctrl+C; force-exit on the second.
fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let got_first_signal = Arc::new(AtomicBool::new(false));

    tokio::spawn(async move {
        loop {
            tokio::signal::ctrl_c().await.ok();
            if got_first_signal.swap(true, Ordering::SeqCst) {
                eprintln!("\nForce exit.");
                std::process::exit(130);
            }
            eprintln!("\nStopping after the current step (Ctrl+C again to force)...");
            cancel_clone.cancel();
        }
    });

    cancel
}

// -----------------------------------------------------------------------
// State file
// -----------------------------------------------------------------------

pub fn load_state(path: &Path) -> Result<WorkflowState> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read state file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse state file: {}", path.display()))
}

/// Write the state through a sibling temp file so a crash never leaves a
/// truncated session behind.
pub fn save_state(path: &Path, state: &WorkflowState) -> Result<()> {
    let contents = serde_json::to_string_pretty(state).context("failed to serialize state")?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)
        .with_context(|| format!("failed to write state file: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace state file: {}", path.display()))?;
    Ok(())
}

/// Persist `state` whatever the run produced, then report.
fn finish_run(
    state_path: &Path,
    state: &WorkflowState,
    result: Result<Phase, WorkflowError>,
) -> Result<()> {
    save_state(state_path, state)?;
    match result {
        Ok(_) => {
            print!("{}", render_state(state, state_path));
            Ok(())
        }
        Err(WorkflowError::Interrupted) => {
            println!("Session interrupted at stage {}.", state.stage);
            println!(
                "Re-run `nutriplan plan continue --state {}` to pick up where it stopped.",
                state_path.display()
            );
            std::process::exit(130);
        }
        Err(e) => Err(e).with_context(|| {
            format!(
                "planning failed at stage {} (state saved to {})",
                state.stage,
                state_path.display()
            )
        }),
    }
}

// -----------------------------------------------------------------------
// nutriplan plan start
// -----------------------------------------------------------------------

pub async fn cmd_start(
    planner: &Planner,
    profile_path: &Path,
    state_path: &Path,
    force: bool,
    cancel: CancellationToken,
) -> Result<()> {
    if state_path.exists() && !force {
        anyhow::bail!(
            "state file already exists at {}\nUse --force to overwrite.",
            state_path.display()
        );
    }
    let profile = read_profile(profile_path)?;

    let mut state = WorkflowState::new(profile);
    tracing::info!(session_id = %state.session_id, "planning session started");
    let result = planner.run(&mut state, cancel).await;
    finish_run(state_path, &state, result)
}

// -----------------------------------------------------------------------
// nutriplan plan resume
// -----------------------------------------------------------------------

pub async fn cmd_resume(
    planner: &Planner,
    state_path: &Path,
    payload: &ReviewPayload,
    cancel: CancellationToken,
) -> Result<()> {
    let mut state = load_state(state_path)?;
    let result = planner.resume(&mut state, payload, cancel).await;
    match result {
        // Rejected before anything ran; the file is left as it was.
        Err(e @ (WorkflowError::Review(_) | WorkflowError::NotAwaitingReview(_))) => {
            Err(e).context("review decision rejected")
        }
        other => finish_run(state_path, &state, other),
    }
}

// -----------------------------------------------------------------------
// nutriplan plan continue
// -----------------------------------------------------------------------

pub async fn cmd_continue(
    planner: &Planner,
    state_path: &Path,
    cancel: CancellationToken,
) -> Result<()> {
    let mut state = load_state(state_path)?;
    if state.phase != Phase::Running {
        anyhow::bail!(
            "session {} is {}; nothing to continue",
            state.session_id,
            state.phase
        );
    }
    let result = planner.run(&mut state, cancel).await;
    finish_run(state_path, &state, result)
}

// -----------------------------------------------------------------------
// nutriplan plan show
// -----------------------------------------------------------------------

pub fn cmd_show(state_path: &Path, json: bool) -> Result<()> {
    let state = load_state(state_path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        print!("{}", render_state(&state, state_path));
    }
    Ok(())
}

// -----------------------------------------------------------------------
// Rendering
// -----------------------------------------------------------------------

pub fn render_state(state: &WorkflowState, state_path: &Path) -> String {
    let mut out = String::new();
    out.push_str(&format!("Session:  {}\n", state.session_id));
    out.push_str(&format!("Phase:    {}\n", state.phase));
    out.push_str(&format!("Stage:    {}\n", state.stage));

    match (&state.phase, &state.final_plan) {
        (Phase::Completed, Some(plan)) => render_plan(&mut out, plan),
        (Phase::AwaitingReview, _) => render_review(&mut out, state, state_path),
        _ => {
            out.push_str(&format!("Meals:    {}\n", state.meals.len()));
        }
    }
    out
}

fn render_meal(out: &mut String, meal: &Meal) {
    out.push_str(&format!(
        "\n[{}] {} ({:.1} kcal)\n",
        meal.meal_time, meal.title, meal.total_calories
    ));
    for ingredient in &meal.ingredients {
        out.push_str(&format!(
            "  - {} {} ({:.1} kcal)\n",
            ingredient.quantity, ingredient.name, ingredient.kcal
        ));
    }
}

fn render_review(out: &mut String, state: &WorkflowState, state_path: &Path) {
    let request = state.review_request();

    if let Some(targets) = &request.nutritional_targets {
        out.push_str(&format!(
            "Total:    {:.1} / {:.0} kcal\n",
            state.total_calories(),
            targets.target_calories
        ));
    }
    for meal in &request.daily_meals {
        render_meal(out, meal);
    }

    let sections: [(&str, Vec<String>); 4] = [
        (
            "Generation errors",
            request
                .meal_generation_errors
                .iter()
                .map(|(mt, e)| format!("{mt}: {e}"))
                .collect(),
        ),
        ("Validation errors", request.validation_errors.clone()),
        (
            "Notices",
            request
                .notices
                .iter()
                .map(|n| format!("{} [{}]: {}", n.meal_time, n.severity, n.message))
                .collect(),
        ),
        (
            "Lookup warnings",
            request
                .lookup_warnings
                .iter()
                .map(|(mt, w)| format!("{mt}: {w}"))
                .collect(),
        ),
    ];
    for (title, lines) in sections {
        if lines.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{title}:\n"));
        for line in lines {
            out.push_str(&format!("  - {line}\n"));
        }
    }

    out.push_str("\nOptions:\n");
    for option in &request.options {
        let requires = if option.requires.is_empty() {
            String::new()
        } else {
            format!(" (requires {})", option.requires.join(", "))
        };
        out.push_str(&format!(
            "  {:<15} {}{requires}\n",
            option.action.to_string(),
            option.label
        ));
    }
    out.push_str(&format!(
        "\nResume with: nutriplan plan resume --state {} --action <option>\n",
        state_path.display()
    ));
}

fn render_plan(out: &mut String, plan: &DietPlan) {
    let m = &plan.macronutrients;
    out.push_str(&format!("Diet:     {}\n", plan.diet_type));
    out.push_str(&format!("Total:    {:.1} kcal\n", plan.total_calories));
    out.push_str(&format!(
        "Macros:   protein {:.1}g ({:.1}%), carbs {:.1}g ({:.1}%), fat {:.1}g ({:.1}%)\n",
        m.protein_grams,
        m.protein_percentage,
        m.carbs_grams,
        m.carbs_percentage,
        m.fat_grams,
        m.fat_percentage
    ));
    for meal in &plan.daily_meals {
        render_meal(out, meal);
    }
    out.push_str("\nShopping list:\n");
    for item in &plan.shopping_list {
        out.push_str(&format!("  - {}: {}\n", item.food, item.quantity));
    }
}
