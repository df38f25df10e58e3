//! Stateless CLI handlers: `nutriplan targets` and `nutriplan shopping`.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use nutriplan_core::calculation::{MealBudget, compute_targets, distribute_calories};
use nutriplan_core::models::{NutritionalTargets, UserProfile, diet_type_label, parse_profile_toml};
use nutriplan_core::shopping::consolidate_shopping_list;

/// Read and validate a profile TOML file.
pub fn read_profile(path: &Path) -> Result<UserProfile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile file: {}", path.display()))?;
    parse_profile_toml(&content)
        .with_context(|| format!("failed to parse profile file: {}", path.display()))
}

#[derive(Debug, Serialize)]
struct TargetsReport {
    diet_type: &'static str,
    targets: NutritionalTargets,
    meal_budget: MealBudget,
}

// -----------------------------------------------------------------------
// nutriplan targets --profile <file>
// -----------------------------------------------------------------------

pub fn run_targets(profile_path: &Path, json: bool) -> Result<()> {
    let profile = read_profile(profile_path)?;
    let targets = compute_targets(&profile).context("failed to compute targets")?;
    let meal_budget = distribute_calories(targets.target_calories, profile.number_of_meals)
        .context("failed to distribute calories")?;

    let report = TargetsReport {
        diet_type: diet_type_label(profile.diet_type, profile.objective),
        targets,
        meal_budget,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print!("{}", render_targets(&report));
    Ok(())
}

fn render_targets(report: &TargetsReport) -> String {
    let t = &report.targets;
    let mut out = String::new();
    out.push_str(&format!("Diet:     {}\n", report.diet_type));
    out.push_str(&format!("BMR:      {:.2} kcal\n", t.bmr));
    out.push_str(&format!("TDEE:     {:.2} kcal\n", t.tdee));
    out.push_str(&format!("Target:   {:.0} kcal\n", t.target_calories));
    out.push('\n');
    out.push_str(&format!("{:<10} {:>10} {:>8}\n", "MACRO", "GRAMS", "PCT"));
    for (name, m) in [("protein", t.protein), ("carbs", t.carbs), ("fat", t.fat)] {
        out.push_str(&format!(
            "{:<10} {:>10.2} {:>7.2}%\n",
            name, m.grams, m.percentage
        ));
    }
    out.push('\n');
    out.push_str(&format!("{:<22} {:>8}\n", "MEAL", "KCAL"));
    for slot in report.meal_budget.iter() {
        out.push_str(&format!(
            "{:<22} {:>8.0}\n",
            slot.meal_time.label(),
            slot.calories
        ));
    }
    out
}

// -----------------------------------------------------------------------
// nutriplan shopping <items...>
// -----------------------------------------------------------------------

pub fn run_shopping(items: &[String]) {
    for line in consolidate_shopping_list(items) {
        println!("{line}");
    }
}
