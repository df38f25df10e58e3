//! Deterministic plan validation and retry routing.
//!
//! Validation never calls out to a model. It checks the day total against
//! the calorie target, every meal against its budget slot, the meal count
//! against the profile, and then decides where the workflow goes next:
//! regenerate a single meal, regenerate the whole day, or hand over to the
//! reviewer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::calculation::MealBudget;
use crate::config::PlannerConfig;
use crate::generation::recipe::deviation;
use crate::models::{
    DietPlan, Macronutrients, Meal, MealNotice, MealTime, NutritionalTargets, Severity,
    UserProfile, diet_type_label,
};
use crate::shopping::shopping_list_for;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Read-only view of the plan under validation.
#[derive(Debug, Clone, Copy)]
pub struct PlanSnapshot<'a> {
    pub profile: &'a UserProfile,
    pub targets: Option<&'a NutritionalTargets>,
    pub budget: Option<&'a MealBudget>,
    pub meals: &'a [Meal],
}

/// Where the workflow goes after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Regenerate only the meal named in the routing hints.
    RegenerateMeal,
    /// Regenerate every meal.
    RegenerateAll,
    /// Suspend for human review.
    Review,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegenerateMeal => write!(f, "regenerate_meal"),
            Self::RegenerateAll => write!(f, "regenerate_all"),
            Self::Review => write!(f, "review"),
        }
    }
}

/// Result of the checks alone, before routing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanCheck {
    pub errors: Vec<String>,
    pub notices: Vec<MealNotice>,
    /// Meals with a budget or consistency error, with regeneration feedback.
    pub failed_meals: BTreeMap<MealTime, String>,
}

impl PlanCheck {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Everything validation changes in the workflow state.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub errors: Vec<String>,
    pub notices: Vec<MealNotice>,
    pub retry_count: u32,
    pub selected_meal_to_change: Option<MealTime>,
    pub feedback: Option<String>,
    /// Assembled plan, present only when every check passed.
    pub draft_plan: Option<DietPlan>,
    pub route: Route,
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn meal_feedback(meal: &Meal, actual: f64, budget: f64, tolerance: f64) -> String {
    let direction = if actual > budget { "over" } else { "under" };
    format!(
        "The previous version of this meal ('{title}') came to {actual:.1} kcal against a \
         budget of {budget:.1} kcal ({direction} by {pct:.1}%). Adjust ingredient quantities \
         so the total lands within {tol:.0}% of the budget.",
        title = meal.title,
        pct = deviation(actual, budget) * 100.0,
        tol = tolerance * 100.0,
    )
}

/// Run every check against `snapshot`.
pub fn check_plan(snapshot: &PlanSnapshot<'_>, config: &PlannerConfig) -> PlanCheck {
    let mut check = PlanCheck::default();

    if snapshot.meals.is_empty() {
        check.errors.push("No meals to validate".to_string());
        return check;
    }
    let Some(targets) = snapshot.targets else {
        check.errors.push("Missing nutritional targets".to_string());
        return check;
    };

    let total: f64 = snapshot.meals.iter().map(|m| m.total_calories).sum();
    let target = targets.target_calories;
    let global_error = deviation(total, target);
    if global_error > config.global_tolerance {
        check.errors.push(format!(
            "Total calories ({total:.1}) differ from target ({target:.1}) by {:.1}% \
             (max allowed: {:.0}%)",
            global_error * 100.0,
            config.global_tolerance * 100.0,
        ));
    }

    for meal in snapshot.meals {
        let ingredient_sum = meal.ingredient_kcal_sum();

        if let Some(budget) = snapshot
            .budget
            .and_then(|b| b.get(meal.meal_time))
            .filter(|b| *b > 0.0)
        {
            let meal_error = deviation(ingredient_sum, budget);
            if meal_error > config.meal_tolerance {
                check.errors.push(format!(
                    "Meal '{title}' ({slot}): ingredient kcal sum {ingredient_sum:.1} differs \
                     from budget {budget:.1} by {pct:.1}% (max allowed: {tol:.0}%)",
                    title = meal.title,
                    slot = meal.meal_time,
                    pct = meal_error * 100.0,
                    tol = config.meal_tolerance * 100.0,
                ));
                check.notices.push(MealNotice {
                    meal_time: meal.meal_time,
                    severity: Severity::Error,
                    deviation_pct: meal_error * 100.0,
                    message: format!("{:.1}% off its {budget:.1} kcal budget", meal_error * 100.0),
                });
                check.failed_meals.insert(
                    meal.meal_time,
                    meal_feedback(meal, ingredient_sum, budget, config.meal_tolerance),
                );
            } else if meal_error > config.warning_threshold {
                check.notices.push(MealNotice {
                    meal_time: meal.meal_time,
                    severity: Severity::Warning,
                    deviation_pct: meal_error * 100.0,
                    message: format!("{:.1}% off its {budget:.1} kcal budget", meal_error * 100.0),
                });
            }
        }

        if !meal.is_consistent() {
            check.errors.push(format!(
                "Meal '{title}' ({slot}): declared total {declared:.1} kcal does not match \
                 its ingredients ({ingredient_sum:.1} kcal)",
                title = meal.title,
                slot = meal.meal_time,
                declared = meal.total_calories,
            ));
            check.failed_meals.entry(meal.meal_time).or_insert_with(|| {
                format!(
                    "The previous version of this meal ('{}') declared {:.1} kcal but its \
                     ingredients add up to {ingredient_sum:.1} kcal. Make the declared total \
                     match the ingredients.",
                    meal.title, meal.total_calories,
                )
            });
        }
    }

    if let Some(budget) = snapshot.budget {
        for slot in budget.iter() {
            if !snapshot.meals.iter().any(|m| m.meal_time == slot.meal_time) {
                check.failed_meals.insert(
                    slot.meal_time,
                    format!(
                        "No meal was produced for this slot last time. Aim for {:.1} kcal.",
                        slot.calories
                    ),
                );
            }
        }
    }

    let expected = usize::from(snapshot.profile.number_of_meals);
    let actual = snapshot.meals.len();
    if actual != expected {
        check
            .errors
            .push(format!("Expected {expected} meals but got {actual}"));
    }

    check
}

/// Assemble the day plan from validated meals.
pub fn assemble_plan(
    profile: &UserProfile,
    targets: &NutritionalTargets,
    meals: &[Meal],
) -> DietPlan {
    DietPlan {
        diet_type: diet_type_label(profile.diet_type, profile.objective).to_string(),
        total_calories: meals.iter().map(|m| m.total_calories).sum(),
        macronutrients: Macronutrients::from(targets),
        daily_meals: meals.to_vec(),
        shopping_list: shopping_list_for(meals),
        day_identifier: 1,
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Validate `snapshot` and decide the next step.
///
/// Any error bumps the retry counter. A single failed meal sets routing
/// hints so only that meal is regenerated; anything else clears them and
/// the whole day is regenerated. Once the counter passes
/// `max_validation_retries` the plan goes to review regardless.
pub fn validate(
    snapshot: &PlanSnapshot<'_>,
    retry_count: u32,
    config: &PlannerConfig,
) -> ValidationOutcome {
    let check = check_plan(snapshot, config);

    if check.is_valid() {
        let draft_plan = snapshot
            .targets
            .map(|targets| assemble_plan(snapshot.profile, targets, snapshot.meals));
        tracing::info!(
            meals = snapshot.meals.len(),
            notices = check.notices.len(),
            "plan passed validation"
        );
        return ValidationOutcome {
            errors: Vec::new(),
            notices: check.notices,
            retry_count: 0,
            selected_meal_to_change: None,
            feedback: None,
            draft_plan,
            route: Route::Review,
        };
    }

    let retry_count = retry_count.saturating_add(1);
    let (selected, feedback) = if check.failed_meals.len() == 1 {
        check
            .failed_meals
            .into_iter()
            .next()
            .map_or((None, None), |(meal_time, feedback)| (Some(meal_time), Some(feedback)))
    } else {
        (None, None)
    };

    let route = if retry_count > config.max_validation_retries {
        Route::Review
    } else if selected.is_some() {
        Route::RegenerateMeal
    } else {
        Route::RegenerateAll
    };

    tracing::warn!(
        errors = check.errors.len(),
        retry_count,
        route = %route,
        selected = ?selected,
        "plan failed validation"
    );

    ValidationOutcome {
        errors: check.errors,
        notices: check.notices,
        retry_count,
        selected_meal_to_change: selected,
        feedback,
        draft_plan: None,
        route,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::calculation::MealSlot;
    use crate::models::{
        ActivityLevel, DietType, Gender, Ingredient, MacroTarget, Objective,
    };

    fn profile(number_of_meals: u8) -> UserProfile {
        UserProfile {
            age: 30,
            gender: Gender::Male,
            weight_kg: 80.0,
            height_cm: 180.0,
            activity_level: ActivityLevel::ModeratelyActive,
            objective: Objective::Maintenance,
            diet_type: DietType::Normal,
            excluded_foods: BTreeSet::new(),
            number_of_meals,
        }
    }

    fn targets() -> NutritionalTargets {
        let m = |grams, percentage| MacroTarget { grams, percentage };
        NutritionalTargets {
            bmr: 1780.0,
            tdee: 2000.0,
            target_calories: 2000.0,
            protein: m(128.0, 25.6),
            carbs: m(241.0, 48.2),
            fat: m(72.0, 26.2),
        }
    }

    fn budget() -> MealBudget {
        MealBudget::new(vec![
            MealSlot {
                meal_time: MealTime::Desayuno,
                calories: 600.0,
            },
            MealSlot {
                meal_time: MealTime::Comida,
                calories: 800.0,
            },
            MealSlot {
                meal_time: MealTime::Cena,
                calories: 600.0,
            },
        ])
    }

    fn meal(meal_time: MealTime, title: &str, ingredient_kcals: &[f64]) -> Meal {
        Meal {
            meal_time,
            title: title.to_string(),
            description: String::new(),
            total_calories: ingredient_kcals.iter().sum(),
            ingredients: ingredient_kcals
                .iter()
                .enumerate()
                .map(|(i, kcal)| Ingredient {
                    name: format!("Ingrediente {i}"),
                    quantity: "100g".into(),
                    weight_grams: 100.0,
                    kcal: *kcal,
                })
                .collect(),
            preparation: vec!["Mezclar".into()],
            alternative: None,
        }
    }

    fn run(meals: &[Meal], budget: Option<&MealBudget>, retry_count: u32) -> ValidationOutcome {
        let profile = profile(3);
        let targets = targets();
        let snapshot = PlanSnapshot {
            profile: &profile,
            targets: Some(&targets),
            budget,
            meals,
        };
        validate(&snapshot, retry_count, &PlannerConfig::default())
    }

    #[test]
    fn exact_match_builds_plan() {
        let budget = budget();
        let meals = vec![
            meal(MealTime::Desayuno, "Avena", &[400.0, 200.0]),
            meal(MealTime::Comida, "Pollo", &[500.0, 300.0]),
            meal(MealTime::Cena, "Salmón", &[600.0]),
        ];
        let outcome = run(&meals, Some(&budget), 2);
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(outcome.retry_count, 0);
        assert_eq!(outcome.route, Route::Review);
        let plan = outcome.draft_plan.expect("plan");
        assert_eq!(plan.total_calories, 2000.0);
        assert_eq!(plan.diet_type, "Balanceada");
        assert_eq!(plan.day_identifier, 1);
    }

    #[test]
    fn small_deviation_is_a_warning_notice() {
        let budget = budget();
        let meals = vec![
            meal(MealTime::Desayuno, "Avena", &[624.0]),
            meal(MealTime::Comida, "Pollo", &[800.0]),
            meal(MealTime::Cena, "Salmón", &[600.0]),
        ];
        let outcome = run(&meals, Some(&budget), 0);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.notices.len(), 1);
        assert_eq!(outcome.notices[0].severity, Severity::Warning);
        assert_eq!(outcome.notices[0].meal_time, MealTime::Desayuno);
    }

    #[test]
    fn one_meal_off_budget_selects_it() {
        let budget = budget();
        let meals = vec![
            meal(MealTime::Desayuno, "Avena", &[600.0]),
            meal(MealTime::Comida, "Pollo", &[800.0]),
            meal(MealTime::Cena, "Cena Mala", &[516.0]),
        ];
        let outcome = run(&meals, Some(&budget), 0);
        assert_eq!(outcome.errors.len(), 1, "{:?}", outcome.errors);
        assert!(outcome.errors[0].contains("Cena Mala"));
        assert!(outcome.errors[0].contains("(Cena)"));
        assert!(outcome.errors[0].contains("14.0%"));
        assert_eq!(outcome.retry_count, 1);
        assert_eq!(outcome.selected_meal_to_change, Some(MealTime::Cena));
        let feedback = outcome.feedback.expect("feedback");
        assert!(feedback.contains("516.0"));
        assert!(feedback.contains("600.0"));
        assert!(feedback.contains("under"));
        assert_eq!(outcome.route, Route::RegenerateMeal);
        assert!(outcome.draft_plan.is_none());
    }

    #[test]
    fn two_meals_off_budget_clear_hints() {
        let budget = budget();
        let meals = vec![
            meal(MealTime::Desayuno, "Avena", &[700.0]),
            meal(MealTime::Comida, "Pollo", &[800.0]),
            meal(MealTime::Cena, "Salmón", &[500.0]),
        ];
        let outcome = run(&meals, Some(&budget), 1);
        assert_eq!(outcome.errors.len(), 2);
        assert_eq!(outcome.retry_count, 2);
        assert_eq!(outcome.selected_meal_to_change, None);
        assert_eq!(outcome.feedback, None);
        assert_eq!(outcome.route, Route::RegenerateAll);
    }

    #[test]
    fn ceiling_escalates_to_review() {
        let budget = budget();
        let meals = vec![
            meal(MealTime::Desayuno, "Avena", &[600.0]),
            meal(MealTime::Comida, "Pollo", &[800.0]),
            meal(MealTime::Cena, "Cena Mala", &[516.0]),
        ];
        let outcome = run(&meals, Some(&budget), 2);
        assert_eq!(outcome.retry_count, 3);
        assert_eq!(outcome.route, Route::Review);
        assert_eq!(outcome.selected_meal_to_change, Some(MealTime::Cena));
    }

    #[test]
    fn ingredient_sum_is_checked_separately_from_declared_total() {
        let budget = budget();
        let mut inconsistent = meal(MealTime::Cena, "Cena Inconsistente", &[300.0, 100.0]);
        inconsistent.total_calories = 600.0;
        let meals = vec![
            meal(MealTime::Desayuno, "Avena", &[600.0]),
            meal(MealTime::Comida, "Pollo", &[800.0]),
            inconsistent,
        ];
        let outcome = run(&meals, Some(&budget), 0);
        let budget_errors: Vec<_> = outcome
            .errors
            .iter()
            .filter(|e| e.contains("ingredient kcal sum"))
            .collect();
        assert_eq!(budget_errors.len(), 1);
        assert!(budget_errors[0].contains("Cena Inconsistente"));
        assert!(budget_errors[0].contains("400.0"));
        assert!(budget_errors[0].contains("budget"));
        assert!(budget_errors[0].contains("33.3%"));
        assert!(outcome.errors.iter().any(|e| e.contains("declared total 600.0")));
        // Both errors concern the same meal, so only it is regenerated.
        assert_eq!(outcome.selected_meal_to_change, Some(MealTime::Cena));
    }

    #[test]
    fn missing_budget_skips_per_meal_check() {
        let meals = vec![
            meal(MealTime::Desayuno, "Avena", &[700.0]),
            meal(MealTime::Comida, "Pollo", &[700.0]),
            meal(MealTime::Cena, "Salmón", &[600.0]),
        ];
        let outcome = run(&meals, None, 0);
        assert!(outcome.errors.is_empty());
        assert!(outcome.draft_plan.is_some());
    }

    #[test]
    fn global_deviation_is_reported() {
        let meals = vec![
            meal(MealTime::Desayuno, "Avena", &[600.0]),
            meal(MealTime::Comida, "Pollo", &[800.0]),
            meal(MealTime::Cena, "Salmón", &[900.0]),
        ];
        let outcome = run(&meals, None, 0);
        assert_eq!(
            outcome.errors,
            vec!["Total calories (2300.0) differ from target (2000.0) by 15.0% (max allowed: 5%)"]
        );
        assert_eq!(outcome.route, Route::RegenerateAll);
    }

    #[test]
    fn empty_meals_and_count_mismatch() {
        let outcome = run(&[], None, 0);
        assert_eq!(outcome.errors, vec!["No meals to validate"]);

        let meals = vec![
            meal(MealTime::Desayuno, "Avena", &[1000.0]),
            meal(MealTime::Cena, "Salmón", &[1000.0]),
        ];
        let outcome = run(&meals, None, 0);
        assert_eq!(outcome.errors, vec!["Expected 3 meals but got 2"]);
    }

    #[test]
    fn missing_slot_counts_as_failed_meal() {
        let budget = budget();
        let meals = vec![
            meal(MealTime::Desayuno, "Avena", &[600.0]),
            meal(MealTime::Comida, "Pollo", &[800.0]),
        ];
        let outcome = run(&meals, Some(&budget), 0);
        assert!(outcome.errors.iter().any(|e| e == "Expected 3 meals but got 2"));
        assert_eq!(outcome.selected_meal_to_change, Some(MealTime::Cena));
        assert_eq!(outcome.route, Route::RegenerateMeal);
    }

    #[test]
    fn missing_targets_is_an_error() {
        let profile = profile(1);
        let meals = vec![meal(MealTime::ComidaUnica, "Todo", &[2000.0])];
        let snapshot = PlanSnapshot {
            profile: &profile,
            targets: None,
            budget: None,
            meals: &meals,
        };
        let outcome = validate(&snapshot, 0, &PlannerConfig::default());
        assert_eq!(outcome.errors, vec!["Missing nutritional targets"]);
    }
}
