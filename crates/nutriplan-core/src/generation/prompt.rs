//! Prompt text for meal generation.

use crate::models::{NutritionalTargets, UserProfile};

use super::MealSpec;

/// Build the generation prompt for one meal.
pub fn build_meal_prompt(
    profile: &UserProfile,
    targets: &NutritionalTargets,
    spec: &MealSpec,
    tolerance: f64,
) -> String {
    let tolerance_pct = tolerance * 100.0;
    let target = spec.target_calories;

    let mut instructions = if spec.is_last && spec.position <= 1 {
        format!(
            "CRITICAL: This is the ONLY meal of the day. It must cover the whole daily \
             target of {target:.1} kcal, so adjust ingredient quantities precisely."
        )
    } else if spec.is_last {
        format!(
            "CRITICAL: This is the LAST meal of the day. Meals 1 to {prev} already \
             account for {consumed:.1} kcal, so you must use EXACTLY the remaining \
             budget ({target:.1} kcal) to close out the daily calorie target. Adjust \
             ingredient quantities precisely to hit this number.",
            prev = spec.position.saturating_sub(1),
            consumed = spec.consumed_calories,
        )
    } else {
        format!(
            "Use the target calories ({target:.1} kcal) as your guide. Small variations \
             within +/-{tolerance_pct:.0}% are acceptable."
        )
    };
    if let Some(feedback) = spec.feedback.as_deref().filter(|f| !f.trim().is_empty()) {
        instructions.push_str("\n\nUSER FEEDBACK (must be incorporated):\n");
        instructions.push_str(feedback.trim());
    }

    let excluded = profile.excluded_foods_label();
    format!(
        "Generate a single meal recipe that fits the user's nutritional plan.

User Profile:
- Objective: {objective}
- Diet Type: {diet_type}
- Excluded Foods: {excluded}

Daily Targets:
- Calories: {daily:.1} kcal
- Protein: {protein:.1} g
- Carbs: {carbs:.1} g
- Fat: {fat:.1} g

Meal Requirements:
- Meal Time: {meal_time}
- Target Calories for THIS meal: {target:.1} kcal (+/-{tolerance_pct:.0}% tolerance)
- This is meal {position} of {total}

{instructions}

Respond with a JSON object with these fields:
- meal_time: \"{meal_time}\"
- title: short descriptive name
- description: brief overview of the meal
- total_calories: your estimate for the whole meal
- ingredients: list of {{\"name\", \"quantity\", \"weight_grams\"}} objects, where
  quantity is the display amount (e.g. \"150g\", \"1/2 unidad\") and weight_grams is
  the edible weight in grams
- preparation: ordered list of cooking steps
- alternative: optional simpler alternative, or null

IMPORTANT:
- Ingredient calories will be verified against a nutrition database
- Do NOT include any of the excluded foods: {excluded}
- Keep the meal appropriate for a {diet_type} diet
- Use metric units (grams, ml) for all quantities
",
        objective = profile.objective,
        diet_type = profile.diet_type,
        daily = targets.target_calories,
        protein = targets.protein.grams,
        carbs = targets.carbs.grams,
        fat = targets.fat.grams,
        meal_time = spec.meal_time,
        position = spec.position,
        total = spec.total_meals,
    )
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::models::{
        ActivityLevel, DietType, Gender, MacroTarget, MealTime, Objective,
    };

    fn profile() -> UserProfile {
        UserProfile {
            age: 30,
            gender: Gender::Female,
            weight_kg: 60.0,
            height_cm: 165.0,
            activity_level: ActivityLevel::LightlyActive,
            objective: Objective::FatLoss,
            diet_type: DietType::Keto,
            excluded_foods: BTreeSet::from(["cacahuete".to_string()]),
            number_of_meals: 3,
        }
    }

    fn targets() -> NutritionalTargets {
        let m = |grams, percentage| MacroTarget { grams, percentage };
        NutritionalTargets {
            bmr: 1320.25,
            tdee: 1815.34,
            target_calories: 1507.0,
            protein: m(94.19, 25.0),
            carbs: m(18.84, 5.0),
            fat: m(117.21, 70.0),
        }
    }

    fn spec(is_last: bool, feedback: Option<&str>) -> MealSpec {
        MealSpec {
            meal_time: MealTime::Cena,
            target_calories: 452.0,
            position: 3,
            total_meals: 3,
            is_last,
            consumed_calories: 1055.0,
            feedback: feedback.map(str::to_string),
        }
    }

    #[test]
    fn prompt_embeds_profile_and_budget() {
        let prompt = build_meal_prompt(&profile(), &targets(), &spec(false, None), 0.05);
        assert!(prompt.contains("Objective: fat_loss"));
        assert!(prompt.contains("Diet Type: keto"));
        assert!(prompt.contains("Excluded Foods: cacahuete"));
        assert!(prompt.contains("Calories: 1507.0 kcal"));
        assert!(prompt.contains("Meal Time: Cena"));
        assert!(prompt.contains("452.0 kcal (+/-5% tolerance)"));
        assert!(prompt.contains("This is meal 3 of 3"));
        assert!(!prompt.contains("LAST meal"));
        assert!(!prompt.contains("USER FEEDBACK"));
    }

    #[test]
    fn last_meal_prompt_mentions_remaining_budget() {
        let prompt = build_meal_prompt(&profile(), &targets(), &spec(true, None), 0.02);
        assert!(prompt.contains("LAST meal of the day"));
        assert!(prompt.contains("1055.0 kcal"));
        assert!(prompt.contains("+/-2% tolerance"));
    }

    #[test]
    fn feedback_is_appended() {
        let prompt = build_meal_prompt(
            &profile(),
            &targets(),
            &spec(false, Some("sin pescado")),
            0.05,
        );
        assert!(prompt.contains("USER FEEDBACK (must be incorporated):\nsin pescado"));
    }
}
