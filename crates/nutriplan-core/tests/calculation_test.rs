//! Invariant sweeps over the deterministic calculations.

use nutriplan_core::calculation::{CalculationError, compute_targets, distribute_calories};
use nutriplan_core::models::{
    ActivityLevel, DietType, Gender, MealTime, Objective, UserProfile,
};
use nutriplan_core::shopping::consolidate_shopping_list;
use nutriplan_test_utils::sample_profile;

fn profiles() -> Vec<UserProfile> {
    let mut out = Vec::new();
    for gender in [Gender::Male, Gender::Female] {
        for activity_level in ActivityLevel::ALL {
            for objective in Objective::ALL {
                for diet_type in [DietType::Normal, DietType::Keto] {
                    for (age, weight_kg, height_cm) in [
                        (18, 30.0, 100.0),
                        (25, 80.0, 180.0),
                        (47, 62.5, 165.0),
                        (100, 300.0, 250.0),
                    ] {
                        out.push(UserProfile {
                            age,
                            gender,
                            weight_kg,
                            height_cm,
                            activity_level,
                            objective,
                            diet_type,
                            excluded_foods: Default::default(),
                            number_of_meals: 3,
                        });
                    }
                }
            }
        }
    }
    out
}

#[test]
fn computed_targets_always_satisfy_their_invariants() {
    for profile in profiles() {
        match compute_targets(&profile) {
            Ok(targets) => {
                assert!(targets.tdee >= targets.bmr, "{profile:?}");
                let sum =
                    targets.protein.percentage + targets.carbs.percentage + targets.fat.percentage;
                assert!((sum - 100.0).abs() <= 1.0, "sum {sum} for {profile:?}");
                assert_eq!(targets.target_calories, targets.target_calories.round());
            }
            // Body-weight-indexed macros can outgrow a small calorie target.
            Err(CalculationError::Inconsistent(_)) => {
                assert_eq!(profile.diet_type, DietType::Normal, "{profile:?}");
            }
            Err(e) => panic!("unexpected error {e} for {profile:?}"),
        }
    }
}

#[test]
fn keto_targets_never_fail() {
    for profile in profiles()
        .into_iter()
        .filter(|p| p.diet_type == DietType::Keto)
    {
        let targets = compute_targets(&profile).unwrap();
        assert_eq!(targets.protein.percentage, 25.0);
        assert_eq!(targets.carbs.percentage, 5.0);
        assert_eq!(targets.fat.percentage, 70.0);
    }
}

#[test]
fn targets_are_deterministic() {
    for profile in profiles() {
        assert_eq!(compute_targets(&profile), compute_targets(&profile));
    }
}

#[test]
fn budgets_sum_exactly_to_the_total() {
    for meals in 1..=6u8 {
        for total in (501..10_000).step_by(37) {
            let total = f64::from(total);
            let budget = distribute_calories(total, meals).unwrap();
            assert_eq!(budget.len(), usize::from(meals));
            assert!(
                (budget.total() - total).abs() < 1e-6,
                "{meals} meals, total {total}: {}",
                budget.total()
            );
            assert!(budget.iter().all(|slot| slot.calories > 0.0));
        }
    }
}

#[test]
fn budget_bounds_are_exclusive() {
    assert!(matches!(
        distribute_calories(500.0, 3),
        Err(CalculationError::TotalCaloriesOutOfRange(_))
    ));
    assert!(matches!(
        distribute_calories(10_000.0, 3),
        Err(CalculationError::TotalCaloriesOutOfRange(_))
    ));
    assert!(matches!(
        distribute_calories(2000.0, 7),
        Err(CalculationError::MealCountOutOfRange(7))
    ));
    assert!(matches!(
        distribute_calories(2000.0, 0),
        Err(CalculationError::MealCountOutOfRange(0))
    ));
}

#[test]
fn sample_profile_budget() {
    let targets = compute_targets(&sample_profile()).unwrap();
    assert_eq!(targets.target_calories, 3581.0);
    let budget = distribute_calories(targets.target_calories, 3).unwrap();
    assert_eq!(budget.get(MealTime::Desayuno), Some(1074.0));
    assert_eq!(budget.get(MealTime::Comida), Some(1432.0));
    assert_eq!(budget.get(MealTime::Cena), Some(1075.0));
}

#[test]
fn consolidation_preserves_gram_totals() {
    for copies in 1..=8usize {
        let lines: Vec<String> = (0..copies)
            .flat_map(|i| {
                [
                    format!("{}g Arroz blanco", 50 + i * 10),
                    format!("Arroz blanco {}g", 25),
                ]
            })
            .collect();
        let expected: usize = (0..copies).map(|i| 50 + i * 10 + 25).sum();
        assert_eq!(
            consolidate_shopping_list(&lines),
            vec![format!("- Arroz Blanco: {expected}g")]
        );
    }
}
