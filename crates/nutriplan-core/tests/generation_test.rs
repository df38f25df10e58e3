//! Recipe generation and batch strategy against scripted collaborators.

use std::sync::Arc;

use nutriplan_core::backend::{ConfigError, LazyClient};
use nutriplan_core::calculation::{compute_targets, distribute_calories};
use nutriplan_core::generation::{
    GenerationError, MealGenerator, MealSpec, RecipeGenerator, generate_batch, regenerate_meal,
};
use nutriplan_core::lookup::{NutritionExtractor, NutritionLookup, SimilaritySearch};
use nutriplan_core::models::MealTime;
use nutriplan_test_utils::{
    BASE_INGREDIENT, KnowledgeBase, ScriptedGenerator, fast_config, sample_profile,
};

fn recipes(generator: Arc<ScriptedGenerator>, kb: Arc<KnowledgeBase>) -> RecipeGenerator {
    let config = fast_config();
    let lookup = Arc::new(NutritionLookup::with_clients(
        Arc::clone(&kb) as Arc<dyn SimilaritySearch>,
        kb as Arc<dyn NutritionExtractor>,
        config.lookup_settings(),
    ));
    RecipeGenerator::new(generator, lookup, config)
}

fn spec(meal_time: MealTime, target: f64) -> MealSpec {
    MealSpec {
        meal_time,
        target_calories: target,
        position: 1,
        total_meals: 3,
        is_last: false,
        consumed_calories: 0.0,
        feedback: None,
    }
}

#[tokio::test]
async fn accepted_meal_carries_resolved_calories() {
    let generator = Arc::new(ScriptedGenerator::new().with_factors(MealTime::Desayuno, &[1.03]));
    let recipes = recipes(Arc::clone(&generator), Arc::new(KnowledgeBase::default()));
    let profile = sample_profile();
    let targets = compute_targets(&profile).unwrap();

    let outcome = recipes
        .generate(&profile, &targets, &spec(MealTime::Desayuno, 500.0), 0.05)
        .await
        .unwrap();

    let meal = outcome.meal.unwrap();
    assert_eq!(outcome.error, None);
    assert_eq!(meal.total_calories, 515.0);
    assert_eq!(meal.ingredients[0].kcal, 515.0);
    assert!(meal.is_consistent());
    assert_eq!(generator.calls_for(MealTime::Desayuno), 1);
}

#[tokio::test]
async fn best_attempt_is_kept_when_none_converge() {
    let generator = Arc::new(
        ScriptedGenerator::new().with_factors(MealTime::Cena, &[1.3, 0.9, 1.2]),
    );
    let recipes = recipes(Arc::clone(&generator), Arc::new(KnowledgeBase::default()));
    let profile = sample_profile();
    let targets = compute_targets(&profile).unwrap();

    let outcome = recipes
        .generate(&profile, &targets, &spec(MealTime::Cena, 600.0), 0.05)
        .await
        .unwrap();

    assert_eq!(outcome.meal.unwrap().total_calories, 540.0);
    assert_eq!(
        outcome.error.as_deref(),
        Some("Failed after 3 attempts. Best error: 10.0%")
    );
    assert_eq!(generator.calls_for(MealTime::Cena), 3);
}

#[tokio::test]
async fn generator_failures_without_fallback_yield_no_meal() {
    let generator = Arc::new(ScriptedGenerator::new().failing(MealTime::Comida, 5));
    let recipes = recipes(Arc::clone(&generator), Arc::new(KnowledgeBase::default()));
    let profile = sample_profile();
    let targets = compute_targets(&profile).unwrap();

    let outcome = recipes
        .generate(&profile, &targets, &spec(MealTime::Comida, 700.0), 0.05)
        .await
        .unwrap();

    assert!(outcome.meal.is_none());
    assert_eq!(
        outcome.error.as_deref(),
        Some("Generation failed: scripted failure for Comida")
    );
}

#[tokio::test]
async fn missing_ingredients_surface_as_lookup_warnings() {
    let generator = Arc::new(ScriptedGenerator::new());
    let empty_kb = Arc::new(KnowledgeBase::empty());
    let recipes = recipes(generator, empty_kb);
    let profile = sample_profile();
    let targets = compute_targets(&profile).unwrap();

    let outcome = recipes
        .generate(&profile, &targets, &spec(MealTime::Desayuno, 500.0), 0.05)
        .await
        .unwrap();

    assert_eq!(outcome.meal.unwrap().total_calories, 0.0);
    assert_eq!(
        outcome.error.as_deref(),
        Some("Failed after 3 attempts. Best error: 100.0%")
    );
    assert_eq!(
        outcome.lookup_warnings,
        Some(format!("[{BASE_INGREDIENT}]: Not found in Knowledge Base."))
    );
}

#[tokio::test]
async fn unconfigured_lookup_fails_fast() {
    let generator = Arc::new(ScriptedGenerator::new());
    let config = fast_config();
    let search: LazyClient<dyn SimilaritySearch> = LazyClient::lazy("search", || async {
        Err::<Arc<dyn SimilaritySearch>, _>(ConfigError::MissingVars(vec![
            "NUTRIPLAN_CATALOG_PATH".into(),
        ]))
    });
    let extractor: LazyClient<dyn NutritionExtractor> =
        LazyClient::ready("extractor", Arc::new(KnowledgeBase::default()));
    let lookup = Arc::new(NutritionLookup::new(search, extractor, config.lookup_settings()));
    let recipes = RecipeGenerator::new(Arc::clone(&generator) as Arc<dyn MealGenerator>, lookup, config);
    let profile = sample_profile();
    let targets = compute_targets(&profile).unwrap();

    let err = recipes
        .generate(&profile, &targets, &spec(MealTime::Desayuno, 500.0), 0.05)
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Config(ConfigError::MissingVars(_))));
    assert!(err.to_string().contains("NUTRIPLAN_CATALOG_PATH"));
    assert_eq!(generator.requests().len(), 1);
}

#[tokio::test]
async fn single_slot_batch_uses_strict_tolerance() {
    // 3% off: inside the regular tolerance but outside the last-meal one.
    let generator = Arc::new(ScriptedGenerator::new().with_factors(MealTime::ComidaUnica, &[1.03]));
    let recipes = recipes(Arc::clone(&generator), Arc::new(KnowledgeBase::default()));
    let mut profile = sample_profile();
    profile.number_of_meals = 1;
    let targets = compute_targets(&profile).unwrap();
    let budget = distribute_calories(targets.target_calories, 1).unwrap();

    let batch = generate_batch(&recipes, &profile, &targets, &budget)
        .await
        .unwrap();

    assert_eq!(batch.meals.len(), 1);
    assert_eq!(generator.calls_for(MealTime::ComidaUnica), 3);
    assert!(batch.errors.contains_key(&MealTime::ComidaUnica));
    let request = &generator.requests()[0];
    assert!(request.spec.is_last);
    assert_eq!(request.spec.target_calories, targets.target_calories);
}

#[tokio::test]
async fn last_meal_absorbs_earlier_deviation() {
    let generator = Arc::new(
        ScriptedGenerator::new().with_factors(MealTime::Desayuno, &[1.04]),
    );
    let recipes = recipes(Arc::clone(&generator), Arc::new(KnowledgeBase::default()));
    let profile = sample_profile();
    let targets = compute_targets(&profile).unwrap();
    let budget = distribute_calories(targets.target_calories, 3).unwrap();

    let batch = generate_batch(&recipes, &profile, &targets, &budget)
        .await
        .unwrap();

    assert!(batch.errors.is_empty());
    let total: f64 = batch.meals.iter().map(|m| m.total_calories).sum();
    assert!((total - targets.target_calories).abs() < 0.5, "total {total}");
    let last = generator.requests().into_iter().last().unwrap();
    assert_eq!(last.spec.meal_time, MealTime::Cena);
    assert!((last.spec.consumed_calories - (1117.0 + 1432.0)).abs() < 0.11);
}

#[tokio::test]
async fn regenerate_meal_rejects_unknown_slot() {
    let generator = Arc::new(ScriptedGenerator::new());
    let recipes = recipes(Arc::clone(&generator), Arc::new(KnowledgeBase::default()));
    let profile = sample_profile();
    let targets = compute_targets(&profile).unwrap();
    let budget = distribute_calories(targets.target_calories, 3).unwrap();

    let none = regenerate_meal(&recipes, &profile, &targets, &budget, MealTime::Brunch, None)
        .await
        .unwrap();
    assert!(none.is_none());
    assert!(generator.requests().is_empty());

    let some = regenerate_meal(
        &recipes,
        &profile,
        &targets,
        &budget,
        MealTime::Comida,
        Some("más verdura".into()),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(some.meal.unwrap().total_calories, 1432.0);
    let request = &generator.requests()[0];
    assert_eq!(request.spec.position, 2);
    assert_eq!(request.spec.feedback.as_deref(), Some("más verdura"));
}
