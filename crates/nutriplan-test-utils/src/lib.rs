//! Shared test utilities for nutriplan integration tests.
//!
//! Provides deterministic stand-ins for the external collaborators:
//!
//! - [`ScriptedGenerator`] builds meals whose resolved calories are a
//!   scripted multiple of the requested budget.
//! - [`KnowledgeBase`] is both the similarity search and the extractor over
//!   an in-memory kcal-per-100g table.
//!
//! Meals from the generator are made of [`BASE_INGREDIENT`], which the
//! default knowledge base prices at 100 kcal per 100 g, so an ingredient
//! weighing `w` grams resolves to exactly `w` kcal.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use nutriplan_core::generation::{MealGenerator, MealRequest};
use nutriplan_core::lookup::{
    LookupError, NutritionExtractor, NutritionFacts, NutritionLookup, SimilaritySearch,
    declared_food_name,
};
use nutriplan_core::models::{
    ActivityLevel, DietType, Gender, Ingredient, Meal, MealTime, Objective, UserProfile,
};
use nutriplan_core::{Planner, PlannerConfig};

/// Ingredient every scripted meal is built from.
pub const BASE_INGREDIENT: &str = "Arroz blanco";

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// 25-year-old male, 80 kg, 180 cm, very active, muscle gain, three meals.
///
/// Targets: 3581 kcal split 1074 / 1432 / 1075.
pub fn sample_profile() -> UserProfile {
    UserProfile {
        age: 25,
        gender: Gender::Male,
        weight_kg: 80.0,
        height_cm: 180.0,
        activity_level: ActivityLevel::VeryActive,
        objective: Objective::MuscleGain,
        diet_type: DietType::Normal,
        excluded_foods: Default::default(),
        number_of_meals: 3,
    }
}

/// Planner config with no lookup backoff, for fast tests.
pub fn fast_config() -> PlannerConfig {
    PlannerConfig {
        lookup_backoff_ms: 0,
        ..PlannerConfig::default()
    }
}

/// A knowledge-base document in the catalog's format.
pub fn kb_document(name: &str, kcal_100g: f64) -> String {
    format!("Alimentos (por 100 gramos): {name}\nEnergía (kcal): {kcal_100g}")
}

/// A meal whose single ingredient carries `kcal`.
pub fn meal_with_kcal(meal_time: MealTime, title: &str, kcal: f64) -> Meal {
    Meal {
        meal_time,
        title: title.to_string(),
        description: format!("{title} de prueba"),
        total_calories: kcal,
        ingredients: vec![Ingredient {
            name: BASE_INGREDIENT.to_string(),
            quantity: format!("{kcal:.0}g"),
            weight_grams: kcal,
            kcal,
        }],
        preparation: vec!["Cocinar".to_string()],
        alternative: None,
    }
}

/// Planner wired to the given fakes.
pub fn planner(
    generator: Arc<ScriptedGenerator>,
    kb: Arc<KnowledgeBase>,
    config: PlannerConfig,
) -> Planner {
    let lookup = Arc::new(NutritionLookup::with_clients(
        Arc::clone(&kb) as Arc<dyn SimilaritySearch>,
        kb as Arc<dyn NutritionExtractor>,
        config.lookup_settings(),
    ));
    Planner::new(generator, lookup, config)
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Deterministic meal generator.
///
/// For each slot, a queue of scale factors decides how far the resolved
/// calories land from the requested budget: `1.0` hits it exactly, `0.86`
/// lands 14% under. The last factor in a queue repeats; slots with no
/// script use `1.0`.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    factors: Mutex<HashMap<MealTime, VecDeque<f64>>>,
    failures: Mutex<HashMap<MealTime, u32>>,
    requests: Mutex<Vec<MealRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the scale factors for successive calls on `meal_time`.
    pub fn with_factors(self, meal_time: MealTime, factors: &[f64]) -> Self {
        lock(&self.factors).insert(meal_time, factors.iter().copied().collect());
        self
    }

    /// Make the next `count` calls on `meal_time` fail.
    pub fn failing(self, meal_time: MealTime, count: u32) -> Self {
        lock(&self.failures).insert(meal_time, count);
        self
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<MealRequest> {
        lock(&self.requests).clone()
    }

    pub fn calls_for(&self, meal_time: MealTime) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r.spec.meal_time == meal_time)
            .count()
    }

    fn next_factor(&self, meal_time: MealTime) -> f64 {
        let mut factors = lock(&self.factors);
        match factors.get_mut(&meal_time) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(1.0),
            Some(queue) => queue.front().copied().unwrap_or(1.0),
            None => 1.0,
        }
    }

    fn should_fail(&self, meal_time: MealTime) -> bool {
        let mut failures = lock(&self.failures);
        match failures.get_mut(&meal_time) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl MealGenerator for ScriptedGenerator {
    async fn generate(&self, request: &MealRequest) -> anyhow::Result<Meal> {
        let meal_time = request.spec.meal_time;
        let call = {
            let mut requests = lock(&self.requests);
            requests.push(request.clone());
            requests.iter().filter(|r| r.spec.meal_time == meal_time).count()
        };
        tokio::task::yield_now().await;

        if self.should_fail(meal_time) {
            anyhow::bail!("scripted failure for {meal_time}");
        }

        let grams = (request.spec.target_calories * self.next_factor(meal_time) * 10.0).round() / 10.0;
        let mut meal = meal_with_kcal(meal_time, &format!("{meal_time} #{call}"), grams);
        // Generators estimate; the lookup supplies the real numbers.
        meal.total_calories = request.spec.target_calories;
        meal.ingredients[0].kcal = 0.0;
        Ok(meal)
    }
}

// ---------------------------------------------------------------------------
// Knowledge base
// ---------------------------------------------------------------------------

/// In-memory knowledge base keyed by lowercase food name.
#[derive(Debug)]
pub struct KnowledgeBase {
    table: HashMap<String, f64>,
    searches: Mutex<usize>,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::new([(BASE_INGREDIENT, 100.0)])
    }
}

impl KnowledgeBase {
    pub fn new<'a>(foods: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self {
            table: foods
                .into_iter()
                .map(|(name, kcal)| (name.to_lowercase(), kcal))
                .collect(),
            searches: Mutex::new(0),
        }
    }

    /// A knowledge base that knows no foods.
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    pub fn search_count(&self) -> usize {
        *lock(&self.searches)
    }
}

#[async_trait]
impl SimilaritySearch for KnowledgeBase {
    async fn search(&self, query: &str, _k: usize) -> Result<Vec<String>, LookupError> {
        *lock(&self.searches) += 1;
        let key = query.trim().to_lowercase();
        Ok(self
            .table
            .get_key_value(&key)
            .map(|(name, kcal)| vec![kb_document(name, *kcal)])
            .unwrap_or_default())
    }
}

#[async_trait]
impl NutritionExtractor for KnowledgeBase {
    async fn extract(
        &self,
        _ingredient: &str,
        document: &str,
    ) -> Result<NutritionFacts, LookupError> {
        let name = declared_food_name(document)
            .ok_or_else(|| LookupError::Backend("document has no food name".to_string()))?;
        let calories_100g = self
            .table
            .get(&name.trim().to_lowercase())
            .copied()
            .ok_or_else(|| LookupError::Backend(format!("unknown food {name}")))?;
        Ok(NutritionFacts {
            food_name: name.trim().to_string(),
            calories_100g,
            notes: String::new(),
        })
    }
}
