//! Per-meal calorie budgets.

use serde::{Deserialize, Serialize};

use crate::models::MealTime;

use super::{CalculationError, round_to};

/// Lower and upper (exclusive) bounds for a distributable daily total.
pub const MIN_TOTAL_CALORIES: f64 = 500.0;
pub const MAX_TOTAL_CALORIES: f64 = 10_000.0;

/// Slot/percentage pattern for each supported meal count.
fn pattern(number_of_meals: u8) -> Option<&'static [(MealTime, f64)]> {
    use MealTime::*;
    let slots: &'static [(MealTime, f64)] = match number_of_meals {
        1 => &[(ComidaUnica, 1.0)],
        2 => &[(Brunch, 0.5), (Cena, 0.5)],
        3 => &[(Desayuno, 0.3), (Comida, 0.4), (Cena, 0.3)],
        4 => &[(Desayuno, 0.25), (Comida, 0.35), (SnackPm, 0.15), (Cena, 0.25)],
        5 => &[
            (Desayuno, 0.25),
            (SnackAm, 0.10),
            (Comida, 0.35),
            (SnackPm, 0.10),
            (Cena, 0.20),
        ],
        6 => &[
            (Desayuno, 0.20),
            (SnackAm, 0.10),
            (Comida, 0.30),
            (SnackPm, 0.10),
            (Cena, 0.20),
            (Recena, 0.10),
        ],
        _ => return None,
    };
    Some(slots)
}

/// Calorie target for one meal slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MealSlot {
    pub meal_time: MealTime,
    pub calories: f64,
}

/// Ordered meal-time to calorie map. Order is the order meals are eaten.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MealBudget {
    slots: Vec<MealSlot>,
}

impl MealBudget {
    pub fn new(slots: Vec<MealSlot>) -> Self {
        Self { slots }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MealSlot> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Budget for the given slot, if the slot is part of this plan.
    pub fn get(&self, meal_time: MealTime) -> Option<f64> {
        self.slots
            .iter()
            .find(|s| s.meal_time == meal_time)
            .map(|s| s.calories)
    }

    /// Zero-based position of the slot in eating order.
    pub fn position(&self, meal_time: MealTime) -> Option<usize> {
        self.slots.iter().position(|s| s.meal_time == meal_time)
    }

    pub fn last(&self) -> Option<&MealSlot> {
        self.slots.last()
    }

    pub fn is_last(&self, meal_time: MealTime) -> bool {
        self.last().is_some_and(|s| s.meal_time == meal_time)
    }

    pub fn total(&self) -> f64 {
        self.slots.iter().map(|s| s.calories).sum()
    }
}

/// Split `total_calories` across `number_of_meals` slots.
///
/// Every slot except the last gets `round(total * pct)`; the last slot takes
/// whatever remains so the budgets add up to the total exactly.
pub fn distribute_calories(
    total_calories: f64,
    number_of_meals: u8,
) -> Result<MealBudget, CalculationError> {
    if !(total_calories > MIN_TOTAL_CALORIES && total_calories < MAX_TOTAL_CALORIES) {
        return Err(CalculationError::TotalCaloriesOutOfRange(total_calories));
    }
    let pattern =
        pattern(number_of_meals).ok_or(CalculationError::MealCountOutOfRange(number_of_meals))?;

    let mut slots = Vec::with_capacity(pattern.len());
    let mut accumulated = 0.0;
    for (i, &(meal_time, pct)) in pattern.iter().enumerate() {
        let calories = if i == pattern.len() - 1 {
            round_to(total_calories - accumulated, 1)
        } else {
            let kcal = (total_calories * pct).round();
            accumulated += kcal;
            kcal
        };
        slots.push(MealSlot {
            meal_time,
            calories,
        });
    }

    Ok(MealBudget { slots })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_meals_split_30_40_30() {
        let budget = distribute_calories(2000.0, 3).unwrap();
        let slots: Vec<_> = budget.iter().map(|s| (s.meal_time, s.calories)).collect();
        assert_eq!(
            slots,
            vec![
                (MealTime::Desayuno, 600.0),
                (MealTime::Comida, 800.0),
                (MealTime::Cena, 600.0),
            ]
        );
    }

    #[test]
    fn last_meal_absorbs_rounding_remainder() {
        let budget = distribute_calories(2333.0, 3).unwrap();
        assert_eq!(budget.get(MealTime::Desayuno), Some(700.0));
        assert_eq!(budget.get(MealTime::Comida), Some(933.0));
        assert_eq!(budget.get(MealTime::Cena), Some(700.0));
        assert_eq!(budget.total(), 2333.0);
    }

    #[test]
    fn single_meal_is_omad() {
        let budget = distribute_calories(1800.0, 1).unwrap();
        assert_eq!(budget.len(), 1);
        assert_eq!(budget.get(MealTime::ComidaUnica), Some(1800.0));
        assert!(budget.is_last(MealTime::ComidaUnica));
    }

    #[test]
    fn every_count_sums_to_total() {
        for n in 1..=6 {
            let budget = distribute_calories(2457.0, n).unwrap();
            assert_eq!(budget.len(), n as usize);
            assert!((budget.total() - 2457.0).abs() < 1e-9, "n={n}");
        }
    }

    #[test]
    fn six_meals_end_with_recena() {
        let budget = distribute_calories(3000.0, 6).unwrap();
        assert_eq!(budget.position(MealTime::SnackAm), Some(1));
        assert!(budget.is_last(MealTime::Recena));
        assert_eq!(budget.get(MealTime::Recena), Some(300.0));
    }

    #[test]
    fn rejects_out_of_range_inputs() {
        assert!(matches!(
            distribute_calories(2000.0, 0),
            Err(CalculationError::MealCountOutOfRange(0))
        ));
        assert!(matches!(
            distribute_calories(2000.0, 7),
            Err(CalculationError::MealCountOutOfRange(7))
        ));
        assert!(matches!(
            distribute_calories(500.0, 3),
            Err(CalculationError::TotalCaloriesOutOfRange(_))
        ));
        assert!(matches!(
            distribute_calories(10_000.0, 3),
            Err(CalculationError::TotalCaloriesOutOfRange(_))
        ));
    }

    #[test]
    fn budget_serializes_as_ordered_list() {
        let budget = distribute_calories(1000.0, 2).unwrap();
        let json = serde_json::to_value(&budget).unwrap();
        assert_eq!(json[0]["meal_time"], "Brunch");
        assert_eq!(json[1]["calories"], 500.0);
    }
}
