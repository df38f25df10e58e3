//! Shopping list consolidation.
//!
//! Free-form ingredient lines (`200g Pollo`, `Avena 80g`, `Limón 1/2 unidad`)
//! are parsed into quantity, unit and name, normalized to grams, millilitres
//! or units, and summed per (name, unit).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Meal, ShoppingListItem};

/// Bucket for lines without a recognizable quantity.
pub const MISC_UNIT: &str = "varios";
/// Quantity shown for [`MISC_UNIT`] items.
pub const UNSPECIFIED_QUANTITY: &str = "cantidad no especificada";

const KNOWN_UNITS: &str = r"(?:gramos|kilogramos|kilos|litros|unidades|unidad|gr|kg|ml|g|l)";

static QTY_UNIT_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)(?P<qty>\d+(?:\.\d+)?)\s*(?P<unit>{KNOWN_UNITS})\b")).ok()
});

static FRACTION_UNIT_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)(?P<num>\d+)\s*/\s*(?P<den>\d+)\s*(?P<unit>{KNOWN_UNITS})\b"
    ))
    .ok()
});

static EMPTY_PARENS_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\(\s*\)").ok());
static TRAILING_NOTE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)\s*$").ok());
static LEADING_DE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)^\s*de\s+").ok());
static TRAILING_DE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)\s+de\s*$").ok());
static WHITESPACE_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\s+").ok());

/// One ingredient line broken into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedIngredient {
    pub quantity: f64,
    pub unit: String,
    pub name: String,
}

fn replace_all(re: &LazyLock<Option<Regex>>, text: &str, with: &str) -> String {
    match re.as_ref() {
        Some(re) => re.replace_all(text, with).into_owned(),
        None => text.to_string(),
    }
}

fn normalize_unit(raw_unit: &str, quantity: f64) -> (f64, String) {
    let unit = raw_unit.to_lowercase();
    match unit.as_str() {
        "kg" | "kilos" | "kilogramos" => (quantity * 1000.0, "g".into()),
        "g" | "gr" | "gramos" => (quantity, "g".into()),
        "l" | "litros" => (quantity * 1000.0, "ml".into()),
        "ml" => (quantity, "ml".into()),
        "unidad" | "unidades" => (quantity, "unidad/es".into()),
        _ => (quantity, unit),
    }
}

fn clean_item_name(name: &str) -> String {
    let name = replace_all(&EMPTY_PARENS_RE, name, "");
    let name = replace_all(&TRAILING_NOTE_RE, &name, "");
    let name = replace_all(&LEADING_DE_RE, &name, "");
    let name = replace_all(&TRAILING_DE_RE, &name, "");
    replace_all(&WHITESPACE_RE, &name, " ").trim().to_string()
}

fn without_span(text: &str, start: usize, end: usize) -> String {
    format!("{}{}", &text[..start], &text[end..])
}

/// Split an ingredient line into quantity, normalized unit and clean name.
///
/// A fraction followed by a unit is tried first so the numerator is not
/// taken as a whole quantity; then a number followed by a unit anywhere in
/// the line. Lines with neither land in the [`MISC_UNIT`] bucket.
pub fn parse_ingredient(raw: &str) -> ParsedIngredient {
    let text = raw.trim();

    if let Some(caps) = FRACTION_UNIT_RE.as_ref().and_then(|re| re.captures(text)) {
        let num: f64 = caps["num"].parse().unwrap_or(0.0);
        let den: f64 = caps["den"].parse().unwrap_or(0.0);
        let quantity = if den == 0.0 { num } else { num / den };
        let (quantity, unit) = normalize_unit(&caps["unit"], quantity);
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let name = clean_item_name(&without_span(text, whole.start, whole.end));
        return ParsedIngredient {
            quantity,
            unit,
            name: name.to_lowercase(),
        };
    }

    if let Some(caps) = QTY_UNIT_RE.as_ref().and_then(|re| re.captures(text)) {
        let quantity: f64 = caps["qty"].parse().unwrap_or(0.0);
        let (quantity, unit) = normalize_unit(&caps["unit"], quantity);
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let name = clean_item_name(&without_span(text, whole.start, whole.end));
        return ParsedIngredient {
            quantity,
            unit,
            name: name.to_lowercase(),
        };
    }

    ParsedIngredient {
        quantity: 0.0,
        unit: MISC_UNIT.to_string(),
        name: clean_item_name(text).to_lowercase(),
    }
}

/// Capitalize the first letter of every word, lowercase the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if prev_alpha {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

/// Render a quantity without trailing zeros (`3`, `0.5`, `1500`).
fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 && quantity.abs() < 1e15 {
        return format!("{quantity:.0}");
    }
    let s = format!("{quantity:.6}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn format_amount(quantity: f64, unit: &str) -> String {
    let sep = if unit.chars().count() > 2 { " " } else { "" };
    format!("{}{sep}{unit}", format_quantity(quantity))
}

/// Consolidate raw ingredient lines into sorted shopping-list lines.
///
/// Output lines look like `- Pechuga De Pollo: 350g` or, for items without
/// a quantity, `- Sal Al Gusto`.
pub fn consolidate_shopping_list<S: AsRef<str>>(ingredients: &[S]) -> Vec<String> {
    let mut totals: BTreeMap<(String, String), f64> = BTreeMap::new();

    for raw in ingredients {
        let raw = raw.as_ref();
        let mut parsed = parse_ingredient(raw);
        if parsed.name.is_empty() {
            parsed.name = raw.trim().to_lowercase();
        }
        let increment = if parsed.unit == MISC_UNIT { 1.0 } else { parsed.quantity };
        *totals.entry((parsed.name, parsed.unit)).or_insert(0.0) += increment;
    }

    let mut lines: Vec<String> = totals
        .into_iter()
        .map(|((name, unit), quantity)| {
            if unit == MISC_UNIT {
                format!("- {}", title_case(&name))
            } else {
                format!("- {}: {}", title_case(&name), format_amount(quantity, &unit))
            }
        })
        .collect();
    lines.sort();
    lines
}

/// Parse `- Food: quantity` lines into items. Lines without a quantity get
/// [`UNSPECIFIED_QUANTITY`]; anything not starting with `- ` is skipped.
pub fn parse_shopping_lines<S: AsRef<str>>(lines: &[S]) -> Vec<ShoppingListItem> {
    lines
        .iter()
        .filter_map(|line| {
            let body = line.as_ref().trim().strip_prefix("- ")?;
            let (food, quantity) = match body.split_once(": ") {
                Some((food, quantity)) => (food.trim(), quantity.trim()),
                None => (body.trim(), UNSPECIFIED_QUANTITY),
            };
            (!food.is_empty()).then(|| ShoppingListItem {
                food: food.to_string(),
                quantity: quantity.to_string(),
            })
        })
        .collect()
}

/// Consolidated shopping list for a set of meals.
pub fn shopping_list_for(meals: &[Meal]) -> Vec<ShoppingListItem> {
    let raw: Vec<String> = meals
        .iter()
        .flat_map(|m| m.ingredients.iter().map(|i| i.shopping_line()))
        .collect();
    parse_shopping_lines(&consolidate_shopping_list(&raw))
}
