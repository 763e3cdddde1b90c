use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::model::ShoppingListItem;
use crate::store::Catalog;

/// Grocery-store sections, in walking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreSection {
    Produce,
    DryBulk,
    CannedPreserved,
    Refrigerated,
    Frozen,
}

impl StoreSection {
    pub const ALL: [StoreSection; 5] = [
        StoreSection::Produce,
        StoreSection::DryBulk,
        StoreSection::CannedPreserved,
        StoreSection::Refrigerated,
        StoreSection::Frozen,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            StoreSection::Produce => "produce",
            StoreSection::DryBulk => "dry_bulk",
            StoreSection::CannedPreserved => "canned_preserved",
            StoreSection::Refrigerated => "refrigerated",
            StoreSection::Frozen => "frozen",
        }
    }

    /// Heading used in the text rendering.
    pub fn label(&self) -> &'static str {
        match self {
            StoreSection::Produce => "🥬 PRODUCE",
            StoreSection::DryBulk => "📦 DRY/BULK GOODS",
            StoreSection::CannedPreserved => "🥫 CANNED/PRESERVED",
            StoreSection::Refrigerated => "🥛 REFRIGERATED",
            StoreSection::Frozen => "❄️ FROZEN",
        }
    }
}

impl fmt::Display for StoreSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

const DRY_KEYWORDS: &[&str] = &[
    "flour", "sugar", "yeast", "oats", "rice", "quinoa", "barley", "millet", "farro", "buckwheat",
    "lentil",
];
const CANNED_MARKERS: &[&str] = &["canned", "can", "salt-free"];
const PRESERVED_KEYWORDS: &[&str] = &[
    "salt-free", "canned", "crushed", "diced", "marinara", "tahini", "molasses", "vinegar", "sauce",
];
const PRESERVED_UNITS: &[&str] = &["can", "jar", "bottle"];
const DRY_TYPES: &[&str] = &["grains", "nuts & seeds", "spices"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Store section for an ingredient. Total: unmatched ingredients land in dry/bulk.
///
/// Rules are checked in order and the first match wins, so keywords such as
/// "frozen" or "milk" in the name override the ingredient type.
pub fn classify(ingredient_name: &str, ingredient_type: &str, shopping_unit: &str) -> StoreSection {
    let name = ingredient_name.trim().to_lowercase();
    let kind = ingredient_type.trim().to_lowercase();
    let unit = shopping_unit.trim().to_lowercase();

    if name.contains("frozen") {
        return StoreSection::Frozen;
    }

    if contains_any(&name, &["milk", "tempeh", "tortilla", "miso"]) || kind == "liquids" {
        return StoreSection::Refrigerated;
    }

    // Fresh ginger and garlic are sold in produce even when typed as spices.
    if name.contains("fresh ginger") || name == "ginger" {
        return StoreSection::Produce;
    }
    if name.starts_with("garlic") && !name.contains("powder") && !name.contains("salt") {
        return StoreSection::Produce;
    }
    if kind == "vegetables" || kind == "fruits" {
        return StoreSection::Produce;
    }
    if kind == "herbs" && (name.contains("fresh") || !name.contains("dried")) {
        return StoreSection::Produce;
    }

    if name.contains("vanilla") || DRY_TYPES.contains(&kind.as_str()) || kind == "herbs" {
        return StoreSection::DryBulk;
    }
    if kind == "pantry items" && contains_any(&name, DRY_KEYWORDS) && !contains_any(&name, CANNED_MARKERS) {
        return StoreSection::DryBulk;
    }

    if kind == "pantry items"
        && (PRESERVED_UNITS.contains(&unit.as_str()) || contains_any(&name, PRESERVED_KEYWORDS))
    {
        return StoreSection::CannedPreserved;
    }
    if kind == "plant proteins" {
        return StoreSection::CannedPreserved;
    }

    StoreSection::DryBulk
}

/// A shopping list split into store sections plus the sub-recipe lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizedList {
    pub sections: BTreeMap<StoreSection, Vec<ShoppingListItem>>,
    pub sub_recipes: Vec<ShoppingListItem>,
}

impl OrganizedList {
    pub fn items(&self, section: StoreSection) -> &[ShoppingListItem] {
        self.sections.get(&section).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.sub_recipes.is_empty() && self.sections.values().all(Vec::is_empty)
    }
}

fn sort_by_name(items: &mut [ShoppingListItem]) {
    items.sort_by_cached_key(|item| item.name().to_lowercase());
}

/// Buckets a generated list by store section, each sorted by name ignoring case.
///
/// Lines whose ingredient is no longer in the catalog are dropped.
pub fn organize_by_sections<C: Catalog + ?Sized>(catalog: &C, list: &[ShoppingListItem]) -> OrganizedList {
    let mut organized = OrganizedList {
        sections: StoreSection::ALL.iter().map(|s| (*s, Vec::new())).collect(),
        sub_recipes: Vec::new(),
    };

    for item in list {
        let ShoppingListItem::Ingredient(line) = item else {
            organized.sub_recipes.push(item.clone());
            continue;
        };
        let Some(ingredient) = catalog.ingredient(line.ingredient_id) else {
            debug!(ingredient = %line.ingredient_id, "Dropping line for unknown ingredient");
            continue;
        };
        let unit_name = catalog
            .unit(ingredient.shopping_unit)
            .map(|u| u.name.as_str())
            .unwrap_or_default();
        let section = classify(&ingredient.name, &ingredient.ingredient_type, unit_name);
        organized.sections.entry(section).or_default().push(item.clone());
    }

    for items in organized.sections.values_mut() {
        sort_by_name(items);
    }
    sort_by_name(&mut organized.sub_recipes);
    organized
}
