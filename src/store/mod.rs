//! Record store boundary.
//!
//! The engine only ever reads through [`Catalog`]. [`Dataset`] is the
//! in-memory tables, [`MemoryStore`] wraps them with validated, atomic writes
//! and the shopping list archive.

pub mod data_loader;
pub mod dataset;
pub mod defaults;
pub mod memory;

use serde::{Deserialize, Serialize};

use crate::model::{
    Ingredient, IngredientId, Recipe, RecipeId, RecipeItem, SizeEstimationRule, SizeQualifier,
    Unit, UnitId,
};

pub use data_loader::load_dataset_dir;
pub use dataset::Dataset;
pub use defaults::DefaultCatalogue;
pub use memory::{MemoryStore, ShoppingListSnapshot};

/// Read queries the engine needs from the record store.
pub trait Catalog {
    fn unit(&self, id: UnitId) -> Option<&Unit>;
    fn unit_by_name(&self, name: &str) -> Option<&Unit>;
    fn ingredient(&self, id: IngredientId) -> Option<&Ingredient>;
    /// Factor of the rule `(ingredient, from -> to)`, if one exists.
    fn conversion_factor(&self, ingredient: IngredientId, from: UnitId, to: UnitId) -> Option<f64>;
    fn size_rules(&self, ingredient: IngredientId) -> &[SizeEstimationRule];
    fn recipe(&self, id: RecipeId) -> Option<&Recipe>;
    fn recipe_items(&self, id: RecipeId) -> &[RecipeItem];
}

/// Full recipe record as submitted on create or update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDraft {
    pub name: String,
    /// Ignored on update: the flag is fixed at creation.
    #[serde(default)]
    pub is_sub_recipe: bool,
    pub yield_quantity: f64,
    pub yield_unit: UnitId,
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub items: Vec<RecipeItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionDraft {
    pub from_unit: UnitId,
    pub to_unit: UnitId,
    pub factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeRuleDraft {
    pub qualifier: SizeQualifier,
    pub reference_unit: UnitId,
    pub reference_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientDraft {
    pub name: String,
    pub ingredient_type: String,
    pub shopping_unit: UnitId,
    #[serde(default)]
    pub conversion_rules: Vec<ConversionDraft>,
    #[serde(default)]
    pub size_rules: Vec<SizeRuleDraft>,
    /// Fill in rules from the built-in catalogue when none are given.
    #[serde(default)]
    pub use_default_conversions: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRef {
    pub id: RecipeId,
    pub name: String,
}

/// Outcome of a recipe deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedRecipe {
    pub id: RecipeId,
    pub name: String,
    pub was_sub_recipe: bool,
    /// Recipes that lost an item because they used the deleted one.
    pub referencing_recipes: Vec<RecipeRef>,
}
