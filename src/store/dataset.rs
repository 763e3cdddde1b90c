use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use super::Catalog;
use crate::error::{EngineError, EngineResult};
use crate::model::{
    ConversionRule, Ingredient, IngredientId, ItemTarget, Recipe, RecipeId, RecipeItem,
    SizeEstimationRule, Unit, UnitCategory, UnitId,
};
use crate::recipe_graph::would_create_cycle;
use crate::units::default_units;

/// In-memory tables of units, ingredients, rules and recipes.
///
/// Raw `insert_*` methods do no cross-table validation; loaders call
/// [`Dataset::validate`] once everything is in place.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    units: BTreeMap<UnitId, Unit>,
    ingredients: BTreeMap<IngredientId, Ingredient>,
    conversions: HashMap<IngredientId, Vec<ConversionRule>>,
    size_rules: HashMap<IngredientId, Vec<SizeEstimationRule>>,
    recipes: BTreeMap<RecipeId, Recipe>,
    items: HashMap<RecipeId, Vec<RecipeItem>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dataset holding only the built-in unit catalogue.
    pub fn with_default_units() -> Self {
        let mut dataset = Self::new();
        for (index, (name, category)) in default_units().enumerate() {
            dataset.insert_unit(Unit {
                id: UnitId(index as u32 + 1),
                name: name.to_string(),
                category,
            });
        }
        dataset
    }

    pub fn insert_unit(&mut self, unit: Unit) {
        self.units.insert(unit.id, unit);
    }

    pub fn insert_ingredient(&mut self, ingredient: Ingredient) {
        self.ingredients.insert(ingredient.id, ingredient);
    }

    /// At most one rule per (ingredient, from-unit); a later rule replaces an earlier one.
    pub fn insert_conversion(&mut self, rule: ConversionRule) {
        let rules = self.conversions.entry(rule.ingredient).or_default();
        rules.retain(|existing| existing.from_unit != rule.from_unit);
        rules.push(rule);
    }

    /// At most one rule per (ingredient, qualifier).
    pub fn insert_size_rule(&mut self, rule: SizeEstimationRule) {
        let rules = self.size_rules.entry(rule.ingredient).or_default();
        rules.retain(|existing| existing.qualifier != rule.qualifier);
        rules.push(rule);
    }

    pub fn insert_recipe(&mut self, recipe: Recipe) {
        self.items.entry(recipe.id).or_default();
        self.recipes.insert(recipe.id, recipe);
    }

    pub fn set_recipe_items(&mut self, recipe: RecipeId, items: Vec<RecipeItem>) {
        self.items.insert(recipe, items);
    }

    pub fn push_recipe_item(&mut self, recipe: RecipeId, item: RecipeItem) {
        self.items.entry(recipe).or_default().push(item);
    }

    /// Removes a recipe, its items, and every item elsewhere that references it.
    ///
    /// Returns the removed recipe and the recipes that lost an item.
    pub fn remove_recipe(&mut self, id: RecipeId) -> Option<(Recipe, Vec<RecipeId>)> {
        let recipe = self.recipes.remove(&id)?;
        self.items.remove(&id);

        let mut referencing = Vec::new();
        for (owner, items) in self.items.iter_mut() {
            let before = items.len();
            items.retain(|item| item.target != ItemTarget::SubRecipe(id));
            if items.len() != before {
                referencing.push(*owner);
            }
        }
        referencing.sort();
        Some((recipe, referencing))
    }

    pub fn next_unit_id(&self) -> UnitId {
        UnitId(self.units.keys().next_back().map_or(1, |id| id.0 + 1))
    }

    pub fn next_ingredient_id(&self) -> IngredientId {
        IngredientId(self.ingredients.keys().next_back().map_or(1, |id| id.0 + 1))
    }

    pub fn next_recipe_id(&self) -> RecipeId {
        RecipeId(self.recipes.keys().next_back().map_or(1, |id| id.0 + 1))
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    pub fn ingredients(&self) -> impl Iterator<Item = &Ingredient> {
        self.ingredients.values()
    }

    pub fn recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.values()
    }

    pub fn conversion_rules(&self, ingredient: IngredientId) -> &[ConversionRule] {
        self.conversions
            .get(&ingredient)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn ingredient_by_name(&self, name: &str) -> Option<&Ingredient> {
        self.ingredients
            .values()
            .find(|i| i.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn recipe_by_name(&self, name: &str) -> Option<&Recipe> {
        self.recipes
            .values()
            .find(|r| r.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Looks a recipe up by numeric id first, then by name.
    pub fn resolve_recipe(&self, key: &str) -> EngineResult<&Recipe> {
        let key = key.trim();
        key.parse::<u32>()
            .ok()
            .and_then(|id| self.recipes.get(&RecipeId(id)))
            .or_else(|| self.recipe_by_name(key))
            .ok_or_else(|| EngineError::RecipeLookupFailed(key.to_string()))
    }

    pub fn unit_id(&self, name: &str) -> EngineResult<UnitId> {
        self.unit_by_name(name)
            .map(|u| u.id)
            .ok_or_else(|| EngineError::UnitNameNotFound(name.to_string()))
    }

    /// Checks every reference, every yield, and that the sub-recipe graph is acyclic.
    pub fn validate(&self) -> EngineResult<()> {
        for ingredient in self.ingredients.values() {
            self.require_unit(ingredient.shopping_unit)?;
        }
        for (ingredient, rules) in &self.conversions {
            self.require_ingredient(*ingredient)?;
            for rule in rules {
                self.require_unit(rule.from_unit)?;
                self.require_unit(rule.to_unit)?;
                if !(rule.factor.is_finite() && rule.factor > 0.0) {
                    return Err(EngineError::InvalidQuantity {
                        context: format!("conversion factor of ingredient {}", ingredient),
                        quantity: rule.factor,
                    });
                }
            }
        }
        for (ingredient, rules) in &self.size_rules {
            self.require_ingredient(*ingredient)?;
            for rule in rules {
                self.require_unit(rule.reference_unit)?;
                if !(rule.reference_value.is_finite() && rule.reference_value > 0.0) {
                    return Err(EngineError::InvalidQuantity {
                        context: format!("size reference value of ingredient {}", ingredient),
                        quantity: rule.reference_value,
                    });
                }
            }
        }
        for recipe in self.recipes.values() {
            let yield_unit = self.require_unit(recipe.yield_unit)?;
            if !(recipe.yield_quantity.is_finite() && recipe.yield_quantity > 0.0) {
                return Err(EngineError::InvalidYield {
                    recipe: recipe.name.clone(),
                    quantity: recipe.yield_quantity,
                });
            }
            if recipe.is_sub_recipe && yield_unit.category == UnitCategory::Special {
                return Err(EngineError::SpecialYieldUnit {
                    recipe: recipe.name.clone(),
                    unit: yield_unit.name.clone(),
                });
            }
        }
        for (owner, items) in &self.items {
            if !self.recipes.contains_key(owner) {
                return Err(EngineError::RecipeNotFound(*owner));
            }
            for item in items {
                if !(item.quantity.is_finite() && item.quantity > 0.0) {
                    return Err(EngineError::InvalidQuantity {
                        context: format!("item of recipe {}", owner),
                        quantity: item.quantity,
                    });
                }
                self.require_unit(item.unit)?;
                match item.target {
                    ItemTarget::Ingredient(id) => {
                        self.require_ingredient(id)?;
                    }
                    ItemTarget::SubRecipe(child) => {
                        if !self.recipes.contains_key(&child) {
                            return Err(EngineError::RecipeNotFound(child));
                        }
                        // An existing edge owner -> child closes a cycle iff child reaches owner.
                        if would_create_cycle(self, *owner, child) {
                            return Err(EngineError::CircularReference {
                                parent: *owner,
                                child,
                            });
                        }
                    }
                }
            }
        }

        let orphaned_sizes = self
            .size_rules
            .keys()
            .filter(|id| self.conversion_rules(**id).is_empty())
            .count();
        if orphaned_sizes > 0 {
            warn!(
                count = orphaned_sizes,
                "Ingredients have size rules but no conversion rules"
            );
        }
        Ok(())
    }

    fn require_unit(&self, id: UnitId) -> EngineResult<&Unit> {
        self.units.get(&id).ok_or(EngineError::UnitNotFound(id))
    }

    fn require_ingredient(&self, id: IngredientId) -> EngineResult<&Ingredient> {
        self.ingredients
            .get(&id)
            .ok_or(EngineError::IngredientNotFound(id))
    }
}

impl Catalog for Dataset {
    fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    fn unit_by_name(&self, name: &str) -> Option<&Unit> {
        let name = name.trim();
        self.units.values().find(|u| u.name.eq_ignore_ascii_case(name))
    }

    fn ingredient(&self, id: IngredientId) -> Option<&Ingredient> {
        self.ingredients.get(&id)
    }

    fn conversion_factor(&self, ingredient: IngredientId, from: UnitId, to: UnitId) -> Option<f64> {
        self.conversion_rules(ingredient)
            .iter()
            .find(|rule| rule.from_unit == from && rule.to_unit == to)
            .map(|rule| rule.factor)
    }

    fn size_rules(&self, ingredient: IngredientId) -> &[SizeEstimationRule] {
        self.size_rules
            .get(&ingredient)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn recipe(&self, id: RecipeId) -> Option<&Recipe> {
        self.recipes.get(&id)
    }

    fn recipe_items(&self, id: RecipeId) -> &[RecipeItem] {
        self.items.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }
}
