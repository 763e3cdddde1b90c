//! Small hand-built datasets shared by unit tests.

use crate::model::{
    ConversionRule, Ingredient, IngredientId, Recipe, RecipeId, SizeEstimationRule,
    SizeQualifier, UnitId,
};
use crate::store::Dataset;

pub struct Kitchen {
    pub data: Dataset,
}

impl Kitchen {
    pub fn new() -> Self {
        Kitchen {
            data: Dataset::with_default_units(),
        }
    }

    pub fn unit(&self, name: &str) -> UnitId {
        self.data.unit_id(name).unwrap()
    }

    pub fn ingredient(&mut self, name: &str, ingredient_type: &str, shopping_unit: &str) -> IngredientId {
        if let Some(existing) = self.data.ingredient_by_name(name) {
            return existing.id;
        }
        let id = self.data.next_ingredient_id();
        let shopping_unit = self.unit(shopping_unit);
        self.data.insert_ingredient(Ingredient {
            id,
            name: name.to_string(),
            ingredient_type: ingredient_type.to_string(),
            shopping_unit,
        });
        id
    }

    pub fn rule(&mut self, ingredient: IngredientId, from: &str, to: &str, factor: f64) {
        let rule = ConversionRule {
            ingredient,
            from_unit: self.unit(from),
            to_unit: self.unit(to),
            factor,
        };
        self.data.insert_conversion(rule);
    }

    pub fn size(&mut self, ingredient: IngredientId, qualifier: SizeQualifier, unit: &str, value: f64) {
        let rule = SizeEstimationRule {
            ingredient,
            qualifier,
            reference_unit: self.unit(unit),
            reference_value: value,
        };
        self.data.insert_size_rule(rule);
    }

    /// Onion bought by the piece, with gram-based size rules.
    pub fn onion(&mut self) -> IngredientId {
        if let Some(existing) = self.data.ingredient_by_name("Onion") {
            return existing.id;
        }
        let onion = self.ingredient("Onion", "Vegetables", "piece");
        self.rule(onion, "gram", "piece", 0.00667);
        self.rule(onion, "kilogram", "piece", 6.67);
        self.rule(onion, "cup", "piece", 1.0);
        self.rule(onion, "whole", "piece", 1.0);
        self.size(onion, SizeQualifier::Small, "gram", 100.0);
        self.size(onion, SizeQualifier::Medium, "gram", 150.0);
        self.size(onion, SizeQualifier::Large, "gram", 200.0);
        onion
    }

    /// Sub-recipes yield 2 cups, full recipes 4 servings.
    pub fn recipe(&mut self, name: &str, is_sub_recipe: bool) -> RecipeId {
        if is_sub_recipe {
            self.recipe_with_yield(name, true, 2.0, "cup")
        } else {
            self.recipe_with_yield(name, false, 4.0, "serving")
        }
    }

    pub fn recipe_with_yield(&mut self, name: &str, is_sub_recipe: bool, quantity: f64, unit: &str) -> RecipeId {
        let id = self.data.next_recipe_id();
        let yield_unit = self.unit(unit);
        self.data.insert_recipe(Recipe {
            id,
            name: name.to_string(),
            is_sub_recipe,
            yield_quantity: quantity,
            yield_unit,
            page_number: None,
        });
        id
    }
}
