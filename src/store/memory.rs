use std::collections::HashSet;
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    Catalog, Dataset, DefaultCatalogue, DeletedRecipe, IngredientDraft, RecipeDraft, RecipeRef,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::{
    ConversionRule, Ingredient, IngredientId, ItemTarget, Recipe, RecipeId, RecipeSelection,
    ShoppingListItem, SizeEstimationRule, SnapshotId, UnitCategory,
};
use crate::recipe_aggregator::generate_shopping_list;
use crate::recipe_graph::would_create_cycle;

/// Archived list: selections and result, kept as an opaque JSON blob.
#[derive(Debug, Clone)]
struct ArchivedList {
    id: SnapshotId,
    recipe_selections: String,
    shopping_list_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingListSnapshot {
    pub id: SnapshotId,
    pub recipe_selections: Vec<RecipeSelection>,
    pub shopping_list: Vec<ShoppingListItem>,
}

/// Shared dataset with serialized writes.
///
/// Every write validates against the current graph and commits under one
/// write guard, so a concurrent writer can never slip a cycle in between the
/// check and the commit.
pub struct MemoryStore {
    data: RwLock<Dataset>,
    defaults: DefaultCatalogue,
    archive: Mutex<Vec<ArchivedList>>,
}

impl MemoryStore {
    pub fn new(data: Dataset, defaults: DefaultCatalogue) -> Self {
        MemoryStore {
            data: RwLock::new(data),
            defaults,
            archive: Mutex::new(Vec::new()),
        }
    }

    pub fn defaults(&self) -> &DefaultCatalogue {
        &self.defaults
    }

    pub fn read(&self) -> EngineResult<RwLockReadGuard<'_, Dataset>> {
        self.data.read().map_err(|_| EngineError::StorePoisoned)
    }

    fn write(&self) -> EngineResult<RwLockWriteGuard<'_, Dataset>> {
        self.data.write().map_err(|_| EngineError::StorePoisoned)
    }

    pub fn check_circular_reference(&self, parent: RecipeId, child: RecipeId) -> EngineResult<bool> {
        let data = self.read()?;
        Ok(would_create_cycle(&*data, parent, child))
    }

    pub fn create_recipe(&self, draft: RecipeDraft) -> EngineResult<RecipeId> {
        let mut data = self.write()?;
        let id = data.next_recipe_id();
        validate_recipe_draft(&data, id, &draft, draft.is_sub_recipe)?;

        data.insert_recipe(Recipe {
            id,
            name: draft.name.trim().to_string(),
            is_sub_recipe: draft.is_sub_recipe,
            yield_quantity: draft.yield_quantity,
            yield_unit: draft.yield_unit,
            page_number: draft.page_number,
        });
        data.set_recipe_items(id, draft.items);
        info!(recipe = %id, "Created recipe");
        Ok(id)
    }

    /// Replaces name, yield, page and the whole item list. `is_sub_recipe` is kept.
    pub fn update_recipe(&self, id: RecipeId, draft: RecipeDraft) -> EngineResult<()> {
        let mut data = self.write()?;
        let is_sub_recipe = data
            .recipe(id)
            .map(|r| r.is_sub_recipe)
            .ok_or(EngineError::RecipeNotFound(id))?;
        validate_recipe_draft(&data, id, &draft, is_sub_recipe)?;

        data.insert_recipe(Recipe {
            id,
            name: draft.name.trim().to_string(),
            is_sub_recipe,
            yield_quantity: draft.yield_quantity,
            yield_unit: draft.yield_unit,
            page_number: draft.page_number,
        });
        data.set_recipe_items(id, draft.items);
        info!(recipe = %id, "Updated recipe");
        Ok(())
    }

    pub fn delete_recipe(&self, id: RecipeId) -> EngineResult<DeletedRecipe> {
        let mut data = self.write()?;
        let (recipe, referencing) = data
            .remove_recipe(id)
            .ok_or(EngineError::RecipeNotFound(id))?;

        let mut referencing_recipes: Vec<RecipeRef> = referencing
            .into_iter()
            .filter_map(|rid| {
                data.recipe(rid).map(|r| RecipeRef {
                    id: r.id,
                    name: r.name.clone(),
                })
            })
            .collect();
        referencing_recipes.sort_by(|a, b| a.name.cmp(&b.name));

        info!(recipe = %id, referencing = referencing_recipes.len(), "Deleted recipe");
        Ok(DeletedRecipe {
            id,
            name: recipe.name,
            was_sub_recipe: recipe.is_sub_recipe,
            referencing_recipes,
        })
    }

    pub fn create_ingredient(&self, draft: IngredientDraft) -> EngineResult<IngredientId> {
        let mut data = self.write()?;
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(EngineError::InvalidQuantity {
                context: "ingredient name (empty)".to_string(),
                quantity: 0.0,
            });
        }
        if data.ingredient_by_name(&name).is_some() {
            return Err(EngineError::DuplicateName {
                kind: "ingredient",
                name,
            });
        }
        let shopping_unit = data
            .unit(draft.shopping_unit)
            .cloned()
            .ok_or(EngineError::UnitNotFound(draft.shopping_unit))?;

        let mut conversions = draft.conversion_rules;
        let mut sizes = draft.size_rules;
        if conversions.is_empty() && draft.use_default_conversions {
            let (default_conversions, default_sizes) =
                self.defaults.rules_for(&*data, &name, &shopping_unit);
            if !default_conversions.is_empty() {
                debug!(ingredient = %name, rules = default_conversions.len(), "Applying default conversions");
                conversions = default_conversions;
                sizes = default_sizes;
            }
        }
        if conversions.is_empty() {
            return Err(EngineError::NoConversionRules { ingredient: name });
        }

        let mut from_units = HashSet::new();
        for rule in &conversions {
            if !from_units.insert(rule.from_unit) {
                return Err(EngineError::DuplicateConversionRule {
                    ingredient: name,
                    from_unit: rule.from_unit,
                });
            }
            for unit in [rule.from_unit, rule.to_unit] {
                data.unit(unit).ok_or(EngineError::UnitNotFound(unit))?;
            }
            if !(rule.factor.is_finite() && rule.factor > 0.0) {
                return Err(EngineError::InvalidQuantity {
                    context: format!("conversion factor of '{}'", name),
                    quantity: rule.factor,
                });
            }
        }
        for size in &sizes {
            data.unit(size.reference_unit)
                .ok_or(EngineError::UnitNotFound(size.reference_unit))?;
            if !(size.reference_value.is_finite() && size.reference_value > 0.0) {
                return Err(EngineError::InvalidQuantity {
                    context: format!("size reference value of '{}'", name),
                    quantity: size.reference_value,
                });
            }
        }

        let id = data.next_ingredient_id();
        data.insert_ingredient(Ingredient {
            id,
            name,
            ingredient_type: draft.ingredient_type.trim().to_string(),
            shopping_unit: shopping_unit.id,
        });
        for rule in conversions {
            data.insert_conversion(ConversionRule {
                ingredient: id,
                from_unit: rule.from_unit,
                to_unit: rule.to_unit,
                factor: rule.factor,
            });
        }
        for size in sizes {
            data.insert_size_rule(SizeEstimationRule {
                ingredient: id,
                qualifier: size.qualifier,
                reference_unit: size.reference_unit,
                reference_value: size.reference_value,
            });
        }
        info!(ingredient = %id, "Created ingredient");
        Ok(id)
    }

    /// Recipes using any of the comma- or space-separated terms in an
    /// ingredient or sub-recipe name. An empty query lists every recipe.
    pub fn find_recipes_by_ingredients(&self, query: &str) -> EngineResult<Vec<Recipe>> {
        let data = self.read()?;
        let terms: Vec<String> = query
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        let mut found: Vec<Recipe> = data
            .recipes()
            .filter(|recipe| {
                terms.is_empty()
                    || data.recipe_items(recipe.id).iter().any(|item| {
                        let target_name = match item.target {
                            ItemTarget::Ingredient(id) => data.ingredient(id).map(|i| i.name.as_str()),
                            ItemTarget::SubRecipe(id) => data.recipe(id).map(|r| r.name.as_str()),
                        };
                        target_name.is_some_and(|name| {
                            let name = name.to_lowercase();
                            terms.iter().any(|term| name.contains(term.as_str()))
                        })
                    })
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    /// Generates a list and archives it together with its selections.
    pub fn generate_and_archive(
        &self,
        config: &EngineConfig,
        selections: &[RecipeSelection],
    ) -> EngineResult<(SnapshotId, Vec<ShoppingListItem>)> {
        let list = {
            let data = self.read()?;
            generate_shopping_list(&*data, config, selections)?
        };
        let id = self.archive_snapshot(selections, &list)?;
        Ok((id, list))
    }

    pub fn archive_snapshot(
        &self,
        selections: &[RecipeSelection],
        list: &[ShoppingListItem],
    ) -> EngineResult<SnapshotId> {
        let recipe_selections = serde_json::to_string(selections)?;
        let shopping_list_data = serde_json::to_string(list)?;
        let mut archive = self.archive.lock().map_err(|_| EngineError::StorePoisoned)?;
        let id = SnapshotId(archive.len() as u32 + 1);
        archive.push(ArchivedList {
            id,
            recipe_selections,
            shopping_list_data,
        });
        debug!(snapshot = %id, "Archived shopping list");
        Ok(id)
    }

    /// Snapshot ids, newest first.
    pub fn snapshots(&self) -> EngineResult<Vec<SnapshotId>> {
        let archive = self.archive.lock().map_err(|_| EngineError::StorePoisoned)?;
        Ok(archive.iter().rev().map(|a| a.id).collect())
    }

    pub fn snapshot(&self, id: SnapshotId) -> EngineResult<ShoppingListSnapshot> {
        let archive = self.archive.lock().map_err(|_| EngineError::StorePoisoned)?;
        let entry = archive
            .iter()
            .find(|a| a.id == id)
            .ok_or(EngineError::SnapshotNotFound(id))?;
        Ok(ShoppingListSnapshot {
            id,
            recipe_selections: serde_json::from_str(&entry.recipe_selections)?,
            shopping_list: serde_json::from_str(&entry.shopping_list_data)?,
        })
    }
}

/// Everything a recipe write must satisfy before any of it is committed.
fn validate_recipe_draft(
    data: &Dataset,
    id: RecipeId,
    draft: &RecipeDraft,
    is_sub_recipe: bool,
) -> EngineResult<()> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(EngineError::InvalidQuantity {
            context: "recipe name (empty)".to_string(),
            quantity: 0.0,
        });
    }
    if data.recipe_by_name(name).is_some_and(|r| r.id != id) {
        return Err(EngineError::DuplicateName {
            kind: "recipe",
            name: name.to_string(),
        });
    }
    if !(draft.yield_quantity.is_finite() && draft.yield_quantity > 0.0) {
        return Err(EngineError::InvalidYield {
            recipe: name.to_string(),
            quantity: draft.yield_quantity,
        });
    }
    let yield_unit = data
        .unit(draft.yield_unit)
        .ok_or(EngineError::UnitNotFound(draft.yield_unit))?;
    if is_sub_recipe && yield_unit.category == UnitCategory::Special {
        return Err(EngineError::SpecialYieldUnit {
            recipe: name.to_string(),
            unit: yield_unit.name.clone(),
        });
    }

    for item in &draft.items {
        if !(item.quantity.is_finite() && item.quantity > 0.0) {
            return Err(EngineError::InvalidQuantity {
                context: format!("item of recipe '{}'", name),
                quantity: item.quantity,
            });
        }
        data.unit(item.unit).ok_or(EngineError::UnitNotFound(item.unit))?;
        match item.target {
            ItemTarget::Ingredient(ingredient) => {
                data.ingredient(ingredient)
                    .ok_or(EngineError::IngredientNotFound(ingredient))?;
            }
            ItemTarget::SubRecipe(child) => {
                data.recipe(child).ok_or(EngineError::RecipeNotFound(child))?;
                if would_create_cycle(data, id, child) {
                    return Err(EngineError::CircularReference { parent: id, child });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecipeItem;
    use crate::store::{ConversionDraft, SizeRuleDraft};
    use crate::model::SizeQualifier;

    fn store() -> MemoryStore {
        MemoryStore::new(
            Dataset::with_default_units(),
            DefaultCatalogue::builtin().unwrap(),
        )
    }

    fn unit(store: &MemoryStore, name: &str) -> crate::model::UnitId {
        store.read().unwrap().unit_id(name).unwrap()
    }

    fn draft(name: &str, is_sub_recipe: bool, store: &MemoryStore) -> RecipeDraft {
        RecipeDraft {
            name: name.to_string(),
            is_sub_recipe,
            yield_quantity: 2.0,
            yield_unit: unit(store, "cup"),
            page_number: None,
            items: Vec::new(),
        }
    }

    #[test]
    fn test_sub_recipe_cannot_yield_servings() {
        let store = store();
        let mut sauce = draft("Sauce", true, &store);
        sauce.yield_unit = unit(&store, "serving");
        assert!(matches!(
            store.create_recipe(sauce),
            Err(EngineError::SpecialYieldUnit { .. })
        ));

        let mut dinner = draft("Dinner", false, &store);
        dinner.yield_unit = unit(&store, "serving");
        assert!(store.create_recipe(dinner).is_ok());
    }

    #[test]
    fn test_update_rejects_cycle_and_keeps_old_items() {
        let store = store();
        let cup = unit(&store, "cup");
        let b = store.create_recipe(draft("B", true, &store)).unwrap();
        let mut a_draft = draft("A", true, &store);
        a_draft.items.push(RecipeItem::sub_recipe(b, 1.0, cup));
        let a = store.create_recipe(a_draft).unwrap();

        assert!(store.check_circular_reference(b, a).unwrap());

        let onion = store
            .create_ingredient(IngredientDraft {
                name: "Onion".to_string(),
                ingredient_type: "Vegetables".to_string(),
                shopping_unit: unit(&store, "piece"),
                conversion_rules: Vec::new(),
                size_rules: Vec::new(),
                use_default_conversions: true,
            })
            .unwrap();
        let piece = unit(&store, "piece");
        let mut b_update = draft("B", true, &store);
        b_update.items.push(RecipeItem::ingredient(onion, 1.0, piece));
        b_update.items.push(RecipeItem::sub_recipe(a, 1.0, cup));
        assert!(matches!(
            store.update_recipe(b, b_update),
            Err(EngineError::CircularReference { .. })
        ));
        assert!(store.read().unwrap().recipe_items(b).is_empty());
    }

    #[test]
    fn test_update_keeps_sub_recipe_flag() {
        let store = store();
        let id = store.create_recipe(draft("Pesto", true, &store)).unwrap();
        let mut update = draft("Basil Pesto", false, &store);
        update.page_number = Some(42);
        store.update_recipe(id, update).unwrap();

        let data = store.read().unwrap();
        let recipe = data.recipe(id).unwrap();
        assert!(recipe.is_sub_recipe);
        assert_eq!(recipe.name, "Basil Pesto");
        assert_eq!(recipe.page_number, Some(42));
    }

    #[test]
    fn test_duplicate_recipe_name_rejected() {
        let store = store();
        store.create_recipe(draft("Hummus", false, &store)).unwrap();
        assert!(matches!(
            store.create_recipe(draft("hummus", false, &store)),
            Err(EngineError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_ingredient_without_rules_is_rejected() {
        let store = store();
        let result = store.create_ingredient(IngredientDraft {
            name: "Dragonfruit".to_string(),
            ingredient_type: "Fruits".to_string(),
            shopping_unit: unit(&store, "piece"),
            conversion_rules: Vec::new(),
            size_rules: Vec::new(),
            use_default_conversions: true,
        });
        assert!(matches!(result, Err(EngineError::NoConversionRules { .. })));
        assert!(store.read().unwrap().ingredient_by_name("Dragonfruit").is_none());
    }

    #[test]
    fn test_ingredient_with_explicit_rules() {
        let store = store();
        let jar = unit(&store, "jar");
        let tbsp = unit(&store, "tablespoon");
        let id = store
            .create_ingredient(IngredientDraft {
                name: "Tahini".to_string(),
                ingredient_type: "Pantry Items".to_string(),
                shopping_unit: jar,
                conversion_rules: vec![ConversionDraft {
                    from_unit: tbsp,
                    to_unit: jar,
                    factor: 1.0 / 32.0,
                }],
                size_rules: Vec::new(),
                use_default_conversions: false,
            })
            .unwrap();
        let data = store.read().unwrap();
        assert_eq!(data.conversion_factor(id, tbsp, jar), Some(1.0 / 32.0));
    }

    #[test]
    fn test_ingredient_rejects_bad_size_rule_atomically() {
        let store = store();
        let piece = unit(&store, "piece");
        let gram = unit(&store, "gram");
        let result = store.create_ingredient(IngredientDraft {
            name: "Leek".to_string(),
            ingredient_type: "Vegetables".to_string(),
            shopping_unit: piece,
            conversion_rules: vec![ConversionDraft {
                from_unit: gram,
                to_unit: piece,
                factor: 0.005,
            }],
            size_rules: vec![SizeRuleDraft {
                qualifier: SizeQualifier::Large,
                reference_unit: gram,
                reference_value: -1.0,
            }],
            use_default_conversions: false,
        });
        assert!(matches!(result, Err(EngineError::InvalidQuantity { .. })));
        assert!(store.read().unwrap().ingredient_by_name("Leek").is_none());
    }

    #[test]
    fn test_ingredient_rejects_repeated_from_unit() {
        let store = store();
        let jar = unit(&store, "jar");
        let tbsp = unit(&store, "tablespoon");
        let rule = |factor| ConversionDraft {
            from_unit: tbsp,
            to_unit: jar,
            factor,
        };
        let result = store.create_ingredient(IngredientDraft {
            name: "Tahini".to_string(),
            ingredient_type: "Pantry Items".to_string(),
            shopping_unit: jar,
            conversion_rules: vec![rule(1.0 / 32.0), rule(1.0 / 30.0)],
            size_rules: Vec::new(),
            use_default_conversions: false,
        });
        assert!(matches!(
            result,
            Err(EngineError::DuplicateConversionRule { from_unit, .. }) if from_unit == tbsp
        ));
        assert!(store.read().unwrap().ingredient_by_name("Tahini").is_none());
    }

    #[test]
    fn test_delete_reports_referencing_recipes() {
        let store = store();
        let cup = unit(&store, "cup");
        let gravy = store.create_recipe(draft("Gravy", true, &store)).unwrap();
        let mut loaf = draft("Lentil Loaf", false, &store);
        loaf.items.push(RecipeItem::sub_recipe(gravy, 1.0, cup));
        let loaf = store.create_recipe(loaf).unwrap();

        let deleted = store.delete_recipe(gravy).unwrap();
        assert!(deleted.was_sub_recipe);
        assert_eq!(deleted.referencing_recipes.len(), 1);
        assert_eq!(deleted.referencing_recipes[0].id, loaf);
        assert!(store.read().unwrap().recipe_items(loaf).is_empty());
        assert!(matches!(
            store.delete_recipe(gravy),
            Err(EngineError::RecipeNotFound(_))
        ));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let store = store();
        let id = store.create_recipe(draft("Empty", false, &store)).unwrap();
        let selections = vec![RecipeSelection::new(id, 2.0)];
        let (snapshot_id, list) = store
            .generate_and_archive(&EngineConfig::default(), &selections)
            .unwrap();
        assert!(list.is_empty());

        let snapshot = store.snapshot(snapshot_id).unwrap();
        assert_eq!(snapshot.recipe_selections, selections);
        assert_eq!(store.snapshots().unwrap(), vec![snapshot_id]);
        assert!(store.snapshot(SnapshotId(99)).is_err());
    }
}
