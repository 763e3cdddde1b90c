use std::collections::HashSet;
use std::slice;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::model::{IngredientId, ItemTarget, RecipeId, RecipeItem, SizeQualifier, UnitId};
use crate::store::Catalog;

/// Whether making `candidate` a sub-recipe of `parent` would close a cycle.
///
/// Walks sub-recipe edges depth first from `candidate`; true as soon as
/// `parent` is reached, including when `candidate == parent`. Shared
/// sub-recipes are visited once.
pub fn would_create_cycle<C: Catalog + ?Sized>(catalog: &C, parent: RecipeId, candidate: RecipeId) -> bool {
    let mut visited: HashSet<RecipeId> = HashSet::new();
    let mut stack = vec![candidate];

    while let Some(current) = stack.pop() {
        if current == parent {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        stack.extend(
            catalog
                .recipe_items(current)
                .iter()
                .filter_map(RecipeItem::sub_recipe_id)
                .filter(|child| !visited.contains(child)),
        );
    }
    false
}

/// A base-ingredient contribution produced by expanding a sub-recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedIngredient {
    pub ingredient: IngredientId,
    pub quantity: f64,
    pub unit: UnitId,
    pub size_qualifier: Option<SizeQualifier>,
    pub preparation_notes: Option<String>,
    /// Recipe whose item list this contribution came from.
    pub source: RecipeId,
}

struct Frame<'a> {
    recipe: RecipeId,
    items: slice::Iter<'a, RecipeItem>,
    scale: f64,
    path: HashSet<RecipeId>,
}

fn open_frame<'a, C: Catalog + ?Sized>(
    catalog: &'a C,
    recipe_id: RecipeId,
    needed_quantity: f64,
    needed_unit: UnitId,
    batch_multiplier: f64,
    path: &HashSet<RecipeId>,
) -> EngineResult<Frame<'a>> {
    if path.contains(&recipe_id) {
        return Err(EngineError::CyclicExpansion(recipe_id));
    }
    let recipe = catalog
        .recipe(recipe_id)
        .ok_or(EngineError::RecipeNotFound(recipe_id))?;
    if !(recipe.yield_quantity.is_finite() && recipe.yield_quantity > 0.0) {
        return Err(EngineError::InvalidYield {
            recipe: recipe.name.clone(),
            quantity: recipe.yield_quantity,
        });
    }
    if needed_unit != recipe.yield_unit {
        debug!(
            recipe = %recipe_id,
            needed_unit = %needed_unit,
            yield_unit = %recipe.yield_unit,
            "Scaling sub-recipe across different units without conversion"
        );
    }

    let mut branch_path = path.clone();
    branch_path.insert(recipe_id);
    Ok(Frame {
        recipe: recipe_id,
        items: catalog.recipe_items(recipe_id).iter(),
        scale: needed_quantity / recipe.yield_quantity * batch_multiplier,
        path: branch_path,
    })
}

/// Flattens a sub-recipe into the base ingredients needed for
/// `needed_quantity` of it, times `batch_multiplier`.
///
/// The yield ratio is applied numerically even when `needed_unit` differs
/// from the yield unit. Nested sub-recipes are scaled by their own yields and
/// consumed. Each branch carries its own copy of `path`, so only a recipe that
/// reappears on its own ancestry is rejected.
pub fn expand_sub_recipe<C: Catalog + ?Sized>(
    catalog: &C,
    sub_recipe: RecipeId,
    needed_quantity: f64,
    needed_unit: UnitId,
    batch_multiplier: f64,
    path: &HashSet<RecipeId>,
) -> EngineResult<Vec<ExpandedIngredient>> {
    let mut expanded = Vec::new();
    let mut stack = vec![open_frame(
        catalog,
        sub_recipe,
        needed_quantity,
        needed_unit,
        batch_multiplier,
        path,
    )?];

    while let Some(frame) = stack.last_mut() {
        let Some(item) = frame.items.next() else {
            stack.pop();
            continue;
        };
        let quantity = item.quantity * frame.scale;
        match item.target {
            ItemTarget::Ingredient(ingredient) => expanded.push(ExpandedIngredient {
                ingredient,
                quantity,
                unit: item.unit,
                size_qualifier: item.size_qualifier,
                preparation_notes: item.preparation_notes.clone(),
                source: frame.recipe,
            }),
            ItemTarget::SubRecipe(child) => {
                let child_frame = open_frame(catalog, child, quantity, item.unit, 1.0, &frame.path)?;
                stack.push(child_frame);
            }
        }
    }
    Ok(expanded)
}
