use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::{
    ContainerDetail, IngredientId, IngredientLine, ItemTarget, RecipeId, RecipeSelection,
    ShoppingListItem, SizeEstimationRule, SizeQualifier, SubRecipeLine, UnitCategory, UnitId,
};
use crate::optim::{choose_size, round_up_purchase};
use crate::recipe_converter::{convert_to_shopping_unit, resolve_reference_value, ReferenceRequest};
use crate::store::Catalog;
use crate::units::fluid_ounces_per_unit;

const FLUID_OUNCE_LABEL: &str = "fl oz";
const FALLBACK_UNIT_NAME: &str = "unit";

/// A recipe item after the batch multiplier has been applied.
#[derive(Debug, Clone, Copy)]
struct ScaledItem {
    quantity: f64,
    unit: UnitId,
    size_qualifier: Option<SizeQualifier>,
}

#[derive(Debug, Default)]
struct Buckets {
    ingredients: BTreeMap<IngredientId, Vec<ScaledItem>>,
    sub_recipes: BTreeMap<(RecipeId, UnitId), f64>,
}

fn collect_items<C: Catalog + ?Sized>(catalog: &C, selections: &[RecipeSelection]) -> EngineResult<Buckets> {
    if selections.is_empty() {
        return Err(EngineError::EmptySelection);
    }

    let mut buckets = Buckets::default();
    for selection in selections {
        if !(selection.batches.is_finite() && selection.batches >= 0.0) {
            return Err(EngineError::InvalidBatch {
                recipe: selection.recipe_id,
                batches: selection.batches,
            });
        }
        catalog
            .recipe(selection.recipe_id)
            .ok_or(EngineError::RecipeNotFound(selection.recipe_id))?;

        for item in catalog.recipe_items(selection.recipe_id) {
            let quantity = item.quantity * selection.batches;
            match item.target {
                ItemTarget::Ingredient(id) => buckets.ingredients.entry(id).or_default().push(ScaledItem {
                    quantity,
                    unit: item.unit,
                    size_qualifier: item.size_qualifier,
                }),
                ItemTarget::SubRecipe(id) => {
                    *buckets.sub_recipes.entry((id, item.unit)).or_insert(0.0) += quantity;
                }
            }
        }
    }
    Ok(buckets)
}

/// Reference unit for size estimation: weight first, then volume, then any.
fn pick_reference_unit<C: Catalog + ?Sized>(catalog: &C, rules: &[SizeEstimationRule]) -> Option<UnitId> {
    rules
        .iter()
        .min_by_key(|rule| match catalog.unit(rule.reference_unit).map(|u| u.category) {
            Some(UnitCategory::Weight) => 0,
            Some(UnitCategory::Volume) => 1,
            _ => 2,
        })
        .map(|rule| rule.reference_unit)
}

fn aggregate_ingredient<C: Catalog + ?Sized>(
    catalog: &C,
    config: &EngineConfig,
    ingredient_id: IngredientId,
    items: &[ScaledItem],
) -> EngineResult<Option<IngredientLine>> {
    let ingredient = catalog
        .ingredient(ingredient_id)
        .ok_or(EngineError::IngredientNotFound(ingredient_id))?;
    let shopping_unit = catalog
        .unit(ingredient.shopping_unit)
        .ok_or(EngineError::UnitNotFound(ingredient.shopping_unit))?;

    let size_rules = catalog.size_rules(ingredient_id);
    let reference_unit = pick_reference_unit(catalog, size_rules);
    let is_container = config.is_container_unit(&shopping_unit.name);
    let volume_unit = catalog.unit_by_name(&config.volume_unit);
    let weight_unit = catalog.unit_by_name(&config.weight_unit);

    let mut total_shopping = 0.0;
    let mut total_reference = 0.0;
    let mut total_volume = 0.0;
    let mut total_weight = 0.0;

    for item in items {
        let Some(shopping_quantity) =
            convert_to_shopping_unit(catalog, ingredient, item.quantity, item.unit)
        else {
            debug!(
                ingredient = %ingredient.name,
                unit = %item.unit,
                quantity = item.quantity,
                "No conversion to shopping unit, skipping item"
            );
            continue;
        };
        total_shopping += shopping_quantity;

        let request = ReferenceRequest {
            ingredient,
            quantity: item.quantity,
            unit: item.unit,
            size_qualifier: item.size_qualifier,
            shopping_quantity,
        };
        if let Some(unit) = reference_unit {
            if let Some((value, path)) = resolve_reference_value(catalog, &request, unit) {
                debug!(ingredient = %ingredient.name, value, ?path, "Reference value");
                total_reference += value;
            }
        }
        if is_container {
            if let Some(unit) = volume_unit {
                if let Some((value, _)) = resolve_reference_value(catalog, &request, unit.id) {
                    total_volume += value;
                }
            }
            if let Some(unit) = weight_unit {
                if let Some((value, _)) = resolve_reference_value(catalog, &request, unit.id) {
                    total_weight += value;
                }
            }
        }
    }

    if total_shopping <= 0.0 {
        debug!(ingredient = %ingredient.name, "Nothing to buy after conversion");
        return Ok(None);
    }

    let baseline = round_up_purchase(total_shopping);
    let mut quantity = baseline;
    let mut size_qualifier = None;
    if let Some(unit) = reference_unit {
        if config.is_discrete_unit(&shopping_unit.name) && total_reference > 0.0 {
            let rules: Vec<SizeEstimationRule> = size_rules
                .iter()
                .filter(|rule| rule.reference_unit == unit)
                .cloned()
                .collect();
            match choose_size(total_reference, &rules) {
                Some(choice) if choice.count <= baseline => {
                    quantity = choice.count;
                    size_qualifier = Some(choice.qualifier);
                }
                Some(choice) => debug!(
                    ingredient = %ingredient.name,
                    sized = choice.count,
                    baseline,
                    "Size estimate needs more pieces than the plain count, using the plain count"
                ),
                None => {}
            }
        }
    }

    let container = if is_container {
        let mut detail = ContainerDetail::default();
        if total_volume > 0.0 {
            match volume_unit.and_then(|u| fluid_ounces_per_unit(&u.name)) {
                Some(per_unit) => {
                    detail.recipe_volume = Some(total_volume * per_unit);
                    detail.recipe_volume_unit = Some(FLUID_OUNCE_LABEL.to_string());
                }
                None => {
                    detail.recipe_volume = Some(total_volume);
                    detail.recipe_volume_unit = Some(config.volume_unit.clone());
                }
            }
        }
        if total_weight > 0.0 {
            detail.recipe_weight = Some(total_weight);
            detail.recipe_weight_unit = Some(config.weight_unit.clone());
        }
        (!detail.is_empty()).then_some(detail)
    } else {
        None
    };

    Ok(Some(IngredientLine {
        ingredient_id,
        ingredient_name: ingredient.name.clone(),
        quantity,
        unit_id: shopping_unit.id,
        unit_name: shopping_unit.name.clone(),
        size_qualifier,
        container,
    }))
}

fn sub_recipe_line<C: Catalog + ?Sized>(
    catalog: &C,
    sub_recipe_id: RecipeId,
    unit_id: UnitId,
    quantity: f64,
) -> EngineResult<SubRecipeLine> {
    let recipe = catalog
        .recipe(sub_recipe_id)
        .ok_or(EngineError::RecipeNotFound(sub_recipe_id))?;
    let unit_name = |id: UnitId| {
        catalog
            .unit(id)
            .map(|u| u.name.clone())
            .unwrap_or_else(|| FALLBACK_UNIT_NAME.to_string())
    };
    Ok(SubRecipeLine {
        sub_recipe_id,
        sub_recipe_name: recipe.name.clone(),
        quantity,
        unit_id,
        unit_name: unit_name(unit_id),
        yield_quantity: recipe.yield_quantity,
        yield_unit_name: unit_name(recipe.yield_unit),
    })
}

/// Builds the shopping list for a set of recipe selections.
///
/// Sub-recipes are not expanded: each `(sub-recipe, unit)` pair becomes its
/// own line with the summed quantity. Ingredient items are converted to the
/// ingredient's shopping unit and rounded up to whole purchases, with a size
/// qualifier for discrete units when size rules allow fewer pieces.
///
/// Output holds sub-recipe lines by name, then ingredient lines by name.
pub fn generate_shopping_list<C: Catalog + Sync + ?Sized>(
    catalog: &C,
    config: &EngineConfig,
    selections: &[RecipeSelection],
) -> EngineResult<Vec<ShoppingListItem>> {
    let buckets = collect_items(catalog, selections)?;

    let ingredient_lines = buckets
        .ingredients
        .par_iter()
        .map(|(id, items)| aggregate_ingredient(catalog, config, *id, items))
        .collect::<EngineResult<Vec<Option<IngredientLine>>>>()?;

    let mut shopping_list: Vec<ShoppingListItem> = Vec::new();
    for (&(sub_recipe_id, unit_id), &quantity) in &buckets.sub_recipes {
        let line = sub_recipe_line(catalog, sub_recipe_id, unit_id, quantity)?;
        shopping_list.push(ShoppingListItem::SubRecipe(line));
    }
    let sub_recipe_count = shopping_list.len();
    shopping_list.extend(ingredient_lines.into_iter().flatten().map(ShoppingListItem::Ingredient));

    shopping_list.sort_by(|a, b| {
        (!a.is_sub_recipe(), a.name()).cmp(&(!b.is_sub_recipe(), b.name()))
    });

    info!(
        selections = selections.len(),
        sub_recipes = sub_recipe_count,
        ingredients = shopping_list.len() - sub_recipe_count,
        "Generated shopping list"
    );
    Ok(shopping_list)
}
