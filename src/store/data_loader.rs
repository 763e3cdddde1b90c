use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io;
use std::path::Path;
use tracing::{debug, info};

use super::{Catalog, Dataset};
use crate::error::{EngineError, EngineResult};
use crate::model::{
    ConversionRule, Ingredient, IngredientId, Recipe, RecipeId, RecipeItem, SizeEstimationRule,
    SizeQualifier, Unit, UnitCategory, UnitId,
};

pub const UNITS_FILE: &str = "units.csv";
pub const INGREDIENTS_FILE: &str = "ingredients.csv";
pub const CONVERSION_RULES_FILE: &str = "conversion_rules.csv";
pub const SIZE_RULES_FILE: &str = "size_rules.csv";
pub const RECIPES_FILE: &str = "recipes.csv";
pub const RECIPE_ITEMS_FILE: &str = "recipe_items.csv";

#[derive(Debug, Deserialize)]
struct UnitRow {
    id: u32,
    name: String,
    category: UnitCategory,
}

#[derive(Debug, Deserialize)]
struct IngredientRow {
    id: u32,
    name: String,
    #[serde(rename = "type")]
    ingredient_type: String,
    shopping_unit: String,
}

#[derive(Debug, Deserialize)]
struct ConversionRow {
    ingredient: String,
    from_unit: String,
    to_unit: String,
    factor: f64,
}

#[derive(Debug, Deserialize)]
struct SizeRow {
    ingredient: String,
    size: SizeQualifier,
    reference_unit: String,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct RecipeRow {
    id: u32,
    name: String,
    is_sub_recipe: String,
    yield_quantity: f64,
    yield_unit: String,
    page_number: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RecipeItemRow {
    recipe: String,
    item_type: String,
    target: String,
    quantity: f64,
    unit: String,
    size_qualifier: Option<SizeQualifier>,
    preparation_notes: Option<String>,
}

/// Reads every row of `file` inside `dir`. A missing file is an empty table.
fn read_table<T: DeserializeOwned>(dir: &Path, file: &str) -> EngineResult<Option<Vec<T>>> {
    let path = dir.join(file);
    if !path.exists() {
        debug!(file, "Table not present, treating as empty");
        return Ok(None);
    }
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(&path)?;
    let rows = rdr.deserialize().collect::<Result<Vec<T>, csv::Error>>()?;
    Ok(Some(rows))
}

fn parse_flag(file: &str, value: &str) -> EngineResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => Err(EngineError::InconsistentDataset(format!(
            "{}: '{}' is not a boolean",
            file, other
        ))),
    }
}

fn unit_ref(dataset: &Dataset, file: &str, name: &str) -> EngineResult<UnitId> {
    dataset.unit_by_name(name).map(|u| u.id).ok_or_else(|| {
        EngineError::InconsistentDataset(format!("{}: unknown unit '{}'", file, name))
    })
}

fn ingredient_ref(dataset: &Dataset, file: &str, name: &str) -> EngineResult<IngredientId> {
    dataset.ingredient_by_name(name).map(|i| i.id).ok_or_else(|| {
        EngineError::InconsistentDataset(format!("{}: unknown ingredient '{}'", file, name))
    })
}

fn recipe_ref(dataset: &Dataset, file: &str, name: &str) -> EngineResult<RecipeId> {
    dataset.recipe_by_name(name).map(|r| r.id).ok_or_else(|| {
        EngineError::InconsistentDataset(format!("{}: unknown recipe '{}'", file, name))
    })
}

/// Loads a dataset from a directory of CSV tables.
///
/// Rows reference units, ingredients and recipes by name. `units.csv` is
/// optional and falls back to the built-in unit catalogue. The result is
/// validated before it is returned, so a dataset with a sub-recipe cycle or a
/// dangling reference never loads.
pub fn load_dataset_dir(dir: &Path) -> EngineResult<Dataset> {
    if !dir.is_dir() {
        return Err(EngineError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Dataset directory not found at: {:?}", dir),
        )));
    }

    let mut dataset = match read_table::<UnitRow>(dir, UNITS_FILE)? {
        Some(rows) => {
            let mut dataset = Dataset::new();
            for row in rows {
                if dataset.unit(UnitId(row.id)).is_some() {
                    return Err(EngineError::DuplicateId {
                        file: UNITS_FILE,
                        kind: "unit",
                        id: row.id,
                    });
                }
                dataset.insert_unit(Unit {
                    id: UnitId(row.id),
                    name: row.name,
                    category: row.category,
                });
            }
            dataset
        }
        None => Dataset::with_default_units(),
    };

    for row in read_table::<IngredientRow>(dir, INGREDIENTS_FILE)?.unwrap_or_default() {
        if dataset.ingredient(IngredientId(row.id)).is_some() {
            return Err(EngineError::DuplicateId {
                file: INGREDIENTS_FILE,
                kind: "ingredient",
                id: row.id,
            });
        }
        if dataset.ingredient_by_name(&row.name).is_some() {
            return Err(EngineError::DuplicateName {
                kind: "ingredient",
                name: row.name,
            });
        }
        let shopping_unit = unit_ref(&dataset, INGREDIENTS_FILE, &row.shopping_unit)?;
        dataset.insert_ingredient(Ingredient {
            id: IngredientId(row.id),
            name: row.name,
            ingredient_type: row.ingredient_type,
            shopping_unit,
        });
    }

    for row in read_table::<ConversionRow>(dir, CONVERSION_RULES_FILE)?.unwrap_or_default() {
        let rule = ConversionRule {
            ingredient: ingredient_ref(&dataset, CONVERSION_RULES_FILE, &row.ingredient)?,
            from_unit: unit_ref(&dataset, CONVERSION_RULES_FILE, &row.from_unit)?,
            to_unit: unit_ref(&dataset, CONVERSION_RULES_FILE, &row.to_unit)?,
            factor: row.factor,
        };
        dataset.insert_conversion(rule);
    }

    for row in read_table::<SizeRow>(dir, SIZE_RULES_FILE)?.unwrap_or_default() {
        let rule = SizeEstimationRule {
            ingredient: ingredient_ref(&dataset, SIZE_RULES_FILE, &row.ingredient)?,
            qualifier: row.size,
            reference_unit: unit_ref(&dataset, SIZE_RULES_FILE, &row.reference_unit)?,
            reference_value: row.value,
        };
        dataset.insert_size_rule(rule);
    }

    for row in read_table::<RecipeRow>(dir, RECIPES_FILE)?.unwrap_or_default() {
        if dataset.recipe(RecipeId(row.id)).is_some() {
            return Err(EngineError::DuplicateId {
                file: RECIPES_FILE,
                kind: "recipe",
                id: row.id,
            });
        }
        if dataset.recipe_by_name(&row.name).is_some() {
            return Err(EngineError::DuplicateName {
                kind: "recipe",
                name: row.name,
            });
        }
        let recipe = Recipe {
            id: RecipeId(row.id),
            is_sub_recipe: parse_flag(RECIPES_FILE, &row.is_sub_recipe)?,
            yield_quantity: row.yield_quantity,
            yield_unit: unit_ref(&dataset, RECIPES_FILE, &row.yield_unit)?,
            page_number: row.page_number,
            name: row.name,
        };
        dataset.insert_recipe(recipe);
    }

    for row in read_table::<RecipeItemRow>(dir, RECIPE_ITEMS_FILE)?.unwrap_or_default() {
        let owner = recipe_ref(&dataset, RECIPE_ITEMS_FILE, &row.recipe)?;
        let unit = unit_ref(&dataset, RECIPE_ITEMS_FILE, &row.unit)?;
        let mut item = match row.item_type.to_lowercase().as_str() {
            "ingredient" => RecipeItem::ingredient(
                ingredient_ref(&dataset, RECIPE_ITEMS_FILE, &row.target)?,
                row.quantity,
                unit,
            ),
            "sub_recipe" | "subrecipe" => RecipeItem::sub_recipe(
                recipe_ref(&dataset, RECIPE_ITEMS_FILE, &row.target)?,
                row.quantity,
                unit,
            ),
            other => {
                return Err(EngineError::InconsistentDataset(format!(
                    "{}: unknown item type '{}'",
                    RECIPE_ITEMS_FILE, other
                )))
            }
        };
        item.size_qualifier = row.size_qualifier;
        item.preparation_notes = row.preparation_notes.filter(|n| !n.is_empty());
        dataset.push_recipe_item(owner, item);
    }

    dataset.validate()?;
    info!(
        units = dataset.units().count(),
        ingredients = dataset.ingredients().count(),
        recipes = dataset.recipes().count(),
        "Loaded dataset from {:?}",
        dir
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, file: &str, contents: &str) {
        fs::write(dir.path().join(file), contents).unwrap();
    }

    fn kitchen_dir() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir,
            INGREDIENTS_FILE,
            "id,name,type,shopping_unit\n1,Onion,Vegetables,piece\n2,Cashews,Nuts & Seeds,gram\n",
        );
        write(
            &dir,
            CONVERSION_RULES_FILE,
            "ingredient,from_unit,to_unit,factor\nOnion,gram,piece,0.00667\nCashews,cup,gram,130\n",
        );
        write(
            &dir,
            SIZE_RULES_FILE,
            "ingredient,size,reference_unit,value\nOnion,small,gram,100\nOnion,large,gram,200\n",
        );
        write(
            &dir,
            RECIPES_FILE,
            "id,name,is_sub_recipe,yield_quantity,yield_unit,page_number\n\
             1,Cashew Cream,1,2,cup,\n\
             2,Onion Soup,false,4,serving,87\n",
        );
        write(
            &dir,
            RECIPE_ITEMS_FILE,
            "recipe,item_type,target,quantity,unit,size_qualifier,preparation_notes\n\
             Cashew Cream,ingredient,Cashews,1,cup,,soaked\n\
             Onion Soup,ingredient,Onion,2,piece,large,\n\
             Onion Soup,sub_recipe,Cashew Cream,0.5,cup,,\n",
        );
        dir
    }

    #[test]
    fn test_load_dataset_with_default_units() -> EngineResult<()> {
        let dir = kitchen_dir();
        let dataset = load_dataset_dir(dir.path())?;

        assert_eq!(dataset.ingredients().count(), 2);
        let soup = dataset.recipe_by_name("Onion Soup").unwrap();
        assert!(!soup.is_sub_recipe);
        assert_eq!(soup.page_number, Some(87));
        let cream = dataset.recipe_by_name("Cashew Cream").unwrap();
        assert!(cream.is_sub_recipe);
        assert_eq!(cream.page_number, None);

        let items = dataset.recipe_items(soup.id);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].size_qualifier, Some(SizeQualifier::Large));
        assert_eq!(items[0].preparation_notes, None);
        assert_eq!(items[1].sub_recipe_id(), Some(cream.id));

        let cream_items = dataset.recipe_items(cream.id);
        assert_eq!(cream_items[0].preparation_notes.as_deref(), Some("soaked"));

        let onion = dataset.ingredient_by_name("onion").unwrap();
        assert_eq!(dataset.size_rules(onion.id).len(), 2);
        Ok(())
    }

    #[test]
    fn test_unknown_unit_is_reported() {
        let dir = kitchen_dir();
        write(
            &dir,
            CONVERSION_RULES_FILE,
            "ingredient,from_unit,to_unit,factor\nOnion,smidgen,piece,0.1\n",
        );
        let err = load_dataset_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("unknown unit 'smidgen'"));
    }

    #[test]
    fn test_cycle_in_tables_fails_to_load() {
        let dir = kitchen_dir();
        write(
            &dir,
            RECIPES_FILE,
            "id,name,is_sub_recipe,yield_quantity,yield_unit,page_number\n\
             1,Cashew Cream,1,2,cup,\n\
             2,Onion Soup,0,4,serving,\n\
             3,Dressing,1,1,cup,\n",
        );
        write(
            &dir,
            RECIPE_ITEMS_FILE,
            "recipe,item_type,target,quantity,unit,size_qualifier,preparation_notes\n\
             Cashew Cream,sub_recipe,Dressing,1,cup,,\n\
             Dressing,sub_recipe,Cashew Cream,1,cup,,\n",
        );
        assert!(matches!(
            load_dataset_dir(dir.path()),
            Err(EngineError::CircularReference { .. })
        ));
    }

    #[test]
    fn test_custom_unit_table_replaces_defaults() -> EngineResult<()> {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, UNITS_FILE, "id,name,category\n10,gram,weight\n11,whole,count\n");
        write(
            &dir,
            INGREDIENTS_FILE,
            "id,name,type,shopping_unit\n1,Lemon,Fruits,whole\n",
        );
        let dataset = load_dataset_dir(dir.path())?;
        assert_eq!(dataset.units().count(), 2);
        assert_eq!(dataset.unit_id("whole")?, UnitId(11));
        assert!(dataset.unit_id("cup").is_err());
        Ok(())
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let dir = kitchen_dir();
        write(
            &dir,
            RECIPES_FILE,
            "id,name,is_sub_recipe,yield_quantity,yield_unit,page_number\n\
             1,Cashew Cream,1,2,cup,\n\
             1,Onion Soup,0,4,serving,\n",
        );
        assert!(matches!(
            load_dataset_dir(dir.path()),
            Err(EngineError::DuplicateId { kind: "recipe", id: 1, .. })
        ));

        let dir = kitchen_dir();
        write(
            &dir,
            INGREDIENTS_FILE,
            "id,name,type,shopping_unit\n1,Onion,Vegetables,piece\n1,Cashews,Nuts & Seeds,gram\n",
        );
        let err = load_dataset_dir(dir.path()).unwrap_err();
        assert_eq!(err.to_string(), "ingredients.csv: ingredient id 1 appears more than once");
    }

    #[test]
    fn test_non_positive_item_quantity_fails_to_load() {
        let dir = kitchen_dir();
        write(
            &dir,
            RECIPE_ITEMS_FILE,
            "recipe,item_type,target,quantity,unit,size_qualifier,preparation_notes\n\
             Onion Soup,ingredient,Onion,-2,piece,,\n",
        );
        assert!(matches!(
            load_dataset_dir(dir.path()),
            Err(EngineError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_missing_directory() {
        let result = load_dataset_dir(Path::new("this_directory_does_not_exist"));
        assert!(matches!(result, Err(EngineError::Io(_))));
    }
}
