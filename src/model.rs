use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! record_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(UnitId);
record_id!(IngredientId);
record_id!(RecipeId);
record_id!(SnapshotId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitCategory {
    Weight,
    Volume,
    Count,
    /// Servings and other non-measurable units ("to taste", "as needed").
    Special,
}

impl fmt::Display for UnitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            UnitCategory::Weight => "weight",
            UnitCategory::Volume => "volume",
            UnitCategory::Count => "count",
            UnitCategory::Special => "special",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    pub category: UnitCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    /// Free-form type tag such as "Vegetables" or "Pantry Items".
    pub ingredient_type: String,
    /// The unit this ingredient is bought and aggregated in.
    pub shopping_unit: UnitId,
}

/// `quantity_in_to_unit = quantity_in_from_unit * factor`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRule {
    pub ingredient: IngredientId,
    pub from_unit: UnitId,
    pub to_unit: UnitId,
    pub factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeQualifier {
    Small,
    Medium,
    Large,
}

impl SizeQualifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeQualifier::Small => "small",
            SizeQualifier::Medium => "medium",
            SizeQualifier::Large => "large",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "small" => Some(SizeQualifier::Small),
            "medium" => Some(SizeQualifier::Medium),
            "large" => Some(SizeQualifier::Large),
            _ => None,
        }
    }
}

impl fmt::Display for SizeQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of `qualifier` size weighs (or measures) `reference_value` of `reference_unit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeEstimationRule {
    pub ingredient: IngredientId,
    pub qualifier: SizeQualifier,
    pub reference_unit: UnitId,
    pub reference_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    pub is_sub_recipe: bool,
    pub yield_quantity: f64,
    pub yield_unit: UnitId,
    pub page_number: Option<u32>,
}

/// What a recipe item points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemTarget {
    Ingredient(IngredientId),
    SubRecipe(RecipeId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeItem {
    pub target: ItemTarget,
    pub quantity: f64,
    pub unit: UnitId,
    pub size_qualifier: Option<SizeQualifier>,
    pub preparation_notes: Option<String>,
}

impl RecipeItem {
    pub fn ingredient(ingredient: IngredientId, quantity: f64, unit: UnitId) -> Self {
        RecipeItem {
            target: ItemTarget::Ingredient(ingredient),
            quantity,
            unit,
            size_qualifier: None,
            preparation_notes: None,
        }
    }

    pub fn sub_recipe(recipe: RecipeId, quantity: f64, unit: UnitId) -> Self {
        RecipeItem {
            target: ItemTarget::SubRecipe(recipe),
            quantity,
            unit,
            size_qualifier: None,
            preparation_notes: None,
        }
    }

    pub fn with_size(mut self, qualifier: SizeQualifier) -> Self {
        self.size_qualifier = Some(qualifier);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.preparation_notes = Some(notes.into());
        self
    }

    pub fn sub_recipe_id(&self) -> Option<RecipeId> {
        match self.target {
            ItemTarget::SubRecipe(id) => Some(id),
            ItemTarget::Ingredient(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecipeSelection {
    pub recipe_id: RecipeId,
    #[serde(default = "default_batches")]
    pub batches: f64,
}

fn default_batches() -> f64 {
    1.0
}

impl RecipeSelection {
    pub fn new(recipe_id: RecipeId, batches: f64) -> Self {
        RecipeSelection { recipe_id, batches }
    }
}

/// Actual volume/weight needed for ingredients bought in containers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_volume_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe_weight_unit: Option<String>,
}

impl ContainerDetail {
    pub fn is_empty(&self) -> bool {
        self.recipe_volume.is_none() && self.recipe_weight.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientLine {
    pub ingredient_id: IngredientId,
    pub ingredient_name: String,
    pub quantity: f64,
    pub unit_id: UnitId,
    pub unit_name: String,
    pub size_qualifier: Option<SizeQualifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubRecipeLine {
    pub sub_recipe_id: RecipeId,
    pub sub_recipe_name: String,
    pub quantity: f64,
    pub unit_id: UnitId,
    pub unit_name: String,
    pub yield_quantity: f64,
    pub yield_unit_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShoppingListItem {
    SubRecipe(SubRecipeLine),
    Ingredient(IngredientLine),
}

impl ShoppingListItem {
    pub fn name(&self) -> &str {
        match self {
            ShoppingListItem::SubRecipe(line) => &line.sub_recipe_name,
            ShoppingListItem::Ingredient(line) => &line.ingredient_name,
        }
    }

    pub fn quantity(&self) -> f64 {
        match self {
            ShoppingListItem::SubRecipe(line) => line.quantity,
            ShoppingListItem::Ingredient(line) => line.quantity,
        }
    }

    pub fn is_sub_recipe(&self) -> bool {
        matches!(self, ShoppingListItem::SubRecipe(_))
    }

    /// Stable key used by clients to mark lines as already bought.
    ///
    /// Quantities render the same way a JavaScript template literal renders a
    /// number, so `3.0` becomes `3`.
    pub fn item_key(&self) -> String {
        match self {
            ShoppingListItem::SubRecipe(line) => format!(
                "subrecipe-{}-{}-{}",
                line.sub_recipe_id, line.quantity, line.unit_id
            ),
            ShoppingListItem::Ingredient(line) => format!(
                "ingredient-{}-{}-{}-{}",
                line.ingredient_id,
                line.quantity,
                line.unit_id,
                line.size_qualifier.map(|q| q.as_str()).unwrap_or("")
            ),
        }
    }
}

/// Name and page of a recipe, for the footer of the formatted list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeInfo {
    pub id: RecipeId,
    pub name: String,
    pub page_number: Option<u32>,
}
