use thiserror::Error;

use crate::model::{IngredientId, RecipeId, SnapshotId, UnitId};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    #[error("Unit not found by name: {0}")]
    UnitNameNotFound(String),

    #[error("Ingredient not found: {0}")]
    IngredientNotFound(IngredientId),

    #[error("Recipe not found: {0}")]
    RecipeNotFound(RecipeId),

    #[error("Recipe not found by name or id: {0}")]
    RecipeLookupFailed(String),

    #[error("Shopping list snapshot not found: {0}")]
    SnapshotNotFound(SnapshotId),

    #[error("A {kind} named '{name}' already exists")]
    DuplicateName { kind: &'static str, name: String },

    #[error("{file}: {kind} id {id} appears more than once")]
    DuplicateId { file: &'static str, kind: &'static str, id: u32 },

    #[error("'{ingredient}' has more than one conversion rule from unit {from_unit}")]
    DuplicateConversionRule { ingredient: String, from_unit: UnitId },

    #[error("No conversion rules provided for '{ingredient}'. Add rules manually or enable default conversions.")]
    NoConversionRules { ingredient: String },

    #[error("Cannot add sub-recipe {child} to recipe {parent}: it would create a circular reference")]
    CircularReference { parent: RecipeId, child: RecipeId },

    #[error("Recipe {0} appears twice on one expansion path")]
    CyclicExpansion(RecipeId),

    #[error("Sub-recipe '{recipe}' cannot use the special unit '{unit}' as its yield unit")]
    SpecialYieldUnit { recipe: String, unit: String },

    #[error("Recipe '{recipe}' has a non-positive yield quantity: {quantity}")]
    InvalidYield { recipe: String, quantity: f64 },

    #[error("Invalid quantity {quantity} for {context}")]
    InvalidQuantity { context: String, quantity: f64 },

    #[error("Invalid batch multiplier {batches} for recipe {recipe}")]
    InvalidBatch { recipe: RecipeId, batches: f64 },

    #[error("No recipe selections provided")]
    EmptySelection,

    #[error("Malformed selection '{0}': expected NAME_OR_ID or NAME_OR_ID=BATCHES")]
    MalformedSelection(String),

    #[error("Default conversion catalogue is invalid: {0}")]
    InvalidDefaults(String),

    #[error("Dataset is inconsistent: {0}")]
    InconsistentDataset(String),

    #[error("Record store lock was poisoned")]
    StorePoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
