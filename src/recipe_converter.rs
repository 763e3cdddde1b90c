use serde::{Deserialize, Serialize};

use crate::model::{Ingredient, SizeQualifier, UnitCategory, UnitId};
use crate::store::Catalog;
use crate::units::teaspoons_per_unit;

/// Which fallback produced a converted quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionPath {
    Identity,
    DirectRule,
    SizeQualifier,
    StandardVolume,
    ViaShoppingUnit,
}

/// Converts `quantity` of `from_unit` into the ingredient's shopping unit.
///
/// Identity when the units match, otherwise the ingredient's rule
/// `from_unit -> shopping unit`. `None` means no conversion is available.
pub fn convert_to_shopping_unit<C: Catalog + ?Sized>(
    catalog: &C,
    ingredient: &Ingredient,
    quantity: f64,
    from_unit: UnitId,
) -> Option<f64> {
    if from_unit == ingredient.shopping_unit {
        return Some(quantity);
    }
    catalog
        .conversion_factor(ingredient.id, from_unit, ingredient.shopping_unit)
        .map(|factor| quantity * factor)
}

/// Converts between two volume units through the teaspoon table.
///
/// Both units must be in the volume category and in the table.
pub fn standard_volume_convert<C: Catalog + ?Sized>(
    catalog: &C,
    from_unit: UnitId,
    to_unit: UnitId,
    quantity: f64,
) -> Option<f64> {
    let from = catalog.unit(from_unit)?;
    let to = catalog.unit(to_unit)?;
    if from.category != UnitCategory::Volume || to.category != UnitCategory::Volume {
        return None;
    }
    let from_tsp = teaspoons_per_unit(&from.name)?;
    let to_tsp = teaspoons_per_unit(&to.name)?;
    Some(quantity * from_tsp / to_tsp)
}

/// One aggregated recipe item, already converted to the shopping unit.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceRequest<'a> {
    pub ingredient: &'a Ingredient,
    pub quantity: f64,
    pub unit: UnitId,
    pub size_qualifier: Option<SizeQualifier>,
    /// This item's quantity in the ingredient's shopping unit.
    pub shopping_quantity: f64,
}

/// Expresses an item in `target` (a reference, cup or gram unit).
///
/// Paths are tried in a fixed order and the first success wins: identity,
/// direct rule, size qualifier, standard volume, then through the shopping
/// unit (a reverse `target -> shopping` rule divides, a forward
/// `shopping -> target` rule multiplies).
pub fn resolve_reference_value<C: Catalog + ?Sized>(
    catalog: &C,
    request: &ReferenceRequest<'_>,
    target: UnitId,
) -> Option<(f64, ConversionPath)> {
    let ingredient = request.ingredient;

    if request.unit == target {
        return Some((request.quantity, ConversionPath::Identity));
    }

    if let Some(factor) = catalog.conversion_factor(ingredient.id, request.unit, target) {
        return Some((request.quantity * factor, ConversionPath::DirectRule));
    }

    if let Some(qualifier) = request.size_qualifier {
        let size_rule = catalog
            .size_rules(ingredient.id)
            .iter()
            .find(|rule| rule.qualifier == qualifier && rule.reference_unit == target);
        if let Some(rule) = size_rule {
            return Some((
                request.shopping_quantity * rule.reference_value,
                ConversionPath::SizeQualifier,
            ));
        }
    }

    if let Some(value) = standard_volume_convert(catalog, request.unit, target, request.quantity) {
        return Some((value, ConversionPath::StandardVolume));
    }

    if request.shopping_quantity > 0.0 {
        let shopping_unit = ingredient.shopping_unit;
        if let Some(factor) = catalog.conversion_factor(ingredient.id, target, shopping_unit) {
            return Some((request.shopping_quantity / factor, ConversionPath::ViaShoppingUnit));
        }
        if let Some(factor) = catalog.conversion_factor(ingredient.id, shopping_unit, target) {
            return Some((request.shopping_quantity * factor, ConversionPath::ViaShoppingUnit));
        }
    }

    None
}
