use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Catalog, ConversionDraft, SizeRuleDraft};
use crate::error::{EngineError, EngineResult};
use crate::model::{SizeQualifier, Unit};

const BUILTIN_CATALOGUE: &str = include_str!("../../data/default_conversions.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultConversion {
    pub from: String,
    pub factor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultSizeEstimate {
    pub size: SizeQualifier,
    pub reference_unit: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultIngredient {
    pub name: String,
    pub shopping_unit: String,
    pub conversions: Vec<DefaultConversion>,
    #[serde(default)]
    pub size_estimation: Vec<DefaultSizeEstimate>,
}

/// Pre-computed conversion factors for common ingredients.
///
/// Reference data: parsed once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultCatalogue {
    pub version: u32,
    pub ingredients: Vec<DefaultIngredient>,
}

impl DefaultCatalogue {
    /// The catalogue compiled into the binary.
    pub fn builtin() -> EngineResult<Self> {
        Self::from_json(BUILTIN_CATALOGUE)
    }

    pub fn from_json(raw: &str) -> EngineResult<Self> {
        let catalogue: DefaultCatalogue = serde_json::from_str(raw)?;
        catalogue.check()?;
        Ok(catalogue)
    }

    pub fn empty() -> Self {
        DefaultCatalogue {
            version: 0,
            ingredients: Vec::new(),
        }
    }

    fn check(&self) -> EngineResult<()> {
        for entry in &self.ingredients {
            let bad_factor = entry
                .conversions
                .iter()
                .any(|c| !(c.factor.is_finite() && c.factor > 0.0));
            let bad_size = entry
                .size_estimation
                .iter()
                .any(|s| !(s.value.is_finite() && s.value > 0.0));
            if bad_factor || bad_size {
                return Err(EngineError::InvalidDefaults(format!(
                    "'{}' has a non-positive factor or size value",
                    entry.name
                )));
            }
        }
        Ok(())
    }

    /// Case-insensitive lookup by ingredient name.
    pub fn lookup(&self, ingredient_name: &str) -> Option<&DefaultIngredient> {
        let name = ingredient_name.trim();
        self.ingredients
            .iter()
            .find(|entry| entry.name == name)
            .or_else(|| {
                self.ingredients
                    .iter()
                    .find(|entry| entry.name.eq_ignore_ascii_case(name))
            })
    }

    pub fn ingredient_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.ingredients.iter().map(|e| e.name.as_str()).collect();
        names.sort();
        names
    }

    /// Builds rules for a new ingredient bought in `shopping_unit`.
    ///
    /// Conversion rules are only produced when `shopping_unit` matches the
    /// catalogue's shopping unit, since the factors target that unit. Size
    /// rules are independent of the shopping unit. Unknown unit names are skipped.
    pub fn rules_for<C: Catalog + ?Sized>(
        &self,
        catalog: &C,
        ingredient_name: &str,
        shopping_unit: &Unit,
    ) -> (Vec<ConversionDraft>, Vec<SizeRuleDraft>) {
        let Some(entry) = self.lookup(ingredient_name) else {
            return (Vec::new(), Vec::new());
        };

        let mut conversions = Vec::new();
        if entry.shopping_unit.eq_ignore_ascii_case(&shopping_unit.name) {
            for conversion in &entry.conversions {
                match catalog.unit_by_name(&conversion.from) {
                    Some(from) => conversions.push(ConversionDraft {
                        from_unit: from.id,
                        to_unit: shopping_unit.id,
                        factor: conversion.factor,
                    }),
                    None => debug!(unit = %conversion.from, "Skipping default conversion from unknown unit"),
                }
            }
        } else {
            debug!(
                ingredient = %entry.name,
                default_unit = %entry.shopping_unit,
                chosen_unit = %shopping_unit.name,
                "Shopping unit differs from catalogue, not applying default factors"
            );
        }

        let sizes = entry
            .size_estimation
            .iter()
            .filter_map(|size| {
                catalog
                    .unit_by_name(&size.reference_unit)
                    .map(|unit| SizeRuleDraft {
                        qualifier: size.size,
                        reference_unit: unit.id,
                        reference_value: size.value,
                    })
            })
            .collect();

        (conversions, sizes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Dataset;

    #[test]
    fn test_builtin_catalogue_parses() {
        let catalogue = DefaultCatalogue::builtin().unwrap();
        assert_eq!(catalogue.version, 1);
        assert!(catalogue.ingredient_names().contains(&"Onion"));
        let names = catalogue.ingredient_names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalogue = DefaultCatalogue::builtin().unwrap();
        assert_eq!(catalogue.lookup("bell pepper").map(|e| e.shopping_unit.as_str()), Some("piece"));
        assert!(catalogue.lookup("Dragonfruit").is_none());
    }

    #[test]
    fn test_rules_target_matching_shopping_unit() {
        let catalogue = DefaultCatalogue::builtin().unwrap();
        let data = Dataset::with_default_units();
        let piece = data.unit_by_name("piece").unwrap().clone();

        let (conversions, sizes) = catalogue.rules_for(&data, "Onion", &piece);
        assert_eq!(conversions.len(), 4);
        assert!(conversions.iter().all(|c| c.to_unit == piece.id));
        let gram = data.unit_id("gram").unwrap();
        assert!(conversions
            .iter()
            .any(|c| c.from_unit == gram && (c.factor - 0.00667).abs() < 1e-12));
        assert_eq!(sizes.len(), 3);
        assert!(sizes.iter().all(|s| s.reference_unit == gram));
    }

    #[test]
    fn test_mismatched_shopping_unit_keeps_only_sizes() {
        let catalogue = DefaultCatalogue::builtin().unwrap();
        let data = Dataset::with_default_units();
        let whole = data.unit_by_name("whole").unwrap().clone();

        let (conversions, sizes) = catalogue.rules_for(&data, "Onion", &whole);
        assert!(conversions.is_empty());
        assert_eq!(sizes.len(), 3);
    }

    #[test]
    fn test_rejects_non_positive_factor() {
        let raw = r#"{"version": 2, "ingredients": [
            {"name": "Mystery", "shopping_unit": "piece", "conversions": [{"from": "gram", "factor": 0}]}
        ]}"#;
        assert!(matches!(
            DefaultCatalogue::from_json(raw),
            Err(EngineError::InvalidDefaults(_))
        ));
    }
}
