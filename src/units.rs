use crate::model::UnitCategory;

/// Built-in unit catalogue, in the order units are registered in a fresh dataset.
pub const DEFAULT_UNITS: &[(&str, UnitCategory)] = &[
    // Volume
    ("cup", UnitCategory::Volume),
    ("tablespoon", UnitCategory::Volume),
    ("teaspoon", UnitCategory::Volume),
    ("milliliter", UnitCategory::Volume),
    ("liter", UnitCategory::Volume),
    ("fluid_ounce", UnitCategory::Volume),
    // Weight
    ("gram", UnitCategory::Weight),
    ("kilogram", UnitCategory::Weight),
    ("ounce", UnitCategory::Weight),
    ("pound", UnitCategory::Weight),
    // Count
    ("whole", UnitCategory::Count),
    ("piece", UnitCategory::Count),
    ("head", UnitCategory::Count),
    ("bunch", UnitCategory::Count),
    ("clove", UnitCategory::Count),
    ("package", UnitCategory::Count),
    ("can", UnitCategory::Count),
    ("jar", UnitCategory::Count),
    ("bottle", UnitCategory::Count),
    ("container", UnitCategory::Count),
    // Special
    ("serving", UnitCategory::Special),
    ("to_taste", UnitCategory::Special),
    ("as_needed", UnitCategory::Special),
];

/// Teaspoons per unit for the standard volume units.
///
/// `liter` is deliberately absent: only these five names take part in
/// standard volume conversion.
const TEASPOONS_PER_UNIT: &[(&str, f64)] = &[
    ("cup", 48.0),
    ("tablespoon", 3.0),
    ("teaspoon", 1.0),
    ("fluid_ounce", 6.0),
    ("milliliter", 0.202884),
];

pub fn default_units() -> impl Iterator<Item = (&'static str, UnitCategory)> {
    DEFAULT_UNITS.iter().copied()
}

/// Case-insensitive lookup in the teaspoon equivalence table.
pub fn teaspoons_per_unit(unit_name: &str) -> Option<f64> {
    let name = unit_name.trim().to_lowercase();
    TEASPOONS_PER_UNIT
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, tsp)| *tsp)
}

/// Fluid ounces in one `unit_name`, for units in the teaspoon table.
pub fn fluid_ounces_per_unit(unit_name: &str) -> Option<f64> {
    Some(teaspoons_per_unit(unit_name)? / teaspoons_per_unit("fluid_ounce")?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teaspoon_table() {
        assert_eq!(teaspoons_per_unit("cup"), Some(48.0));
        assert_eq!(teaspoons_per_unit("Tablespoon"), Some(3.0));
        assert_eq!(teaspoons_per_unit("fluid_ounce"), Some(6.0));
        assert_eq!(teaspoons_per_unit("liter"), None);
        assert_eq!(teaspoons_per_unit("gram"), None);
    }

    #[test]
    fn test_fluid_ounces() {
        assert_eq!(fluid_ounces_per_unit("cup"), Some(8.0));
        assert_eq!(fluid_ounces_per_unit("tablespoon"), Some(0.5));
        assert_eq!(fluid_ounces_per_unit("gram"), None);
    }

    #[test]
    fn test_default_units_have_unique_names() {
        let mut names: Vec<&str> = default_units().map(|(name, _)| name).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_every_table_unit_is_a_default_volume_unit() {
        for (name, _) in TEASPOONS_PER_UNIT {
            let category = default_units().find(|(n, _)| n == name).map(|(_, c)| c);
            assert_eq!(category, Some(UnitCategory::Volume), "{name}");
        }
    }
}
