use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use crate::model::{RecipeInfo, RecipeSelection, ShoppingListItem};
use crate::section_classifier::{OrganizedList, StoreSection};
use crate::store::Catalog;

const TITLE: &str = "🛒 Shopping List";
const NEED_TO_BUY: &str = "🛒 NEED TO BUY";
const ALREADY_HAVE: &str = "✅ ALREADY HAVE";
const RECIPES_USED: &str = "📖 RECIPES USED";
const SUB_RECIPES_LABEL: &str = "🔄 SUB-RECIPES";

/// Renders a quantity without a trailing `.0` for whole numbers.
pub fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format!("{:.0}", quantity)
    } else {
        format!("{}", quantity)
    }
}

fn format_amount(value: f64) -> String {
    if value < 1.0 {
        format!("{:.2}", value)
    } else {
        format!("{:.1}", value)
    }
}

/// One bullet line for a shopping list item.
pub fn format_item_line(item: &ShoppingListItem) -> String {
    match item {
        ShoppingListItem::SubRecipe(line) => {
            let mut text = format!(
                "• {} {} {}",
                format_quantity(line.quantity),
                line.unit_name,
                line.sub_recipe_name
            );
            if line.yield_quantity != 0.0 && !line.yield_unit_name.is_empty() {
                text.push_str(&format!(
                    " (yields {} {})",
                    format_quantity(line.yield_quantity),
                    line.yield_unit_name
                ));
            }
            text
        }
        ShoppingListItem::Ingredient(line) => {
            let mut text = match line.size_qualifier {
                Some(size) => format!(
                    "• {} {} {} {}",
                    format_quantity(line.quantity),
                    size,
                    line.unit_name,
                    line.ingredient_name
                ),
                None => format!(
                    "• {} {} {}",
                    format_quantity(line.quantity),
                    line.unit_name,
                    line.ingredient_name
                ),
            };
            if let Some(detail) = &line.container {
                let mut needs = Vec::new();
                if let Some(volume) = detail.recipe_volume.filter(|v| *v != 0.0) {
                    let unit = detail.recipe_volume_unit.as_deref().unwrap_or("fl oz");
                    needs.push(format!("{} {}", format_amount(volume), unit));
                }
                if let Some(weight) = detail.recipe_weight.filter(|w| *w != 0.0) {
                    let unit = detail.recipe_weight_unit.as_deref().unwrap_or("g");
                    needs.push(format!("{} {}", format_amount(weight), unit));
                }
                if !needs.is_empty() {
                    text.push_str(&format!(" (need: {})", needs.join(", ")));
                }
            }
            text
        }
    }
}

/// Headed blocks in section order, sub-recipes last. Empty blocks are skipped.
fn push_blocks(lines: &mut Vec<String>, blocks: &[(&str, Vec<&ShoppingListItem>)]) {
    for (label, items) in blocks {
        if items.is_empty() {
            continue;
        }
        lines.push(label.to_string());
        lines.extend(items.iter().map(|item| format_item_line(item)));
        lines.push(String::new());
    }
}

/// Plain-text rendering of an organized list.
///
/// Lines whose key (see [`ShoppingListItem::item_key`]) is in `checked_ids`
/// move from "need to buy" to "already have". Checked ids that match nothing
/// in `flat_list` are ignored.
pub fn format_as_text(
    organized: &OrganizedList,
    recipes: &[RecipeInfo],
    checked_ids: &HashSet<String>,
    flat_list: &[ShoppingListItem],
) -> String {
    let known: HashSet<String> = flat_list.iter().map(ShoppingListItem::item_key).collect();
    let stale = checked_ids.iter().filter(|id| !known.contains(*id)).count();
    if stale > 0 {
        debug!(stale, "Ignoring checked ids that are not on the list");
    }

    let mut groups: Vec<(&str, &[ShoppingListItem])> = StoreSection::ALL
        .iter()
        .map(|section| (section.label(), organized.items(*section)))
        .collect();
    groups.push((SUB_RECIPES_LABEL, organized.sub_recipes.as_slice()));

    let mut need: Vec<(&str, Vec<&ShoppingListItem>)> = Vec::new();
    let mut have: Vec<(&str, Vec<&ShoppingListItem>)> = Vec::new();
    for (label, items) in groups {
        let (checked, unchecked): (Vec<&ShoppingListItem>, Vec<&ShoppingListItem>) = items
            .iter()
            .partition(|item| checked_ids.contains(&item.item_key()));
        need.push((label, unchecked));
        have.push((label, checked));
    }

    let has_need = need.iter().any(|(_, items)| !items.is_empty());
    let has_have = have.iter().any(|(_, items)| !items.is_empty());

    let mut lines = vec![TITLE.to_string(), String::new()];
    if has_need {
        lines.push(NEED_TO_BUY.to_string());
        lines.push(String::new());
        push_blocks(&mut lines, &need);
    }
    if has_have {
        if has_need {
            lines.push(String::new());
        }
        lines.push(ALREADY_HAVE.to_string());
        lines.push(String::new());
        push_blocks(&mut lines, &have);
    }
    if !recipes.is_empty() {
        lines.push(RECIPES_USED.to_string());
        for recipe in recipes {
            match recipe.page_number {
                Some(page) if page > 0 => lines.push(format!("• {} (p. {})", recipe.name, page)),
                _ => lines.push(format!("• {}", recipe.name)),
            }
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Footer entries for the selected recipes: each recipe once, by id.
pub fn recipe_info_for_selections<C: Catalog + ?Sized>(
    catalog: &C,
    selections: &[RecipeSelection],
) -> Vec<RecipeInfo> {
    let ids: BTreeSet<_> = selections.iter().map(|s| s.recipe_id).collect();
    ids.into_iter()
        .filter_map(|id| catalog.recipe(id))
        .map(|recipe| RecipeInfo {
            id: recipe.id,
            name: recipe.name.clone(),
            page_number: recipe.page_number,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ContainerDetail, IngredientId, IngredientLine, RecipeId, SizeQualifier, SubRecipeLine,
        UnitId,
    };
    use std::collections::BTreeMap;

    fn onion_line() -> ShoppingListItem {
        ShoppingListItem::Ingredient(IngredientLine {
            ingredient_id: IngredientId(1),
            ingredient_name: "Onion".to_string(),
            quantity: 3.0,
            unit_id: UnitId(12),
            unit_name: "piece".to_string(),
            size_qualifier: Some(SizeQualifier::Large),
            container: None,
        })
    }

    fn tahini_line() -> ShoppingListItem {
        ShoppingListItem::Ingredient(IngredientLine {
            ingredient_id: IngredientId(2),
            ingredient_name: "Tahini".to_string(),
            quantity: 1.0,
            unit_id: UnitId(18),
            unit_name: "jar".to_string(),
            size_qualifier: None,
            container: Some(ContainerDetail {
                recipe_volume: Some(6.0),
                recipe_volume_unit: Some("fl oz".to_string()),
                recipe_weight: Some(0.5),
                recipe_weight_unit: Some("gram".to_string()),
            }),
        })
    }

    fn cream_line() -> ShoppingListItem {
        ShoppingListItem::SubRecipe(SubRecipeLine {
            sub_recipe_id: RecipeId(4),
            sub_recipe_name: "Cashew Cream".to_string(),
            quantity: 1.5,
            unit_id: UnitId(1),
            unit_name: "cup".to_string(),
            yield_quantity: 2.0,
            yield_unit_name: "cup".to_string(),
        })
    }

    fn organized() -> OrganizedList {
        let mut sections: BTreeMap<StoreSection, Vec<ShoppingListItem>> =
            StoreSection::ALL.iter().map(|s| (*s, Vec::new())).collect();
        sections.insert(StoreSection::Produce, vec![onion_line()]);
        sections.insert(StoreSection::CannedPreserved, vec![tahini_line()]);
        OrganizedList {
            sections,
            sub_recipes: vec![cream_line()],
        }
    }

    #[test]
    fn test_format_quantity() {
        assert_eq!(format_quantity(3.0), "3");
        assert_eq!(format_quantity(1.5), "1.5");
        assert_eq!(format_quantity(0.25), "0.25");
    }

    #[test]
    fn test_item_lines() {
        assert_eq!(format_item_line(&onion_line()), "• 3 large piece Onion");
        assert_eq!(
            format_item_line(&tahini_line()),
            "• 1 jar Tahini (need: 6.0 fl oz, 0.50 gram)"
        );
        assert_eq!(
            format_item_line(&cream_line()),
            "• 1.5 cup Cashew Cream (yields 2 cup)"
        );
    }

    #[test]
    fn test_full_text_with_checked_item() {
        let flat = vec![cream_line(), onion_line(), tahini_line()];
        let checked: HashSet<String> = ["ingredient-1-3-12-large".to_string(), "stale-id".to_string()]
            .into_iter()
            .collect();
        let recipes = vec![
            RecipeInfo {
                id: RecipeId(1),
                name: "Hummus Bowl".to_string(),
                page_number: Some(112),
            },
            RecipeInfo {
                id: RecipeId(2),
                name: "Onion Soup".to_string(),
                page_number: None,
            },
        ];

        let text = format_as_text(&organized(), &recipes, &checked, &flat);
        let expected = [
            "🛒 Shopping List",
            "",
            "🛒 NEED TO BUY",
            "",
            "🥫 CANNED/PRESERVED",
            "• 1 jar Tahini (need: 6.0 fl oz, 0.50 gram)",
            "",
            "🔄 SUB-RECIPES",
            "• 1.5 cup Cashew Cream (yields 2 cup)",
            "",
            "",
            "✅ ALREADY HAVE",
            "",
            "🥬 PRODUCE",
            "• 3 large piece Onion",
            "",
            "📖 RECIPES USED",
            "• Hummus Bowl (p. 112)",
            "• Onion Soup",
            "",
        ]
        .join("\n");
        assert_eq!(text, expected);
    }

    #[test]
    fn test_nothing_checked_has_no_already_have_block() {
        let flat = vec![cream_line(), onion_line(), tahini_line()];
        let text = format_as_text(&organized(), &[], &HashSet::new(), &flat);
        assert!(text.starts_with("🛒 Shopping List\n\n🛒 NEED TO BUY\n\n🥬 PRODUCE\n"));
        assert!(!text.contains("ALREADY HAVE"));
        assert!(!text.contains("RECIPES USED"));
    }

    #[test]
    fn test_empty_list_renders_title_only() {
        let text = format_as_text(&OrganizedList::default(), &[], &HashSet::new(), &[]);
        assert_eq!(text, "🛒 Shopping List\n");
    }
}
