use anyhow::{anyhow, Context, Result};
use dotenv::dotenv;
use std::collections::HashSet;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pantry_list::cli::{parse_args, parse_selection_arg, Cli, Command};
use pantry_list::config::{EngineConfig, DATA_DIR_ENV_VAR, DEFAULT_LOG_FILTER};
use pantry_list::list_formatter::{format_as_text, format_quantity, recipe_info_for_selections};
use pantry_list::model::RecipeSelection;
use pantry_list::recipe_aggregator::generate_shopping_list;
use pantry_list::recipe_graph::expand_sub_recipe;
use pantry_list::section_classifier::{classify, organize_by_sections};
use pantry_list::store::{load_dataset_dir, Catalog, Dataset, DefaultCatalogue, MemoryStore};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_store(cli: &Cli) -> Result<MemoryStore> {
    let dir = cli
        .data_dir
        .as_deref()
        .ok_or_else(|| anyhow!("No dataset directory: pass --data-dir or set {}", DATA_DIR_ENV_VAR))?;
    let dataset = load_dataset_dir(dir)
        .with_context(|| format!("Failed to load dataset from {:?}", dir))?;
    let defaults = DefaultCatalogue::builtin().context("Failed to parse built-in default conversions")?;
    Ok(MemoryStore::new(dataset, defaults))
}

fn resolve_selections(data: &Dataset, raw: &[String]) -> Result<Vec<RecipeSelection>> {
    raw.iter()
        .map(|arg| {
            let (key, batches) = parse_selection_arg(arg)?;
            let recipe = data.resolve_recipe(&key)?;
            Ok(RecipeSelection::new(recipe.id, batches))
        })
        .collect()
}

fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_json_file(path),
        None => Ok(EngineConfig::default()),
    }
}

fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();

    let cli = parse_args();
    let config = load_engine_config(cli.engine_config.as_deref())?;

    match &cli.command {
        Command::List { recipes, checked, json } => {
            let store = open_store(&cli)?;
            let data = store.read()?;
            let selections = resolve_selections(&data, recipes)?;
            let list = generate_shopping_list(&*data, &config, &selections)
                .context("Failed to generate shopping list")?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else {
                let organized = organize_by_sections(&*data, &list);
                let recipe_info = recipe_info_for_selections(&*data, &selections);
                let checked: HashSet<String> = checked.iter().cloned().collect();
                println!("{}", format_as_text(&organized, &recipe_info, &checked, &list));
            }
        }
        Command::CheckCycle { parent, child } => {
            let store = open_store(&cli)?;
            let (parent, child) = {
                let data = store.read()?;
                (data.resolve_recipe(parent)?.clone(), data.resolve_recipe(child)?.clone())
            };
            if store.check_circular_reference(parent.id, child.id)? {
                println!("Adding '{}' to '{}' would create a cycle", child.name, parent.name);
            } else {
                println!("'{}' can be added to '{}'", child.name, parent.name);
            }
        }
        Command::Expand { sub_recipe, quantity, unit, batches } => {
            let store = open_store(&cli)?;
            let data = store.read()?;
            let recipe = data.resolve_recipe(sub_recipe)?;
            let unit = match unit {
                Some(name) => data.unit_id(name)?,
                None => recipe.yield_unit,
            };
            let expanded = expand_sub_recipe(&*data, recipe.id, *quantity, unit, *batches, &HashSet::new())
                .with_context(|| format!("Failed to expand '{}'", recipe.name))?;

            println!("{} for {} batch(es):", recipe.name, format_quantity(*batches));
            for entry in expanded {
                let name = data.ingredient(entry.ingredient).map_or("?", |i| i.name.as_str());
                let unit_name = data.unit(entry.unit).map_or("?", |u| u.name.as_str());
                match entry.size_qualifier {
                    Some(size) => println!("• {} {} {} {}", format_quantity(entry.quantity), size, unit_name, name),
                    None => println!("• {} {} {}", format_quantity(entry.quantity), unit_name, name),
                }
            }
        }
        Command::Classify { name, ingredient_type, unit } => {
            let section = classify(name, ingredient_type, unit);
            println!("{} ({})", section.label(), section);
        }
        Command::Search { query } => {
            let store = open_store(&cli)?;
            let found = store.find_recipes_by_ingredients(query)?;
            if found.is_empty() {
                println!("No recipes found for '{}'", query);
            }
            for recipe in found {
                match recipe.page_number {
                    Some(page) => println!("{} (p. {})", recipe.name, page),
                    None => println!("{}", recipe.name),
                }
            }
        }
        Command::Defaults { name } => {
            let catalogue = DefaultCatalogue::builtin().context("Failed to parse built-in default conversions")?;
            match name {
                Some(name) => {
                    let entry = catalogue
                        .lookup(name)
                        .ok_or_else(|| anyhow!("No default conversions for '{}'", name))?;
                    println!("{}", serde_json::to_string_pretty(entry)?);
                }
                None => {
                    println!("Default conversions v{}:", catalogue.version);
                    for name in catalogue.ingredient_names() {
                        println!("  {}", name);
                    }
                }
            }
        }
    }

    Ok(())
}
