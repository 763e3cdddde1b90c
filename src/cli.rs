use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DATA_DIR_ENV_VAR;
use crate::error::{EngineError, EngineResult};

#[derive(Parser, Debug)]
#[command(author, version, about = "Shopping lists from recipe selections", long_about = None)]
pub struct Cli {
    /// Directory holding the dataset CSV tables
    #[arg(short, long, env = DATA_DIR_ENV_VAR, global = true)]
    pub data_dir: Option<PathBuf>,

    /// JSON file overriding the engine's unit settings
    #[arg(long, global = true)]
    pub engine_config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a shopping list
    List {
        /// Recipes as NAME_OR_ID or NAME_OR_ID=BATCHES
        #[arg(required = true)]
        recipes: Vec<String>,

        /// Item keys already in the pantry
        #[arg(long, value_delimiter = ',')]
        checked: Vec<String>,

        /// Print the flat list as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Check whether adding CHILD to PARENT would create a cycle
    CheckCycle { parent: String, child: String },
    /// Flatten a sub-recipe into base ingredients
    Expand {
        sub_recipe: String,

        #[arg(short, long, default_value_t = 1.0)]
        quantity: f64,

        /// Unit of the quantity; defaults to the recipe's yield unit
        #[arg(short, long)]
        unit: Option<String>,

        #[arg(short, long, default_value_t = 1.0)]
        batches: f64,
    },
    /// Show the store section for an ingredient
    Classify {
        name: String,

        #[arg(short = 't', long = "type", default_value = "")]
        ingredient_type: String,

        #[arg(short, long, default_value = "")]
        unit: String,
    },
    /// List recipes using any of the given ingredients
    Search { query: String },
    /// Show the built-in default conversions
    Defaults {
        /// Ingredient to show; lists all names when omitted
        name: Option<String>,
    },
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Splits `NAME_OR_ID[=BATCHES]` into the recipe key and batch count.
pub fn parse_selection_arg(raw: &str) -> EngineResult<(String, f64)> {
    let (key, batches) = match raw.rsplit_once('=') {
        Some((key, batches)) => {
            let batches: f64 = batches
                .trim()
                .parse()
                .map_err(|_| EngineError::MalformedSelection(raw.to_string()))?;
            (key, batches)
        }
        None => (raw, 1.0),
    };
    let key = key.trim();
    if key.is_empty() || !batches.is_finite() || batches < 0.0 {
        return Err(EngineError::MalformedSelection(raw.to_string()));
    }
    Ok((key.to_string(), batches))
}
