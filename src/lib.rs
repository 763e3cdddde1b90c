pub mod cli;
pub mod config;
pub mod error;
pub mod list_formatter;
pub mod model;
pub mod optim;
pub mod recipe_aggregator;
pub mod recipe_converter;
pub mod recipe_graph;
pub mod section_classifier;
pub mod store;
pub mod units;

#[cfg(test)]
mod test_fixtures;

pub use error::{EngineError, EngineResult};
