pub mod size_optimizer;

pub use size_optimizer::{choose_size, round_up_purchase, SizeChoice};
