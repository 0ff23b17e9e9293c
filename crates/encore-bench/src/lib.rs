//! # Encore Bench
//!
//! The scenario layer and load scheduler of the Encore benchmarker: weighted
//! load scenarios and exclusive validation scenarios drive the shadow store
//! and the consistency oracle from `encore-core` through the HTTP sessions
//! of `encore-client`, while the runner ramps concurrency, injects periodic
//! heavyweight validations and folds everything into one scored result.

pub mod page;
pub mod result;
pub mod runner;
pub mod scenario;
pub mod static_files;
pub mod world;

pub use result::BenchResult;
pub use runner::{RunOptions, Runner};
pub use world::World;
