//! CLI command implementations

pub mod build;
pub mod clear;
pub mod config;
pub mod get;
pub mod prune;
pub mod status;

pub use build::execute as build;
pub use clear::execute as clear;
pub use config::execute as config;
pub use get::execute as get;
pub use prune::execute as prune;
pub use status::execute as status;
