//! gitpack - content-addressed build cache for git dependencies
//!
//! Builds npm packages from a git URL plus commit SHA, stores the resulting
//! tarballs in a local content-addressed cache, and resolves misses through
//! a shared registry and an upstream-git fallback.

pub mod build;
pub mod cli;
pub mod config;
pub mod error;
pub mod hierarchy;
pub mod key;
pub mod store;
pub mod tier;

pub use error::{GitPackError, GitPackResult};
