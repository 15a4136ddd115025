//! packrat: a minimal single-entry JavaScript bundler.
//!
//! The pipeline is resolve → graph → emit, driven by
//! [`core::services::PackratBuildService`] behind the [`core::interfaces::Bundler`]
//! trait: supply a [`core::models::Configuration`], receive a
//! [`core::models::BuildResult`].

pub mod cli;
pub mod core;
pub mod infrastructure;
pub mod utils;

pub use crate::core::interfaces::Bundler;
pub use crate::core::models::{BuildResult, BuildStats, Configuration, Mode, ModuleSpecifier, ResolveOptions};
pub use crate::core::services::PackratBuildService;
pub use crate::utils::BuildError;
