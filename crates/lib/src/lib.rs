//! bundlemake-lib: bundler targets for an incremental build graph
//!
//! This crate provides the pieces that turn a bundler invocation into a
//! build target whose staleness is tracked per input file:
//! - `BundlerRule`: runs a bundler and writes its report as the `webpack` target
//! - `add_bundle`: registers a bundler rule with a `Makefile`
//! - `Makefile`: rule graph with post-requisite based up-to-date checks
//! - `EsbuildCompiler`: the esbuild-backed bundler handle

pub mod bundler;
pub mod config;
pub mod consts;
pub mod deferred;
pub mod make;
pub mod path;
pub mod register;
pub mod rule;

pub use bundler::{BundlerError, Compiler, EsbuildCompiler, EsbuildConfig, Stats};
pub use config::{ConfigError, ProjectConfig};
pub use make::{BuildSummary, MakeConfig, MakeError, Makefile};
pub use path::BuildPath;
pub use register::add_bundle;
pub use rule::{BundlerRule, RecipeArgs, RecipeError, Rule};
