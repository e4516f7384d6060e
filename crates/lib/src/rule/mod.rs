//! Build-graph rule contract.
//!
//! A [`Rule`] names the targets it produces and knows how to produce them.
//! While its recipe runs, the graph hands it a [`RecipeArgs`] through which
//! it resolves logical paths, declares files discovered during the build and
//! writes to the build log.

pub mod bundler_rule;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::bundler::BundlerError;
use crate::path::BuildPath;

pub use bundler_rule::BundlerRule;

/// Services the build graph offers a running recipe.
pub trait RecipeArgs: Send {
  /// Absolute filesystem path of a logical path.
  fn abs(&self, path: &BuildPath) -> PathBuf;

  /// Declare a file read during this build. Changes to it make the rule's
  /// targets stale.
  fn add_postreq(&mut self, path: &Path);

  /// Append text to the build log.
  fn log(&mut self, text: &str);
}

#[async_trait]
pub trait Rule: Send {
  fn targets(&self) -> Vec<BuildPath>;

  /// Paths that must exist (and be up to date) before the recipe runs.
  fn prereqs(&self) -> Vec<BuildPath> {
    Vec::new()
  }

  /// Produce the targets.
  ///
  /// `Ok(false)` is a handled build failure whose details are in the log;
  /// `Err` means the recipe itself could not run to completion.
  async fn recipe(&mut self, args: &mut dyn RecipeArgs) -> Result<bool, RecipeError>;
}

/// Hard recipe failures.
#[derive(Debug, Error)]
pub enum RecipeError {
  #[error("bundler invocation failed: {0}")]
  Bundler(#[from] BundlerError),

  #[error("failed to write report {path}: {source}")]
  Report {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The bundler dropped its completion callback without calling it.
  #[error("bundler never reported completion")]
  Abandoned,
}
