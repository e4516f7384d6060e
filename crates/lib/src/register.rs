//! Convenience entry point for adding a bundler target to a build graph.

use tracing::debug;

use crate::bundler::Compiler;
use crate::make::{MakeError, Makefile};
use crate::path::BuildPath;
use crate::rule::BundlerRule;

/// Add a bundler target to the build graph.
///
/// Initializes the bundler from `config`, registers the resulting rule with
/// `make`, and returns the target path so callers can depend on it.
/// Initialization errors surface here, before any recipe runs.
pub fn add_bundle<C>(make: &mut Makefile, config: C::Config) -> Result<BuildPath, MakeError>
where
  C: Compiler + 'static,
{
  let rule = BundlerRule::<C>::new(config)?;
  let target = rule.target();
  make.add(Box::new(rule))?;
  debug!(target = %target, "added bundler rule");
  Ok(target)
}
