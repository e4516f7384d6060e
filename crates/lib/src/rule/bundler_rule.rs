//! Rule adapting one bundler configuration into a single build target.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{RecipeArgs, RecipeError, Rule};
use crate::bundler::{BundlerError, Compiler, Stats};
use crate::consts::BUNDLE_TARGET;
use crate::deferred::{PromiseError, Resolvers, resolvers};
use crate::path::BuildPath;

/// Runs a bundler and exposes its report as the `webpack` build target.
///
/// The compiler handle is created once and reused for every recipe call so
/// the bundler can keep whatever incremental state it has.
pub struct BundlerRule<C: Compiler> {
  compiler: C,
}

impl<C: Compiler> BundlerRule<C> {
  /// Initialize the bundler from `config`. Initialization errors are
  /// returned as-is.
  pub fn new(config: C::Config) -> Result<Self, BundlerError> {
    Ok(Self {
      compiler: C::new(config)?,
    })
  }

  pub fn target(&self) -> BuildPath {
    BuildPath::build(BUNDLE_TARGET)
  }

  async fn compile(&mut self) -> Result<Stats, RecipeError> {
    let Resolvers {
      resolve,
      reject,
      promise,
    } = resolvers::<Stats, BundlerError>();

    self.compiler.run(Box::new(move |result| {
      match result {
        Ok(stats) => resolve.resolve(stats),
        Err(e) => reject.reject(e),
      };
    }));

    promise.await.map_err(|e| match e {
      PromiseError::Rejected(e) => RecipeError::Bundler(e),
      PromiseError::Abandoned => RecipeError::Abandoned,
    })
  }
}

#[async_trait]
impl<C: Compiler> Rule for BundlerRule<C> {
  fn targets(&self) -> Vec<BuildPath> {
    vec![self.target()]
  }

  async fn recipe(&mut self, args: &mut dyn RecipeArgs) -> Result<bool, RecipeError> {
    let stats = self.compile().await?;

    args.log(&stats.render(true));

    for dep in stats.file_dependencies() {
      args.add_postreq(&absolute(dep));
    }

    let report = args.abs(&self.target());
    if let Err(source) = write_report(&report, &stats.to_string()).await {
      return Err(RecipeError::Report { path: report, source });
    }

    debug!(
      errors = stats.error_count(),
      warnings = stats.warning_count(),
      deps = stats.file_dependencies.len(),
      "bundler finished"
    );

    Ok(!stats.has_errors())
  }
}

fn absolute(path: &Path) -> PathBuf {
  if path.is_absolute() {
    return path.to_path_buf();
  }
  std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

async fn write_report(path: &Path, text: &str) -> std::io::Result<()> {
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent).await?;
  }
  tokio::fs::write(path, text).await
}
