//! Bundler contract.
//!
//! A bundler is reached through a [`Compiler`] handle: it is initialized once
//! from a configuration and then asked to `run` any number of times. Each run
//! completes by invoking a callback with either an invocation-level error or
//! the [`Stats`] of the compilation.

pub mod esbuild;
pub mod stats;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use esbuild::{EsbuildCompiler, EsbuildConfig};
pub use stats::{Asset, Diagnostic, Location, Severity, Stats};

/// Completion callback handed to [`Compiler::run`].
pub type OnComplete = Box<dyn FnOnce(Result<Stats, BundlerError>) + Send + 'static>;

/// A stateful bundler handle.
///
/// Implementations own whatever incremental state the bundler keeps between
/// runs; the handle is reused for every invocation of the rule that owns it.
pub trait Compiler: Send {
  type Config;

  /// Initialize the bundler. Errors here mean the configuration is unusable.
  fn new(config: Self::Config) -> Result<Self, BundlerError>
  where
    Self: Sized;

  /// Start one compilation. `on_complete` must be called at most once.
  fn run(&mut self, on_complete: OnComplete);
}

/// Invocation-level bundler errors.
///
/// These are distinct from compilation errors, which are reported through
/// [`Stats::has_errors`].
#[derive(Debug, Error)]
pub enum BundlerError {
  #[error(
    "esbuild not found. Install it with: npm install -g esbuild\n\
     or point BUNDLEMAKE_ESBUILD at the binary."
  )]
  NotFound,

  #[error("invalid bundler configuration: {0}")]
  InvalidConfig(String),

  #[error("cannot read entry {path}: {source}")]
  EntryUnreadable {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to run {program}: {source}")]
  Spawn {
    program: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid metafile {path}: {source}")]
  Metafile {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("io error: {0}")]
  Io(#[from] io::Error),

  #[error("bundler failed: {0}")]
  Internal(String),
}
