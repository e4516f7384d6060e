//! Project configuration (`bundlemake.toml`).
//!
//! Relative roots resolve against the directory holding the file. The bundle
//! entry resolves against the source root and the outfile against the build
//! root, mirroring where sources and outputs live.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::bundler::EsbuildConfig;
use crate::consts::{BUILD_ROOT_ENV, CONFIG_FILENAME};
use crate::make::MakeConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid config {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
  src_root: Option<PathBuf>,
  build_root: Option<PathBuf>,
  bundle: EsbuildConfig,
}

#[derive(Debug, Clone)]
pub struct ProjectConfig {
  /// The file this configuration was read from.
  pub path: PathBuf,
  pub make: MakeConfig,
  pub bundle: EsbuildConfig,
}

impl ProjectConfig {
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let read_err = |source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    };
    let path = dunce::canonicalize(path).map_err(read_err)?;
    let raw = std::fs::read_to_string(&path).map_err(read_err)?;
    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut config = Self::parse(&raw, &base).map_err(|source| ConfigError::Parse {
      path: path.clone(),
      source,
    })?;
    config.path = path;
    Ok(config)
  }

  /// Parse configuration text, resolving relative paths against `base`.
  pub fn parse(raw: &str, base: &Path) -> Result<Self, toml::de::Error> {
    let raw: RawConfig = toml::from_str(raw)?;

    let src_root = match raw.src_root {
      Some(dir) => base.join(dir),
      None => base.to_path_buf(),
    };
    let build_root = match std::env::var(BUILD_ROOT_ENV) {
      Ok(dir) if !dir.is_empty() => base.join(dir),
      _ => match raw.build_root {
        Some(dir) => base.join(dir),
        None => src_root.join("build"),
      },
    };

    let mut bundle = raw.bundle;
    bundle.entry = src_root.join(&bundle.entry);
    bundle.outfile = build_root.join(&bundle.outfile);
    bundle.working_dir = Some(match bundle.working_dir.take() {
      Some(dir) => src_root.join(dir),
      None => src_root.clone(),
    });

    Ok(Self {
      path: base.join(CONFIG_FILENAME),
      make: MakeConfig { src_root, build_root },
      bundle,
    })
  }
}
