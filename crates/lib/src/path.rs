//! Logical paths in the build graph.
//!
//! A [`BuildPath`] names a file relative to either the source root or the
//! build root of a [`Makefile`](crate::make::Makefile). Rules declare their
//! targets and prerequisites with logical paths; the graph resolves them to
//! absolute filesystem paths only when a recipe runs.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
  #[error("path is empty")]
  Empty,

  #[error("path must be relative: {0}")]
  Absolute(String),

  #[error("path escapes its root: {0}")]
  EscapesRoot(String),
}

/// Which root a [`BuildPath`] is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Root {
  Src,
  Build,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildPath {
  root: Root,
  rel: String,
}

impl BuildPath {
  /// A path under the build root.
  ///
  /// # Panics
  ///
  /// Panics if `rel` is not a valid relative path. Use [`BuildPath::new`]
  /// for untrusted input.
  pub fn build(rel: &str) -> Self {
    match Self::new(Root::Build, rel) {
      Ok(path) => path,
      Err(e) => panic!("invalid build path {rel:?}: {e}"),
    }
  }

  /// A path under the source root.
  ///
  /// # Panics
  ///
  /// Panics if `rel` is not a valid relative path.
  pub fn src(rel: &str) -> Self {
    match Self::new(Root::Src, rel) {
      Ok(path) => path,
      Err(e) => panic!("invalid source path {rel:?}: {e}"),
    }
  }

  pub fn new(root: Root, rel: &str) -> Result<Self, PathError> {
    Ok(Self {
      root,
      rel: normalize(rel)?,
    })
  }

  /// Parse `build:<rel>`, `src:<rel>` or a bare `<rel>` (a build path).
  pub fn parse(s: &str) -> Result<Self, PathError> {
    if let Some(rel) = s.strip_prefix("build:") {
      Self::new(Root::Build, rel)
    } else if let Some(rel) = s.strip_prefix("src:") {
      Self::new(Root::Src, rel)
    } else {
      Self::new(Root::Build, s)
    }
  }

  pub fn root(&self) -> Root {
    self.root
  }

  pub fn rel(&self) -> &str {
    &self.rel
  }

  pub fn is_build(&self) -> bool {
    self.root == Root::Build
  }

  /// Resolve against the given roots.
  pub fn resolve(&self, src_root: &Path, build_root: &Path) -> PathBuf {
    let base = match self.root {
      Root::Src => src_root,
      Root::Build => build_root,
    };
    self.rel.split('/').fold(base.to_path_buf(), |acc, part| acc.join(part))
  }
}

impl fmt::Display for BuildPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.root {
      Root::Src => write!(f, "src:{}", self.rel),
      Root::Build => write!(f, "build:{}", self.rel),
    }
  }
}

fn normalize(rel: &str) -> Result<String, PathError> {
  let path = Path::new(rel);
  if path.is_absolute() || rel.starts_with('/') || rel.starts_with('\\') {
    return Err(PathError::Absolute(rel.to_string()));
  }

  let mut parts: Vec<String> = Vec::new();
  for component in path.components() {
    match component {
      Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
      Component::CurDir => {}
      Component::ParentDir => {
        if parts.pop().is_none() {
          return Err(PathError::EscapesRoot(rel.to_string()));
        }
      }
      Component::RootDir | Component::Prefix(_) => return Err(PathError::Absolute(rel.to_string())),
    }
  }

  if parts.is_empty() {
    return Err(PathError::Empty);
  }

  Ok(parts.join("/"))
}
