use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::path::BuildPath;
use crate::rule::RecipeArgs;

/// [`RecipeArgs`] handed to one recipe run. Collects the declared
/// post-requisites and the captured log.
pub struct RecipeContext {
  src_root: PathBuf,
  build_root: PathBuf,
  postreqs: BTreeSet<PathBuf>,
  log: String,
}

impl RecipeContext {
  pub fn new(src_root: &Path, build_root: &Path) -> Self {
    Self {
      src_root: src_root.to_path_buf(),
      build_root: build_root.to_path_buf(),
      postreqs: BTreeSet::new(),
      log: String::new(),
    }
  }

  pub fn into_parts(self) -> (BTreeSet<PathBuf>, String) {
    (self.postreqs, self.log)
  }
}

impl RecipeArgs for RecipeContext {
  fn abs(&self, path: &BuildPath) -> PathBuf {
    path.resolve(&self.src_root, &self.build_root)
  }

  fn add_postreq(&mut self, path: &Path) {
    debug!(path = %path.display(), "postreq");
    self.postreqs.insert(path.to_path_buf());
  }

  fn log(&mut self, text: &str) {
    for line in text.lines() {
      debug!("{}", line);
    }
    self.log.push_str(text);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn collects_postreqs_and_log() {
    let mut ctx = RecipeContext::new(Path::new("/p"), Path::new("/p/build"));
    assert_eq!(ctx.abs(&BuildPath::build("webpack")), PathBuf::from("/p/build/webpack"));
    assert_eq!(ctx.abs(&BuildPath::src("a.js")), PathBuf::from("/p/a.js"));

    ctx.add_postreq(Path::new("/p/a.js"));
    ctx.add_postreq(Path::new("/p/a.js"));
    ctx.log("line one\n");
    ctx.log("line two\n");

    let (postreqs, log) = ctx.into_parts();
    assert_eq!(postreqs.len(), 1);
    assert!(postreqs.contains(Path::new("/p/a.js")));
    assert_eq!(log, "line one\nline two\n");
  }
}
