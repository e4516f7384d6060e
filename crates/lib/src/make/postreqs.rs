//! Persisted post-requisite records.
//!
//! After a recipe runs, the files it declared are stored per target so the
//! next build can tell whether the target is stale without running the rule.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRecord {
  /// Whether the last recipe run succeeded.
  pub ok: bool,
  pub postreqs: BTreeSet<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
  version: u32,
  targets: BTreeMap<String, TargetRecord>,
}

pub struct PostreqStore {
  path: PathBuf,
  records: BTreeMap<String, TargetRecord>,
}

impl PostreqStore {
  /// Load records from `path`. A missing file yields an empty store; an
  /// unreadable one is ignored with a warning so every target rebuilds.
  pub fn load(path: &Path) -> Self {
    let records = match std::fs::read_to_string(path) {
      Ok(raw) => match serde_json::from_str::<StateFile>(&raw) {
        Ok(state) if state.version == STATE_VERSION => state.targets,
        Ok(state) => {
          warn!(path = %path.display(), version = state.version, "ignoring build state from another version");
          BTreeMap::new()
        }
        Err(e) => {
          warn!(path = %path.display(), error = %e, "ignoring corrupt build state");
          BTreeMap::new()
        }
      },
      Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
      Err(e) => {
        warn!(path = %path.display(), error = %e, "ignoring unreadable build state");
        BTreeMap::new()
      }
    };

    debug!(path = %path.display(), targets = records.len(), "loaded build state");

    Self {
      path: path.to_path_buf(),
      records,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn get(&self, target: &str) -> Option<&TargetRecord> {
    self.records.get(target)
  }

  pub fn record(&mut self, target: &str, postreqs: BTreeSet<PathBuf>, ok: bool) {
    self.records.insert(target.to_string(), TargetRecord { ok, postreqs });
  }

  pub fn remove(&mut self, target: &str) {
    self.records.remove(target);
  }

  /// Write the records, replacing the previous file atomically.
  pub fn save(&self) -> io::Result<()> {
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let state = StateFile {
      version: STATE_VERSION,
      targets: self.records.clone(),
    };
    let json = serde_json::to_string_pretty(&state).map_err(io::Error::other)?;

    let tmp = self.path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, &self.path)
  }
}
