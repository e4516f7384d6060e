//! Incremental build graph.
//!
//! A [`Makefile`] holds rules keyed by the targets they produce. Building a
//! goal visits the goal's rule and everything it depends on in dependency
//! order, skipping rules whose targets are up to date. A target is up to date
//! when it exists, its last recipe succeeded, and no file declared during
//! that run (a post-requisite) or listed as a prerequisite has changed since.

pub mod context;
pub mod graph;
pub mod postreqs;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::bundler::BundlerError;
use crate::consts::{POSTREQS_FILENAME, STATE_DIR};
use crate::path::BuildPath;
use crate::rule::{RecipeError, Rule};

pub use context::RecipeContext;
pub use graph::RuleGraph;
pub use postreqs::{PostreqStore, TargetRecord};

#[derive(Debug, Error)]
pub enum MakeError {
  #[error("no rule to make {0}")]
  NoRule(BuildPath),

  #[error("{0} is already produced by another rule")]
  DuplicateTarget(BuildPath),

  #[error("rule declares no targets")]
  NoTargets,

  #[error("dependency cycle detected")]
  CycleDetected,

  #[error("bundler initialization failed: {0}")]
  Bundler(#[from] BundlerError),

  #[error("failed to save build state {path}: {source}")]
  State {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

#[derive(Debug, Clone)]
pub struct MakeConfig {
  pub src_root: PathBuf,
  pub build_root: PathBuf,
}

impl MakeConfig {
  /// Sources under `src_root`, outputs under `<src_root>/build`.
  pub fn new(src_root: impl Into<PathBuf>) -> Self {
    let src_root = src_root.into();
    Self {
      build_root: src_root.join("build"),
      src_root,
    }
  }
}

/// A recipe that ran during a build.
#[derive(Debug)]
pub struct TargetLog {
  pub target: BuildPath,
  pub log: String,
  pub duration: Duration,
}

#[derive(Debug, Default)]
pub struct BuildSummary {
  /// Recipes that ran and succeeded.
  pub built: Vec<TargetLog>,

  /// Recipes that ran and reported a build failure.
  pub failed: Vec<TargetLog>,

  /// Recipes that could not run to completion.
  pub errored: Vec<(BuildPath, RecipeError)>,

  /// Rules skipped because they were up to date.
  pub up_to_date: Vec<BuildPath>,

  /// Rules skipped because a dependency failed.
  pub skipped: Vec<BuildPath>,
}

impl BuildSummary {
  pub fn is_success(&self) -> bool {
    self.failed.is_empty() && self.errored.is_empty() && self.skipped.is_empty()
  }

  pub fn total(&self) -> usize {
    self.built.len() + self.failed.len() + self.errored.len() + self.up_to_date.len() + self.skipped.len()
  }
}

/// Why a rule has to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
  MissingTarget(BuildPath),
  NeverBuilt,
  PreviousFailure,
  MissingInput(PathBuf),
  ChangedInput(PathBuf),
  UpstreamRebuilt,
}

impl fmt::Display for Staleness {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Staleness::MissingTarget(target) => write!(f, "{} does not exist", target),
      Staleness::NeverBuilt => write!(f, "no previous build recorded"),
      Staleness::PreviousFailure => write!(f, "previous build failed"),
      Staleness::MissingInput(path) => write!(f, "{} no longer exists", path.display()),
      Staleness::ChangedInput(path) => write!(f, "{} changed", path.display()),
      Staleness::UpstreamRebuilt => write!(f, "a prerequisite was rebuilt"),
    }
  }
}

pub struct Makefile {
  src_root: PathBuf,
  build_root: PathBuf,
  rules: Vec<Box<dyn Rule>>,
  producers: HashMap<BuildPath, usize>,
  order: Vec<BuildPath>,
  postreqs: PostreqStore,
}

impl Makefile {
  pub fn new(config: MakeConfig) -> Self {
    let state_path = config.build_root.join(STATE_DIR).join(POSTREQS_FILENAME);
    Self {
      src_root: config.src_root,
      build_root: config.build_root,
      rules: Vec::new(),
      producers: HashMap::new(),
      order: Vec::new(),
      postreqs: PostreqStore::load(&state_path),
    }
  }

  pub fn abs(&self, path: &BuildPath) -> PathBuf {
    path.resolve(&self.src_root, &self.build_root)
  }

  /// Every registered target, in registration order.
  pub fn targets(&self) -> &[BuildPath] {
    &self.order
  }

  pub fn postreqs(&self) -> &PostreqStore {
    &self.postreqs
  }

  /// Register a rule. Each target may be produced by only one rule.
  pub fn add(&mut self, rule: Box<dyn Rule>) -> Result<(), MakeError> {
    let targets = rule.targets();
    if targets.is_empty() {
      return Err(MakeError::NoTargets);
    }
    if let Some(dup) = targets.iter().find(|t| self.producers.contains_key(*t)) {
      return Err(MakeError::DuplicateTarget(dup.clone()));
    }

    let idx = self.rules.len();
    for target in targets {
      debug!(target = %target, "registered target");
      self.producers.insert(target.clone(), idx);
      self.order.push(target);
    }
    self.rules.push(rule);
    Ok(())
  }

  /// Bring `goal` up to date.
  ///
  /// Recipe outcomes are reported in the summary. `Err` is returned only for
  /// problems with the graph itself or its persisted state.
  pub async fn build(&mut self, goal: &BuildPath) -> Result<BuildSummary, MakeError> {
    let goal_rule = *self.producers.get(goal).ok_or_else(|| MakeError::NoRule(goal.clone()))?;

    let prereqs: Vec<Vec<BuildPath>> = self.rules.iter().map(|r| r.prereqs()).collect();
    let graph = RuleGraph::new(&prereqs, &self.producers, |p| self.abs(p).exists())?;
    let plan = graph.plan(goal_rule)?;

    info!(goal = %goal, rules = plan.len(), "starting build");

    let mut summary = BuildSummary::default();
    let mut ran: HashSet<usize> = HashSet::new();
    let mut blocked: HashSet<usize> = HashSet::new();

    for idx in plan {
      let name = self.rule_name(idx);
      let upstream = graph.dependencies(idx);

      if let Some(&failed) = upstream.iter().find(|d| blocked.contains(*d)) {
        warn!(target = %name, failed_dep = %self.rule_name(failed), "skipping target due to failed dependency");
        summary.skipped.push(name);
        blocked.insert(idx);
        continue;
      }

      let staleness = if upstream.iter().any(|d| ran.contains(d)) {
        Some(Staleness::UpstreamRebuilt)
      } else {
        self.staleness(idx)
      };

      let Some(reason) = staleness else {
        debug!(target = %name, "up to date");
        summary.up_to_date.push(name);
        continue;
      };

      info!(target = %name, reason = %reason, "running recipe");
      let started = Instant::now();
      let mut ctx = RecipeContext::new(&self.src_root, &self.build_root);
      let outcome = self.rules[idx].recipe(&mut ctx).await;
      let duration = started.elapsed();
      let (postreqs, log) = ctx.into_parts();
      let key = name.to_string();

      match outcome {
        Ok(true) => {
          info!(target = %name, postreqs = postreqs.len(), "target built");
          self.postreqs.record(&key, postreqs, true);
          ran.insert(idx);
          summary.built.push(TargetLog {
            target: name,
            log,
            duration,
          });
        }
        Ok(false) => {
          warn!(target = %name, "recipe reported failure");
          self.postreqs.record(&key, postreqs, false);
          blocked.insert(idx);
          summary.failed.push(TargetLog {
            target: name,
            log,
            duration,
          });
        }
        Err(e) => {
          error!(target = %name, error = %e, "recipe failed");
          self.postreqs.remove(&key);
          blocked.insert(idx);
          summary.errored.push((name, e));
        }
      }

      self.postreqs.save().map_err(|source| MakeError::State {
        path: self.postreqs.path().to_path_buf(),
        source,
      })?;
    }

    info!(
      built = summary.built.len(),
      up_to_date = summary.up_to_date.len(),
      failed = summary.failed.len() + summary.errored.len(),
      skipped = summary.skipped.len(),
      "build complete"
    );

    Ok(summary)
  }

  fn rule_name(&self, idx: usize) -> BuildPath {
    // `add` guarantees at least one target per rule.
    self.rules[idx].targets().swap_remove(0)
  }

  /// `None` when the rule's targets are up to date.
  fn staleness(&self, idx: usize) -> Option<Staleness> {
    let rule = &self.rules[idx];
    let targets = rule.targets();

    let mut oldest: Option<SystemTime> = None;
    for target in &targets {
      match modified(&self.abs(target)) {
        Some(mtime) => oldest = Some(oldest.map_or(mtime, |o| o.min(mtime))),
        None => return Some(Staleness::MissingTarget(target.clone())),
      }
    }
    let oldest = oldest?;

    let record = match self.postreqs.get(&targets[0].to_string()) {
      Some(record) => record,
      None => return Some(Staleness::NeverBuilt),
    };
    if !record.ok {
      return Some(Staleness::PreviousFailure);
    }

    let prereq_paths = rule.prereqs().into_iter().map(|p| self.abs(&p));
    for path in record.postreqs.iter().cloned().chain(prereq_paths) {
      match modified(&path) {
        None => return Some(Staleness::MissingInput(path)),
        Some(mtime) if mtime > oldest => return Some(Staleness::ChangedInput(path)),
        Some(_) => {}
      }
    }

    None
  }
}

fn modified(path: &Path) -> Option<SystemTime> {
  std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
