//! esbuild integration.
//!
//! Drives the esbuild CLI and reads its metafile to learn which files the
//! compilation read. Diagnostics are recovered from esbuild's stderr.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};
use which::which;

use super::stats::{Asset, Diagnostic, Location, Severity, Stats};
use super::{BundlerError, Compiler, OnComplete};
use crate::consts::ESBUILD_ENV;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
  #[default]
  Iife,
  Cjs,
  Esm,
}

impl Format {
  pub fn as_str(self) -> &'static str {
    match self {
      Format::Iife => "iife",
      Format::Cjs => "cjs",
      Format::Esm => "esm",
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
  #[default]
  Browser,
  Node,
  Neutral,
}

impl Platform {
  pub fn as_str(self) -> &'static str {
    match self {
      Platform::Browser => "browser",
      Platform::Node => "node",
      Platform::Neutral => "neutral",
    }
  }
}

fn default_target() -> String {
  "es2020".to_string()
}

/// esbuild bundler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EsbuildConfig {
  /// Entry module.
  pub entry: PathBuf,

  /// Bundle output file.
  pub outfile: PathBuf,

  #[serde(default)]
  pub format: Format,

  #[serde(default)]
  pub platform: Platform,

  /// ECMAScript target version
  #[serde(default = "default_target")]
  pub target: String,

  #[serde(default)]
  pub minify: bool,

  #[serde(default)]
  pub sourcemap: bool,

  /// External modules to exclude from bundling
  #[serde(default)]
  pub external: Vec<String>,

  /// Compile-time substitutions (`--define:KEY=VALUE`).
  #[serde(default)]
  pub define: BTreeMap<String, String>,

  /// Additional esbuild arguments
  #[serde(default)]
  pub extra_args: Vec<String>,

  /// Directory esbuild runs in. Relative paths resolve against it.
  #[serde(default)]
  pub working_dir: Option<PathBuf>,

  /// Explicit esbuild binary.
  #[serde(default)]
  pub esbuild: Option<PathBuf>,
}

impl EsbuildConfig {
  pub fn new(entry: impl Into<PathBuf>, outfile: impl Into<PathBuf>) -> Self {
    Self {
      entry: entry.into(),
      outfile: outfile.into(),
      format: Format::default(),
      platform: Platform::default(),
      target: default_target(),
      minify: false,
      sourcemap: false,
      external: Vec::new(),
      define: BTreeMap::new(),
      extra_args: Vec::new(),
      working_dir: None,
      esbuild: None,
    }
  }

  pub fn validate(&self) -> Result<(), BundlerError> {
    if self.entry.as_os_str().is_empty() {
      return Err(BundlerError::InvalidConfig("entry is empty".to_string()));
    }
    if self.outfile.as_os_str().is_empty() {
      return Err(BundlerError::InvalidConfig("outfile is empty".to_string()));
    }
    if self.target.is_empty() || self.target.contains(char::is_whitespace) {
      return Err(BundlerError::InvalidConfig(format!("invalid target {:?}", self.target)));
    }
    if self.external.iter().any(String::is_empty) {
      return Err(BundlerError::InvalidConfig("external module name is empty".to_string()));
    }
    if self.define.keys().any(String::is_empty) {
      return Err(BundlerError::InvalidConfig("define key is empty".to_string()));
    }
    Ok(())
  }
}

/// Find the esbuild binary: explicit config, then the environment, then `PATH`.
pub fn locate_esbuild(config: &EsbuildConfig) -> Result<PathBuf, BundlerError> {
  if let Some(path) = &config.esbuild {
    return Ok(path.clone());
  }
  if let Ok(path) = std::env::var(ESBUILD_ENV)
    && !path.is_empty()
  {
    return Ok(PathBuf::from(path));
  }
  which("esbuild").map_err(|_| BundlerError::NotFound)
}

/// esbuild-backed [`Compiler`].
pub struct EsbuildCompiler {
  program: PathBuf,
  config: Arc<EsbuildConfig>,
  working_dir: PathBuf,
  runs: u64,
  last_inputs: Arc<Mutex<BTreeSet<PathBuf>>>,
}

impl Compiler for EsbuildCompiler {
  type Config = EsbuildConfig;

  fn new(config: EsbuildConfig) -> Result<Self, BundlerError> {
    config.validate()?;
    let program = locate_esbuild(&config)?;
    let working_dir = match &config.working_dir {
      Some(dir) => dir.clone(),
      None => std::env::current_dir()?,
    };

    debug!(program = %program.display(), working_dir = %working_dir.display(), "initialized esbuild compiler");

    Ok(Self {
      program,
      config: Arc::new(config),
      working_dir,
      runs: 0,
      last_inputs: Arc::new(Mutex::new(BTreeSet::new())),
    })
  }

  fn run(&mut self, on_complete: OnComplete) {
    self.runs += 1;

    let invocation = Invocation {
      program: self.program.clone(),
      config: self.config.clone(),
      working_dir: self.working_dir.clone(),
      run: self.runs,
      last_inputs: self.last_inputs.clone(),
    };

    match tokio::runtime::Handle::try_current() {
      Ok(handle) => {
        handle.spawn(async move {
          on_complete(invocation.execute().await);
        });
      }
      Err(_) => on_complete(Err(BundlerError::Internal(
        "esbuild compiler must run inside a tokio runtime".to_string(),
      ))),
    }
  }
}

struct Invocation {
  program: PathBuf,
  config: Arc<EsbuildConfig>,
  working_dir: PathBuf,
  run: u64,
  last_inputs: Arc<Mutex<BTreeSet<PathBuf>>>,
}

impl Invocation {
  fn resolve(&self, path: &Path) -> PathBuf {
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.working_dir.join(path)
    }
  }

  async fn execute(self) -> Result<Stats, BundlerError> {
    let started = Instant::now();

    let entry = self.resolve(&self.config.entry);
    tokio::fs::File::open(&entry)
      .await
      .map_err(|source| BundlerError::EntryUnreadable {
        path: entry.clone(),
        source,
      })?;

    let outfile = self.resolve(&self.config.outfile);
    if let Some(parent) = outfile.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }

    let metafile = metafile_path(&outfile);
    match tokio::fs::remove_file(&metafile).await {
      Ok(()) => {}
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => return Err(e.into()),
    }

    let args = build_args(&self.config, &entry, &outfile, &metafile);
    info!(run = self.run, entry = %entry.display(), "running esbuild");
    debug!(program = %self.program.display(), args = ?args, "spawning esbuild");

    let output = Command::new(&self.program)
      .args(&args)
      .current_dir(&self.working_dir)
      .kill_on_drop(true)
      .output()
      .await
      .map_err(|source| BundlerError::Spawn {
        program: self.program.clone(),
        source,
      })?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut stats = Stats {
      diagnostics: parse_diagnostics(&stderr, &self.working_dir),
      ..Stats::default()
    };

    if output.status.success() {
      let raw = tokio::fs::read_to_string(&metafile).await?;
      let meta = Metafile::parse(&raw).map_err(|source| BundlerError::Metafile {
        path: metafile.clone(),
        source,
      })?;
      stats.file_dependencies = meta.input_paths(&self.working_dir);
      stats.assets = meta.assets();
    } else {
      if !stats.has_errors() {
        let mut diagnostic = Diagnostic::error(format!("esbuild exited with {}", output.status));
        diagnostic.detail = stderr.lines().map(str::to_string).collect();
        stats.diagnostics.push(diagnostic);
      }
      stats.file_dependencies = failed_dependencies(&entry, &stats.diagnostics);
    }

    self.note_inputs(&stats.file_dependencies);
    stats.duration = started.elapsed();

    Ok(stats)
  }

  fn note_inputs(&self, inputs: &BTreeSet<PathBuf>) {
    let mut last = self.last_inputs.lock().unwrap_or_else(PoisonError::into_inner);
    if self.run > 1 {
      let added = inputs.difference(&last).count();
      let removed = last.difference(inputs).count();
      debug!(run = self.run, added, removed, "input set changed since previous run");
    }
    *last = inputs.clone();
  }
}

fn metafile_path(outfile: &Path) -> PathBuf {
  let mut name = outfile.file_name().unwrap_or_default().to_os_string();
  name.push(".meta.json");
  outfile.with_file_name(name)
}

fn build_args(config: &EsbuildConfig, entry: &Path, outfile: &Path, metafile: &Path) -> Vec<String> {
  let mut args = vec![
    entry.display().to_string(),
    "--bundle".to_string(),
    format!("--outfile={}", outfile.display()),
    format!("--metafile={}", metafile.display()),
    format!("--format={}", config.format.as_str()),
    format!("--platform={}", config.platform.as_str()),
    format!("--target={}", config.target),
    "--log-level=warning".to_string(),
    "--color=false".to_string(),
  ];

  if config.minify {
    args.push("--minify".to_string());
  }
  if config.sourcemap {
    args.push("--sourcemap".to_string());
  }
  for ext in &config.external {
    args.push(format!("--external:{}", ext));
  }
  for (key, value) in &config.define {
    args.push(format!("--define:{}={}", key, value));
  }
  args.extend(config.extra_args.iter().cloned());

  args
}

/// The parts of esbuild's metafile we read.
#[derive(Debug, Deserialize)]
struct Metafile {
  #[serde(default)]
  inputs: BTreeMap<String, MetaInput>,
  #[serde(default)]
  outputs: BTreeMap<String, MetaOutput>,
}

#[derive(Debug, Deserialize)]
struct MetaInput {
  #[allow(dead_code)]
  #[serde(default)]
  bytes: u64,
}

#[derive(Debug, Deserialize)]
struct MetaOutput {
  #[serde(default)]
  bytes: u64,
}

impl Metafile {
  fn parse(raw: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(raw)
  }

  fn input_paths(&self, working_dir: &Path) -> BTreeSet<PathBuf> {
    self
      .inputs
      .keys()
      .filter(|key| is_file_input(key))
      .map(|key| working_dir.join(key))
      .collect()
  }

  fn assets(&self) -> Vec<Asset> {
    self
      .outputs
      .iter()
      .filter(|(name, _)| !name.ends_with(".meta.json"))
      .map(|(name, output)| Asset {
        name: name.clone(),
        bytes: output.bytes,
      })
      .collect()
  }
}

/// Metafile inputs from virtual namespaces (`<stdin>`, `(disabled):fs`,
/// data URLs) are not files on disk.
fn is_file_input(key: &str) -> bool {
  !(key.starts_with('<') || key.starts_with('(') || key.starts_with("data:") || key.contains("://"))
}

fn failed_dependencies(entry: &Path, diagnostics: &[Diagnostic]) -> BTreeSet<PathBuf> {
  let mut deps = BTreeSet::new();
  deps.insert(entry.to_path_buf());
  deps.extend(
    diagnostics
      .iter()
      .filter_map(|d| d.location.as_ref())
      .map(|location| location.file.clone()),
  );
  deps
}

/// Parse esbuild's plain-text diagnostics.
///
/// Each diagnostic starts with a `[ERROR]` or `[WARNING]` header; the first
/// `file:line:col:` line after it is its location and everything else up to
/// the next header is kept as detail.
fn parse_diagnostics(stderr: &str, working_dir: &Path) -> Vec<Diagnostic> {
  let mut diagnostics: Vec<Diagnostic> = Vec::new();

  for line in stderr.lines() {
    if let Some((severity, message)) = parse_header(line) {
      diagnostics.push(Diagnostic {
        severity,
        message: message.to_string(),
        location: None,
        detail: Vec::new(),
      });
      continue;
    }

    let Some(current) = diagnostics.last_mut() else {
      continue;
    };
    if is_summary_line(line) {
      continue;
    }
    if current.location.is_none()
      && let Some(mut location) = parse_location(line)
    {
      if location.file.is_relative() {
        location.file = working_dir.join(&location.file);
      }
      current.location = Some(location);
      continue;
    }
    if !line.trim().is_empty() {
      current.detail.push(line.trim_end().to_string());
    }
  }

  diagnostics
}

/// Headers start at column zero, optionally after the `✘`/`▲` marker.
/// Code-frame lines are indented and may echo arbitrary source text.
fn parse_header(line: &str) -> Option<(Severity, &str)> {
  if line.starts_with(char::is_whitespace) {
    return None;
  }
  let rest = line
    .strip_prefix("✘ ")
    .or_else(|| line.strip_prefix("▲ "))
    .unwrap_or(line);
  if let Some(message) = rest.strip_prefix("[ERROR] ") {
    return Some((Severity::Error, message.trim()));
  }
  if let Some(message) = rest.strip_prefix("[WARNING] ") {
    return Some((Severity::Warning, message.trim()));
  }
  None
}

fn parse_location(line: &str) -> Option<Location> {
  let loc = line.trim().strip_suffix(':')?;
  let mut parts = loc.rsplitn(3, ':');
  let column = parts.next()?.parse().ok()?;
  let line = parts.next()?.parse().ok()?;
  let file = parts.next()?;
  if file.is_empty() {
    return None;
  }
  Some(Location {
    file: PathBuf::from(file),
    line,
    column,
  })
}

/// Lines like `1 error` or `2 warnings and 1 error`.
/// Matches the closing tally: `1 error`, `2 warnings`, `1 warning and 1 error`.
fn is_summary_line(line: &str) -> bool {
  if line.starts_with(char::is_whitespace) {
    return false;
  }
  let is_tally = |count: &str, kind: &str| {
    count.parse::<u64>().is_ok() && matches!(kind, "error" | "errors" | "warning" | "warnings")
  };
  let words: Vec<&str> = line.trim_end().split(' ').collect();
  match words.as_slice() {
    [count, kind] => is_tally(count, kind),
    [c1, k1, "and", c2, k2] => is_tally(c1, k1) && is_tally(c2, k2),
    _ => false,
  }
}
