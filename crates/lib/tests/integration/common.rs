//! Shared fixtures for integration tests.
//!
//! `ScriptCompiler` is a tiny deterministic bundler: it inlines files named
//! by `require("./x.js")` lines, reports every line containing
//! `syntax error` as a compilation error, and caches file contents by mtime
//! so unchanged files are not read again.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use bundlemake_lib::bundler::{BundlerError, Compiler, Diagnostic, OnComplete, Stats};
use bundlemake_lib::{BuildPath, MakeConfig, Makefile, add_bundle};
use tempfile::TempDir;

pub struct ScriptConfig {
  pub entry: PathBuf,
  pub outfile: PathBuf,
  pub reads: Arc<AtomicUsize>,
}

pub struct ScriptCompiler {
  entry: PathBuf,
  outfile: PathBuf,
  reads: Arc<AtomicUsize>,
  cache: HashMap<PathBuf, (SystemTime, String)>,
}

impl Compiler for ScriptCompiler {
  type Config = ScriptConfig;

  fn new(config: ScriptConfig) -> Result<Self, BundlerError> {
    if config.entry.as_os_str().is_empty() {
      return Err(BundlerError::InvalidConfig("entry is empty".to_string()));
    }
    Ok(Self {
      entry: config.entry,
      outfile: config.outfile,
      reads: config.reads,
      cache: HashMap::new(),
    })
  }

  fn run(&mut self, on_complete: OnComplete) {
    on_complete(self.compile());
  }
}

impl ScriptCompiler {
  fn compile(&mut self) -> Result<Stats, BundlerError> {
    let mut stats = Stats::default();
    let mut out = String::new();

    self.read(&self.entry.clone()).map_err(|source| BundlerError::EntryUnreadable {
      path: self.entry.clone(),
      source,
    })?;
    self.inline(&self.entry.clone(), &mut stats, &mut out);

    std::fs::write(&self.outfile, out)?;
    Ok(stats)
  }

  fn inline(&mut self, file: &Path, stats: &mut Stats, out: &mut String) {
    if !stats.file_dependencies.insert(file.to_path_buf()) {
      return;
    }
    let source = match self.read(file) {
      Ok(source) => source,
      Err(e) => {
        stats.diagnostics.push(Diagnostic::error(format!("cannot read {}: {}", file.display(), e)));
        return;
      }
    };

    for (n, line) in source.lines().enumerate() {
      if let Some(dep) = required(line) {
        let dep = file.parent().unwrap_or(Path::new("")).join(dep);
        self.inline(&dep, stats, out);
      } else if line.contains("syntax error") {
        stats
          .diagnostics
          .push(Diagnostic::error("unexpected token").at(file, n as u32 + 1, 1));
      } else {
        out.push_str(line);
        out.push('\n');
      }
    }
  }

  fn read(&mut self, file: &Path) -> std::io::Result<String> {
    let mtime = std::fs::metadata(file)?.modified()?;
    if let Some((cached, source)) = self.cache.get(file)
      && *cached == mtime
    {
      return Ok(source.clone());
    }
    let source = std::fs::read_to_string(file)?;
    self.reads.fetch_add(1, Ordering::SeqCst);
    self.cache.insert(file.to_path_buf(), (mtime, source.clone()));
    Ok(source)
  }
}

fn required(line: &str) -> Option<&str> {
  line.trim().strip_prefix("require(\"")?.strip_suffix("\");")
}

/// A scratch project with pinned file times.
pub struct Project {
  pub temp: TempDir,
  pub reads: Arc<AtomicUsize>,
}

impl Project {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("src")).unwrap();
    std::fs::create_dir_all(temp.path().join("build")).unwrap();
    Self {
      temp,
      reads: Arc::new(AtomicUsize::new(0)),
    }
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  pub fn path(&self, rel: &str) -> PathBuf {
    self.root().join(rel)
  }

  /// Write a source file dated an hour ago.
  pub fn write(&self, rel: &str, content: &str) {
    let path = self.path(rel);
    std::fs::write(&path, content).unwrap();
    set_mtime(&path, SystemTime::now() - Duration::from_secs(3600));
  }

  /// Rewrite a source file dated an hour ahead, so it is newer than any
  /// target written during the test.
  pub fn edit(&self, rel: &str, content: &str) {
    let path = self.path(rel);
    std::fs::write(&path, content).unwrap();
    set_mtime(&path, SystemTime::now() + Duration::from_secs(3600));
  }

  pub fn makefile(&self) -> Makefile {
    Makefile::new(MakeConfig::new(self.root()))
  }

  /// A makefile with the bundle target for `src/index.js` registered.
  pub fn bundle(&self) -> (Makefile, BuildPath) {
    let mut make = self.makefile();
    let target = add_bundle::<ScriptCompiler>(
      &mut make,
      ScriptConfig {
        entry: self.path("src/index.js"),
        outfile: self.path("build/bundle.js"),
        reads: self.reads.clone(),
      },
    )
    .unwrap();
    (make, target)
  }

  pub fn artifact(&self) -> String {
    std::fs::read_to_string(self.path("build/bundle.js")).unwrap()
  }

  pub fn reads(&self) -> usize {
    self.reads.load(Ordering::SeqCst)
  }
}

pub fn set_mtime(path: &Path, time: SystemTime) {
  File::options().write(true).open(path).unwrap().set_modified(time).unwrap();
}

pub fn mtime(path: &Path) -> SystemTime {
  std::fs::metadata(path).unwrap().modified().unwrap()
}

pub fn deps(make: &Makefile, target: &BuildPath) -> BTreeSet<PathBuf> {
  make.postreqs().get(&target.to_string()).unwrap().postreqs.clone()
}
