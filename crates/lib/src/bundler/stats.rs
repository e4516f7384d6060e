//! Compilation statistics and the human-readable report.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use owo_colors::OwoColorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
  Error,
  Warning,
}

impl Severity {
  pub fn as_str(self) -> &'static str {
    match self {
      Severity::Error => "ERROR",
      Severity::Warning => "WARNING",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
  pub file: PathBuf,
  pub line: u32,
  pub column: u32,
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
  pub severity: Severity,
  pub message: String,
  pub location: Option<Location>,
  /// Extra lines printed by the bundler (code frames, notes).
  pub detail: Vec<String>,
}

impl Diagnostic {
  pub fn error(message: impl Into<String>) -> Self {
    Self {
      severity: Severity::Error,
      message: message.into(),
      location: None,
      detail: Vec::new(),
    }
  }

  pub fn warning(message: impl Into<String>) -> Self {
    Self {
      severity: Severity::Warning,
      ..Self::error(message)
    }
  }

  pub fn at(mut self, file: impl Into<PathBuf>, line: u32, column: u32) -> Self {
    self.location = Some(Location {
      file: file.into(),
      line,
      column,
    });
    self
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
  pub name: String,
  pub bytes: u64,
}

/// Result of one compilation.
#[derive(Debug, Clone, Default)]
pub struct Stats {
  pub assets: Vec<Asset>,
  pub diagnostics: Vec<Diagnostic>,
  /// Every file the bundler read, as reported by the bundler.
  pub file_dependencies: BTreeSet<PathBuf>,
  pub duration: Duration,
}

impl Stats {
  pub fn has_errors(&self) -> bool {
    self.error_count() > 0
  }

  pub fn error_count(&self) -> usize {
    self.count(Severity::Error)
  }

  pub fn warning_count(&self) -> usize {
    self.count(Severity::Warning)
  }

  fn count(&self, severity: Severity) -> usize {
    self.diagnostics.iter().filter(|d| d.severity == severity).count()
  }

  pub fn file_dependencies(&self) -> impl Iterator<Item = &Path> {
    self.file_dependencies.iter().map(PathBuf::as_path)
  }

  /// Render the report. The plain form is what `Display` produces.
  pub fn render(&self, colors: bool) -> String {
    let mut out = String::new();

    for asset in &self.assets {
      let size = format_bytes(asset.bytes);
      if colors {
        out.push_str(&format!("asset {} {}\n", asset.name.green().bold(), size));
      } else {
        out.push_str(&format!("asset {} {}\n", asset.name, size));
      }
    }

    let inputs = self.file_dependencies.len();
    out.push_str(&format!(
      "{} input file{}\n",
      inputs,
      if inputs == 1 { "" } else { "s" }
    ));

    for diagnostic in &self.diagnostics {
      let label = match (diagnostic.severity, colors) {
        (Severity::Error, true) => diagnostic.severity.as_str().red().bold().to_string(),
        (Severity::Warning, true) => diagnostic.severity.as_str().yellow().bold().to_string(),
        (_, false) => diagnostic.severity.as_str().to_string(),
      };
      match &diagnostic.location {
        Some(location) => out.push_str(&format!("\n{} in {}\n", label, location)),
        None => out.push_str(&format!("\n{}\n", label)),
      }
      out.push_str(&format!("  {}\n", diagnostic.message));
      for line in &diagnostic.detail {
        out.push_str(&format!("  {}\n", line));
      }
    }

    let millis = self.duration.as_millis();
    let summary = match self.error_count() {
      0 => format!("compiled successfully in {} ms", millis),
      1 => format!("compiled with 1 error in {} ms", millis),
      n => format!("compiled with {} errors in {} ms", n, millis),
    };
    if !self.diagnostics.is_empty() {
      out.push('\n');
    }
    if colors {
      if self.has_errors() {
        out.push_str(&summary.red().to_string());
      } else {
        out.push_str(&summary.green().to_string());
      }
    } else {
      out.push_str(&summary);
    }
    out.push('\n');

    out
  }
}

impl fmt::Display for Stats {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.render(false))
  }
}

fn format_bytes(bytes: u64) -> String {
  const KIB: u64 = 1024;
  const MIB: u64 = KIB * 1024;

  if bytes >= MIB {
    format!("{:.1} MiB", bytes as f64 / MIB as f64)
  } else if bytes >= KIB {
    format!("{:.1} KiB", bytes as f64 / KIB as f64)
  } else {
    format!("{} bytes", bytes)
  }
}
