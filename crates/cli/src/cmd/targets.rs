//! Targets command implementation.

use std::path::Path;

use anyhow::Result;

use crate::output::symbols;

pub fn cmd_targets(config: &Path) -> Result<()> {
  let (make, _) = super::load_project(config)?;

  for target in make.targets() {
    println!("  {} {} {}", symbols::INFO, target, make.abs(target).display());
  }

  Ok(())
}
