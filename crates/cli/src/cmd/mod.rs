mod build;
mod targets;

pub use build::cmd_build;
pub use targets::cmd_targets;

use std::path::Path;

use anyhow::{Context, Result};

use bundlemake_lib::{BuildPath, EsbuildCompiler, Makefile, ProjectConfig, add_bundle};

/// Load the project and register its bundle target.
fn load_project(config: &Path) -> Result<(Makefile, BuildPath)> {
  let project = ProjectConfig::load(config)?;
  let mut make = Makefile::new(project.make);
  let target = add_bundle::<EsbuildCompiler>(&mut make, project.bundle)
    .with_context(|| format!("Failed to register bundle from {}", project.path.display()))?;
  Ok((make, target))
}
