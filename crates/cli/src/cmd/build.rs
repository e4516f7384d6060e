//! Implementation of the `bundlemake build` command.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tracing::info;

use bundlemake_lib::{BuildPath, BuildSummary};

use crate::output::{
  eprint_log, format_duration, print_error, print_info, print_json, print_log, print_stat, print_success, print_warning,
};

/// Execute the build command.
///
/// Loads the project, brings `target` (default: the bundle target) up to
/// date, and prints a summary. Fails unless every visited rule succeeded.
pub fn cmd_build(config: &Path, target: Option<&str>, timeout: Option<Duration>, json: bool, verbose: bool) -> Result<()> {
  let (mut make, bundle) = super::load_project(config)?;
  let goal = match target {
    Some(t) => BuildPath::parse(t).with_context(|| format!("Invalid target '{}'", t))?,
    None => bundle,
  };

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let started = Instant::now();
  let summary = rt.block_on(async {
    match timeout {
      Some(limit) => match tokio::time::timeout(limit, make.build(&goal)).await {
        Ok(result) => result.map_err(anyhow::Error::from),
        Err(_) => Err(anyhow::anyhow!("Build timed out after {}", humantime::format_duration(limit))),
      },
      None => make.build(&goal).await.map_err(anyhow::Error::from),
    }
  })?;
  let elapsed = started.elapsed();
  info!(goal = %goal, elapsed = ?elapsed, "build finished");

  if json {
    print_json(&summary_json(&goal, &summary, elapsed))?;
  } else {
    print_summary(&goal, &summary, elapsed, verbose);
  }

  if !summary.is_success() {
    bail!("Build of {} failed", goal);
  }
  Ok(())
}

fn print_summary(goal: &BuildPath, summary: &BuildSummary, elapsed: Duration, verbose: bool) {
  for built in &summary.built {
    print_success(&format!("Built {} in {}", built.target, format_duration(built.duration)));
    if verbose {
      print_log(&built.log);
    }
  }
  for target in &summary.up_to_date {
    print_info(&format!("{} is up to date", target));
  }
  for failed in &summary.failed {
    print_error(&format!("{} failed after {}", failed.target, format_duration(failed.duration)));
    eprint_log(&failed.log);
  }
  for (target, err) in &summary.errored {
    print_error(&format!("{}: {}", target, err));
  }
  for target in &summary.skipped {
    print_warning(&format!("Skipped {} (dependency failed)", target));
  }

  println!();
  print_stat("Goal", &goal.to_string());
  print_stat("Targets", &summary.total().to_string());
  print_stat("Built", &summary.built.len().to_string());
  print_stat("Up to date", &summary.up_to_date.len().to_string());
  print_stat("Failed", &(summary.failed.len() + summary.errored.len()).to_string());
  print_stat("Elapsed", &format_duration(elapsed));
}

fn summary_json(goal: &BuildPath, summary: &BuildSummary, elapsed: Duration) -> serde_json::Value {
  let built: Vec<_> = summary
    .built
    .iter()
    .map(|t| serde_json::json!({ "target": t.target.to_string(), "duration_ms": t.duration.as_millis() as u64 }))
    .collect();
  let failed: Vec<_> = summary
    .failed
    .iter()
    .map(|t| serde_json::json!({ "target": t.target.to_string(), "log": t.log }))
    .collect();
  let errored: Vec<_> = summary
    .errored
    .iter()
    .map(|(target, err)| serde_json::json!({ "target": target.to_string(), "error": err.to_string() }))
    .collect();
  let names = |targets: &[BuildPath]| targets.iter().map(ToString::to_string).collect::<Vec<_>>();

  serde_json::json!({
    "goal": goal.to_string(),
    "success": summary.is_success(),
    "built": built,
    "up_to_date": names(&summary.up_to_date),
    "failed": failed,
    "errored": errored,
    "skipped": names(&summary.skipped),
    "elapsed_ms": elapsed.as_millis() as u64,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use bundlemake_lib::make::TargetLog;

  #[test]
  fn summary_json_lists_outcomes() {
    let summary = BuildSummary {
      failed: vec![TargetLog {
        target: BuildPath::build("webpack"),
        log: "error\n".to_string(),
        duration: Duration::from_millis(12),
      }],
      up_to_date: vec![BuildPath::build("other")],
      ..Default::default()
    };

    let json = summary_json(&BuildPath::build("webpack"), &summary, Duration::from_millis(20));

    assert_eq!(json["success"], false);
    assert_eq!(json["goal"], "build:webpack");
    assert_eq!(json["failed"][0]["log"], "error\n");
    assert_eq!(json["up_to_date"][0], "build:other");
    assert_eq!(json["elapsed_ms"], 20);
  }
}
