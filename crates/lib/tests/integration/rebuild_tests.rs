//! Bundle targets rebuilt through the build graph.

use std::time::{Duration, SystemTime};

use bundlemake_lib::{BundlerError, RecipeError};

use super::common::{Project, deps, mtime, set_mtime};

#[tokio::test]
async fn builds_entry_exports() {
  let project = Project::new();
  project.write("src/index.js", "module.exports = { one: 1 };\n");
  let (mut make, target) = project.bundle();

  let summary = make.build(&target).await.unwrap();

  assert!(summary.is_success());
  assert_eq!(summary.built.len(), 1);
  assert_eq!(project.artifact(), "module.exports = { one: 1 };\n");

  let report = std::fs::read_to_string(make.abs(&target)).unwrap();
  assert!(report.contains("compiled successfully"));
  assert!(summary.built[0].log.contains("1 input file"));
}

#[tokio::test]
async fn entry_change_rebuilds() {
  let project = Project::new();
  project.write("src/index.js", "module.exports = { two: 2 };\n");
  let (mut make, target) = project.bundle();

  make.build(&target).await.unwrap();
  assert!(project.artifact().contains("two: 2"));

  project.edit("src/index.js", "module.exports = { three: 3 };\n");
  let summary = make.build(&target).await.unwrap();

  assert_eq!(summary.built.len(), 1);
  assert!(project.artifact().contains("three: 3"));
  assert!(!project.artifact().contains("two: 2"));
}

#[tokio::test]
async fn transitive_change_rebuilds() {
  let project = Project::new();
  project.write("src/index.js", "require(\"./dep.js\");\nmodule.exports = dep;\n");
  project.write("src/dep.js", "const dep = { four: 4 };\n");
  let (mut make, target) = project.bundle();

  make.build(&target).await.unwrap();
  assert!(project.artifact().contains("four: 4"));
  assert!(deps(&make, &target).contains(&project.path("src/dep.js")));

  project.edit("src/dep.js", "const dep = { four: 5 };\n");
  let summary = make.build(&target).await.unwrap();

  assert_eq!(summary.built.len(), 1);
  assert!(project.artifact().contains("four: 5"));
}

#[tokio::test]
async fn unchanged_sources_keep_report() {
  let project = Project::new();
  project.write("src/index.js", "require(\"./dep.js\");\n");
  project.write("src/dep.js", "const dep = 1;\n");
  let (mut make, target) = project.bundle();

  make.build(&target).await.unwrap();
  let report = make.abs(&target);
  let before = mtime(&report);

  let summary = make.build(&target).await.unwrap();

  assert_eq!(summary.up_to_date, vec![target.clone()]);
  assert!(summary.built.is_empty());
  assert_eq!(mtime(&report), before);
}

#[tokio::test]
async fn compile_error_is_soft_failure() {
  let project = Project::new();
  project.write("src/index.js", "require(\"./dep.js\");\n");
  project.write("src/dep.js", "syntax error here\n");
  let (mut make, target) = project.bundle();

  let summary = make.build(&target).await.unwrap();

  assert!(summary.errored.is_empty());
  assert_eq!(summary.failed.len(), 1);
  assert!(summary.failed[0].log.contains("unexpected token"));

  let record = make.postreqs().get(&target.to_string()).unwrap();
  assert!(!record.ok);
  assert!(record.postreqs.contains(&project.path("src/dep.js")));

  project.edit("src/dep.js", "const dep = 1;\n");
  let summary = make.build(&target).await.unwrap();

  assert!(summary.is_success());
  assert_eq!(summary.built.len(), 1);
  assert!(project.artifact().contains("const dep = 1;"));
}

#[tokio::test]
async fn missing_entry_is_hard_failure() {
  let project = Project::new();
  let (mut make, target) = project.bundle();

  let summary = make.build(&target).await.unwrap();

  assert!(summary.failed.is_empty());
  assert_eq!(summary.errored.len(), 1);
  assert!(matches!(
    summary.errored[0].1,
    RecipeError::Bundler(BundlerError::EntryUnreadable { .. })
  ));
  assert!(!make.abs(&target).exists());
  assert!(make.postreqs().get(&target.to_string()).is_none());
}

#[tokio::test]
async fn added_dependency_is_tracked() {
  let project = Project::new();
  project.write("src/index.js", "const a = 1;\n");
  project.write("src/extra.js", "const extra = 2;\n");
  let (mut make, target) = project.bundle();

  make.build(&target).await.unwrap();
  assert!(!deps(&make, &target).contains(&project.path("src/extra.js")));

  project.edit("src/index.js", "require(\"./extra.js\");\n");
  make.build(&target).await.unwrap();
  assert!(deps(&make, &target).contains(&project.path("src/extra.js")));

  set_mtime(&project.path("src/index.js"), SystemTime::now() - Duration::from_secs(3600));
  let summary = make.build(&target).await.unwrap();
  assert_eq!(summary.up_to_date, vec![target.clone()]);

  // Only the discovered dependency changes now.
  project.edit("src/extra.js", "const extra = 3;\n");
  let summary = make.build(&target).await.unwrap();
  assert_eq!(summary.built.len(), 1);
  assert!(project.artifact().contains("extra = 3"));
}

#[tokio::test]
async fn compiler_handle_caches_unchanged_files() {
  let project = Project::new();
  project.write("src/index.js", "require(\"./dep.js\");\nconst v = 1;\n");
  project.write("src/dep.js", "const dep = 1;\n");
  let (mut make, target) = project.bundle();

  make.build(&target).await.unwrap();
  assert_eq!(project.reads(), 2);

  project.edit("src/index.js", "require(\"./dep.js\");\nconst v = 2;\n");
  make.build(&target).await.unwrap();

  // Only the edited entry is read again.
  assert_eq!(project.reads(), 3);
}
