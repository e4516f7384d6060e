pub const APP_NAME: &str = "bundlemake";

/// Logical name of the build path a bundler rule produces.
pub const BUNDLE_TARGET: &str = "webpack";

/// Directory under the build root holding bookkeeping state.
pub const STATE_DIR: &str = ".bundlemake";

pub const POSTREQS_FILENAME: &str = "postreqs.json";

pub const CONFIG_FILENAME: &str = "bundlemake.toml";

/// Overrides the configured build root.
pub const BUILD_ROOT_ENV: &str = "BUNDLEMAKE_BUILD_ROOT";

/// Overrides the esbuild binary lookup.
pub const ESBUILD_ENV: &str = "BUNDLEMAKE_ESBUILD";
