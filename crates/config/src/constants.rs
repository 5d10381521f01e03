//! Default locations inside the output root
//!
//! All paths are relative; they are resolved against the sandboxed output
//! root at use time and never against the process working directory.

pub const GO_ROOT_DIR: &str = "deps/gomod";
pub const GO_MOD_CACHE_DIR: &str = "deps/gomod/pkg/mod";
pub const CACHE_DOWNLOAD_DIR: &str = "deps/gomod/pkg/mod/cache/download";
pub const STAGING_DIR: &str = "deps/.staging";

pub const CONFIG_DIR_NAME: &str = "prefetch";
pub const CONFIG_FILE_NAME: &str = "config.toml";
