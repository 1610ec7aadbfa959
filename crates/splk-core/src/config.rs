//! Runtime configuration for the kernel, threaded explicitly through every
//! constructor rather than read from module-level global state.

use std::path::PathBuf;

/// Which evolution pipeline the `Compiler` runs on each `observe` call.
///
/// `Scientific` is the canonical, direct signal-to-rule pipeline; only
/// kept for callers that still want the older hypothesis-gated path
/// (useful when a caller wants an extra human-in-the-loop step before a
/// rule is created at all, since `HypothesisBased` never mutates a
/// `ScopedRule` directly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Scientific,
    HypothesisBased,
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::Scientific
    }
}

#[derive(Debug, Clone)]
pub struct SplkConfig {
    pub max_rules: usize,
    pub max_nodes: usize,
    pub thread_safety: bool,
    pub auto_evolve: bool,
    pub log_level: String,
    pub archive_path: Option<PathBuf>,
    pub archive_max_mb: u64,
    pub pipeline: Pipeline,
    /// Observations between automatic `garbage_collect` runs in the Facade.
    pub gc_threshold: u32,
}

impl Default for SplkConfig {
    fn default() -> Self {
        Self {
            max_rules: 1000,
            max_nodes: 500,
            thread_safety: true,
            auto_evolve: true,
            log_level: "INFO".to_string(),
            archive_path: None,
            archive_max_mb: 100,
            pipeline: Pipeline::default(),
            gc_threshold: 50,
        }
    }
}

impl SplkConfig {
    /// Build a config from `SPLK_*` environment variables, falling back to
    /// `Default` for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_rules: env_usize("SPLK_MAX_RULES", defaults.max_rules),
            max_nodes: env_usize("SPLK_MAX_NODES", defaults.max_nodes),
            thread_safety: env_bool("SPLK_THREAD_SAFETY", defaults.thread_safety),
            auto_evolve: env_bool("SPLK_AUTO_EVOLVE", defaults.auto_evolve),
            log_level: std::env::var("SPLK_LOG_LEVEL").unwrap_or(defaults.log_level),
            archive_path: std::env::var("SPLK_ARCHIVE_PATH").ok().map(PathBuf::from),
            archive_max_mb: env_u64("SPLK_ARCHIVE_MAX_MB", defaults.archive_max_mb),
            pipeline: match std::env::var("SPLK_PIPELINE").as_deref() {
                Ok("hypothesis") => Pipeline::HypothesisBased,
                _ => Pipeline::Scientific,
            },
            gc_threshold: env_usize("SPLK_GC_THRESHOLD", defaults.gc_threshold as usize) as u32,
        }
    }

    /// Default gzip-rotated archive directory under the OS data dir, used
    /// when `archive_path` is unset.
    pub fn resolved_archive_path(&self) -> PathBuf {
        self.archive_path.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("dev", "splk", "splk")
                .map(|dirs| dirs.data_dir().join("cold_storage"))
                .unwrap_or_else(|| PathBuf::from("./splk_cold_storage"))
        })
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).as_deref() {
        Ok("1") | Ok("true") | Ok("TRUE") => true,
        Ok("0") | Ok("false") | Ok("FALSE") => false,
        _ => default,
    }
}
