//! Application configuration constants.
//! Defaults and environment overrides in one place.

use std::str::FromStr;
use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    env_prefix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!(".{pkg}.toml"),
                env_prefix: pkg.to_uppercase(),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Per-directory settings file, e.g. `.streamline.toml`.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// `STREAMLINE_<suffix>`.
    pub fn env_var(&self, suffix: &str) -> String {
        format!("{}_{}", self.env_prefix, suffix)
    }
}

// ---- Engine defaults ----

pub struct StreamlineConsts;

impl StreamlineConsts {
    /// Concurrent handler calls per executor stage when nothing else is configured.
    pub const DEFAULT_WORKERS: usize = 20;
    /// Name meaning stdin / stdout.
    pub const STDIO: &'static str = "-";
    pub const LINE_DELIMITER: u8 = b'\n';
    /// Combiner reads the inserted value from the latest version...
    pub const COMBINE_SOURCE_OFFSET: isize = -1;
    /// ...and inserts it into the version before that.
    pub const COMBINE_TARGET_OFFSET: isize = -2;
    pub const DEFAULT_SPLIT_DELIMITER: &'static str = r"\s+";
    pub const DEFAULT_HEAD_COUNT: usize = 1;
}

// ---- Environment ----

/// Environment variable suffixes (prefixed with the package name).
pub struct EnvKeys;

impl EnvKeys {
    pub const WORKER_COUNT: &'static str = "WORKER_COUNT";
    pub const CLOSING_NEWLINE: &'static str = "CLOSING_NEWLINE";
}

/// Parse `STREAMLINE_<suffix>` as `T`; `default` when unset or unparsable.
pub fn env_or<T: FromStr>(suffix: &str, default: T) -> T {
    std::env::var(PackagePaths::get().env_var(suffix))
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Truthy env flag: `1`, `true`, `yes`, `on` (any case).
pub fn env_flag(suffix: &str) -> bool {
    std::env::var(PackagePaths::get().env_var(suffix))
        .map(|s| {
            matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}
