//! Load `.streamline.toml` from a directory (CLI only). Lib callers build `Opts` themselves.

use serde::Deserialize;
use std::path::Path;

use crate::utils::config::PackagePaths;
use crate::{ErrorRendering, Opts};

#[derive(Debug, Default, Deserialize)]
pub struct StreamlineToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    workers: Option<usize>,
    /// JSON text, e.g. `"\"ERR\""` or `"0"`.
    error_value: Option<String>,
    error_rendering: Option<ErrorRendering>,
    headers: Option<bool>,
    extract: Option<String>,
    progress: Option<bool>,
    closing_newline: Option<bool>,
    keep_trailing_newline: Option<bool>,
    verbose: Option<bool>,
}

/// Load the settings file from `dir` if present. None if missing or unreadable.
pub fn load_streamline_toml(dir: &Path) -> Option<StreamlineToml> {
    let path = dir.join(PackagePaths::get().config_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_streamline_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

pub fn parse_streamline_toml(s: &str) -> Result<StreamlineToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $opts:expr, $sec_field:ident => $opts_field:ident) => {
        if let Some(v) = $sec.$sec_field {
            $opts.$opts_field = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI flags.
pub fn apply_file_to_opts(file: &StreamlineToml, opts: &mut Opts) {
    let sec = &file.settings;
    apply_file_opt!(sec, opts, workers => workers);
    if let Some(ref raw) = sec.error_value {
        match serde_json::from_str(raw) {
            Ok(v) => opts.error_value = v,
            Err(e) => log::warn!("ignoring error_value {:?}: {}", raw, e),
        }
    }
    apply_file_opt!(sec, opts, error_rendering => error_rendering);
    apply_file_opt!(sec, opts, headers => headers);
    if let Some(ref path) = sec.extract {
        opts.extract = Some(path.clone());
    }
    apply_file_opt!(sec, opts, progress => progress);
    apply_file_opt!(sec, opts, closing_newline => closing_newline);
    apply_file_opt!(sec, opts, keep_trailing_newline => keep_trailing_newline);
    apply_file_opt!(sec, opts, verbose => verbose);
}
