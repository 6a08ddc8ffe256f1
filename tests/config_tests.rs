use clap::Parser;
use log::LevelFilter;
use serde_json::json;
use streamline::engine::{Cli, setup_opts};
use streamline::utils::streamline_toml::parse_streamline_toml;
use streamline::utils::{apply_file_to_opts, load_streamline_toml};
use streamline::{ErrorRendering, Opts};

// --- .streamline.toml ---

#[test]
fn test_toml_overrides_present_fields_only() {
    let file = parse_streamline_toml(
        r#"
[settings]
workers = 4
error_value = "\"ERR\""
error_rendering = "message"
headers = true
extract = "result"
"#,
    )
    .unwrap();
    let mut opts = Opts::default();
    apply_file_to_opts(&file, &mut opts);

    assert_eq!(opts.workers, 4);
    assert_eq!(opts.error_value, json!("ERR"));
    assert_eq!(opts.error_rendering, ErrorRendering::Message);
    assert!(opts.headers);
    assert_eq!(opts.extract.as_deref(), Some("result"));
    assert!(!opts.progress);
    assert_eq!(opts.input, "-");
}

#[test]
fn test_toml_bad_error_value_is_ignored() {
    let file = parse_streamline_toml("[settings]\nerror_value = \"not json\"\n").unwrap();
    let mut opts = Opts::default();
    apply_file_to_opts(&file, &mut opts);
    assert_eq!(opts.error_value, serde_json::Value::Null);
}

#[test]
fn test_toml_rejects_bad_types() {
    assert!(parse_streamline_toml("[settings]\nworkers = \"many\"\n").is_err());
    assert!(parse_streamline_toml("[settings]\nerror_rendering = \"loud\"\n").is_err());
}

#[test]
fn test_toml_empty_is_default() {
    let file = parse_streamline_toml("").unwrap();
    let mut opts = Opts::default();
    apply_file_to_opts(&file, &mut opts);
    assert_eq!(opts.workers, Opts::default().workers);
}

#[test]
fn test_load_toml_from_dir() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_streamline_toml(dir.path()).is_none());

    std::fs::write(
        dir.path().join(".streamline.toml"),
        "[settings]\nprogress = true\n",
    )
    .unwrap();
    let file = load_streamline_toml(dir.path()).unwrap();
    let mut opts = Opts::default();
    apply_file_to_opts(&file, &mut opts);
    assert!(opts.progress);
}

#[test]
fn test_default_opts() {
    let opts = Opts::default();
    assert_eq!(opts.workers, 20);
    assert_eq!(opts.error_rendering, ErrorRendering::Substitute);
    assert_eq!(opts.output, "-");
}

// --- option layering ---

#[test]
fn test_setup_opts_logs_before_reading_settings() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    let cli = Cli::parse_from(["streamline"]);

    std::fs::write(dir.path().join(".streamline.toml"), "[settings]\nverbose = true\n").unwrap();
    let opts = setup_opts(&cli).unwrap();
    assert!(opts.verbose);
    assert_eq!(log::max_level(), LevelFilter::Debug);

    std::fs::write(dir.path().join(".streamline.toml"), "[settings\nworkers = 3\n").unwrap();
    let opts = setup_opts(&cli).unwrap();
    assert!(!opts.verbose);
    assert_eq!(opts.workers, Opts::default().workers);
    assert_eq!(log::max_level(), LevelFilter::Info);
}
