pub mod config;
pub mod logger;
pub mod streamline_toml;

pub use config::*;
pub use logger::{set_verbose, setup_logging};
pub use streamline_toml::{apply_file_to_opts, load_streamline_toml};
