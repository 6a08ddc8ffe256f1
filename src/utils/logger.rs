use colored::Colorize;
use env_logger::fmt::Formatter;
use env_logger::{Builder, Target};
use log::{Level, LevelFilter, Record};
use std::io::Write;

/// Initialise logging to stderr so it never mixes with pipeline output on stdout.
/// Dependencies log at warn, this crate at info (debug when `verbose`). Later calls are ignored;
/// use [`set_verbose`] to change the level once settings are known.
pub fn setup_logging(verbose: bool) {
    let _ = Builder::from_default_env()
        .target(Target::Stderr)
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_PKG_NAME"), LevelFilter::Debug)
        .format(format_record)
        .try_init();
    set_verbose(verbose);
}

/// Raise or lower this crate's level after the logger is up.
pub fn set_verbose(verbose: bool) {
    log::set_max_level(if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
}

/// `[streamline] msg`, with level and target for warnings and errors. Records emitted from a
/// handler worker carry the worker's thread name.
fn format_record(buf: &mut Formatter, record: &Record) -> std::io::Result<()> {
    let name = env!("CARGO_PKG_NAME").cyan();
    let thread = std::thread::current();
    let worker = thread
        .name()
        .filter(|n| n.contains("-worker-"))
        .map(|n| format!(" {}", n.dimmed()))
        .unwrap_or_default();
    match record.level() {
        Level::Error | Level::Warn => {
            let level_str = if record.level() == Level::Warn {
                "WARN".yellow()
            } else {
                "ERROR".red()
            };
            let target = record.target().white();
            writeln!(buf, "[{name}{worker} {level_str} {target}] {}", record.args())
        }
        _ => writeln!(buf, "[{name}{worker}] {}", record.args()),
    }
}
