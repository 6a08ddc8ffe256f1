//! Streamline CLI: run input lines through a chain of stages.

use anyhow::Result;
use clap::Parser;
use std::time::Instant;
use streamline::engine::arg_parser::Cli;
use streamline::engine::handle_run;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
