//! Fer language compiler driver.
//!
//! Wires [`fer_core`]'s module-graph orchestration and [`fer_manifest`]'s
//! manifest/lockfile handling into a command-line tool (spec.md §6). The
//! core crate never touches the filesystem or a network; this binary is
//! the only place that does.

mod cli;

use clap::Parser;
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, ConfigBuilder, LevelPadding, TermLogger, TerminalMode, ThreadLogMode};
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = ConfigBuilder::new()
        .set_location_level(LevelFilter::Error)
        .set_thread_mode(ThreadLogMode::Both)
        .set_level_padding(LevelPadding::Off)
        .set_thread_level(LevelFilter::Off)
        .build();
    CombinedLogger::init(vec![TermLogger::new(LevelFilter::Info, config, TerminalMode::Mixed, ColorChoice::Auto)]).unwrap();

    cli::run(cli::Cli::parse())
}
