use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// 2D gravitational N-body simulator.
#[derive(Debug, Parser)]
#[command(name = "n-body-2d", version, about)]
pub struct CliArgs {
    /// Path to the JSON configuration file.
    pub config: PathBuf,

    /// Logging verbosity.
    #[arg(long, value_enum, default_value_t = Verbosity::Debug)]
    pub verbosity: Verbosity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum Verbosity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Verbosity {
    pub fn to_level_filter(self) -> tracing::level_filters::LevelFilter {
        match self {
            Verbosity::Debug => tracing::level_filters::LevelFilter::DEBUG,
            Verbosity::Info => tracing::level_filters::LevelFilter::INFO,
            Verbosity::Warning => tracing::level_filters::LevelFilter::WARN,
            Verbosity::Error => tracing::level_filters::LevelFilter::ERROR,
        }
    }
}
