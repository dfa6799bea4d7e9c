use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "transcript-waterfall",
    about = "Transcript Waterfall - fetch a YouTube transcript from whichever source answers first",
    version,
    long_about = "Races several independent transcript sources in ordered waves under one global deadline. Falls back from exact captions to auto-generated captions to the video description, and reports every failed attempt when nothing works."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./config.yaml or the user config directory)
    #[arg(short, long, global = true, env = "TRANSCRIPT_WATERFALL_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Retrieve the transcript of a video
    Retrieve {
        /// YouTube URL or 11-character video id
        #[arg(value_name = "URL_OR_ID")]
        input: String,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Truncate the text to this many characters
        #[arg(long, default_value = "30000")]
        max_chars: usize,

        /// Override the global deadline in milliseconds
        #[arg(long, value_name = "MS")]
        deadline_ms: Option<u64>,

        /// Print every failed attempt when retrieval fails
        #[arg(long)]
        trail: bool,
    },

    /// List the configured waves and their strategies
    Strategies,

    /// Show or create the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON with tier, strategy and diagnostics
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_retrieve() {
        let cli = Cli::parse_from([
            "transcript-waterfall",
            "retrieve",
            "dQw4w9WgXcQ",
            "--format",
            "json",
            "--deadline-ms",
            "4000",
            "--trail",
        ]);
        match cli.command {
            Commands::Retrieve { input, format, deadline_ms, trail, max_chars, .. } => {
                assert_eq!(input, "dQw4w9WgXcQ");
                assert_eq!(format, OutputFormat::Json);
                assert_eq!(deadline_ms, Some(4000));
                assert!(trail);
                assert_eq!(max_chars, 30000);
            }
            _ => panic!("expected retrieve"),
        }
    }
}
