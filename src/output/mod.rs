use anyhow::Result;
use std::path::Path;

use crate::cli::OutputFormat;
use crate::engine::RetrievalOutcome;

pub mod formatters;

pub use formatters::*;

/// Rendering options shared by file and console output
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub format: OutputFormat,
    pub max_chars: usize,
    pub include_trail: bool,
}

fn render(outcome: &RetrievalOutcome, options: &RenderOptions) -> Result<String> {
    let content = match options.format {
        OutputFormat::Text => format_as_text(outcome, options.max_chars, options.include_trail),
        OutputFormat::Json => format_as_json(outcome, options.max_chars)?,
    };
    Ok(content)
}

/// Save retrieval outcome to file
pub async fn save_to_file(outcome: &RetrievalOutcome, path: &Path, options: &RenderOptions) -> Result<()> {
    let content = render(outcome, options)?;
    fs_err::write(path, content)?;
    Ok(())
}

/// Print retrieval outcome to console; failures in text form go to stderr
pub fn print_to_console(outcome: &RetrievalOutcome, options: &RenderOptions) -> Result<()> {
    let content = render(outcome, options)?;

    if outcome.is_success() || options.format == OutputFormat::Json {
        println!("{}", content);
    } else {
        eprintln!("{}", content);
    }
    Ok(())
}
