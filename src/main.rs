use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transcript_waterfall::cli::{Cli, Commands, OutputFormat};
use transcript_waterfall::config::Config;
use transcript_waterfall::output::{self, RenderOptions};
use transcript_waterfall::{utils, RetrievalEngine, VideoId};

fn init_tracing(verbose: bool, json_logs: bool) {
    let default_filter = if verbose {
        "transcript_waterfall=debug"
    } else {
        "transcript_waterfall=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Retrieve {
            input,
            output,
            format,
            max_chars,
            deadline_ms,
            trail,
        } => {
            // validated before any configuration or network work
            let id = VideoId::parse(&input)?;
            if utils::is_url(&input) {
                tracing::debug!("Resolved {} to video id {}", input, id);
            }

            let config = Config::load(cli.config.as_deref()).await?;

            let missing_deps = utils::check_dependencies(&config.strategies.subprocess.program).await;
            if !missing_deps.is_empty() && !cli.quiet {
                eprintln!("{} Dependency check warnings:", style("⚠").yellow());
                for dep in missing_deps {
                    eprintln!("   • {}", dep);
                }
                eprintln!("   (Continuing anyway - other strategies may still succeed)");
            }

            let mut engine = RetrievalEngine::from_config(&config)?;
            if let Some(ms) = deadline_ms {
                config
                    .engine
                    .check_deadline(ms)
                    .context("Invalid --deadline-ms")?;
                engine = engine.with_deadline(Duration::from_millis(ms));
            }

            let progress = if cli.quiet {
                ProgressBar::hidden()
            } else {
                ProgressBar::new_spinner()
            };
            progress.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
            );
            progress.set_message(format!("Fetching transcript for {}...", id));
            progress.enable_steady_tick(Duration::from_millis(120));

            let outcome = engine.retrieve(&id).await;
            progress.finish_and_clear();

            let options = RenderOptions {
                format,
                max_chars,
                include_trail: trail,
            };
            match output {
                // a failed text retrieval must not replace the file with its diagnostics
                Some(path) if outcome.is_success() || options.format == OutputFormat::Json => {
                    output::save_to_file(&outcome, &path, &options).await?;
                    if outcome.is_success() {
                        println!("Transcript saved to: {}", path.display());
                    }
                }
                _ => output::print_to_console(&outcome, &options)?,
            }

            let retrieved = outcome.into_result()?;
            if !cli.quiet {
                eprintln!(
                    "{} {} via {} ({}) in {}",
                    style("✓").green(),
                    retrieved.tier,
                    retrieved.strategy,
                    retrieved.wave,
                    utils::format_elapsed(retrieved.elapsed_ms)
                );
            }
        }
        Commands::Strategies => {
            let config = Config::load(cli.config.as_deref()).await?;
            let engine = RetrievalEngine::from_config(&config)?;

            println!("Global deadline: {}ms", engine.deadline().as_millis());
            for (index, wave) in engine.waves().iter().enumerate() {
                println!("Wave {} ({}):", index + 1, style(wave.label()).bold());
                for strategy in wave.strategies() {
                    println!("  • {} (timeout {}ms)", strategy.name(), strategy.timeout().as_millis());
                }
            }
        }
        Commands::Config { show } => {
            let config = Config::load(cli.config.as_deref()).await?;
            if show {
                config.display();
            } else {
                config.save().await?;
                let (path, _) = Config::config_path()?;
                println!("Configuration written to: {}", path.display());
            }
        }
    }

    Ok(())
}
