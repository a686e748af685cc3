use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use okyimages::config;
use okyimages::{CaptureOrchestrator, CaptureOutcome, ErrorCategory, UploadedImage};

#[derive(Parser)]
#[command(name = "okyimages")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Upload clipboard or file images and print a markdown reference", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload the image currently on the clipboard
    Paste,

    /// Upload an existing image file
    Upload {
        /// Image to upload
        path: PathBuf,
    },

    /// Show where the configuration lives and what it contains
    Config {
        /// Restore default settings first
        #[arg(long)]
        reset: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Logger first so configuration problems are reported
    let level_from_env = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Trace)
        .parse_default_env()
        .init();
    if !level_from_env {
        log::set_max_level(effective_level(cli.verbose, log::LevelFilter::Info));
    }

    let settings = match config::load_config() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            config::Config::default()
        }
    };

    if !level_from_env {
        log::set_max_level(effective_level(cli.verbose, settings.env_filter_level()));
    }

    log::info!("Starting okyimages v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Config { reset } => {
            if reset {
                config::reset_config()?;
            }
            let current = if reset {
                config::Config::default()
            } else {
                settings
            };
            println!("{}", config::get_config_path()?.display());
            println!("{}", serde_json::to_string_pretty(&current)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Paste => {
            let orchestrator = CaptureOrchestrator::new(settings)?;
            Ok(report(orchestrator.capture_from_clipboard().await))
        }
        Commands::Upload { path } => {
            let orchestrator = CaptureOrchestrator::new(settings)?;
            Ok(report(orchestrator.capture_from_file(&path).await))
        }
    }
}

/// Log level used when RUST_LOG does not set one.
fn effective_level(verbose: bool, configured: log::LevelFilter) -> log::LevelFilter {
    if verbose {
        log::LevelFilter::Debug
    } else {
        configured
    }
}

fn markdown_reference(image: &UploadedImage) -> String {
    format!(
        "![{}]({} \"{}\")",
        image.display_name, image.url, image.display_name
    )
}

fn report(outcome: CaptureOutcome) -> ExitCode {
    match outcome {
        Ok(image) => {
            println!("{}", markdown_reference(&image));
            eprintln!("Image uploaded successfully!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let hint = match e.category() {
                ErrorCategory::Environment => "check the local setup",
                ErrorCategory::ClipboardState => "copy an image first",
                ErrorCategory::Subprocess => "the capture helper failed",
                ErrorCategory::Remote => "the image store did not accept the upload",
                ErrorCategory::Configuration => "check the configuration file",
            };
            log::error!("Image upload failed: {}", e);
            eprintln!("Image upload failed ({}): {}", hint, e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::LevelFilter;

    #[test]
    fn test_verbose_overrides_configured_level() {
        assert_eq!(effective_level(true, LevelFilter::Warn), LevelFilter::Debug);
        assert_eq!(effective_level(false, LevelFilter::Warn), LevelFilter::Warn);
    }

    #[test]
    fn test_startup_level_lets_config_warnings_through() {
        // load_config warns before the configured level is known
        assert!(log::Level::Warn <= effective_level(false, LevelFilter::Info));
    }

    #[test]
    fn test_markdown_reference() {
        let image = UploadedImage {
            display_name: "image-1.png".to_string(),
            url: "https://images.oky.ac.cn/.netlify/images?url=2024/abcd1234.png".to_string(),
        };
        assert_eq!(
            markdown_reference(&image),
            "![image-1.png](https://images.oky.ac.cn/.netlify/images?url=2024/abcd1234.png \"image-1.png\")"
        );
    }
}
