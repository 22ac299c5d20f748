//! Terminal front end for the breed gallery.
//!
//! Presentation only: everything interesting lives in the library crate.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use breed_gallery::config::Configuration;
use breed_gallery::events::LoadProgress;
use breed_gallery::gallery::{Gallery, History, ImageView, Presenter};
use breed_gallery::source::HttpImageSource;
use clap::{ArgAction, Parser};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "breed-gallery", version, about = "Browse dog breeds from the terminal")]
struct Args {
    /// Path to YAML config (defaults apply when the file is missing)
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Breed to show first
    #[arg(long, value_name = "NAME")]
    default_breed: Option<String>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"))
        .add_directive(format!("breed_gallery={level}").parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
    Ok(())
}

#[derive(Debug, Default)]
struct TerminalPresenter;

impl Presenter for TerminalPresenter {
    fn loading(&mut self, progress: LoadProgress) {
        println!("Loading... ({} %)", progress.percent);
    }

    fn ready(&mut self, view: &ImageView) {
        println!("Ready.");
        print_view(view);
    }

    fn error(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

fn print_view(view: &ImageView) {
    println!("{}\n  {}", view.caption, view.url);
}

enum Command<'a> {
    Next,
    Breed(&'a str),
    Breeds,
    Browse,
    History,
    Help,
    Quit,
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let cmd = parts.next()?;
        Some(match cmd {
            "next" | "n" => Self::Next,
            "breed" | "b" => match parts.next() {
                Some(name) => Self::Breed(name),
                None => Self::Unknown(line.trim()),
            },
            "breeds" => Self::Breeds,
            "browse" => Self::Browse,
            "history" | "h" => Self::History,
            "help" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            _ => Self::Unknown(line.trim()),
        })
    }
}

fn print_help() {
    println!("commands: next | breed <name> | breeds | browse | history | help | quit");
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        config,
        default_breed,
        verbose,
    } = Args::parse();
    init_tracing(verbose)?;

    let mut cfg = Configuration::from_yaml_file_or_default(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?;
    if let Some(name) = default_breed {
        cfg.default_breed = name;
    }
    let cfg = cfg.validated().context("invalid configuration values")?;
    tracing::debug!("configuration: {cfg:#?}");

    let source = Arc::new(HttpImageSource::new(&cfg.source).context("failed to build HTTP client")?);
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut gallery = Gallery::new(&cfg, TerminalPresenter);
    gallery
        .load(source, cancel.clone())
        .await
        .context("breed catalog failed to load")?;
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line.context("reading stdin")?,
        };
        let Some(line) = line else {
            tracing::info!("stdin closed; initiating shutdown");
            break;
        };
        let Some(command) = Command::parse(&line) else {
            continue;
        };
        let outcome = match command {
            Command::Next => gallery.advance().map(|view| print_view(&view)),
            Command::Breed(name) => gallery.select_breed(name).map(|view| print_view(&view)),
            Command::Breeds => {
                println!("{}", gallery.picker().join(", "));
                Ok(())
            }
            Command::Browse => {
                for entry in gallery.browser() {
                    let thumb = entry.thumbnail.map(|t| t.url).unwrap_or_default();
                    println!("{:<28} {}", entry.name, thumb);
                }
                Ok(())
            }
            Command::History => gallery.active_history().map(|history| match history {
                History::Empty => println!("No history yet"),
                History::Images(images) => {
                    for image in images {
                        println!("  {}", image.url());
                    }
                }
            }),
            Command::Help => {
                print_help();
                Ok(())
            }
            Command::Quit => break,
            Command::Unknown(text) => {
                println!("unknown command: {text}");
                print_help();
                Ok(())
            }
        };
        if let Err(err) = outcome {
            println!("error: {err}");
        }
    }

    cancel.cancel();
    gallery.settle().await;
    Ok(())
}
