use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cvr_chat_core::{ChatClient, Config, HttpBackend};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "cvr-chat", version)]
#[command(about = "Terminal chat client for the INEC CVR voter registration assistant")]
struct Cli {
    /// Backend base URL (overrides CVR_CHAT_URL and the config file)
    #[arg(long)]
    url: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Store --url in the config file for later runs
    #[arg(long, requires = "url")]
    remember: bool,

    /// Where to write logs
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_file.clone())?;

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load().unwrap_or_else(|e| {
            warn!(error = %e, "could not load config, using defaults");
            Config::new()
        }),
    };

    if cli.remember {
        let path = match &cli.config {
            Some(path) => path.clone(),
            None => Config::get_config_path()?,
        };
        config.base_url = cli.url.clone();
        config
            .save_to(&path)
            .with_context(|| format!("failed to save config to {}", path.display()))?;
        info!(path = %path.display(), "saved backend url");
    }

    let base_url = config.base_url(cli.url.as_deref());
    info!(%base_url, "starting cvr-chat");

    let backend = Arc::new(HttpBackend::new(&base_url));
    let mut app = App::new(ChatClient::new(backend, config.greeting()), base_url);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    info!("cvr-chat exiting");
    result
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        app.poll_tasks().await;
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }

    Ok(())
}

/// Logs go to a file; the terminal belongs to the UI.
fn init_logging(log_file: Option<PathBuf>) -> Result<()> {
    let path = match log_file {
        Some(path) => path,
        None => Config::config_dir()?.join("cvr-chat.log"),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    Ok(())
}
