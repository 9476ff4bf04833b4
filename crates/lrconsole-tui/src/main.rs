use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use lrconsole_core::{Console, ConsoleConfig};
use tracing::info;

mod app;
mod handler;
mod tui;
mod ui;

#[cfg(test)]
mod test_support;

use app::App;
use tui::{EventHandler, Tui, TICK_RATE};

#[derive(Parser)]
#[command(name = "lrconsole")]
#[command(about = "Terminal console for driving a remote photo-editing agent")]
#[command(version)]
struct Cli {
    /// Agent address, e.g. http://localhost:5000
    #[arg(long, env = "LRCONSOLE_URL")]
    url: Option<String>,

    /// Seconds between status refreshes
    #[arg(long)]
    status_interval: Option<u64>,

    /// Seconds to wait for a command or status answer
    #[arg(long)]
    timeout: Option<u64>,

    /// Log file (default: <data dir>/lrconsole/lrconsole.log)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_file_logging(cli.log_file.clone())?;

    let config = load_config(&cli)?;
    info!(base_url = %config.base_url, "starting console");

    let mut console = Console::connect(config)?;
    console.start();
    let mut app = App::new(console);

    let mut terminal = tui::init()?;
    tui::install_panic_hook();

    let result = run(&mut terminal, &mut app).await;

    app.console.shutdown();
    tui::restore()?;
    info!("console closed");
    result
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await,
            None => break,
        }
    }

    Ok(())
}

/// File, then environment, then flags.
fn load_config(cli: &Cli) -> Result<ConsoleConfig> {
    let mut config = ConsoleConfig::load()?.with_base_url(cli.url.clone());
    if let Some(secs) = cli.status_interval {
        config.status_interval_secs = secs;
    }
    if let Some(secs) = cli.timeout {
        config.request_timeout_secs = secs;
    }
    Ok(config)
}

// The terminal owns stdout/stderr, so logs go to a file.
fn init_file_logging(path: Option<PathBuf>) -> Result<()> {
    let log_path = match path {
        Some(path) => path,
        None => dirs::data_local_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?
            .join("lrconsole")
            .join("lrconsole.log"),
    };
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| anyhow!("Cannot open log file {:?}: {}", log_path, e))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lrconsole=info,lrconsole_core=info".into()),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();

    Ok(())
}
