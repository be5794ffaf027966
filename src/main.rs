use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use sentui::app::App;
use sentui::backend::HttpBackend;
use sentui::config::Config;
use sentui::logger;

/// Terminal dashboard for live news sentiment streaming and single-shot
/// text sentiment analysis.
#[derive(Debug, Parser)]
#[command(name = "sentui", version, about)]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Sentiment backend base URL (overrides the config file).
    #[arg(long)]
    backend_url: Option<String>,
    /// Stream keyword to start with (overrides the config file).
    #[arg(long)]
    keyword: Option<String>,
    /// Log file location (defaults to the platform data directory).
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = cli.backend_url {
        config.backend_url = url;
    }
    if let Some(keyword) = cli.keyword {
        config.keyword = keyword;
    }

    let log_path = cli.log_file.unwrap_or_else(logger::default_log_path);
    logger::init(&log_path)?;

    let backend: Arc<HttpBackend> = Arc::new(HttpBackend::new(config.backend_url.clone()));
    let app = App::new(config, backend);

    let mut terminal = setup_terminal()?;
    let result = app.run(&mut terminal).await;
    restore_terminal(&mut terminal)?;
    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
