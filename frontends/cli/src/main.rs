use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use questboard_cli::commands::{run, Backends, Cli};
use questboard_cli::config::AppConfig;
use questboard_cli::logging::init_logging;
use questboard_core::{AppState, NotificationLevel};
use questboard_remote::HttpOrderingClient;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging(&config.log)?;

    let app_state = Arc::new(AppState::new(config.notifications.max_visible));
    let mut stdout = std::io::stdout().lock();

    let result = if cli.offline {
        info!("Running against the in-memory demo backend");
        let backends = Backends::offline(Local::now().date_naive());
        run(cli.command, &backends, Arc::clone(&app_state), &mut stdout).await
    } else {
        let client = Arc::new(
            HttpOrderingClient::new(&config.remote).context("Failed to set up the HTTP client")?,
        );
        let backends = Backends {
            cards: Arc::clone(&client),
            quests: client,
        };
        run(cli.command, &backends, Arc::clone(&app_state), &mut stdout).await
    };

    for notification in app_state.notifications().active() {
        let label = match notification.level {
            NotificationLevel::Info => "info",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        };
        eprintln!("[{}] {}", label, notification.message);
    }

    result
}
