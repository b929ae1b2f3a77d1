mod config;
mod error;
mod logging;
mod sink;
mod state;
mod sync;
mod wootric;

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;
use crate::error::TapResult;
use crate::sink::JsonLinesSink;
use crate::state::SyncState;
use crate::sync::Syncer;
use crate::wootric::client::{WootricClient, WootricClientConfig};

#[derive(Parser)]
#[command(
    name = "tap-wootric",
    version,
    about = "Incremental Singer tap for the Wootric feedback API"
)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long)]
    config: PathBuf,

    /// Path to a JSON state file from a previous run
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_level);

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "fatal");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> TapResult<()> {
    let config = Config::from_file(&cli.config)?;

    let mut state = match &cli.state {
        Some(path) => {
            let value = config::load_state_file(path)?;
            SyncState::from_value(config.start_date, &value)?
        }
        None => SyncState::new(config.start_date),
    };

    let mut client = WootricClient::new(WootricClientConfig::from_tap_config(&config))
        .map_err(wootric::client::WootricClientError::from)
        .map_err(crate::error::TapError::from)?;

    tracing::info!("authenticating");
    client.authenticate().await?;

    let stdout = std::io::stdout();
    let mut sink = JsonLinesSink::new(stdout.lock());

    Syncer::new(&client, &mut state, &mut sink)
        .sync_all()
        .await?;

    tracing::info!("completed sync");
    Ok(())
}
