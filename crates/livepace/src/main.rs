mod bootstrap;

use std::sync::Arc;

use anyhow::Result;
use pace_core::settings::Settings;
use pace_data::paceman::{PacemanClient, PlayerDirectory};
use pace_data::registry::SubscriptionRegistry;
use pace_data::store::JsonFileStore;
use pace_runtime::clock::{Clock, TokioClock};
use pace_runtime::commands::{AcceptAllPlayers, CommandHandler};
use pace_runtime::notifier::Notifier;
use pace_runtime::poller::PollLoop;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(settings.tracing_level())?;

    tracing::info!("livepace v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Data file: {}, API: {}, poll every {}s",
        settings.data_file.display(),
        settings.api_base,
        settings.poll_interval
    );

    let registry = Arc::new(SubscriptionRegistry::open(Arc::new(JsonFileStore::new(
        &settings.data_file,
    ))));
    tracing::info!("Tracking {} player(s)", registry.len());

    let paceman = Arc::new(PacemanClient::new(&settings.api_base));
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);
    let notifier = Notifier::new(bootstrap::build_sink(&settings), clock.clone(), settings.send_pause());

    let poller = PollLoop::new(
        registry.clone(),
        paceman.clone(),
        notifier,
        clock,
        settings.poll_interval(),
    )
    .spawn(CancellationToken::new());

    let directory: Arc<dyn PlayerDirectory> = if settings.skip_player_check {
        Arc::new(AcceptAllPlayers)
    } else {
        paceman
    };
    let commands = CommandHandler::new(registry.clone(), directory);

    // Commands come from stdin; the loop ends on EOF or Ctrl+C.
    tokio::select! {
        result = bootstrap::serve_commands(
            &commands,
            &settings.destination,
            bootstrap::spawn_stdin_reader(),
            tokio::io::stdout(),
        ) => {
            result?;
            tracing::info!("stdin closed; shutting down");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received; shutting down");
        }
    }

    poller.shutdown().await;

    if let Err(e) = registry.flush() {
        tracing::warn!(error = %e, "final save of subscriptions failed");
    }

    Ok(())
}
