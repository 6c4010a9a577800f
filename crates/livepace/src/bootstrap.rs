use std::sync::Arc;

use pace_core::settings::Settings;
use pace_runtime::commands::{Command, CommandHandler};
use pace_runtime::notifier::MessageSink;
use pace_runtime::sinks::{ConsoleSink, WebhookSink};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `level` is used, falling back to
/// `"info"` if it does not parse.
pub fn setup_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()?;

    Ok(())
}

// ── Sink selection ─────────────────────────────────────────────────────────────

/// Webhook sink when a URL is configured, stdout otherwise.
pub fn build_sink(settings: &Settings) -> Arc<dyn MessageSink> {
    match &settings.webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "delivering notifications to webhook");
            Arc::new(WebhookSink::new(url.clone()))
        }
        None => {
            tracing::info!("delivering notifications to stdout");
            Arc::new(ConsoleSink)
        }
    }
}

// ── Command host ───────────────────────────────────────────────────────────────

/// Forward stdin lines into a channel from a dedicated thread.
///
/// Tokio's own stdin reader cannot be cancelled, which would stall runtime
/// shutdown until the next newline.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(32);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Handle each incoming line on behalf of `origin` and write the reply to
/// `writer`. Returns when the sender side closes.
pub async fn serve_commands<W>(
    handler: &CommandHandler,
    origin: &str,
    mut lines: mpsc::Receiver<String>,
    mut writer: W,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines.recv().await {
        let Some(command) = Command::parse(&line) else {
            if !line.trim().is_empty() {
                tracing::debug!(line = %line, "ignoring non-command input");
            }
            continue;
        };

        let reply = handler.handle(origin, command).await;
        writer.write_all(reply.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
