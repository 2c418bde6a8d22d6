//! aprsbot — relays chat `message` commands onto APRS-IS.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use aprsbot::{
    BotConfig, CommandContext, CommandRegistry, ConsoleSink, ConsoleTransport, LinkSource,
    NotificationSink, ReplyTarget,
};
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// APRS messaging chat bot.
#[derive(Parser, Debug)]
#[command(name = "aprsbot", about = "APRS messaging chat bot", version)]
struct Args {
    /// Run without an APRS-IS connection (the `message` command is disabled).
    #[arg(long)]
    offline: bool,

    /// Seconds to wait for a message acknowledgement (overrides ACK_TIMEOUT_SECONDS).
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    ack_timeout: Option<u64>,

    /// Seconds between pending-message expiry checks (overrides SWEEP_INTERVAL_SECONDS).
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    sweep_interval: Option<u64>,

    /// Seconds to wait for the listener on shutdown (overrides SHUTDOWN_TIMEOUT_SECONDS).
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    shutdown_timeout: Option<u64>,

    /// Name the console user's commands are attributed to.
    #[arg(long, default_value = "operator")]
    user: String,
}

impl Args {
    fn apply(&self, config: &mut BotConfig) {
        if let Some(secs) = self.ack_timeout {
            config.ack_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.sweep_interval {
            config.sweep_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.shutdown_timeout {
            config.shutdown_timeout = Duration::from_secs(secs);
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialise structured logging (controlled via RUST_LOG env var).
    // Logs go to stderr; stdout carries chat replies.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let runtime = tokio::runtime::Runtime::new().context("failed to start the Tokio runtime")?;
    let result = runtime.block_on(run(args));
    // A pending stdin read holds a blocking thread that never returns on its own.
    runtime.shutdown_timeout(Duration::from_millis(250));
    result
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = BotConfig::from_env().context("invalid configuration")?;
    args.apply(&mut config);

    let sink: Arc<dyn NotificationSink> = Arc::new(ConsoleSink::stdout());
    let ctx = CommandContext {
        config,
        sink: sink.clone(),
        link: if args.offline { LinkSource::Offline } else { LinkSource::AprsIs },
    };
    let registry = CommandRegistry::build(&ctx).await;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("interrupt received, shutting down");
                    shutdown.cancel();
                }
                Err(e) => warn!(error = %e, "failed to listen for interrupt"),
            }
        });
    }

    let transport = ConsoleTransport::new(
        BufReader::new(tokio::io::stdin()),
        ReplyTarget::new("console", args.user),
    );
    let handled = transport.run(&registry, sink.as_ref(), &shutdown).await;

    registry.shutdown().await;
    let handled = handled.context("failed to read commands")?;
    info!(handled, "aprsbot exiting");
    Ok(())
}
