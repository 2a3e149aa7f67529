use std::{io::BufRead, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use keycloak_event_dispatcher::{
    Dispatcher, DispatcherConfig, MessageSource,
    handler::{EventCounter, LoggingHandler},
    source::{ChannelSource, LinesSource},
};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Lines buffered between the stdin reader thread and the dispatcher.
const STDIN_BUFFER: usize = 64;

/// Dispatches newline-delimited Keycloak admin events to the built-in handlers.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Maximum number of events handled at once. Defaults to the number of CPUs.
    #[arg(long, env = "DISPATCHER_POOL_SIZE")]
    pool_size: Option<usize>,

    /// File with one JSON event per line. Reads stdin when omitted.
    input: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    set_up_tracing()?;
    let args = Args::parse();

    let config = match args.pool_size {
        Some(pool_size) => DispatcherConfig::with_pool_size(pool_size),
        None => DispatcherConfig::default(),
    };

    match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            run(LinesSource::new(BufReader::new(file)), config).await
        }
        None => run(stdin_source(), config).await,
    }
}

/// Reads stdin on a plain thread so a pending read never holds up shutdown.
fn stdin_source() -> ChannelSource {
    let (source, sender) = ChannelSource::new(STDIN_BUFFER);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().split(b'\n') {
            match line {
                Ok(line) if line.trim_ascii().is_empty() => continue,
                Ok(line) => {
                    if sender.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    error!(error = %err, "Failed to read stdin");
                    break;
                }
            }
        }
    });
    source
}

async fn run<S: MessageSource>(source: S, config: DispatcherConfig) -> Result<()> {
    let counter = Arc::new(EventCounter::new());
    let mut dispatcher = Dispatcher::new(source, config)?;
    dispatcher.register_handler(Arc::new(LoggingHandler));
    dispatcher.register_handler(counter.clone());
    let dispatcher = Arc::new(dispatcher);

    let ctx = CancellationToken::new();
    let shutdown = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            shutdown.cancel();
        }
    });

    info!(pool_size = dispatcher.pool_size(), "Dispatching events");
    let result = dispatcher.start(ctx).await;
    dispatcher.close().await?;
    result.context("Dispatcher stopped")?;

    info!("Handled {} events", counter.total());
    for (resource_type, count) in counter.by_resource_type().await {
        info!("  {resource_type}: {count}");
    }
    Ok(())
}

fn set_up_tracing() -> Result<()> {
    #[cfg(windows)]
    let with_color = nu_ansi_term::enable_ansi_support().is_ok();
    #[cfg(not(windows))]
    let with_color = true;

    // Logs go to stderr so stdout stays free for piping.
    let fmt_layer = fmt::layer()
        .with_ansi(with_color)
        .with_target(false)
        .with_writer(std::io::stderr);
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(if cfg!(debug_assertions) { "debug" } else { "info" }))?;
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    Ok(())
}
