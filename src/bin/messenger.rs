//! `messenger` - dispatch demo messages and run consumers from a JSON config.
//!
//! ```text
//! messenger --config messenger.json send --name Ada --count 3
//! messenger --config messenger.json consume async --limit 10
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use messenger_rust::{HandlersLocator, Message, Messenger, MessengerConfig, TraceMiddleware};
use serde::{Deserialize, Serialize};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "messenger", version, about = "Message bus and worker runtime")]
struct Cli {
    /// Messenger configuration (JSON)
    #[arg(short, long, default_value = "messenger.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dispatch `Hello` messages through the bus
    Send {
        #[arg(short, long, default_value = "world")]
        name: String,

        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Consume messages from the given transports until interrupted
    Consume {
        #[arg(required = true)]
        transports: Vec<String>,

        /// Stop each worker after this many messages
        #[arg(long)]
        limit: Option<usize>,

        /// Stop each worker after this many seconds
        #[arg(long)]
        time_limit: Option<u64>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct Hello {
    name: String,
}

impl Message for Hello {
    const NAME: &'static str = "app.hello";
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = MessengerConfig::from_path(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    if let Command::Consume {
        limit, time_limit, ..
    } = &cli.command
    {
        if let Some(limit) = limit {
            config.worker.message_limit = Some(*limit);
        }
        if let Some(secs) = time_limit {
            config.worker.time_limit = Some(Duration::from_secs(*secs));
        }
    }

    let messenger = Messenger::builder(config)
        .handlers(HandlersLocator::new().named_handler("hello", |msg: &Hello| {
            info!(name = %msg.name, "Hello {}!", msg.name);
            Ok(())
        }))
        .middleware(TraceMiddleware)
        .register::<Hello>()
        .build()
        .context("assembling messenger")?;

    match cli.command {
        Command::Send { name, count } => send(&messenger, &name, count),
        Command::Consume { transports, .. } => consume(&messenger, &transports),
    }
}

fn send(messenger: &Messenger, name: &str, count: usize) -> Result<()> {
    for _ in 0..count {
        let envelope = messenger
            .dispatch(Hello {
                name: name.to_string(),
            })
            .context("dispatching Hello")?;
        info!(stamps = envelope.stamps().len(), "dispatched");
    }
    Ok(())
}

fn consume(messenger: &Messenger, transports: &[String]) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        if let Err(e) = flag::register(signal, Arc::clone(&shutdown)) {
            warn!("Failed to register handler for signal {}: {}", signal, e);
        }
    }

    let consumer = messenger.consume(transports).context("starting consumers")?;
    info!(transports = ?transports, "consuming; press Ctrl-C to stop");

    while !shutdown.load(Ordering::Relaxed) && !consumer.is_finished() {
        thread::sleep(Duration::from_millis(100));
    }

    for (transport, stats) in consumer.stop() {
        info!(
            transport = %transport,
            handled = stats.messages_handled,
            retried = stats.messages_retried,
            dead_lettered = stats.messages_dead_lettered,
            transport_errors = stats.transport_errors,
            "consumer finished"
        );
    }
    Ok(())
}
