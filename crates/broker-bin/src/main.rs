//! Broker daemon binary.
//!
//! Listens for JSON-over-TCP requests on a local socket and manages:
//! - instance registration and session tokens
//! - per-recipient message queues, with spill-to-file for oversized payloads
//! - the rename/forwarding name registry
//! - SQLite-backed persistence across restarts

use std::path::PathBuf;

use broker::{BrokerConfig, BrokerCore};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Broker command line arguments.
#[derive(Parser, Debug)]
#[command(name = "broker")]
#[command(about = "Inter-process message broker")]
struct Args {
	/// Address to bind the TCP listener to
	#[arg(long, value_name = "HOST:PORT")]
	bind: Option<String>,

	/// Directory holding the SQLite database and spilled-message files
	#[arg(long, value_name = "PATH")]
	data_dir: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	info!("starting broker");

	let bind_addr = args
		.bind
		.or_else(|| match (std::env::var("IPC_HOST").ok(), std::env::var("IPC_PORT").ok()) {
			(None, None) => None,
			(host, port) => Some(format!(
				"{}:{}",
				host.as_deref().unwrap_or("127.0.0.1"),
				port.as_deref().unwrap_or("9876")
			)),
		})
		.unwrap_or_else(|| broker_proto::constants::DEFAULT_BIND_ADDR.to_string());

	let data_dir = args.data_dir.unwrap_or_else(broker_proto::paths::default_data_dir);
	let shared_secret = std::env::var("IPC_SHARED_SECRET").ok();

	info!(data_dir = %data_dir.display(), "data directory");

	let core = BrokerCore::new(BrokerConfig { data_dir, shared_secret })?;
	let core = std::sync::Arc::new(core);

	let shutdown = CancellationToken::new();
	let signal_shutdown = shutdown.clone();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			info!("received shutdown signal");
			signal_shutdown.cancel();
		}
	});

	info!(addr = %bind_addr, "starting TCP server");
	broker::server::serve(core, &bind_addr, shutdown).await?;

	Ok(())
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::fmt::format::FmtSpan;
	use tracing_subscriber::prelude::*;

	// Support BROKER_LOG_DIR for smoke testing
	if let Some(log_dir) = std::env::var("BROKER_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let pid = std::process::id();
		let log_path = log_dir.join(format!("broker.{}.log", pid));

		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
				if verbose {
					EnvFilter::new("broker=trace,debug")
				} else {
					EnvFilter::new("broker=debug,info")
				}
			});

			let file_layer = tracing_subscriber::fmt::layer()
				.with_writer(file)
				.with_ansi(false)
				.with_span_events(FmtSpan::CLOSE)
				.with_target(true);

			tracing_subscriber::registry().with(filter).with(file_layer).init();

			tracing::info!(path = ?log_path, "broker tracing initialized");
			return;
		}
	}

	// Fallback to stderr-only logging
	tracing_subscriber::fmt()
		.with_max_level(if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
		.init();
}
