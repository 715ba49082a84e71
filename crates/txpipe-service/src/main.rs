//! Main entry point for the txpipe command-line tool.
//!
//! Loads a configuration file, wires the pipeline from the registered
//! implementations and runs a single command: a contract call, a deployment,
//! a batch of requests, or finality polling for an existing transaction.
//! Results are printed to stdout as JSON.

use clap::{Parser, Subcommand};
use serde::{de::DeserializeOwned, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};
use txpipe_config::Config;
use txpipe_core::{Pipeline, PollSubscription};
use txpipe_types::{Network, OperationRequest, TransactionId};

mod factory_registry;

/// Command-line arguments for the txpipe tool.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Call a contract function described by a JSON request file
	Call {
		request: PathBuf,
		/// Poll the transaction until it settles
		#[arg(long)]
		track: bool,
	},
	/// Deploy a contract described by a JSON request file
	Deploy {
		request: PathBuf,
		/// Poll the transaction until it settles
		#[arg(long)]
		track: bool,
	},
	/// Run a JSON array of requests one after another
	Batch { requests: PathBuf },
	/// Poll a broadcast transaction until it settles
	Status {
		txid: String,
		#[arg(short, long, default_value = "testnet")]
		network: Network,
	},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let pipeline = factory_registry::build_pipeline_from_config(config)?;

	run(&pipeline, args.command).await
}

async fn run(pipeline: &Pipeline, command: Command) -> Result<(), Box<dyn Error>> {
	match command {
		Command::Call { request, track } => {
			let request: OperationRequest = read_json(&request).await?;
			let txid = pipeline.operations.call_contract(&request).await?;
			report(pipeline, txid, request.network(), track).await
		}
		Command::Deploy { request, track } => {
			let request: OperationRequest = read_json(&request).await?;
			let txid = pipeline.operations.deploy_contract(&request).await?;
			report(pipeline, txid, request.network(), track).await
		}
		Command::Batch { requests } => {
			let requests: Vec<OperationRequest> = read_json(&requests).await?;
			let items = pipeline.batch.execute(requests).await;
			print_json(&items)
		}
		Command::Status { txid, network } => {
			let subscription = pipeline.poller.poll(TransactionId::new(txid), network);
			follow(subscription).await
		}
	}
}

async fn report(
	pipeline: &Pipeline,
	txid: Option<TransactionId>,
	network: Network,
	track: bool,
) -> Result<(), Box<dyn Error>> {
	let Some(txid) = txid else {
		return print_json(&serde_json::json!({ "declined": true }));
	};

	print_json(&serde_json::json!({ "txid": txid, "network": network }))?;

	if track {
		follow(pipeline.operations.track(txid, network)).await?;
	}
	Ok(())
}

/// Prints every state change until the transaction settles or the user
/// interrupts.
async fn follow(mut subscription: PollSubscription) -> Result<(), Box<dyn Error>> {
	loop {
		tokio::select! {
			update = subscription.changed() => match update {
				Some(tracked) => {
					print_json(&tracked)?;
					if tracked.status.is_terminal() {
						return Ok(());
					}
				}
				None => return Ok(()),
			},
			_ = tokio::signal::ctrl_c() => {
				subscription.stop_polling();
				tracing::info!("Interrupted");
				return Ok(());
			}
		}
	}
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn Error>> {
	let contents = tokio::fs::read_to_string(path)
		.await
		.map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
	Ok(serde_json::from_str(&contents)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}
