//! Command-line entry point: one reconciliation run per invocation.

// std
use std::{path::PathBuf, process::ExitCode};
// crates.io
use clap::Parser;
use tracing_subscriber::{EnvFilter, filter::ParseError as FilterParseError};
// self
use crate::{
	_prelude::*,
	config::Config,
	destination::DestinationClient,
	source::SourceClient,
	store::ConfigFileStore,
	sync::{DryRunDirectory, Reconciler, SyncReport},
};

const DEFAULT_LOG_FILTER: &str = "info";

/// Synchronize payroll driver home addresses into the fleet-management directory.
#[derive(Clone, Debug, Parser)]
#[command(name = "driver-sync", version, about)]
pub struct Cli {
	/// Path to the YAML configuration file; rotated refresh tokens are written back to it.
	#[arg(long, short, env = "DRIVER_SYNC_CONFIG")]
	pub config: PathBuf,
	/// Log filter directive (e.g. `debug` or `driver_sync=trace`); overrides `RUST_LOG`.
	#[arg(long)]
	pub log_level: Option<String>,
	/// Look up drivers but only log the updates that would be sent.
	#[arg(long)]
	pub dry_run: bool,
}

/// Parses arguments, runs one reconciliation, and maps fatal errors to exit status 1.
pub fn main() -> ExitCode {
	let cli = Cli::parse();

	if let Err(e) = init_tracing(cli.log_level.as_deref()) {
		print_error_chain(&e);

		return ExitCode::FAILURE;
	}

	let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
		Ok(runtime) => runtime,
		Err(e) => {
			print_error_chain(&e);

			return ExitCode::FAILURE;
		},
	};

	match runtime.block_on(run(&cli)) {
		Ok(_) => ExitCode::SUCCESS,
		Err(e) => {
			tracing::error!(error = %e, "Run aborted.");
			print_error_chain(&e);

			ExitCode::FAILURE
		},
	}
}

/// Executes one run: authenticate both sides, fetch the report, reconcile.
pub async fn run(cli: &Cli) -> Result<SyncReport> {
	let config = Config::from_file(&cli.config)?;
	let store = ConfigFileStore::new(cli.config.clone(), config.clone());
	let source = SourceClient::connect(&config.source, &store).await?;

	tracing::info!(auth_mode = source.auth_mode(), "Connected to payroll API.");

	let destination = DestinationClient::connect(&config.destination).await?;
	let records = source.fetch_home_addresses(&config.source.home_addresses_report).await?;
	let report = if cli.dry_run {
		let directory = DryRunDirectory::new(destination);

		Reconciler::new(&directory).sync(&records).await
	} else {
		Reconciler::new(&destination).sync(&records).await
	};

	tracing::info!(dry_run = cli.dry_run, %report, "Run complete.");

	Ok(report)
}

/// Installs the global `fmt` subscriber; `--log-level` wins over `RUST_LOG`, which wins over `info`.
pub fn init_tracing(log_level: Option<&str>) -> Result<(), FilterParseError> {
	let filter = match log_level {
		Some(directive) => EnvFilter::try_new(directive)?,
		None => EnvFilter::try_from_default_env()
			.unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
	};

	// A subscriber may already be installed when embedded; keep the existing one.
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();

	Ok(())
}

fn print_error_chain(err: &dyn StdError) {
	eprintln!("error: {err}");

	let mut source = err.source();

	while let Some(cause) = source {
		eprintln!("  caused by: {cause}");

		source = cause.source();
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parses_flags() {
		let cli = Cli::try_parse_from([
			"driver-sync",
			"--config",
			"/etc/driver-sync.yaml",
			"--log-level",
			"debug",
			"--dry-run",
		])
		.expect("Arguments should parse.");

		assert_eq!(cli.config, PathBuf::from("/etc/driver-sync.yaml"));
		assert_eq!(cli.log_level.as_deref(), Some("debug"));
		assert!(cli.dry_run);
	}

	#[test]
	fn invalid_log_filter_is_rejected() {
		assert!(init_tracing(Some("driver_sync=loud")).is_err());
	}

	#[tokio::test]
	async fn missing_config_file_is_fatal() {
		let cli = Cli {
			config: PathBuf::from("/nonexistent/driver-sync.yaml"),
			log_level: None,
			dry_run: false,
		};

		assert!(matches!(run(&cli).await, Err(Error::Config(_))));
	}
}
