// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! orgraph operator binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use orgraph_fga::{ObjectRef, Subject};
use orgraph_server::{build_service, init_tracing, ServerError};
use orgraph_server_config::ServerConfig;

mod version;

/// orgraph - organization graph kept consistent with a relationship store.
#[derive(Parser, Debug)]
#[command(name = "orgraph-server", about = "orgraph operator tooling", version)]
struct Args {
	/// Config file (defaults to /etc/orgraph/server.toml)
	#[arg(long, env = "ORGRAPH_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Apply database migrations
	Migrate,
	/// Retry relationship tuple deletions left behind by cascades
	Reconcile {
		/// Only report how many deletions are pending
		#[arg(long)]
		dry_run: bool,
	},
	/// Ask the relationship store whether a subject holds a relation
	Check {
		/// Subject, e.g. `user:<id>` or `organization:<id>#member`
		subject: Subject,
		/// Relation, e.g. `can_view`
		relation: String,
		/// Object, e.g. `organization:<id>`
		object: ObjectRef,
	},
	/// Show version and build information
	Version,
}

fn load_config(path: Option<PathBuf>) -> Result<ServerConfig, ServerError> {
	let config = match path {
		Some(path) => orgraph_server_config::load_config_with_file(path)?,
		None => orgraph_server_config::load_config()?,
	};
	Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Command::Version = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = load_config(args.config)?;
	init_tracing(&config);

	tracing::info!(
		database = %config.database.url,
		authz_backend = %config.authz.backend,
		"starting orgraph-server"
	);

	let service = build_service(&config).await?;

	match args.command {
		Command::Migrate => {
			// build_service has already migrated.
			tracing::info!("database migrations applied");
		}
		Command::Reconcile { dry_run } => {
			let reconciler = service
				.reconciler()
				.with_batch_size(config.reconcile.batch_size);
			if dry_run {
				let pending = reconciler.pending_count().await?;
				println!("{pending} tuple deletions pending");
			} else {
				let report = reconciler.run().await?;
				println!(
					"attempted {} reconciled {} remaining {}",
					report.attempted, report.reconciled, report.remaining
				);
				if report.remaining > 0 {
					std::process::exit(2);
				}
			}
		}
		Command::Check {
			subject,
			relation,
			object,
		} => {
			let allowed = service
				.coordinator()
				.store()
				.check(&subject, &relation, &object)
				.await?;
			println!("{}", if allowed { "allowed" } else { "denied" });
		}
		Command::Version => {}
	}

	Ok(())
}
