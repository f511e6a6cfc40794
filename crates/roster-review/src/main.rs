use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use roster_review::commands::{self, parse_as_of, EvaluateOptions, Verdict};
use roster_review::{config, fixture};
use tracing::info;

/// Review roster scheduling proposals with the multi-agent consensus engine.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Engine configuration TOML (ROSTER_* environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Roster store snapshot JSON (rosters, shifts, preferences, budgets)
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    /// Append audit records to this JSON-lines file
    #[arg(long, global = true)]
    audit_log: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate one proposal
    Evaluate {
        /// Proposal JSON
        proposal: PathBuf,

        /// Roster the proposal belongs to
        #[arg(long)]
        roster: Option<String>,

        /// Who is asking, recorded in the audit trail
        #[arg(long, default_value = "roster-review")]
        requested_by: String,

        /// Evaluation instant, YYYY-MM-DD HH:MM (defaults to now)
        #[arg(long, value_parser = parse_as_of)]
        as_of: Option<NaiveDateTime>,

        /// Print the editable transparent decision instead of the quick result
        #[arg(long, default_value_t = false)]
        review: bool,
    },

    /// Evaluate a JSON array of consensus requests concurrently
    Batch {
        /// Request batch JSON
        requests: PathBuf,
    },

    /// Apply reviewer edits to a saved transparent decision
    Edit {
        /// Decision JSON produced by `evaluate --review`
        decision: PathBuf,

        /// JSON array of edits
        #[arg(long)]
        edits: Option<PathBuf>,

        /// Record a verdict after the edits
        #[arg(long, value_enum)]
        verdict: Option<Verdict>,
    },

    /// Drop audit records past their retention horizon (needs --audit-log)
    Purge {
        /// Purge as of this instant, YYYY-MM-DD HH:MM (defaults to now)
        #[arg(long, value_parser = parse_as_of)]
        as_of: Option<NaiveDateTime>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!(command = ?cli.command, "roster-review starting");

    let output = match cli.command {
        Command::Evaluate {
            proposal,
            roster,
            requested_by,
            as_of,
            review,
        } => {
            let engine = engine(&cli.config, &cli.fixture, &cli.audit_log)?;
            let proposal = fixture::load_proposal(&proposal)?;
            let options = EvaluateOptions {
                roster_id: roster,
                requested_by,
                as_of,
                review,
            };
            commands::evaluate(&engine, proposal, options).await?
        }
        Command::Batch { requests } => {
            let engine = engine(&cli.config, &cli.fixture, &cli.audit_log)?;
            let requests = fixture::load_requests(&requests)?;
            commands::batch(&engine, requests).await?
        }
        Command::Edit {
            decision,
            edits,
            verdict,
        } => {
            let decision = fixture::load_decision(&decision)?;
            let edits = match edits {
                Some(path) => fixture::load_edits(&path)?,
                None => Vec::new(),
            };
            commands::edit(decision, &edits, verdict)?
        }
        Command::Purge { as_of } => {
            if cli.audit_log.is_none() {
                bail!("purge needs --audit-log");
            }
            let engine = engine(&cli.config, &cli.fixture, &cli.audit_log)?;
            commands::purge(&engine, as_of).await?
        }
    };

    println!("{}", output.json);
    Ok(if output.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn engine(
    config_path: &Option<PathBuf>,
    fixture_path: &Option<PathBuf>,
    audit_log: &Option<PathBuf>,
) -> Result<roster_consensus::ConsensusEngine> {
    let config = config::load(config_path.as_deref())?;
    let snapshot = fixture::load_snapshot(fixture_path.as_deref())?;
    commands::build_engine(config, snapshot, audit_log.as_deref())
        .context("Failed to start the engine")
}
