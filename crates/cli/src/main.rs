use crate::{
    conn::{ConnectionPinger, PostgresConnectionPinger},
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use chrono::{Duration, Utc};
use clap::Parser;
use commands::Commands;
use connectors::validator::{SchemaValidator, ValidationPolicy};
use engine_config::settings::{
    PipelineConfig,
    validated::{CuratedBackend, ValidatedConfig},
};
use engine_core::ledger::{RunLedger, SledRunLedger};
use engine_runtime::{Pipeline, execution::factory};
use model::{
    core::identifiers::{BatchId, RecordId},
    execution::run::RunStatus,
    records::raw::RawFile,
};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod conn;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(name = "c360", version, about = "Customer 360 ingestion and transformation pipeline")]
struct Cli {
    #[arg(long, global = true, help = "Pipeline configuration file (TOML)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Object store root directory, overrides the config")]
    root: Option<PathBuf>,

    #[arg(long, global = true, help = "State database directory, overrides the config")]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "Command failed");
            eprintln!("error: {err}");
            ExitCode::GeneralError
        }
    };
    std::process::exit(code.as_i32());
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Run { watch, json } => {
            let pipeline = Pipeline::build(config).await?;
            let report = if watch {
                let shutdown = ShutdownCoordinator::new(CancellationToken::new());
                shutdown.register_handlers();
                pipeline.watch(shutdown.cancel_token()).await?
            } else {
                let report = pipeline.scan_once().await?;
                pipeline.shutdown().await?;
                report
            };
            output::print_scan_report(&report, json)?;

            let failed = report
                .runs
                .iter()
                .any(|r| !r.duplicate && r.status == RunStatus::Failed);
            Ok(if failed || report.ingestion_failures > 0 || report.unrecorded > 0 {
                ExitCode::FailedRuns
            } else {
                ExitCode::Success
            })
        }
        Commands::Validate { path, strict } => {
            let content = tokio::fs::read(&path).await?;
            let policy = if strict {
                ValidationPolicy::strict()
            } else {
                config.validation
            };
            let id = blake3::hash(&content).to_hex();
            let file = RawFile::new(format!("local-{}", &id[..16]), path.as_str(), Utc::now());
            let result = SchemaValidator::new(policy).validate(&file, &content);
            output::print_validation(&result)?;
            Ok(if result.is_valid {
                ExitCode::Success
            } else {
                ExitCode::GeneralError
            })
        }
        Commands::Runs {
            since,
            until,
            batch,
            json,
        } => {
            let ledger = open_ledger(&config)?;
            let runs = match batch {
                Some(batch) => ledger.find_by_batch(&BatchId::from(batch)).await?,
                None => {
                    let until = until.unwrap_or_else(Utc::now);
                    let since = since.unwrap_or_else(|| until - Duration::hours(24));
                    if since >= until {
                        return Err(CliError::InvalidArguments(
                            "--since must be earlier than --until".into(),
                        ));
                    }
                    ledger.query_by_time_range(since, until).await?
                }
            };
            output::print_runs(&runs, json)?;
            Ok(ExitCode::Success)
        }
        Commands::ShowRun { id } => {
            let ledger = open_ledger(&config)?;
            let record = ledger
                .get(&RecordId::from(id.as_str()))
                .await?
                .ok_or_else(|| CliError::NotFound(format!("Run record '{id}'")))?;
            output::print_json(&record)?;
            Ok(ExitCode::Success)
        }
        Commands::Replay { id } => {
            let pipeline = Pipeline::build(config).await?;
            let summary = pipeline.replay(&RecordId::from(id.as_str())).await?;
            pipeline.shutdown().await?;
            output::print_json(&summary)?;
            Ok(if summary.status == RunStatus::Success {
                ExitCode::Success
            } else {
                ExitCode::FailedRuns
            })
        }
        Commands::Customers { id, json } => {
            let db = factory::open_state(&config)?;
            let store = factory::create_curated_store(&config, &db).await?;
            let customers = match id {
                Some(id) => {
                    let entity = store
                        .get(&id)
                        .await?
                        .ok_or_else(|| CliError::NotFound(format!("Customer '{id}'")))?;
                    vec![entity]
                }
                None => store.read_all().await?,
            };
            output::print_customers(&customers, json)?;
            Ok(ExitCode::Success)
        }
        Commands::TestConn { url } => {
            let url = match (url, &config.curated) {
                (Some(url), _) => url,
                (None, CuratedBackend::Postgres { url, .. }) => url.clone(),
                (None, CuratedBackend::Sled) => {
                    return Err(CliError::InvalidArguments(
                        "no --url given and the curated store is not PostgreSQL".into(),
                    ));
                }
            };
            PostgresConnectionPinger { url }.ping().await?;
            Ok(ExitCode::Success)
        }
    }
}

fn load_config(cli: &Cli) -> Result<ValidatedConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            PipelineConfig::load(path)?
        }
        None => PipelineConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.storage.root = root.clone();
    }
    if let Some(state) = &cli.state {
        config.state.path = Some(state.clone());
    }
    Ok(config.validate()?)
}

fn open_ledger(config: &ValidatedConfig) -> Result<SledRunLedger, CliError> {
    let db = factory::open_state(config)?;
    Ok(SledRunLedger::from_db(&db)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c360.toml");
        std::fs::write(
            &path,
            "[storage]\nroot = \"/srv/landing\"\npoll_interval_ms = 250\n\n[transform]\ntimeout_secs = 5\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "c360",
            "--config",
            path.to_str().unwrap(),
            "--state",
            "/var/lib/c360",
            "runs",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();

        assert_eq!(config.storage_root, PathBuf::from("/srv/landing"));
        assert_eq!(config.state_path, Some(PathBuf::from("/var/lib/c360")));
        assert_eq!(config.poll_interval, std::time::Duration::from_millis(250));
        assert_eq!(config.transform_timeout, std::time::Duration::from_secs(5));
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c360.toml");
        std::fs::write(&path, "[storage]\nbucket = \"nope\"\n").unwrap();

        let cli = Cli::try_parse_from(["c360", "--config", path.to_str().unwrap(), "customers"]).unwrap();
        assert!(matches!(load_config(&cli), Err(CliError::Settings(_))));
    }
}
