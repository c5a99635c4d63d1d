use crate::{
    env::EnvManager,
    error::CliError,
    output::LagRow,
    shutdown::{Outcome, ShutdownSignal},
};
use clap::Parser;
use commands::Commands;
use engine_config::settings::{TransitConfig, TransitSettings};
use engine_core::progress::ProgressNotifier;
use engine_runtime::execution::{
    MongoRepositoryFactory, RepositoryFactory, executor, prepare::CollectionPreparation,
};
use std::{process::ExitCode, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod env;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "transit",
    version = "0.1.0",
    about = "Document collection transit tool"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logger, RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let outcome = match dispatch(cli.command).await {
        Ok(outcome) => outcome,
        Err(CliError::ShutdownRequested) => {
            warn!("Transit interrupted by shutdown");
            Outcome::Interrupted
        }
        Err(err) => {
            error!(error = %err, "Transit failed");
            Outcome::Failed
        }
    };

    outcome.into()
}

async fn dispatch(command: Commands) -> Result<Outcome, CliError> {
    match command {
        Commands::Run {
            config,
            env_file,
            dry_run,
            run_loop,
            output,
        } => {
            let settings = load_settings(&config, env_file.as_deref())?
                .with_dry_run(dry_run)
                .with_loop(run_loop);

            let token = CancellationToken::new();
            let names = settings.collections.iter().map(|c| c.name.clone()).collect();
            let shutdown = ShutdownSignal::listen(token.clone(), names);

            let factory = Arc::new(MongoRepositoryFactory::connect(&settings).await?);
            let result = executor::run(
                settings,
                factory.clone() as Arc<dyn RepositoryFactory>,
                token,
            )
            .await;

            if let Ok(factory) = Arc::try_unwrap(factory) {
                factory.shutdown().await;
            }
            let report = result?;

            match output {
                Some(path) => output::write_report(&report, path).await?,
                None => output::print_report(&report)?,
            }

            Ok(Outcome::of_run(&report, shutdown.received()))
        }
        Commands::Lag {
            config,
            env_file,
            collection,
            json,
        } => {
            let settings = load_settings(&config, env_file.as_deref())?;
            if let Some(name) = &collection
                && settings.collection(name).is_none()
            {
                return Err(CliError::UnknownCollection(name.clone()));
            }

            let factory = MongoRepositoryFactory::connect(&settings).await?;
            let rows = collect_lag(&settings, &factory, collection.as_deref()).await;
            factory.shutdown().await;

            output::print_lag(&rows?, json)?;
            Ok(Outcome::Completed)
        }
        Commands::Validate { config, env_file } => {
            let settings = load_settings(&config, env_file.as_deref())?;
            println!("{}", output::settings_json(&settings)?);
            Ok(Outcome::Completed)
        }
    }
}

fn load_settings(config: &str, env_file: Option<&str>) -> Result<TransitSettings, CliError> {
    let mut env = EnvManager::new();
    if let Some(path) = env_file {
        env.load_from_file(path)?;
    }

    info!(config, "Loading transit config");
    let config = TransitConfig::load(config, env.all())?;
    Ok(TransitSettings::from_config(config)?)
}

async fn collect_lag(
    settings: &TransitSettings,
    factory: &dyn RepositoryFactory,
    only: Option<&str>,
) -> Result<Vec<LagRow>, CliError> {
    let mut rows = Vec::new();

    for collection in &settings.collections {
        if only.is_some_and(|name| name != collection.name) {
            continue;
        }
        let Some(iterative) = collection.iterative.as_ref() else {
            info!(collection = %collection.name, "Full transit collection, lag not applicable");
            continue;
        };

        let repositories = factory.repositories(&collection.name);
        let preparation = CollectionPreparation::new(
            &collection.name,
            repositories.source,
            repositories.destination,
            ProgressNotifier::new(&collection.name),
        );
        let prepared = preparation.lag(Some(iterative)).await?;

        rows.push(LagRow {
            collection: collection.name.clone(),
            filter: prepared.filter,
            lag: prepared.count,
        });
    }

    Ok(rows)
}
