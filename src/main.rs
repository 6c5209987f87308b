use std::{process, sync::Arc};

use clap::Parser;
use serde_json::Value;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use vitrine::{
    cache::{CacheConfig, CollectionCache, FilterOptions, QueryKey},
    client::{ApiClient, Fetcher},
    collection::ResourceCollection,
    config::{self, CliArgs, Command, KeyArgs, ListArgs, Settings},
    error::AppError,
    infra::telemetry,
    resources::ResourceKind,
    session::SessionReader,
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let cli_args = CliArgs::parse();

    // `key` is offline: no settings, no logging.
    if let Command::Key(args) = &cli_args.command {
        return run_key(args);
    }

    let settings = config::load(&cli_args)?;
    telemetry::init(&settings.logging)?;

    match cli_args.command {
        Command::List(args) => run_list(settings, args).await,
        Command::Session(_) => run_session(settings).await,
        Command::Key(_) => Ok(()),
    }
}

fn run_key(args: &KeyArgs) -> Result<(), AppError> {
    let kind = ResourceKind::from(args.resource);
    let options = FilterOptions::try_from(&args.filters)?;
    println!("{}", QueryKey::build(&kind.descriptor().endpoint, &options));
    Ok(())
}

fn build_fetcher(settings: &Settings) -> Result<Arc<dyn Fetcher>, AppError> {
    let client = ApiClient::from_settings(&settings.api)?;
    info!(base_url = %client.base(), "API client ready");
    Ok(Arc::new(client))
}

async fn run_list(settings: Settings, args: ListArgs) -> Result<(), AppError> {
    let fetcher = build_fetcher(&settings)?;
    let cache = Arc::new(CollectionCache::<Value>::new(CacheConfig::from(
        &settings.cache,
    )));
    let kind = ResourceKind::from(args.resource);
    let options = FilterOptions::try_from(&args.filters)?;

    let collection = ResourceCollection::new(cache, fetcher, &kind.descriptor(), &options);
    let view = collection.refetch().await;

    let rendered = serde_json::to_string_pretty(&view)
        .map_err(|err| AppError::unexpected(format!("failed to render collection: {err}")))?;
    println!("{rendered}");

    if view.is_error && view.items.is_empty() {
        let message = view
            .error
            .as_ref()
            .map(|err| err.to_string())
            .unwrap_or_else(|| "collection fetch failed".to_string());
        return Err(AppError::unexpected(format!(
            "{} ({}): {message}",
            kind.as_str(),
            collection.key()
        )));
    }
    Ok(())
}

async fn run_session(settings: Settings) -> Result<(), AppError> {
    let fetcher = build_fetcher(&settings)?;
    let reader = SessionReader::new(fetcher, settings.api.session_path.clone());
    let session = reader.refresh().await?;

    let rendered = serde_json::to_string_pretty(&session)
        .map_err(|err| AppError::unexpected(format!("failed to render session: {err}")))?;
    println!("{rendered}");
    Ok(())
}
