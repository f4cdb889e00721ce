use anyhow::{Context, Result};
use doc_store::StoreClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use social_core::clients::{HttpPushClient, HttpSearchClient, PushEndpointClient, SearchClient};
use social_core::config::{Config, LogFormat, StoreBackend};
use social_core::stream::{StreamRecord, UserSyncDispatcher};
use social_core::Managers;

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,social_core=debug,doc_store=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn build_store(config: &Config) -> Result<StoreClient> {
    match config.store.backend {
        StoreBackend::Memory => {
            warn!("Using in-memory store, state is lost on exit");
            Ok(StoreClient::in_memory())
        }
        #[cfg(feature = "dynamodb")]
        StoreBackend::Dynamodb => {
            let store = doc_store::DynamoStore::from_env(config.store.table_name.clone()).await;
            Ok(StoreClient::new(Arc::new(store)))
        }
        #[cfg(not(feature = "dynamodb"))]
        StoreBackend::Dynamodb => {
            anyhow::bail!("STORE_BACKEND=dynamodb requires building with the `dynamodb` feature")
        }
    }
}

#[derive(Debug, Default)]
struct Summary {
    records: usize,
    malformed: usize,
    skipped: usize,
    handler_failures: usize,
}

async fn process<R: AsyncBufRead + Unpin>(dispatcher: &UserSyncDispatcher, reader: R) -> Result<Summary> {
    let mut summary = Summary::default();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read change record")? {
        if line.trim().is_empty() {
            continue;
        }
        summary.records += 1;
        let record: StreamRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                error!(line = summary.records, error = %e, "Malformed change record");
                summary.malformed += 1;
                continue;
            }
        };
        let outcome = dispatcher.dispatch(&record).await;
        if outcome.invoked.is_empty() {
            summary.skipped += 1;
        }
        summary.handler_failures += outcome.failed.len();
    }
    Ok(summary)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.logging.format);
    info!(env = %config.app.env, "Starting social sync worker");

    let store = build_store(&config).await?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.clients.timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;
    let search_client = config.search.as_ref().map(|search| {
        info!(url = %search.url, index = %search.user_index, "Search index sync enabled");
        Arc::new(HttpSearchClient::new(http.clone(), &search.url, search.user_index.clone()))
            as Arc<dyn SearchClient>
    });
    let push_client = config.push.as_ref().map(|push| {
        info!(url = %push.url, "Push endpoint sync enabled");
        Arc::new(HttpPushClient::new(http.clone(), &push.url)) as Arc<dyn PushEndpointClient>
    });

    let managers = Managers::new(store, search_client, push_client);
    let dispatcher = UserSyncDispatcher::new(managers.user.clone());

    let summary = match &config.stream.change_log_path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open change log `{path}`"))?;
            process(&dispatcher, BufReader::new(file)).await?
        }
        None => process(&dispatcher, BufReader::new(tokio::io::stdin())).await?,
    };

    info!(
        records = summary.records,
        malformed = summary.malformed,
        skipped = summary.skipped,
        handler_failures = summary.handler_failures,
        "Change log processed"
    );
    Ok(())
}
