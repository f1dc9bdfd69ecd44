//! `fetch`: retrieve a service's features and save them.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tree_zones::io::{DEFAULT_LOCAL_FILE, save_feature_collection};
use tree_zones_arcgis::retrieve::{Retrieval, Retriever};
use tree_zones_arcgis_models::{RetrievalState, ServiceDefinition};
use tree_zones_cli_utils::{IndicatifProgress, MultiProgress};
use tree_zones_models::{FeatureCollection, ObjectId};

use crate::ServiceArgs;

#[derive(Args)]
pub struct FetchArgs {
    #[command(flatten)]
    service: ServiceArgs,
    /// Attribute filter (`ArcGIS` where clause). Defaults to the service's.
    #[arg(long = "where")]
    where_clause: Option<String>,
    /// Identifiers requested per page
    #[arg(long)]
    id_batch_size: Option<usize>,
    /// Features requested per chunk
    #[arg(long)]
    feature_batch_size: Option<usize>,
    /// Pause after each request, in milliseconds
    #[arg(long)]
    short_delay_ms: Option<u64>,
    /// Longer pause taken after every `--long-delay-every` requests
    #[arg(long)]
    long_delay_ms: Option<u64>,
    /// Request interval for the longer pause (0 disables it)
    #[arg(long)]
    long_delay_every: Option<u32>,
    /// Where to save the retrieved feature collection
    #[arg(long, default_value = DEFAULT_LOCAL_FILE)]
    output: PathBuf,
    /// Where to write identifiers that could not be retrieved, one per line
    #[arg(long)]
    missing_output: Option<PathBuf>,
}

impl FetchArgs {
    /// Resolves the service definition and applies command-line overrides.
    pub fn definition(&self) -> Result<ServiceDefinition, Box<dyn std::error::Error>> {
        let mut definition = self.service.resolve()?;
        let pagination = &mut definition.pagination;

        if let Some(where_clause) = &self.where_clause {
            definition.where_clause.clone_from(where_clause);
        }
        if let Some(size) = self.id_batch_size {
            pagination.id_batch_size = size;
        }
        if let Some(size) = self.feature_batch_size {
            pagination.feature_batch_size = size;
        }
        if let Some(ms) = self.short_delay_ms {
            pagination.courtesy.short_delay_ms = ms;
        }
        if let Some(ms) = self.long_delay_ms {
            pagination.courtesy.long_delay_ms = ms;
        }
        if let Some(every) = self.long_delay_every {
            pagination.courtesy.long_delay_every = every;
        }

        Ok(definition)
    }
}

/// Retrieves and saves the collection.
///
/// Returns `None` when nothing was retrieved. A partial retrieval is still
/// saved and returned.
pub async fn run(
    args: &FetchArgs,
    definition: &ServiceDefinition,
    multi: &MultiProgress,
) -> Result<Option<FeatureCollection>, Box<dyn std::error::Error>> {
    log::info!("Fetching {} from {}", definition.name, definition.query_url);

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let progress = IndicatifProgress::retrieval_bar(multi, &definition.name);
    let mut retriever = Retriever::for_service(definition)?
        .with_progress(progress)
        .with_cancellation(cancel);

    let start = Instant::now();
    let retrieval = retriever.retrieve_all(&definition.where_clause).await;
    interrupt.abort();

    report(&retrieval, start.elapsed().as_secs_f64());

    let missing = retrieval.missing_ids();
    if !missing.is_empty()
        && let Some(path) = &args.missing_output
    {
        write_missing_ids(path, &missing)?;
        log::info!("Wrote {} missing object IDs to {}", missing.len(), path.display());
    }

    if retrieval.is_empty() {
        return Ok(None);
    }

    save_feature_collection(&args.output, &retrieval.collection)?;
    Ok(Some(retrieval.collection))
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        log::warn!("Interrupted; stopping before the next request");
        cancel.cancel();
    }
}

fn report(retrieval: &Retrieval, elapsed_secs: f64) {
    match retrieval.state {
        RetrievalState::Done if retrieval.is_empty() => {
            log::warn!("The service returned no features for this query");
        }
        RetrievalState::Done => {
            log::info!(
                "Retrieved all {} features ({} object IDs) in {elapsed_secs:.1}s",
                retrieval.collection.len(),
                retrieval.identifier_count,
            );
        }
        _ => {
            if let Some(interruption) = &retrieval.id_interruption {
                log::warn!(
                    "Object ID listing stopped at offset {}: {}",
                    interruption.offset,
                    interruption.error
                );
            }
            for chunk in &retrieval.failed_chunks {
                log::warn!(
                    "Batch {} ({} object IDs) failed: {}",
                    chunk.index + 1,
                    chunk.ids.len(),
                    chunk.error
                );
            }
            if retrieval.cancelled {
                log::warn!(
                    "Cancelled with {} object IDs not yet requested",
                    retrieval.unattempted_ids.len()
                );
            }
            log::warn!(
                "Partial retrieval: {} features from {} object IDs, {} missing ({elapsed_secs:.1}s)",
                retrieval.collection.len(),
                retrieval.identifier_count,
                retrieval.missing_ids().len(),
            );
            if retrieval.is_empty() {
                log::error!("No features were retrieved");
            }
        }
    }
}

fn write_missing_ids(path: &Path, ids: &[ObjectId]) -> std::io::Result<()> {
    let mut text = ids
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    text.push('\n');
    std::fs::write(path, text)
}
