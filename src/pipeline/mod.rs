//! Batch indexing: provision -> ground truth -> noise -> bulk load.

pub mod loader;
pub mod local;
pub mod noise;
pub mod parallel;
pub mod provision;

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::document::SourceDocument;
use crate::elastic::{ElasticClient, ElasticError};
use crate::pool::{RetryPolicy, TaskPool};
use crate::wiki::{ContentSource, WikiError};
use loader::{BulkLoader, LoadReport};
use local::LocalError;
use noise::NoiseFetcher;
use parallel::ParallelFetcher;
use provision::IndexSchema;

/// Why a subject or page produced no document.
#[derive(Debug, thiserror::Error)]
pub enum FetchFailure {
    #[error("{language}:'{title}' does not exist")]
    Missing { language: String, title: String },

    #[error("{language}:'{title}' failed after {attempts} attempt(s): {source}")]
    Failed {
        language: String,
        title: String,
        attempts: u32,
        source: WikiError,
    },
}

/// Conditions that stop a run before or during provisioning.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    #[error("inference endpoint(s) not found: {}. Run `polyglot-indexer deploy` first.", .0.join(", "))]
    MissingInference(Vec<String>),

    #[error("index '{0}' does not exist. Run the indexing pipeline first.")]
    MissingIndex(String),

    #[error(transparent)]
    Local(#[from] LocalError),

    #[error("provisioning failed: {0}")]
    Platform(#[from] ElasticError),
}

#[derive(Debug)]
pub struct PipelineSummary {
    pub index: String,
    pub subjects_requested: usize,
    pub subjects_found: usize,
    pub ground_truth: usize,
    pub noise: Vec<(String, usize)>,
    pub fetch_failures: Vec<FetchFailure>,
    pub noise_skipped: usize,
    pub load: LoadReport,
    pub elapsed: Duration,
}

fn validate(config: &PipelineConfig) -> Result<(), PipelineError> {
    if config.languages.is_empty() {
        return Err(PipelineError::InvalidConfig("no target languages".into()));
    }
    if config.max_content_chars == 0 {
        return Err(PipelineError::InvalidConfig(
            "max content length must be positive".into(),
        ));
    }
    Ok(())
}

/// Rebuilds `config.index_name` from scratch and fills it.
///
/// Fatal: invalid configuration, a missing inference endpoint, provisioning errors.
/// Everything after provisioning degrades to logged failures in the summary.
pub async fn run<S: ContentSource>(
    es: &ElasticClient,
    source: &S,
    config: &PipelineConfig,
) -> Result<PipelineSummary, PipelineError> {
    let started = Instant::now();
    validate(config)?;

    let schema = IndexSchema::source_documents(&config.inference_id);
    let missing = provision::missing_inference(es, &schema).await?;
    if !missing.is_empty() {
        return Err(PipelineError::MissingInference(missing));
    }
    provision::ensure_index(es, &config.index_name, &schema).await?;

    let retry = RetryPolicy::new(config.max_attempts, config.retry_base_delay);

    let ground = ParallelFetcher::new(source, TaskPool::new(config.workers, retry), config)
        .fetch_parallel(&config.subjects, &config.languages)
        .await;

    info!("gathering background noise");
    let noise_batches = NoiseFetcher::new(source, TaskPool::new(config.languages.len(), retry), config)
        .fetch_all(&config.languages, config.noise_per_language)
        .await;

    let mut documents: Vec<SourceDocument> = ground.documents;
    let ground_truth = documents.len();
    let mut noise = Vec::new();
    let mut noise_skipped = 0;
    for batch in noise_batches {
        noise.push((batch.language, batch.documents.len()));
        noise_skipped += batch.skipped;
        documents.extend(batch.documents);
    }
    noise.sort();

    info!(total = documents.len(), "performing bulk indexing");
    let load = BulkLoader::new(es, &config.index_name, config.chunk_size)
        .load(&documents)
        .await;

    Ok(PipelineSummary {
        index: config.index_name.clone(),
        subjects_requested: config.subjects.len(),
        subjects_found: ground.subjects_found,
        ground_truth,
        noise,
        fetch_failures: ground.failures,
        noise_skipped,
        load,
        elapsed: started.elapsed(),
    })
}

#[derive(Debug)]
pub struct LocalSummary {
    pub prepared: usize,
    pub skipped: usize,
    pub load: LoadReport,
}

pub const LOCAL_CHUNK_SIZE: usize = 5;

/// Appends local text documents to an index built earlier. Never provisions.
pub async fn load_local(
    es: &ElasticClient,
    index: &str,
    dir: &Path,
) -> Result<LocalSummary, PipelineError> {
    if !es.index_exists(index).await? {
        return Err(PipelineError::MissingIndex(index.to_string()));
    }

    let scan = local::scan_directory(dir, local::MAX_LOCAL_CHARS)?;
    if scan.documents.is_empty() {
        warn!(dir = %dir.display(), "no text documents found");
    }

    let load = BulkLoader::new(es, index, LOCAL_CHUNK_SIZE)
        .load(&scan.documents)
        .await;
    Ok(LocalSummary {
        prepared: scan.documents.len(),
        skipped: scan.skipped.len(),
        load,
    })
}

pub fn format_summary(summary: &PipelineSummary) -> String {
    let mut out = format!("# Indexing summary: {}\n\n", summary.index);
    out.push_str(&format!(
        "Ground truth: {} documents from {}/{} subjects\n",
        summary.ground_truth, summary.subjects_found, summary.subjects_requested
    ));
    for (language, count) in &summary.noise {
        out.push_str(&format!("Background noise [{language}]: {count} documents\n"));
    }
    if summary.noise_skipped > 0 {
        out.push_str(&format!("Noise pages skipped: {}\n", summary.noise_skipped));
    }
    push_load(&mut out, &summary.load);

    if !summary.fetch_failures.is_empty() {
        out.push_str("\n## Dropped subjects\n\n");
        for failure in &summary.fetch_failures {
            out.push_str(&format!("- {failure}\n"));
        }
    }
    out.push_str(&format!(
        "\nCompleted in {:.2} seconds.\n",
        summary.elapsed.as_secs_f64()
    ));
    out
}

pub fn format_local_summary(summary: &LocalSummary) -> String {
    let mut out = format!(
        "Prepared {} local documents ({} skipped)\n",
        summary.prepared, summary.skipped
    );
    push_load(&mut out, &summary.load);
    out
}

fn push_load(out: &mut String, load: &LoadReport) {
    out.push_str(&format!("Successfully indexed {} documents.\n", load.success));
    if !load.failures.is_empty() {
        out.push_str(&format!("Failed to index {} documents:\n", load.failures.len()));
        for f in &load.failures {
            let status = f.status.map(|s| format!(" [{s}]")).unwrap_or_default();
            out.push_str(&format!("- #{} {}{status}: {}\n", f.position, f.title, f.reason));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loader::FailureRecord;

    #[test]
    fn summary_lists_counts_and_failures() {
        let summary = PipelineSummary {
            index: "docs".into(),
            subjects_requested: 3,
            subjects_found: 2,
            ground_truth: 5,
            noise: vec![("en".into(), 10), ("he".into(), 7)],
            fetch_failures: vec![FetchFailure::Missing {
                language: "en".into(),
                title: "Atlantis".into(),
            }],
            noise_skipped: 2,
            load: LoadReport {
                success: 21,
                failures: vec![FailureRecord {
                    position: 4,
                    title: "bad".into(),
                    status: Some(400),
                    reason: "mapper_parsing_exception".into(),
                }],
            },
            elapsed: Duration::from_millis(1500),
        };

        let text = format_summary(&summary);
        assert!(text.contains("Ground truth: 5 documents from 2/3 subjects"));
        assert!(text.contains("Background noise [he]: 7 documents"));
        assert!(text.contains("Successfully indexed 21 documents."));
        assert!(text.contains("- #4 bad [400]: mapper_parsing_exception"));
        assert!(text.contains("en:'Atlantis' does not exist"));
        assert!(text.contains("1.50 seconds"));
    }

    #[test]
    fn empty_languages_rejected() {
        let config = PipelineConfig {
            languages: vec![],
            ..PipelineConfig::default()
        };
        assert!(matches!(validate(&config), Err(PipelineError::InvalidConfig(_))));
    }
}
