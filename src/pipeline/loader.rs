use tracing::{info, warn};

use crate::document::SourceDocument;
use crate::elastic::{ElasticClient, ElasticError};

/// A document the destination did not accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// Index into the slice passed to `BulkLoader::load`.
    pub position: usize,
    pub title: String,
    pub status: Option<u16>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub success: usize,
    pub failures: Vec<FailureRecord>,
}

/// Writes documents in fixed-size bulk chunks. No atomicity across or within chunks:
/// rejected documents and failed chunks are recorded and loading continues.
pub struct BulkLoader<'a> {
    es: &'a ElasticClient,
    index: &'a str,
    chunk_size: usize,
}

impl<'a> BulkLoader<'a> {
    pub fn new(es: &'a ElasticClient, index: &'a str, chunk_size: usize) -> Self {
        Self {
            es,
            index,
            chunk_size: chunk_size.max(1),
        }
    }

    pub async fn load(&self, documents: &[SourceDocument]) -> LoadReport {
        let mut report = LoadReport::default();
        let chunks = documents.len().div_ceil(self.chunk_size);

        for (n, chunk) in documents.chunks(self.chunk_size).enumerate() {
            let offset = n * self.chunk_size;
            let (body, encode_failures) = self.encode_chunk(chunk, offset);
            report.failures.extend(encode_failures);
            if body.positions.is_empty() {
                continue;
            }

            match self.es.bulk(body.ndjson).await {
                Ok(response) => {
                    let mut items = response.items.into_iter();
                    for &position in &body.positions {
                        let doc = &documents[position];
                        let item = items.next().and_then(|mut i| i.remove("index"));
                        match item {
                            Some(item) if item.is_success() => report.success += 1,
                            Some(item) => report.failures.push(FailureRecord {
                                position,
                                title: doc.title.clone(),
                                status: Some(item.status),
                                reason: item
                                    .error
                                    .map_or_else(|| format!("status {}", item.status), |e| e.to_string()),
                            }),
                            None => report.failures.push(FailureRecord {
                                position,
                                title: doc.title.clone(),
                                status: None,
                                reason: "no result returned for document".to_string(),
                            }),
                        }
                    }
                }
                Err(e) => {
                    warn!(chunk = n + 1, error = %e, "bulk chunk failed");
                    let status = match &e {
                        ElasticError::Api { code, .. } => Some(*code),
                        _ => None,
                    };
                    for &position in &body.positions {
                        report.failures.push(FailureRecord {
                            position,
                            title: documents[position].title.clone(),
                            status,
                            reason: e.to_string(),
                        });
                    }
                }
            }
            info!(
                chunk = n + 1,
                of = chunks,
                indexed = report.success,
                failed = report.failures.len(),
                "bulk chunk submitted"
            );
        }

        if let Err(e) = self.es.refresh(self.index).await {
            warn!(index = self.index, error = %e, "refresh after load failed");
        }
        report.failures.sort_by_key(|f| f.position);
        report
    }

    fn encode_chunk(&self, chunk: &[SourceDocument], offset: usize) -> (ChunkBody, Vec<FailureRecord>) {
        let action = serde_json::json!({ "index": { "_index": self.index } }).to_string();
        let mut body = ChunkBody::default();
        let mut failures = Vec::new();

        for (i, doc) in chunk.iter().enumerate() {
            match serde_json::to_string(doc) {
                Ok(source) => {
                    body.ndjson.push_str(&action);
                    body.ndjson.push('\n');
                    body.ndjson.push_str(&source);
                    body.ndjson.push('\n');
                    body.positions.push(offset + i);
                }
                Err(e) => failures.push(FailureRecord {
                    position: offset + i,
                    title: doc.title.clone(),
                    status: None,
                    reason: format!("could not serialize document: {e}"),
                }),
            }
        }
        (body, failures)
    }
}

#[derive(Default)]
struct ChunkBody {
    ndjson: String,
    positions: Vec<usize>,
}
