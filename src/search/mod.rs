//! Hybrid semantic + keyword queries and corpus statistics over an indexed collection.

mod format;

pub use format::{format_results, format_stats};

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::elastic::{ElasticClient, ElasticError};
use crate::elastic::types::SearchResponse;

pub const DEFAULT_SIZE: usize = 30;
const SEMANTIC_BOOST: f64 = 2.0;
const TITLE_FIELDS: &[&str] = &["title^5", "original_title^5"];

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    pub language: Option<String>,
    pub category: Option<String>,
    pub size: usize,
}

impl SearchRequest {
    /// Semantic match on `content` blended with a boosted title match.
    /// A blank query lists everything that passes the filters.
    pub fn to_body(&self) -> Value {
        let query = self.query.trim();
        let must = if query.is_empty() {
            json!({"match_all": {}})
        } else {
            json!({
                "bool": {
                    "should": [
                        {
                            "semantic": {
                                "field": "content",
                                "query": query,
                                "boost": SEMANTIC_BOOST
                            }
                        },
                        {
                            "multi_match": {
                                "query": query,
                                "fields": TITLE_FIELDS,
                                "type": "best_fields"
                            }
                        }
                    ]
                }
            })
        };

        let filters: Vec<Value> = [("language", &self.language), ("category", &self.category)]
            .into_iter()
            .filter_map(|(field, value)| {
                value
                    .as_deref()
                    .filter(|v| !v.is_empty())
                    .map(|v| json!({"term": {field: v}}))
            })
            .collect();

        json!({
            "query": {"bool": {"must": [must], "filter": filters}},
            "size": self.size
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub content: Value,
    #[serde(skip)]
    pub score: f64,
}

impl SearchHit {
    /// `semantic_text` fields may come back as a plain string or as `{ "text": ... }`.
    pub fn content_text(&self) -> &str {
        match &self.content {
            Value::String(s) => s.as_str(),
            Value::Object(o) => o.get("text").and_then(Value::as_str).unwrap_or_default(),
            _ => "",
        }
    }
}

#[derive(Debug, Default)]
pub struct SearchResults {
    pub total: u64,
    pub hits: Vec<SearchHit>,
}

pub async fn search(
    es: &ElasticClient,
    index: &str,
    request: &SearchRequest,
) -> Result<SearchResults, ElasticError> {
    let response = es.search(index, &request.to_body()).await?;
    Ok(to_results(response))
}

fn to_results(response: SearchResponse) -> SearchResults {
    let hits = response
        .hits
        .hits
        .into_iter()
        .filter_map(|hit| match serde_json::from_value::<SearchHit>(hit.source) {
            Ok(mut parsed) => {
                parsed.score = hit.score.unwrap_or_default();
                Some(parsed)
            }
            Err(e) => {
                debug!(error = %e, "skipping hit with malformed _source");
                None
            }
        })
        .collect();
    SearchResults {
        total: response.hits.total.map_or(0, |t| t.value),
        hits,
    }
}

#[derive(Debug, Default)]
pub struct CorpusStats {
    pub total: u64,
    pub languages: Vec<(String, u64)>,
    pub categories: Vec<(String, u64)>,
}

pub async fn corpus_stats(es: &ElasticClient, index: &str) -> Result<CorpusStats, ElasticError> {
    let body = json!({
        "size": 0,
        "track_total_hits": true,
        "aggs": {
            "languages": {"terms": {"field": "language", "size": 50}},
            "categories": {"terms": {"field": "category", "size": 50}}
        }
    });
    let mut response = es.search(index, &body).await?;

    let mut buckets = |name: &str| -> Vec<(String, u64)> {
        response
            .aggregations
            .remove(name)
            .map(|agg| {
                agg.buckets
                    .into_iter()
                    .map(|b| {
                        let key = b.key.as_str().map_or_else(|| b.key.to_string(), String::from);
                        (key, b.doc_count)
                    })
                    .collect()
            })
            .unwrap_or_default()
    };
    let languages = buckets("languages");
    let categories = buckets("categories");

    Ok(CorpusStats {
        total: response.hits.total.map_or(0, |t| t.value),
        languages,
        categories,
    })
}
