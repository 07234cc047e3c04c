use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::elastic::{ElasticClient, ElasticError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Keyword,
    /// Embedded by the platform at write and query time through a named inference endpoint.
    Semantic { inference_id: String },
}

#[derive(Debug, Clone)]
pub struct IndexSchema {
    fields: Vec<(String, FieldType)>,
}

impl IndexSchema {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn field(mut self, name: &str, kind: FieldType) -> Self {
        self.fields.push((name.to_string(), kind));
        self
    }

    /// Layout for `SourceDocument` records: keyword facets plus a semantic `content` field.
    pub fn source_documents(inference_id: &str) -> Self {
        Self::new()
            .field("title", FieldType::Text)
            .field("original_title", FieldType::Text)
            .field("url", FieldType::Keyword)
            .field("language", FieldType::Keyword)
            .field("category", FieldType::Keyword)
            .field(
                "content",
                FieldType::Semantic {
                    inference_id: inference_id.to_string(),
                },
            )
    }

    pub fn semantic_inference_ids(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter_map(|(_, kind)| match kind {
            FieldType::Semantic { inference_id } => Some(inference_id.as_str()),
            _ => None,
        })
    }

    pub fn to_body(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, kind)| {
                let mapping = match kind {
                    FieldType::Text => json!({"type": "text"}),
                    FieldType::Keyword => json!({"type": "keyword"}),
                    FieldType::Semantic { inference_id } => json!({
                        "type": "semantic_text",
                        "inference_id": inference_id
                    }),
                };
                (name.clone(), mapping)
            })
            .collect();
        json!({ "mappings": { "properties": properties } })
    }
}

impl Default for IndexSchema {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the ids of semantic-field inference endpoints that do not exist on the cluster.
pub async fn missing_inference(
    es: &ElasticClient,
    schema: &IndexSchema,
) -> Result<Vec<String>, ElasticError> {
    let mut missing = Vec::new();
    for id in schema.semantic_inference_ids() {
        if !es.inference_exists(id).await? {
            missing.push(id.to_string());
        }
    }
    Ok(missing)
}

/// Drops any index called `name` and recreates it with `schema`.
///
/// Destructive: every document previously stored under `name` is lost.
/// Returns whether the platform acknowledged the creation.
pub async fn ensure_index(
    es: &ElasticClient,
    name: &str,
    schema: &IndexSchema,
) -> Result<bool, ElasticError> {
    if es.index_exists(name).await? {
        warn!(index = name, "deleting existing index");
        es.delete_index(name).await?;
    }
    let created = es.create_index(name, &schema.to_body()).await?;
    info!(index = name, acknowledged = created, "index created");
    Ok(created)
}
