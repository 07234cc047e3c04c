use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{
    DEFAULT_INDEX, DEFAULT_INFERENCE_ID, DEFAULT_MODEL_ID, DEPLOY_INFERENCE_ID, PipelineConfig,
};
use crate::search::DEFAULT_SIZE;

#[derive(Parser, Debug)]
#[command(
    name = "polyglot-indexer",
    version,
    about = "Seed a multilingual semantic search index from Wikipedia",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(flatten)]
    pub index: IndexArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rebuild the index and fill it with ground truth and noise (default)
    Index(IndexArgs),
    /// Append local .txt/.md/.pdf documents to an existing index
    Protocols {
        dir: PathBuf,
        #[arg(long, default_value = DEFAULT_INDEX)]
        index: String,
    },
    /// Run a hybrid semantic + title query
    Search {
        #[arg(default_value = "")]
        query: String,
        #[arg(long = "lang")]
        language: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value_t = DEFAULT_SIZE)]
        size: usize,
        #[arg(long, default_value = DEFAULT_INDEX)]
        index: String,
    },
    /// Document counts per language and category
    Stats {
        #[arg(long, default_value = DEFAULT_INDEX)]
        index: String,
    },
    /// Start the embedding model and create its inference endpoint
    Deploy {
        #[arg(long, default_value = DEFAULT_MODEL_ID)]
        model_id: String,
        #[arg(long, default_value = DEPLOY_INFERENCE_ID)]
        inference_id: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    #[arg(long, default_value = DEFAULT_INDEX)]
    pub index: String,

    #[arg(long, default_value = DEFAULT_INFERENCE_ID)]
    pub inference_id: String,

    #[arg(long, value_delimiter = ',', default_values = ["en", "he", "ar"])]
    pub languages: Vec<String>,

    /// Replaces the built-in subject list
    #[arg(long, value_delimiter = ',')]
    pub subjects: Vec<String>,

    #[arg(long, default_value_t = 50)]
    pub noise_per_language: usize,

    #[arg(long, default_value_t = 5)]
    pub workers: usize,

    #[arg(long, default_value_t = 10)]
    pub chunk_size: usize,

    #[arg(long, default_value_t = 5000)]
    pub max_chars: usize,

    #[arg(long, default_value_t = 4)]
    pub max_attempts: u32,
}

impl IndexArgs {
    pub fn into_config(self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        let subjects = if self.subjects.is_empty() {
            defaults.subjects
        } else {
            self.subjects
        };
        PipelineConfig {
            index_name: self.index,
            inference_id: self.inference_id,
            languages: self
                .languages
                .into_iter()
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty())
                .collect(),
            subjects,
            noise_per_language: self.noise_per_language,
            max_content_chars: self.max_chars,
            chunk_size: self.chunk_size.max(1),
            workers: self.workers.max(1),
            max_attempts: self.max_attempts,
            ..defaults
        }
    }
}
