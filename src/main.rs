mod cli;
mod config;
mod deploy;
mod document;
mod elastic;
mod lang;
mod pipeline;
mod pool;
mod search;
mod wiki;

pub const USER_AGENT: &str = concat!(
    "polyglot-indexer/",
    env!("CARGO_PKG_VERSION"),
    " (multilingual search indexer)"
);

use clap::Parser;
use cli::{Cli, Command};
use config::{ElasticConfig, WikiConfig};
use elastic::ElasticClient;
use reqwest::Client;
use search::SearchRequest;
use tracing::info;
use wiki::WikipediaClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("polyglot_indexer=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let http = Client::new();
    let es = ElasticClient::new(http.clone(), &ElasticConfig::from_env()?);

    match cli.command.unwrap_or(Command::Index(cli.index)) {
        Command::Index(args) => {
            let config = args.into_config();
            let wiki = WikipediaClient::new(http, &WikiConfig::from_env());
            info!(
                index = %config.index_name,
                subjects = config.subjects.len(),
                languages = ?config.languages,
                "starting indexing run"
            );
            let summary = pipeline::run(&es, &wiki, &config)
                .await
                .inspect_err(|e| tracing::error!("indexing aborted: {e}"))?;
            print!("{}", pipeline::format_summary(&summary));
        }
        Command::Protocols { dir, index } => {
            let summary = pipeline::load_local(&es, &index, &dir).await?;
            print!("{}", pipeline::format_local_summary(&summary));
        }
        Command::Search {
            query,
            language,
            category,
            size,
            index,
        } => {
            let request = SearchRequest {
                query,
                language,
                category,
                size,
            };
            let results = search::search(&es, &index, &request).await?;
            print!("{}", search::format_results(&results, &request.query));
        }
        Command::Stats { index } => {
            let stats = search::corpus_stats(&es, &index).await?;
            print!("{}", search::format_stats(&stats, &index));
        }
        Command::Deploy {
            model_id,
            inference_id,
        } => {
            let outcome = deploy::deploy_model(&es, &model_id, &inference_id).await?;
            print!("{}", deploy::format_outcome(&outcome, &model_id, &inference_id));
        }
    }
    Ok(())
}
