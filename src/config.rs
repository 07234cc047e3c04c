use std::env;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD};

/// Errors raised while reading connection settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no Elasticsearch endpoint configured: set ELASTIC_URL or ELASTIC_CLOUD_ID")]
    MissingEndpoint,

    #[error("ELASTIC_API_KEY not set")]
    MissingApiKey,

    #[error("invalid ELASTIC_CLOUD_ID: {0}")]
    InvalidCloudId(String),

    #[error("invalid ELASTIC_URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Connection settings for the search platform, read once at startup.
#[derive(Debug, Clone)]
pub struct ElasticConfig {
    pub endpoint: String,
    pub api_key: ApiKey,
}

impl ElasticConfig {
    /// `ELASTIC_CLOUD_ID` wins over `ELASTIC_URL` when both are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(
            non_empty_var("ELASTIC_CLOUD_ID").as_deref(),
            non_empty_var("ELASTIC_URL").as_deref(),
            non_empty_var("ELASTIC_API_KEY").as_deref(),
        )
    }

    fn from_vars(
        cloud_id: Option<&str>,
        url: Option<&str>,
        api_key: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let endpoint = match (cloud_id, url) {
            (Some(id), _) => decode_cloud_id(id)?,
            (None, Some(raw)) => {
                let parsed = url::Url::parse(raw)?;
                parsed.as_str().trim_end_matches('/').to_string()
            }
            (None, None) => return Err(ConfigError::MissingEndpoint),
        };
        let api_key = api_key.ok_or(ConfigError::MissingApiKey)?;
        Ok(Self {
            endpoint,
            api_key: ApiKey::new(api_key),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Decode `<name>:<base64("host$es_uuid$kibana_uuid")>` into the Elasticsearch URL.
pub fn decode_cloud_id(cloud_id: &str) -> Result<String, ConfigError> {
    let invalid = |why: &str| ConfigError::InvalidCloudId(why.to_string());

    let (_, encoded) = cloud_id
        .split_once(':')
        .ok_or_else(|| invalid("expected '<name>:<base64>'"))?;
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|e| invalid(&e.to_string()))?;
    let decoded = String::from_utf8(decoded).map_err(|_| invalid("payload is not UTF-8"))?;

    let mut parts = decoded.split('$');
    let host = parts.next().filter(|h| !h.is_empty());
    let es_uuid = parts.next().filter(|u| !u.is_empty());
    let (Some(host), Some(es_uuid)) = (host, es_uuid) else {
        return Err(invalid("missing host or Elasticsearch id"));
    };

    Ok(match host.split_once(':') {
        Some((domain, port)) if port != "443" => format!("https://{es_uuid}.{domain}:{port}"),
        Some((domain, _)) => format!("https://{es_uuid}.{domain}"),
        None => format!("https://{es_uuid}.{host}"),
    })
}

#[derive(Debug, Clone)]
pub struct WikiConfig {
    pub user_agent: String,
    pub timeout: Duration,
}

impl WikiConfig {
    pub fn from_env() -> Self {
        Self {
            user_agent: non_empty_var("WIKI_USER_AGENT")
                .unwrap_or_else(|| crate::USER_AGENT.to_string()),
            timeout: Duration::from_secs(30),
        }
    }
}

pub const DEFAULT_INDEX: &str = "multilingual-scale-index";
pub const DEFAULT_INFERENCE_ID: &str = ".multilingual-e5-small-elasticsearch";
pub const DEFAULT_MODEL_ID: &str = ".multilingual-e5-small";
/// Endpoint created by `deploy`. Dot-prefixed ids are reserved for preconfigured endpoints.
pub const DEPLOY_INFERENCE_ID: &str = "multilingual-e5-inference";

pub const GROUND_TRUTH_SUBJECTS: &[&str] = &[
    "Albert Einstein",
    "Jerusalem",
    "DNA",
    "Solar System",
    "Quantum mechanics",
    "Artificial intelligence",
    "World Wide Web",
    "Climate change",
    "Leonardo da Vinci",
    "William Shakespeare",
    "Olympics",
    "Ancient Egypt",
    "Empire of Japan",
    "French Revolution",
    "Black hole",
    "Evolution",
    "Photosynthesis",
    "Blockchain",
    "SpaceX",
    "Nuclear power",
    "Mount Everest",
    "Amazon River",
    "Sahara",
    "Pacific Ocean",
    "Antarctica",
    "Ludwig van Beethoven",
    "Socrates",
    "Gothic architecture",
    "Mythology",
    "Cinema",
    "Moon",
    "Mars",
    "Big Bang",
    "Galaxies",
    "International Space Station",
    "Bacteria",
    "Viruses",
    "Human genome",
    "Heart",
    "Ecosystem",
    "Thermodynamics",
    "Electromagnetism",
    "Gravity",
    "String theory",
    "Higgs boson",
];

/// Seed topics for background noise, per language.
pub fn noise_seeds(language: &str) -> &'static [&'static str] {
    match language {
        "en" => &["Earth", "History", "Science", "Technology", "World", "Society"],
        "he" => &["כדור_הארץ", "היסטוריה", "מדע", "טכנולוגיה", "עולם", "חברה"],
        "ar" => &["الأرض", "تاريخ", "علوم", "تكنولوجيا", "عالم", "مجتمع"],
        _ => &[],
    }
}

/// Knobs for one indexing run. Built once at entry and passed down by reference.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub index_name: String,
    pub inference_id: String,
    pub canonical_language: String,
    pub languages: Vec<String>,
    pub subjects: Vec<String>,
    pub noise_per_language: usize,
    pub max_content_chars: usize,
    pub chunk_size: usize,
    pub workers: usize,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub page_delay: Duration,
    pub subject_delay: Duration,
    pub link_delay: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            index_name: DEFAULT_INDEX.to_string(),
            inference_id: DEFAULT_INFERENCE_ID.to_string(),
            canonical_language: "en".to_string(),
            languages: ["en", "he", "ar"].map(String::from).to_vec(),
            subjects: GROUND_TRUTH_SUBJECTS.iter().map(|s| s.to_string()).collect(),
            noise_per_language: 50,
            max_content_chars: 5000,
            chunk_size: 10,
            workers: 5,
            max_attempts: 4,
            retry_base_delay: Duration::from_secs(1),
            page_delay: Duration::from_millis(200),
            subject_delay: Duration::from_millis(500),
            link_delay: Duration::from_millis(300),
        }
    }
}
