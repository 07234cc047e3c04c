//! Ground-truth fetch: the same subject resolved across every target language.

use tracing::{debug, info, warn};

use super::FetchFailure;
use crate::config::PipelineConfig;
use crate::document::{GROUND_TRUTH, SourceDocument};
use crate::pool::{TaskPool, Throttle};
use crate::wiki::types::WikiPage;
use crate::wiki::{ContentSource, WikiError};

#[derive(Debug, Default)]
pub struct ParallelFetch {
    pub documents: Vec<SourceDocument>,
    pub failures: Vec<FetchFailure>,
    pub subjects_found: usize,
}

pub struct ParallelFetcher<'a, S> {
    source: &'a S,
    pool: TaskPool,
    canonical_language: &'a str,
    max_chars: usize,
    page_delay: Throttle,
    subject_delay: Throttle,
}

impl<'a, S: ContentSource> ParallelFetcher<'a, S> {
    pub fn new(source: &'a S, pool: TaskPool, config: &'a PipelineConfig) -> Self {
        Self {
            source,
            pool,
            canonical_language: &config.canonical_language,
            max_chars: config.max_content_chars,
            page_delay: Throttle(config.page_delay),
            subject_delay: Throttle(config.subject_delay),
        }
    }

    /// Fetches every subject in every language it can be resolved to.
    /// Output order follows worker completion, not `subjects`.
    pub async fn fetch_parallel(&self, subjects: &[String], languages: &[String]) -> ParallelFetch {
        info!(
            subjects = subjects.len(),
            languages = ?languages,
            workers = self.pool.workers(),
            "fetching parallel ground truth"
        );

        let outcomes = self
            .pool
            .run(subjects, |subject| async move {
                let outcome = self.fetch_subject(subject, languages).await;
                self.subject_delay.pause().await;
                outcome
            })
            .await;

        let mut fetch = ParallelFetch::default();
        for outcome in outcomes {
            match outcome {
                Ok(docs) => {
                    if !docs.is_empty() {
                        fetch.subjects_found += 1;
                    }
                    fetch.documents.extend(docs);
                }
                Err(failure) => {
                    warn!(%failure, "subject dropped");
                    fetch.failures.push(failure);
                }
            }
        }
        fetch
    }

    /// One subject, retried as a unit on transient errors.
    pub async fn fetch_subject(
        &self,
        subject: &str,
        languages: &[String],
    ) -> Result<Vec<SourceDocument>, FetchFailure> {
        let result = self
            .pool
            .retry
            .run(subject, || self.fetch_subject_once(subject, languages))
            .await;

        match result {
            Ok(Some(docs)) => {
                info!(subject, languages = docs.len(), "gathered subject");
                Ok(docs)
            }
            Ok(None) => Err(FetchFailure::Missing {
                language: self.canonical_language.to_string(),
                title: subject.to_string(),
            }),
            Err((source, attempts)) => Err(FetchFailure::Failed {
                language: self.canonical_language.to_string(),
                title: subject.to_string(),
                attempts,
                source,
            }),
        }
    }

    /// `Ok(None)` when the canonical page itself does not exist.
    async fn fetch_subject_once(
        &self,
        subject: &str,
        languages: &[String],
    ) -> Result<Option<Vec<SourceDocument>>, WikiError> {
        let canon = self.canonical_language;
        let Some(canonical_page) = self.source.page(canon, subject).await? else {
            return Ok(None);
        };
        self.page_delay.pause().await;

        let needs_links = languages.iter().any(|l| l != canon);
        let localized = if needs_links {
            let links = self.source.langlinks(canon, subject).await?;
            self.page_delay.pause().await;
            links
        } else {
            Default::default()
        };

        let mut docs = Vec::new();
        for lang in languages {
            let page = if lang == canon {
                Some(canonical_page.clone())
            } else if let Some(title) = localized.get(lang) {
                let page = self.source.page(lang, title).await?;
                self.page_delay.pause().await;
                page
            } else {
                debug!(subject, lang = %lang, "no cross-language link");
                None
            };

            if let Some(doc) = page.and_then(|p| self.to_document(p, lang, subject)) {
                docs.push(doc);
            }
        }
        Ok(Some(docs))
    }

    fn to_document(&self, page: WikiPage, lang: &str, subject: &str) -> Option<SourceDocument> {
        let doc = SourceDocument::new(
            page.title,
            page.url,
            lang,
            GROUND_TRUTH,
            &page.summary,
            self.max_chars,
        );
        if doc.is_none() {
            debug!(subject, lang, "empty summary skipped");
        }
        doc.map(|d| d.with_original_title(subject))
    }
}
