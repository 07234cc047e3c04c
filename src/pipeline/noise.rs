//! Background noise: unrelated pages per language, gathered from seed topics and their links.

use std::collections::HashSet;

use tracing::{debug, info};

use super::FetchFailure;
use crate::config::{PipelineConfig, noise_seeds};
use crate::document::{BACKGROUND_NOISE, SourceDocument};
use crate::pool::{TaskPool, Throttle};
use crate::wiki::ContentSource;

#[derive(Debug, Default)]
pub struct NoiseBatch {
    pub language: String,
    pub documents: Vec<SourceDocument>,
    pub skipped: usize,
}

pub struct NoiseFetcher<'a, S> {
    source: &'a S,
    pool: TaskPool,
    max_chars: usize,
    page_delay: Throttle,
    link_delay: Throttle,
    seed_delay: Throttle,
}

impl<'a, S: ContentSource> NoiseFetcher<'a, S> {
    pub fn new(source: &'a S, pool: TaskPool, config: &PipelineConfig) -> Self {
        Self {
            source,
            pool,
            max_chars: config.max_content_chars,
            page_delay: Throttle(config.page_delay),
            link_delay: Throttle(config.link_delay),
            seed_delay: Throttle(config.subject_delay),
        }
    }

    /// One pool entry per language; each language runs its seeds sequentially.
    pub async fn fetch_all(&self, languages: &[String], target_count: usize) -> Vec<NoiseBatch> {
        self.pool
            .run(languages, |lang| async move {
                let seeds = noise_seeds(lang);
                self.fetch_noise(lang, seeds, target_count).await
            })
            .await
    }

    /// Gathers at most `target_count` distinct pages for `language`.
    /// Individual page failures are skipped; this never fails as a whole.
    pub async fn fetch_noise(
        &self,
        language: &str,
        seeds: &[&str],
        target_count: usize,
    ) -> NoiseBatch {
        let mut batch = NoiseBatch {
            language: language.to_string(),
            ..Default::default()
        };
        let mut seen: HashSet<String> = HashSet::new();

        for seed in seeds {
            if batch.documents.len() >= target_count {
                break;
            }
            if seen.insert(seed.to_string()) {
                match self.fetch_page(language, seed).await {
                    Ok(doc) => self.accept(&mut batch, &mut seen, doc),
                    Err(failure) => {
                        debug!(%failure, "noise seed skipped");
                        batch.skipped += 1;
                        self.seed_delay.pause().await;
                        continue;
                    }
                }
                self.page_delay.pause().await;
            } else {
                debug!(seed, "seed already collected, enumerating links only");
            }

            let remaining = target_count.saturating_sub(batch.documents.len());
            let links = self
                .pool
                .retry
                .run(seed, || self.source.links(language, seed, remaining))
                .await
                .unwrap_or_else(|(e, _)| {
                    debug!(seed, error = %e, "link enumeration failed");
                    Vec::new()
                });

            for link in links {
                if batch.documents.len() >= target_count {
                    break;
                }
                if !seen.insert(link.clone()) {
                    continue;
                }
                match self.fetch_page(language, &link).await {
                    Ok(doc) => self.accept(&mut batch, &mut seen, doc),
                    Err(failure) => {
                        debug!(%failure, "noise page skipped");
                        batch.skipped += 1;
                    }
                }
                self.link_delay.pause().await;
            }
            self.seed_delay.pause().await;
        }

        info!(
            language,
            documents = batch.documents.len(),
            skipped = batch.skipped,
            "gathered background noise"
        );
        batch
    }

    fn accept(&self, batch: &mut NoiseBatch, seen: &mut HashSet<String>, doc: SourceDocument) {
        // Redirects can resolve two link titles to the same page.
        if batch.documents.iter().any(|d| d.title == doc.title) {
            return;
        }
        seen.insert(doc.title.clone());
        batch.documents.push(doc);
    }

    async fn fetch_page(&self, language: &str, title: &str) -> Result<SourceDocument, FetchFailure> {
        let page = self
            .pool
            .retry
            .run(title, || self.source.page(language, title))
            .await
            .map_err(|(source, attempts)| FetchFailure::Failed {
                language: language.to_string(),
                title: title.to_string(),
                attempts,
                source,
            })?;

        let missing = || FetchFailure::Missing {
            language: language.to_string(),
            title: title.to_string(),
        };
        let page = page.ok_or_else(missing)?;
        SourceDocument::new(
            page.title,
            page.url,
            language,
            BACKGROUND_NOISE,
            &page.summary,
            self.max_chars,
        )
        .ok_or_else(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::RetryPolicy;
    use crate::wiki::fake::FakeWiki;
    use std::time::Duration;

    fn config() -> PipelineConfig {
        PipelineConfig {
            page_delay: Duration::ZERO,
            subject_delay: Duration::ZERO,
            link_delay: Duration::ZERO,
            ..PipelineConfig::default()
        }
    }

    fn pool() -> TaskPool {
        TaskPool::new(3, RetryPolicy::new(2, Duration::from_millis(1)))
    }

    fn wiki() -> FakeWiki {
        FakeWiki::new()
            .with_page("en", "Earth", "Earth is the third planet.")
            .with_links("en", "Earth", &["Sun", "Moon", "Ocean", "Ghost", "Earth"])
            .with_page("en", "Sun", "The Sun is a star.")
            .with_page("en", "Moon", "The Moon orbits Earth.")
            .with_page("en", "Ocean", "An ocean is a body of salt water.")
            .with_page("en", "History", "History is the study of the past.")
            .with_links("en", "History", &["Moon", "Rome"])
            .with_page("en", "Rome", "Rome is the capital of Italy.")
    }

    #[tokio::test]
    async fn seeds_and_links_tagged_as_noise() {
        let wiki = wiki();
        let config = config();
        let fetcher = NoiseFetcher::new(&wiki, pool(), &config);

        let batch = fetcher.fetch_noise("en", &["Earth", "History"], 50).await;

        let titles: Vec<_> = batch.documents.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Earth", "Sun", "Moon", "Ocean", "History", "Rome"]);
        for doc in &batch.documents {
            assert_eq!(doc.category, BACKGROUND_NOISE);
            assert_eq!(doc.language, "en");
            assert!(doc.original_title.is_none());
        }
        assert_eq!(batch.skipped, 1);
    }

    #[tokio::test]
    async fn never_exceeds_target_count() {
        let wiki = wiki();
        let config = config();
        let fetcher = NoiseFetcher::new(&wiki, pool(), &config);

        let batch = fetcher.fetch_noise("en", &["Earth", "History"], 3).await;
        assert_eq!(batch.documents.len(), 3);
    }

    #[tokio::test]
    async fn unreachable_seeds_yield_empty_batch() {
        let wiki = FakeWiki::new()
            .broken("he", "מדע")
            .failing("he", "עולם", 100);
        let config = config();
        let fetcher = NoiseFetcher::new(&wiki, pool(), &config);

        let batch = fetcher.fetch_noise("he", &["מדע", "עולם", "חברה"], 50).await;
        assert!(batch.documents.is_empty());
        assert_eq!(batch.skipped, 3);
    }

    #[tokio::test]
    async fn failing_link_does_not_stop_batch() {
        let wiki = wiki().broken("en", "Sun");
        let config = config();
        let fetcher = NoiseFetcher::new(&wiki, pool(), &config);

        let batch = fetcher.fetch_noise("en", &["Earth"], 50).await;
        let titles: Vec<_> = batch.documents.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Earth", "Moon", "Ocean"]);
    }

    #[tokio::test]
    async fn seed_reached_as_link_is_not_fetched_again() {
        let wiki = wiki().with_links("en", "Moon", &["Rome"]);
        let config = config();
        let fetcher = NoiseFetcher::new(&wiki, pool(), &config);

        let batch = fetcher.fetch_noise("en", &["Earth", "Moon"], 50).await;

        let titles: Vec<_> = batch.documents.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Earth", "Sun", "Moon", "Ocean", "Rome"]);
        // Earth page + links, four link pages, Moon links, Rome page.
        assert_eq!(wiki.calls(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn noise_requests_are_spaced_by_delays() {
        let wiki = wiki();
        let config = PipelineConfig {
            page_delay: Duration::from_millis(200),
            link_delay: Duration::from_millis(300),
            subject_delay: Duration::from_millis(500),
            ..PipelineConfig::default()
        };
        let fetcher = NoiseFetcher::new(&wiki, pool(), &config);

        let started = tokio::time::Instant::now();
        let batch = fetcher.fetch_noise("en", &["Earth"], 50).await;
        let elapsed = started.elapsed();

        // Seed page, then Sun, Moon, Ocean and the missing Ghost; Earth itself is already seen.
        assert_eq!(batch.documents.len(), 4);
        let expected = config.page_delay + config.link_delay * 4 + config.subject_delay;
        assert!(elapsed >= expected, "elapsed {elapsed:?} < {expected:?}");
    }

    #[tokio::test]
    async fn fetch_all_runs_each_language() {
        let wiki = FakeWiki::new()
            .with_page("en", "Earth", "Earth is the third planet.")
            .with_page("he", "מדע", "מדע הוא שיטה.")
            .with_page("ar", "علوم", "العلوم هي المعرفة.");
        let config = config();
        let fetcher = NoiseFetcher::new(&wiki, pool(), &config);

        let langs: Vec<String> = ["en", "he", "ar"].map(String::from).to_vec();
        let mut batches = fetcher.fetch_all(&langs, 5).await;
        batches.sort_by(|a, b| a.language.cmp(&b.language));

        let counts: Vec<_> = batches
            .iter()
            .map(|b| (b.language.as_str(), b.documents.len()))
            .collect();
        assert_eq!(counts, vec![("ar", 1), ("en", 1), ("he", 1)]);
    }
}
