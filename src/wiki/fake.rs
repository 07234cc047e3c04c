use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::types::WikiPage;
use super::{ContentSource, WikiError};

/// In-memory encyclopedia with injectable transient failures.
#[derive(Default)]
pub(crate) struct FakeWiki {
    pages: HashMap<(String, String), WikiPage>,
    langlinks: HashMap<(String, String), HashMap<String, String>>,
    links: HashMap<(String, String), Vec<String>>,
    failures: Mutex<HashMap<(String, String), u32>>,
    broken: Vec<(String, String)>,
    calls: AtomicUsize,
}

fn key(lang: &str, title: &str) -> (String, String) {
    (lang.to_string(), title.to_string())
}

impl FakeWiki {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_page(mut self, lang: &str, title: &str, summary: &str) -> Self {
        self.pages.insert(
            key(lang, title),
            WikiPage {
                title: title.to_string(),
                url: format!("https://{lang}.wikipedia.org/wiki/{}", title.replace(' ', "_")),
                summary: summary.to_string(),
            },
        );
        self
    }

    pub(crate) fn with_langlink(mut self, lang: &str, title: &str, to: &str, to_title: &str) -> Self {
        self.langlinks
            .entry(key(lang, title))
            .or_default()
            .insert(to.to_string(), to_title.to_string());
        self
    }

    pub(crate) fn with_links(mut self, lang: &str, title: &str, targets: &[&str]) -> Self {
        self.links.insert(
            key(lang, title),
            targets.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    /// The next `count` requests touching (lang, title) fail with a rate limit.
    pub(crate) fn failing(self, lang: &str, title: &str, count: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(key(lang, title), count);
        self
    }

    /// Every request touching (lang, title) fails with a permanent error.
    pub(crate) fn broken(mut self, lang: &str, title: &str) -> Self {
        self.broken.push(key(lang, title));
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self, lang: &str, title: &str) -> Result<(), WikiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let k = key(lang, title);
        if self.broken.contains(&k) {
            return Err(WikiError::Query {
                code: "internal_api_error".into(),
                info: "broken page".into(),
            });
        }
        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(&k)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(WikiError::RateLimited);
        }
        Ok(())
    }
}

impl ContentSource for FakeWiki {
    async fn page(&self, lang: &str, title: &str) -> Result<Option<WikiPage>, WikiError> {
        self.check(lang, title)?;
        tokio::task::yield_now().await;
        Ok(self.pages.get(&key(lang, title)).cloned())
    }

    async fn langlinks(
        &self,
        lang: &str,
        title: &str,
    ) -> Result<HashMap<String, String>, WikiError> {
        self.check(lang, title)?;
        Ok(self
            .langlinks
            .get(&key(lang, title))
            .cloned()
            .unwrap_or_default())
    }

    async fn links(
        &self,
        lang: &str,
        title: &str,
        limit: usize,
    ) -> Result<Vec<String>, WikiError> {
        self.check(lang, title)?;
        Ok(self
            .links
            .get(&key(lang, title))
            .map(|l| l.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
