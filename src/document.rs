use serde::{Deserialize, Serialize};

pub const GROUND_TRUTH: &str = "Parallel Ground Truth";
pub const BACKGROUND_NOISE: &str = "Background Noise";
pub const PROTOCOL: &str = "Protocol";

/// One record destined for the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    pub url: String,
    pub language: String,
    pub category: String,
    pub content: String,
}

impl SourceDocument {
    /// Builds a document with bounded content. Returns `None` when nothing is left after trimming.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        language: impl Into<String>,
        category: impl Into<String>,
        raw_content: &str,
        max_chars: usize,
    ) -> Option<Self> {
        let content = bounded_content(raw_content, max_chars);
        if content.is_empty() {
            return None;
        }
        Some(Self {
            title: title.into(),
            original_title: None,
            url: url.into(),
            language: language.into(),
            category: category.into(),
            content,
        })
    }

    pub fn with_original_title(mut self, original: impl Into<String>) -> Self {
        self.original_title = Some(original.into());
        self
    }
}

/// Cuts `text` to at most `max_chars` characters, then trims surrounding whitespace.
pub fn bounded_content(text: &str, max_chars: usize) -> String {
    let end = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(i, _)| i);
    text[..end].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_content_truncates_by_chars() {
        let text = "א".repeat(6000);
        let out = bounded_content(&text, 5000);
        assert_eq!(out.chars().count(), 5000);
    }

    #[test]
    fn bounded_content_trims_after_cut() {
        assert_eq!(bounded_content("  hello world  ", 8), "hello");
        assert_eq!(bounded_content("  hello world  ", 10), "hello wo");
        assert_eq!(bounded_content("\n text \n", 100), "text");
    }

    #[test]
    fn bounded_content_short_text_untouched() {
        assert_eq!(bounded_content("short", 5000), "short");
    }

    #[test]
    fn empty_content_yields_no_document() {
        assert!(SourceDocument::new("T", "u", "en", BACKGROUND_NOISE, "   \n", 5000).is_none());
    }

    #[test]
    fn serialization_omits_missing_original_title() {
        let doc = SourceDocument::new("T", "u", "en", BACKGROUND_NOISE, "body", 5000).unwrap();
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("original_title").is_none());
        assert_eq!(json["category"], "Background Noise");

        let doc = doc.with_original_title("Canon");
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["original_title"], "Canon");
    }
}
