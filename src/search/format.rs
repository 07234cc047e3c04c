use super::{CorpusStats, SearchResults};

const SNIPPET_CHARS: usize = 300;

pub fn format_results(results: &SearchResults, query: &str) -> String {
    let heading = if query.trim().is_empty() { "(all documents)" } else { query };
    let mut output = format!("# Search: {}\n\n", sanitize_line(heading));
    output.push_str(&format!(
        "Showing {} of {} matching documents\n\n",
        results.hits.len(),
        results.total
    ));

    for (rank, hit) in results.hits.iter().enumerate() {
        output.push_str(&format!(
            "{}. [{}] {} (score: {:.2}, {})\n",
            rank + 1,
            hit.language,
            sanitize_line(&hit.title),
            hit.score,
            hit.category
        ));
        if !hit.url.is_empty() {
            output.push_str(&format!("   {}\n", hit.url));
        }
        let text = hit.content_text();
        if !text.is_empty() {
            let snippet: String = text.chars().take(SNIPPET_CHARS).collect();
            let ellipsis = if text.chars().nth(SNIPPET_CHARS).is_some() { "..." } else { "" };
            output.push_str(&format!("   {}{ellipsis}\n", sanitize_line(&snippet)));
        }
        output.push('\n');
    }
    output
}

pub fn format_stats(stats: &CorpusStats, index: &str) -> String {
    let mut output = format!("# Corpus: {index}\n\nTotal documents: {}\n", stats.total);

    output.push_str("\n## Languages\n\n");
    for (language, count) in &stats.languages {
        output.push_str(&format!("- {language}: {count} docs\n"));
    }
    if !stats.categories.is_empty() {
        output.push_str("\n## Categories\n\n");
        for (category, count) in &stats.categories {
            output.push_str(&format!("- {category}: {count} docs\n"));
        }
    }
    output
}

/// Collapses newlines so a value stays on its line.
fn sanitize_line(s: &str) -> String {
    s.chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}
