use apidocs_llm_client::TextGenerator;
use log::{debug, warn};
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of a query expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// The original query first, then distinct paraphrases
    pub queries: Vec<String>,
    /// The generator was called and failed; `queries` holds only the original
    pub failed: bool,
}

impl Expansion {
    fn original_only(query: &str, failed: bool) -> Self {
        Self {
            queries: vec![query.to_string()],
            failed,
        }
    }
}

/// Widens recall by asking a text generator for alternative phrasings
#[derive(Clone)]
pub struct QueryExpander {
    generator: Option<Arc<dyn TextGenerator>>,
    max_variations: usize,
}

impl QueryExpander {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, max_variations: usize) -> Self {
        Self {
            generator,
            max_variations,
        }
    }

    /// Expander that always returns the original query alone
    pub fn disabled() -> Self {
        Self::new(None, 0)
    }

    pub fn is_enabled(&self) -> bool {
        self.generator.is_some() && self.max_variations > 0
    }

    /// Expand `query` into `[query, variation...]`; never fails
    pub async fn expand(&self, query: &str) -> Expansion {
        // A filter-only query has no text to paraphrase
        let Some(generator) = self
            .generator
            .as_ref()
            .filter(|_| self.max_variations > 0 && !query.trim().is_empty())
        else {
            return Expansion::original_only(query, false);
        };

        let prompt = build_prompt(query, self.max_variations);
        match generator.generate(&prompt).await {
            Ok(text) => {
                let variations = parse_variations(&text, query, self.max_variations);
                debug!("Expanded '{query}' into {} variations", variations.len());

                let mut queries = Vec::with_capacity(variations.len() + 1);
                queries.push(query.to_string());
                queries.extend(variations);
                Expansion {
                    queries,
                    failed: false,
                }
            }
            Err(e) => {
                warn!("Query expansion failed, using original query only: {e}");
                Expansion::original_only(query, true)
            }
        }
    }
}

fn build_prompt(query: &str, count: usize) -> String {
    format!(
        "Generate {count} alternative search queries for the following API documentation \
         question. Use synonyms, technical terms, and related error codes.\n\
         Original query: {query}\n\
         Return a simple list separated by newlines. NO numbering, NO explanations."
    )
}

/// Clean generator output into at most `max` distinct variations.
///
/// List markers, numbering and wrapping quotes are stripped. Lines equal to
/// the original query (ignoring case) or to an earlier line are dropped.
pub fn parse_variations(text: &str, original: &str, max: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(original.trim().to_lowercase());

    let mut variations = Vec::new();
    for line in text.lines() {
        if variations.len() >= max {
            break;
        }

        let cleaned = strip_list_marker(line.trim());
        let cleaned = cleaned
            .trim_matches(|c| matches!(c, '"' | '\'' | '`'))
            .trim();
        if cleaned.is_empty() {
            continue;
        }

        if seen.insert(cleaned.to_lowercase()) {
            variations.push(cleaned.to_string());
        }
    }
    variations
}

fn strip_list_marker(line: &str) -> &str {
    if let Some(rest) = line
        .strip_prefix('-')
        .or_else(|| line.strip_prefix('*'))
        .or_else(|| line.strip_prefix('•'))
    {
        return rest.trim_start();
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim_start();
        }
    }

    line
}
