use apidocs_doc_store::Filters;

/// A query with its embedded `key:value` constraints pulled out
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedQuery {
    /// Free text with the filter tokens removed and whitespace collapsed
    pub clean: String,
    /// Extracted filters; a repeated key keeps its last value
    pub filters: Filters,
}

/// Extract `key:value` filters from a free-text query.
///
/// A filter is a whole whitespace-delimited token whose key is made of word
/// characters and whose value is made of word characters, `.` or `-`. Anything
/// else (URLs, `a:b:c`, `std::io`) stays in the clean query untouched.
///
/// ```
/// use apidocs_retrieval::parse_query;
///
/// let parsed = parse_query("login issues type:guide");
/// assert_eq!(parsed.clean, "login issues");
/// assert_eq!(parsed.filters.get("type").map(String::as_str), Some("guide"));
/// ```
pub fn parse_query(query: &str) -> ParsedQuery {
    let mut filters = Filters::new();
    let mut kept = Vec::new();

    for token in query.split_whitespace() {
        match split_filter(token) {
            Some((key, value)) => {
                filters.insert(key.to_string(), value.to_string());
            }
            None => kept.push(token),
        }
    }

    ParsedQuery {
        clean: kept.join(" "),
        filters,
    }
}

fn split_filter(token: &str) -> Option<(&str, &str)> {
    let (key, value) = token.split_once(':')?;
    if key.is_empty() || value.is_empty() {
        return None;
    }

    if !key.chars().all(is_word_char) {
        return None;
    }

    if !value
        .chars()
        .all(|c| is_word_char(c) || c == '.' || c == '-')
    {
        return None;
    }

    Some((key, value))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
