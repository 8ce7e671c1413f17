//! Query decomposition
//!
//! Splits a raw user query into positive text (quoting preserved), negative
//! terms (words starting with `-`), and a quoted-phrase flag. Purely lexical;
//! no language inspection happens here.

/// A decomposed user query
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    /// Keywords minus negatives, with quoting preserved
    pub positive_text: String,
    /// Words that started with '-' (the dash stripped)
    pub negative_terms: Vec<String>,
    /// Whether any "…" substring is present
    pub has_quoted_phrase: bool,
    pub raw_query: String,
}

impl ParsedQuery {
    pub fn is_empty(&self) -> bool {
        self.positive_text.is_empty()
    }

    /// The FTS MATCH input, when there is one
    pub fn fts_query(&self) -> Option<&str> {
        (!self.positive_text.is_empty()).then_some(self.positive_text.as_str())
    }
}

/// Split a raw query into positives, negatives, and the quote flag
pub fn parse_query(raw: &str) -> ParsedQuery {
    let mut positives: Vec<String> = Vec::new();
    let mut negatives: Vec<String> = Vec::new();
    let mut has_quoted_phrase = false;

    let mut chars = raw.chars().peekable();
    let mut current = String::new();
    let mut in_quotes = false;

    let flush = |token: &mut String, positives: &mut Vec<String>, negatives: &mut Vec<String>| {
        if token.is_empty() {
            return;
        }
        if let Some(stripped) = token.strip_prefix('-') {
            // A bare dash is noise, not a negative
            if !stripped.is_empty() {
                negatives.push(stripped.to_string());
            }
        } else {
            positives.push(std::mem::take(token));
        }
        token.clear();
    };

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                current.push('"');
                if in_quotes {
                    in_quotes = false;
                    has_quoted_phrase = true;
                    flush(&mut current, &mut positives, &mut negatives);
                } else {
                    in_quotes = true;
                    // Unterminated quote: treat the rest as the phrase
                    if !chars.clone().any(|c| c == '"') {
                        let rest: String = chars.by_ref().collect();
                        current.push_str(rest.trim_end());
                        current.push('"');
                        has_quoted_phrase = true;
                        flush(&mut current, &mut positives, &mut negatives);
                        in_quotes = false;
                    }
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                flush(&mut current, &mut positives, &mut negatives);
            }
            c => current.push(c),
        }
    }
    flush(&mut current, &mut positives, &mut negatives);

    ParsedQuery {
        positive_text: positives.join(" "),
        negative_terms: negatives,
        has_quoted_phrase,
        raw_query: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_keywords() {
        let q = parse_query("sunset beach waves");
        assert_eq!(q.positive_text, "sunset beach waves");
        assert!(q.negative_terms.is_empty());
        assert!(!q.has_quoted_phrase);
    }

    #[test]
    fn test_negative_terms_extracted() {
        let q = parse_query("beach -crowd -night");
        assert_eq!(q.positive_text, "beach");
        assert_eq!(q.negative_terms, vec!["crowd", "night"]);
    }

    #[test]
    fn test_quoted_phrase_preserved() {
        let q = parse_query("\"golden hour\" beach");
        assert_eq!(q.positive_text, "\"golden hour\" beach");
        assert!(q.has_quoted_phrase);
    }

    #[test]
    fn test_negative_inside_quotes_is_literal() {
        let q = parse_query("\"state-of-the-art drone\"");
        assert_eq!(q.positive_text, "\"state-of-the-art drone\"");
        assert!(q.negative_terms.is_empty());
    }

    #[test]
    fn test_unterminated_quote() {
        let q = parse_query("\"golden hour");
        assert_eq!(q.positive_text, "\"golden hour\"");
        assert!(q.has_quoted_phrase);
    }

    #[test]
    fn test_empty_and_dash_only() {
        let q = parse_query("  - ");
        assert!(q.is_empty());
        assert!(q.negative_terms.is_empty());
        assert_eq!(q.fts_query(), None);
    }

    #[test]
    fn test_raw_query_retained() {
        let q = parse_query("drone -blurry");
        assert_eq!(q.raw_query, "drone -blurry");
    }
}
