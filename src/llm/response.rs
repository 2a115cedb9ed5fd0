//! Cleanup of raw model answers

/// Remove every `"` and `'` character, then surrounding whitespace
pub fn remove_quote_chars(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '"' && *c != '\'')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Strip leading/trailing double quotes, then single quotes, then whitespace
pub fn trim_quotes(text: &str) -> &str {
    text.trim().trim_matches('"').trim_matches('\'').trim()
}

/// Like [`trim_quotes`], also dropping trailing or leading periods
pub fn trim_label(text: &str) -> &str {
    trim_quotes(text).trim_matches('.').trim()
}

/// Return the body of the first Markdown code fence, if any
pub fn strip_code_fences(text: &str) -> &str {
    let inner = if text.contains("```json") {
        text.split("```json").nth(1)
    } else if text.contains("```") {
        text.split("```").nth(1)
    } else {
        None
    };

    match inner {
        Some(body) => body.split("```").next().unwrap_or(body).trim(),
        None => text.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_quote_chars() {
        assert_eq!(remove_quote_chars(" \"Factures d'eau\" "), "Factures deau");
        assert_eq!(remove_quote_chars("\"\""), "");
    }

    #[test]
    fn test_trim_quotes() {
        assert_eq!(trim_quotes("\"Total: 40 EUR\""), "Total: 40 EUR");
        assert_eq!(trim_quotes("'it's here'"), "it's here");
        assert_eq!(trim_quotes("  \"  \" "), "");
    }

    #[test]
    fn test_trim_label() {
        assert_eq!(trim_label("\"Contrats.\""), "Contrats");
        assert_eq!(trim_label("Factures."), "Factures");
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fences("Here:\n```\n[]\n```\nDone"), "[]");
        assert_eq!(strip_code_fences("  [3] "), "[3]");
        assert_eq!(strip_code_fences("```json\n[4]"), "[4]");
    }
}
