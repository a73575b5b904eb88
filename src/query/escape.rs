//! Escaping and quoting of user-supplied text for the backend query syntax.

/// Characters with special meaning in the backend's query grammar.
/// `*` is left alone: wildcards are handled by the wildcard operator.
const SPECIAL_CHARS: &[char] = &[
    '\\', '+', '-', '!', '(', ')', ':', '^', '[', ']', '"', '{', '}', '~', '?', '|', '&', ';', '/',
];

pub fn escape_special_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    for ch in text.chars() {
        if SPECIAL_CHARS.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

pub fn is_wildcard(text: &str) -> bool {
    text.contains('*')
}

pub fn contains_whitespace(text: &str) -> bool {
    text.chars().any(char::is_whitespace)
}

pub fn quote_text(text: &str) -> String {
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        text.to_string()
    } else {
        format!("\"{}\"", text)
    }
}

/// Escape a value for a single-quoted local-param value (`key='...'`).
pub fn escape_local_param(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for ch in value.chars() {
        if ch == '\\' || ch == '\'' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_grammar_characters_but_not_wildcards() {
        assert_eq!(escape_special_chars("a+b:c*"), "a\\+b\\:c*");
        assert_eq!(escape_special_chars("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(escape_special_chars("x y"), "x y");
    }

    #[test]
    fn quoting_is_idempotent() {
        assert_eq!(quote_text("x y"), "\"x y\"");
        assert_eq!(quote_text("\"x y\""), "\"x y\"");
    }

    #[test]
    fn local_param_values_escape_quotes_and_backslashes() {
        assert_eq!(escape_local_param("it's a\\b"), "it\\'s a\\\\b");
    }
}
