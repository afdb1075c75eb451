use serde::{Deserialize, Serialize};

/// Tokenization mode for the sparse encoder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenMode {
    /// Plain text: split on whitespace and punctuation
    Simple,
    /// Source code: additionally split identifiers on case and separator
    /// boundaries
    #[default]
    Code,
}

/// Frozen stop list of common English function words and generic programming
/// keywords. Part of the encoding contract: changing it would make sparse
/// vectors from different runs incompatible.
const STOP_WORDS: &[&str] = &[
    "var", "let", "const", "this", "that", "new", "null", "true", "false", "the", "is", "at", "of",
    "on", "and", "or", "to", "in", "it", "for", "as", "be", "by", "an", "if", "do", "no", "so",
];

/// Delimiters that terminate an identifier segment in code mode
const CODE_DELIMITERS: &[char] = &[
    ',', ';', ':', '{', '}', '(', ')', '[', ']', '<', '>', '\'', '"', '=', '+', '-', '*', '/',
    '\\', '|', '&', '^', '%', '$', '#', '@', '!', '~', '`',
];

/// Tokenize `text` into an ordered sequence of lowercased terms.
///
/// Deterministic: the same input always produces the same token sequence.
pub fn tokenize(text: &str, mode: TokenMode) -> Vec<String> {
    match mode {
        TokenMode::Simple => tokenize_simple(text),
        TokenMode::Code => tokenize_code(text),
    }
}

fn tokenize_simple(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() > 1)
        .map(|token| token.to_lowercase())
        .collect()
}

fn tokenize_code(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    for segment in text.split(|c: char| c.is_whitespace() || CODE_DELIMITERS.contains(&c)) {
        if segment.is_empty() {
            continue;
        }
        for word in split_identifier(segment).split_whitespace() {
            let token = word.to_lowercase();
            if token.chars().count() > 1 && !STOP_WORDS.contains(&token.as_str()) {
                tokens.push(token);
            }
        }
    }

    tokens
}

/// Insert word boundaries into an identifier segment.
///
/// Three boundary rules, applied in one pass: a lowercase letter followed by
/// an uppercase letter (`getUser` -> `get User`), runs of `_`/`-` collapse to
/// spaces (`snake_case` -> `snake case`), and an uppercase run followed by an
/// `UppercaseLowercase` pair (`XMLParser` -> `XML Parser`).
fn split_identifier(segment: &str) -> String {
    let chars: Vec<char> = segment.chars().collect();
    let mut out = String::with_capacity(segment.len() + 8);

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' {
            out.push(' ');
            continue;
        }
        if i > 0 {
            let prev = chars[i - 1];
            let camel_boundary = prev.is_lowercase() && c.is_uppercase();
            let acronym_boundary = prev.is_uppercase()
                && c.is_uppercase()
                && chars.get(i + 1).is_some_and(|next| next.is_lowercase());
            if camel_boundary || acronym_boundary {
                out.push(' ');
            }
        }
        out.push(c);
    }

    out
}
