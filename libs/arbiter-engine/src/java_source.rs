// Lightweight Java source scanning: top-level declarations only.
// Comments, string and char literals are skipped; nested bodies are ignored.

/// A word at brace depth 0 with its byte offset in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub start: usize,
    pub text: &'a str,
}

/// Identifier-like words that sit outside every `{ ... }` block
pub(crate) fn top_level_words(code: &str) -> Vec<Token<'_>> {
    let bytes = code.as_bytes();
    let mut words = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < bytes.len() && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i += 2;
            }
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            b if b.is_ascii_alphanumeric() || b == b'_' || b == b'$' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'$') {
                    i += 1;
                }
                if depth == 0 {
                    words.push(Token {
                        start,
                        text: &code[start..i],
                    });
                }
            }
            _ => i += 1,
        }
    }
    words
}

const TYPE_KEYWORDS: [&str; 4] = ["class", "interface", "enum", "record"];
const MODIFIERS: [&str; 5] = ["final", "abstract", "static", "strictfp", "sealed"];

/// Index of the type keyword a `public` at `at` belongs to, skipping other modifiers
fn declared_type(words: &[Token<'_>], at: usize) -> Option<usize> {
    if words[at].text != "public" {
        return None;
    }
    let mut i = at + 1;
    while i < words.len() && MODIFIERS.contains(&words[i].text) {
        i += 1;
    }
    (i < words.len() && TYPE_KEYWORDS.contains(&words[i].text)).then_some(i)
}

/// Name of the first top-level `public class`
pub(crate) fn public_class(code: &str) -> Option<&str> {
    let words = top_level_words(code);
    (0..words.len())
        .filter_map(|at| declared_type(&words, at))
        .find(|&keyword| words[keyword].text == "class")
        .and_then(|keyword| words.get(keyword + 1))
        .map(|name| name.text)
}

/// True when a top-level `class <name>` is declared
pub(crate) fn declares_class(code: &str, name: &str) -> bool {
    top_level_words(code)
        .windows(2)
        .any(|w| w[0].text == "class" && w[1].text == name)
}

/// Drop `public` from every top-level type declaration
pub(crate) fn strip_public_types(code: &str) -> String {
    let words = top_level_words(code);
    let mut out = String::with_capacity(code.len());
    let mut copied = 0;
    for at in 0..words.len() {
        if declared_type(&words, at).is_some() {
            out.push_str(&code[copied..words[at].start]);
            copied = words[at + 1].start;
        }
    }
    out.push_str(&code[copied..]);
    out
}
