use crate::core::filters::compile_patterns;
use anyhow::Context;
use log::debug;
use regex::Regex;

/// Characters that split tokens besides whitespace.
const TOKEN_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '(', ')', '[', ']', '{', '}', '\'', '"',
];

/// Whitespace that separates tokens. Unlike `char::is_whitespace` this
/// leaves out NEL (U+0085) and counts the byte order mark (U+FEFF).
fn is_token_space(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\u{0B}' | '\u{0C}' | '\r' | ' ' | '\u{A0}' | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{2028}' | '\u{2029}' | '\u{202F}' | '\u{205F}' | '\u{3000}' | '\u{FEFF}'
    )
}

/// Crude token estimate: two tokens per whitespace/punctuation separated fragment.
pub fn estimate_tokens(text: &str) -> usize {
    text.split(|c: char| is_token_space(c) || TOKEN_PUNCTUATION.contains(&c))
        .filter(|fragment| !fragment.is_empty())
        .count()
        * 2
}

pub fn section_marker(path: &str) -> String {
    format!("//===== FILE: {} =====//", path)
}

/// Removes license/copyright blocks from the start of a file.
#[derive(Debug, Clone)]
pub struct HeaderStripper {
    patterns: Vec<Regex>,
}

impl HeaderStripper {
    pub fn new(patterns: &[String]) -> anyhow::Result<Self> {
        let patterns = compile_patterns(patterns).context("Invalid header pattern")?;
        Ok(Self { patterns })
    }

    /// Applies every pattern in order at the start of the text and repeats
    /// until none of them matches there any more.
    pub fn strip<'a>(&self, text: &'a str) -> &'a str {
        let mut current = text;
        loop {
            let before = current.len();
            for re in &self.patterns {
                current = strip_leading(current, re);
            }
            if current.len() == before {
                return current;
            }
        }
    }
}

fn strip_leading<'a>(text: &'a str, re: &Regex) -> &'a str {
    let mut current = text;
    loop {
        let candidate = current.trim_start();
        match re.find(candidate) {
            Some(m) if m.start() == 0 && m.end() > 0 => {
                debug!("Stripped {} byte header block", m.end());
                current = &candidate[m.end()..];
            }
            _ => return current,
        }
    }
}

/// Turns raw file content into its document section and token estimate.
pub fn normalize(path: &str, raw: &str, stripper: &HeaderStripper) -> (String, usize) {
    let stripped = stripper.strip(raw);
    let tokens = estimate_tokens(stripped);
    let section = format!("{}\n\n{}\n", section_marker(path), stripped.trim());
    (section, tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::config::default_header_patterns;

    fn stripper(patterns: &[&str]) -> HeaderStripper {
        let patterns: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        HeaderStripper::new(&patterns).unwrap()
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("   \n\t "), 0);
        assert_eq!(estimate_tokens("hello world"), 4);
        assert_eq!(estimate_tokens("fn main() { println!(\"hi\"); }"), 8);
        assert_eq!(estimate_tokens("a.b,c"), 6);
    }

    #[test]
    fn test_estimate_tokens_whitespace_set() {
        assert_eq!(estimate_tokens("a\u{FEFF}b"), 4);
        assert_eq!(estimate_tokens("a\u{3000}b\u{2009}c"), 6);
        assert_eq!(estimate_tokens("a\u{85}b"), 2);
        assert_eq!(estimate_tokens("\u{FEFF}fn main"), 4);
    }

    #[test]
    fn test_estimate_tokens_is_even() {
        for text in ["x", "one two three", "[a](b) {c}", "'quoted' \"text\""] {
            assert_eq!(estimate_tokens(text) % 2, 0);
        }
    }

    #[test]
    fn test_strip_removes_leading_header_only() {
        let s = stripper(&[r"/\*[\s\S]*?Copyright[\s\S]*?\*/"]);
        let text = "/* Copyright 2020 Acme */\ncode();\n/* Copyright again */\n";

        assert_eq!(s.strip(text), "\ncode();\n/* Copyright again */\n");
    }

    #[test]
    fn test_strip_removes_consecutive_blocks() {
        let s = stripper(&[r"/\*[\s\S]*?Copyright[\s\S]*?\*/"]);
        let text = "/* Copyright A */\n\n/* Copyright B */\nbody";

        assert_eq!(s.strip(text), "\nbody");
    }

    #[test]
    fn test_strip_applies_patterns_in_sequence() {
        let s = stripper(&[r"// SPDX[^\n]*\n", r"/\*[\s\S]*?\*/"]);
        let text = "/* header */\n// SPDX-License-Identifier: MIT\nlet x = 1;";

        assert_eq!(s.strip(text), "let x = 1;");
    }

    #[test]
    fn test_strip_without_match_is_noop() {
        let s = stripper(&[r"/\*[\s\S]*?Copyright[\s\S]*?\*/"]);
        let text = "  let a = \"\\*\\\\ /* not a header */\";\n";

        assert_eq!(s.strip(text), text);
        assert_eq!(stripper(&[]).strip(text), text);
    }

    #[test]
    fn test_strip_is_idempotent() {
        let s = HeaderStripper::new(&default_header_patterns()).unwrap();
        let inputs = [
            "/*\n * Copyright (c) 2024 Example\n * Licensed under MIT\n */\nconst a = 1;\n",
            "/* SPDX-License-Identifier: Apache-2.0 */\n/* more */\nfn x() {}",
            "plain text with no header",
            "",
        ];

        for input in inputs {
            let once = s.strip(input);
            assert_eq!(s.strip(once), once);
        }
    }

    #[test]
    fn test_default_pattern_strips_uppercase_license_block() {
        let s = HeaderStripper::new(&default_header_patterns()).unwrap();
        let text = "/* LICENSE: MIT\n   COPYRIGHT Acme */\nimport os\n";

        assert_eq!(s.strip(text).trim(), "import os");
    }

    #[test]
    fn test_normalize_wraps_section() {
        let s = stripper(&[r"/\*[\s\S]*?Copyright[\s\S]*?\*/"]);
        let (section, tokens) = normalize("sub/b.py", "/* Copyright X */\n\nprint(1)\n\n", &s);

        assert_eq!(section, "//===== FILE: sub/b.py =====//\n\nprint(1)\n");
        assert_eq!(tokens, 4);
    }

    #[test]
    fn test_normalize_empty_file_keeps_marker() {
        let (section, tokens) = normalize("empty.js", "", &stripper(&[]));

        assert_eq!(section, "//===== FILE: empty.js =====//\n\n\n");
        assert_eq!(tokens, 0);
    }
}
