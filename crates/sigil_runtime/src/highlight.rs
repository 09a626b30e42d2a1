//! Syntax highlighting for the REPL.

use std::borrow::Cow;
use std::iter::Peekable;
use std::str::Chars;

use sigil_language::token::Keyword;

const RESET: &str = "\x1b[0m";

/// Highlighter for script source.
pub struct SigilHighlighter {}

impl SigilHighlighter {
    /// Creates a new highlighter.
    pub const fn new() -> Self {
        Self {}
    }

    /// Highlight a line of input.
    #[allow(clippy::unused_self)]
    pub fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let mut result = String::with_capacity(line.len() * 2);
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                // Comments run to the end of the line
                '#' => {
                    result.push_str("\x1b[2;3m"); // dim italic
                    result.push(c);
                    result.extend(chars.by_ref());
                    result.push_str(RESET);
                }
                '/' if chars.peek() == Some(&'/') => {
                    result.push_str("\x1b[2;3m");
                    result.push(c);
                    result.extend(chars.by_ref());
                    result.push_str(RESET);
                }

                // Strings
                '"' | '\'' => {
                    result.push_str("\x1b[33m"); // yellow
                    result.push(c);
                    while let Some(next) = chars.next() {
                        result.push(next);
                        if next == '\\' {
                            if let Some(escaped) = chars.next() {
                                result.push(escaped);
                            }
                        } else if next == c {
                            break;
                        }
                    }
                    result.push_str(RESET);
                }

                // Variables
                '$' => {
                    result.push_str("\x1b[34m"); // blue
                    result.push(c);
                    take_word(&mut chars, &mut result);
                    result.push_str(RESET);
                }

                // Numbers
                c if c.is_ascii_digit() => {
                    result.push_str("\x1b[35m"); // magenta
                    result.push(c);
                    while let Some(next) =
                        chars.next_if(|n| n.is_ascii_alphanumeric() || *n == '.' || *n == '_')
                    {
                        result.push(next);
                    }
                    result.push_str(RESET);
                }

                // Open and close tags
                '<' if chars.peek() == Some(&'?') => {
                    result.push_str("\x1b[1;35m");
                    result.push(c);
                    while let Some(next) = chars.next_if(|n| *n == '?' || n.is_alphabetic() || *n == '=') {
                        result.push(next);
                    }
                    result.push_str(RESET);
                }

                // Delimiters - bright
                '(' | ')' | '[' | ']' | '{' | '}' => {
                    result.push_str("\x1b[1m"); // bold
                    result.push(c);
                    result.push_str(RESET);
                }

                c if c.is_alphabetic() || c == '_' => {
                    let mut word = String::from(c);
                    take_word(&mut chars, &mut word);
                    let lower = word.to_ascii_lowercase();
                    let color = if Keyword::from_ident(&word).is_some() {
                        "\x1b[32m" // green
                    } else if matches!(lower.as_str(), "true" | "false" | "null") {
                        "\x1b[34m"
                    } else if chars.peek() == Some(&'(') {
                        "\x1b[36m" // cyan for calls
                    } else {
                        ""
                    };
                    if color.is_empty() {
                        result.push_str(&word);
                    } else {
                        result.push_str(color);
                        result.push_str(&word);
                        result.push_str(RESET);
                    }
                }

                _ => result.push(c),
            }
        }

        Cow::Owned(result)
    }
}

fn take_word(chars: &mut Peekable<Chars<'_>>, out: &mut String) {
    while let Some(next) = chars.next_if(|n| n.is_alphanumeric() || *n == '_') {
        out.push(next);
    }
}

impl Default for SigilHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(s: &str) -> String {
        let mut out = String::new();
        let mut in_escape = false;
        for c in s.chars() {
            match c {
                '\x1b' => in_escape = true,
                'm' if in_escape => in_escape = false,
                _ if in_escape => {}
                _ => out.push(c),
            }
        }
        out
    }

    #[test]
    fn highlighting_preserves_text() {
        let h = SigilHighlighter::new();
        for line in [
            "<?php echo 'a\\'b', $x[0] + 1.5; // done",
            "function f(&$a) { return strlen(\"x$a\"); }",
            "# comment only",
            "",
        ] {
            assert_eq!(strip(&h.highlight(line, 0)), line);
        }
    }

    #[test]
    fn keywords_and_variables_are_colored() {
        let h = SigilHighlighter::new();
        let out = h.highlight("if ($x) echo TRUE;", 0);
        assert!(out.contains("\x1b[32mif\x1b[0m"));
        assert!(out.contains("\x1b[34m$x\x1b[0m"));
        assert!(out.contains("\x1b[34mTRUE\x1b[0m"));
        assert!(out.contains("\x1b[32mecho\x1b[0m"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn highlighting_never_changes_text(line in "[ -~]{0,60}") {
                let h = SigilHighlighter::new();
                prop_assert_eq!(strip(&h.highlight(&line, 0)), line);
            }
        }
    }
}
