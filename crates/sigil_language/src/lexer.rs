//! Lexer for Sigil source.
//!
//! Source text is either a plain code fragment (`$x = 1;`) or a template
//! that starts in HTML mode and switches to code at `<?php` / `<?=`. Text
//! outside the tags becomes [`TokenKind::InlineHtml`].

use sigil_foundation::Type;

use crate::span::Span;
use crate::token::{IndexSegment, Keyword, Segment, Token, TokenKind};

/// Tokenizer over one source unit.
pub struct Lexer<'src> {
    /// Full source text.
    source: &'src str,
    /// Unconsumed remainder.
    rest: &'src str,
    /// Byte offset of `rest`.
    position: usize,
    /// Current line (1-based).
    line: u32,
    /// Current column (1-based).
    column: u32,
    /// True while outside the code tags.
    in_html: bool,
    /// Tokens scanned ahead of the cursor (`?>` and `<?=` expand to two).
    pending: Vec<Token>,
}

impl<'src> Lexer<'src> {
    /// Creates a lexer. Sources starting with `<` or a shebang line begin
    /// in HTML mode; anything else is treated as code.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Self {
            source,
            rest: source,
            position: 0,
            line: 1,
            column: 1,
            in_html: false,
            pending: Vec::new(),
        };
        if source.starts_with("#!") {
            while let Some(c) = lexer.peek_char() {
                lexer.advance();
                if c == '\n' {
                    break;
                }
            }
            lexer.in_html = true;
        } else if source.trim_start().starts_with('<') {
            lexer.in_html = true;
        }
        lexer
    }

    /// Returns the next token.
    pub fn next_token(&mut self) -> Token {
        if let Some(token) = self.pending.pop() {
            return token;
        }
        if self.in_html {
            if let Some(token) = self.scan_html() {
                return token;
            }
        }

        self.skip_whitespace();

        let start = self.position;
        let line = self.line;
        let column = self.column;

        let Some(c) = self.peek_char() else {
            return Token::new(TokenKind::Eof, Span::new(start, start, line, column));
        };

        let kind = match c {
            '(' => self.scan_paren(),
            ')' => self.single(TokenKind::RParen),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            '{' => self.single(TokenKind::LBrace),
            '}' => self.single(TokenKind::RBrace),
            ';' => self.single(TokenKind::Semicolon),
            ',' => self.single(TokenKind::Comma),
            '~' => self.single(TokenKind::Tilde),
            '#' => self.scan_line_comment(),
            '/' if self.peek_char_n(1) == Some('/') => self.scan_line_comment(),
            '/' if self.peek_char_n(1) == Some('*') => self.scan_block_comment(),
            '$' if self.peek_char_n(1).is_some_and(is_ident_start) => {
                self.advance();
                TokenKind::Variable(self.scan_ident_text())
            }
            '\'' => self.scan_single_quoted(),
            '"' => self.scan_double_quoted(),
            '.' if self.peek_char_n(1).is_some_and(|c| c.is_ascii_digit()) => self.scan_number(),
            c if c.is_ascii_digit() => self.scan_number(),
            c if is_ident_start(c) => {
                let ident = self.scan_ident_text();
                match Keyword::from_ident(&ident) {
                    Some(keyword) => TokenKind::Keyword(keyword),
                    None => TokenKind::Ident(ident),
                }
            }
            '?' if self.rest.starts_with("?>") => {
                self.advance_n(2);
                if self.rest.starts_with('\n') {
                    self.advance();
                }
                self.in_html = true;
                TokenKind::Semicolon
            }
            _ => self.scan_operator(),
        };

        Token::new(kind, Span::new(start, self.position, line, column))
    }

    /// Tokenizes the whole source, including the trailing `Eof`.
    #[must_use]
    pub fn tokenize_all(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    fn peek_char(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn peek_char_n(&self, n: usize) -> Option<char> {
        self.rest.chars().nth(n)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            let len = c.len_utf8();
            self.rest = &self.rest[len..];
            self.position += len;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn advance_n(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    /// Scans inline text up to the next open tag. Returns `None` once the
    /// lexer is back in code mode with nothing to report.
    fn scan_html(&mut self) -> Option<Token> {
        let start = self.position;
        let line = self.line;
        let column = self.column;

        let rest = self.rest;
        let cut = rest.find("<?").unwrap_or(rest.len());
        let text = &rest[..cut];
        self.advance_n(text.chars().count());
        let html_span = Span::new(start, self.position, line, column);

        let mut tokens = Vec::new();
        if self.rest.is_empty() {
            tokens.push(Token::new(
                TokenKind::Eof,
                Span::new(self.position, self.position, self.line, self.column),
            ));
        } else {
            let tag_start = (self.position, self.line, self.column);
            let echo = self.rest.starts_with("<?=");
            if echo {
                self.advance_n(3);
            } else if self
                .rest
                .get(..5)
                .is_some_and(|tag| tag.eq_ignore_ascii_case("<?php"))
            {
                self.advance_n(5);
            } else {
                self.advance_n(2);
            }
            self.in_html = false;
            if echo {
                tokens.push(Token::new(
                    TokenKind::Keyword(Keyword::Echo),
                    Span::new(tag_start.0, self.position, tag_start.1, tag_start.2),
                ));
            }
        }
        if !text.is_empty() {
            tokens.push(Token::new(TokenKind::InlineHtml(text.to_string()), html_span));
        }

        // `pending` is a stack: push in reverse so the html comes first.
        tokens.reverse();
        let mut tokens = tokens.into_iter();
        let first = tokens.next()?;
        self.pending.extend(tokens.rev());
        Some(first)
    }

    fn scan_line_comment(&mut self) -> TokenKind {
        let start = self.position;
        while let Some(c) = self.peek_char() {
            if c == '\n' || self.rest.starts_with("?>") {
                break;
            }
            self.advance();
        }
        TokenKind::Comment(self.source[start..self.position].to_string())
    }

    fn scan_block_comment(&mut self) -> TokenKind {
        let start = self.position;
        self.advance_n(2);
        loop {
            if self.rest.is_empty() {
                return TokenKind::Error("unterminated comment".into());
            }
            if self.rest.starts_with("*/") {
                self.advance_n(2);
                break;
            }
            self.advance();
        }
        TokenKind::Comment(self.source[start..self.position].to_string())
    }

    /// Scans `(` or a cast such as `(int)`.
    fn scan_paren(&mut self) -> TokenKind {
        let rest = self.rest;
        let inner = &rest[1..];
        // Cast names are short; don't scan the rest of the file for `)`.
        let close = inner.char_indices().take(12).find(|&(_, c)| c == ')');
        if let Some((close, _)) = close {
            let name = inner[..close].trim_matches([' ', '\t']);
            let ty = match name.to_ascii_lowercase().as_str() {
                "int" | "integer" => Some(Type::Int),
                "float" | "double" | "real" => Some(Type::Float),
                "string" | "binary" => Some(Type::String),
                "bool" | "boolean" => Some(Type::Bool),
                "array" => Some(Type::Array),
                "object" => Some(Type::Object),
                "unset" => Some(Type::Null),
                _ => None,
            };
            if let Some(ty) = ty {
                let consumed = inner[..=close].chars().count() + 1;
                self.advance_n(consumed);
                return TokenKind::Cast(ty);
            }
        }
        self.single(TokenKind::LParen)
    }

    fn scan_single_quoted(&mut self) -> TokenKind {
        self.advance();
        let mut text = String::new();
        loop {
            match self.peek_char() {
                Some('\'') => {
                    self.advance();
                    return TokenKind::String(text);
                }
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        Some(c @ ('\'' | '\\')) => {
                            self.advance();
                            text.push(c);
                        }
                        _ => text.push('\\'),
                    }
                }
                Some(c) => {
                    self.advance();
                    text.push(c);
                }
                None => return TokenKind::Error("unterminated string literal".into()),
            }
        }
    }

    fn scan_double_quoted(&mut self) -> TokenKind {
        self.advance();
        let mut segments = Vec::new();
        let mut text = String::new();
        loop {
            match self.peek_char() {
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    if let Err(message) = self.scan_escape(&mut text) {
                        return TokenKind::Error(message);
                    }
                }
                Some('$') if self.peek_char_n(1).is_some_and(is_ident_start) => {
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    self.advance();
                    let name = self.scan_ident_text();
                    segments.push(self.scan_interpolated_index(name));
                }
                Some('{') if self.peek_char_n(1) == Some('$') => {
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    self.advance_n(2);
                    let name = self.scan_ident_text();
                    let segment = self.scan_interpolated_index(name);
                    if self.peek_char() != Some('}') {
                        return TokenKind::Error("expected '}' after interpolated variable".into());
                    }
                    self.advance();
                    segments.push(segment);
                }
                Some(c) => {
                    self.advance();
                    text.push(c);
                }
                None => return TokenKind::Error("unterminated string literal".into()),
            }
        }
        if segments.is_empty() {
            return TokenKind::String(text);
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        TokenKind::Template(segments)
    }

    fn scan_interpolated_index(&mut self, name: String) -> Segment {
        if self.peek_char() != Some('[') {
            return Segment::Var(name);
        }
        let rest = self.rest;
        let inner = &rest[1..];
        let Some(close) = inner.find(']') else {
            return Segment::Var(name);
        };
        let key = &inner[..close];
        let index = if let Some(var) = key.strip_prefix('$') {
            IndexSegment::Var(var.to_string())
        } else if let Ok(n) = key.parse::<i64>() {
            IndexSegment::Int(n)
        } else if !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_') {
            IndexSegment::Name(key.to_string())
        } else {
            return Segment::Var(name);
        };
        self.advance_n(key.chars().count() + 2);
        Segment::Index(name, index)
    }

    /// Handles the character after a backslash in a double-quoted string.
    fn scan_escape(&mut self, text: &mut String) -> Result<(), String> {
        let Some(c) = self.peek_char() else {
            return Err("unterminated string literal".into());
        };
        let simple = match c {
            'n' => Some('\n'),
            't' => Some('\t'),
            'r' => Some('\r'),
            'v' => Some('\x0b'),
            'e' => Some('\x1b'),
            'f' => Some('\x0c'),
            '\\' => Some('\\'),
            '$' => Some('$'),
            '"' => Some('"'),
            _ => None,
        };
        if let Some(ch) = simple {
            self.advance();
            text.push(ch);
            return Ok(());
        }
        match c {
            'x' if self.peek_char_n(1).is_some_and(|d| d.is_ascii_hexdigit()) => {
                self.advance();
                let digits = self.take_while_max(2, |d| d.is_ascii_hexdigit());
                let byte = u8::from_str_radix(&digits, 16).map_err(|e| e.to_string())?;
                text.push(char::from(byte));
            }
            'u' if self.peek_char_n(1) == Some('{') => {
                self.advance_n(2);
                let digits = self.take_while_max(6, |d| d.is_ascii_hexdigit());
                if self.peek_char() != Some('}') {
                    return Err("invalid unicode escape".into());
                }
                self.advance();
                let ch = u32::from_str_radix(&digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("invalid codepoint: {digits}"))?;
                text.push(ch);
            }
            '0'..='7' => {
                let digits = self.take_while_max(3, |d| ('0'..='7').contains(&d));
                let code = u32::from_str_radix(&digits, 8).map_err(|e| e.to_string())?;
                text.push(char::from_u32(code & 0xff).unwrap_or('\0'));
            }
            _ => text.push('\\'),
        }
        Ok(())
    }

    fn take_while_max(&mut self, max: usize, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while out.len() < max {
            match self.peek_char() {
                Some(c) if pred(c) => {
                    out.push(c);
                    self.advance();
                }
                _ => break,
            }
        }
        out
    }

    fn scan_number(&mut self) -> TokenKind {
        let start = self.position;
        let radix = match (self.peek_char(), self.peek_char_n(1)) {
            (Some('0'), Some('x' | 'X')) => 16,
            (Some('0'), Some('b' | 'B')) => 2,
            (Some('0'), Some('o' | 'O')) => 8,
            _ => 10,
        };
        if radix != 10 {
            self.advance_n(2);
            let digits: String = self
                .take_while_max(usize::MAX, |c| c.is_digit(radix) || c == '_')
                .replace('_', "");
            return match i64::from_str_radix(&digits, radix) {
                Ok(n) => TokenKind::Int(n),
                Err(_) => match u64::from_str_radix(&digits, radix) {
                    #[allow(clippy::cast_precision_loss)]
                    Ok(n) => TokenKind::Float(n as f64),
                    Err(e) => TokenKind::Error(format!("invalid integer literal: {e}")),
                },
            };
        }

        let mut is_float = false;
        self.take_while_max(usize::MAX, |c| c.is_ascii_digit() || c == '_');
        if self.peek_char() == Some('.') && self.peek_char_n(1).is_some_and(|c| c.is_ascii_digit())
        {
            is_float = true;
            self.advance();
            self.take_while_max(usize::MAX, |c| c.is_ascii_digit() || c == '_');
        } else if self.peek_char() == Some('.') && !self.rest.starts_with("..") {
            // `1.` is a float; `1 . 2` and `1..` are not
            let next = self.peek_char_n(1);
            if !next.is_some_and(|c| c == '=' || is_ident_start(c) || c == '$' || c == '\'' || c == '"') {
                is_float = true;
                self.advance();
            }
        }
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let sign = matches!(self.peek_char_n(1), Some('+' | '-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_char_n(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.advance_n(digit_at);
                self.take_while_max(usize::MAX, |c| c.is_ascii_digit());
            }
        }

        let text = self.source[start..self.position].replace('_', "");
        if is_float {
            return match text.parse::<f64>() {
                Ok(f) => TokenKind::Float(f),
                Err(e) => TokenKind::Error(format!("invalid float literal: {e}")),
            };
        }
        if text.len() > 1 && text.starts_with('0') {
            return match i64::from_str_radix(&text[1..], 8) {
                Ok(n) => TokenKind::Int(n),
                Err(e) => TokenKind::Error(format!("invalid octal literal: {e}")),
            };
        }
        match text.parse::<i64>() {
            Ok(n) => TokenKind::Int(n),
            // Integer literals past i64 become floats.
            Err(_) => match text.parse::<f64>() {
                Ok(f) => TokenKind::Float(f),
                Err(e) => TokenKind::Error(format!("invalid integer literal: {e}")),
            },
        }
    }

    fn scan_ident_text(&mut self) -> String {
        let start = self.position;
        while self.peek_char().is_some_and(is_ident_char) {
            self.advance();
        }
        self.source[start..self.position].to_string()
    }

    fn scan_operator(&mut self) -> TokenKind {
        const OPERATORS: &[(&str, fn() -> TokenKind)] = &[
            ("<=>", || TokenKind::Spaceship),
            ("===", || TokenKind::EqEqEq),
            ("!==", || TokenKind::NotEqEq),
            ("**=", || TokenKind::AssignOp(Box::new(TokenKind::StarStar))),
            ("<<=", || TokenKind::AssignOp(Box::new(TokenKind::ShiftLeft))),
            (">>=", || TokenKind::AssignOp(Box::new(TokenKind::ShiftRight))),
            ("??=", || TokenKind::CoalesceAssign),
            ("...", || TokenKind::Ellipsis),
            ("==", || TokenKind::EqEq),
            ("!=", || TokenKind::NotEq),
            ("<>", || TokenKind::NotEq),
            ("<=", || TokenKind::LtEq),
            (">=", || TokenKind::GtEq),
            ("<<", || TokenKind::ShiftLeft),
            (">>", || TokenKind::ShiftRight),
            ("&&", || TokenKind::AmpAmp),
            ("||", || TokenKind::PipePipe),
            ("??", || TokenKind::Coalesce),
            ("++", || TokenKind::PlusPlus),
            ("--", || TokenKind::MinusMinus),
            ("=>", || TokenKind::DoubleArrow),
            ("**", || TokenKind::StarStar),
            ("+=", || TokenKind::AssignOp(Box::new(TokenKind::Plus))),
            ("-=", || TokenKind::AssignOp(Box::new(TokenKind::Minus))),
            ("*=", || TokenKind::AssignOp(Box::new(TokenKind::Star))),
            ("/=", || TokenKind::AssignOp(Box::new(TokenKind::Slash))),
            ("%=", || TokenKind::AssignOp(Box::new(TokenKind::Percent))),
            (".=", || TokenKind::AssignOp(Box::new(TokenKind::Dot))),
            ("&=", || TokenKind::AssignOp(Box::new(TokenKind::Amp))),
            ("|=", || TokenKind::AssignOp(Box::new(TokenKind::Pipe))),
            ("^=", || TokenKind::AssignOp(Box::new(TokenKind::Caret))),
            ("+", || TokenKind::Plus),
            ("-", || TokenKind::Minus),
            ("*", || TokenKind::Star),
            ("/", || TokenKind::Slash),
            ("%", || TokenKind::Percent),
            (".", || TokenKind::Dot),
            ("&", || TokenKind::Amp),
            ("|", || TokenKind::Pipe),
            ("^", || TokenKind::Caret),
            ("!", || TokenKind::Bang),
            ("?", || TokenKind::Question),
            (":", || TokenKind::Colon),
            ("=", || TokenKind::Assign),
            ("<", || TokenKind::Lt),
            (">", || TokenKind::Gt),
        ];

        for (text, make) in OPERATORS {
            if self.rest.starts_with(text) {
                self.advance_n(text.len());
                return make();
            }
        }
        let c = self.peek_char().unwrap_or('\0');
        self.advance();
        TokenKind::Error(format!("unexpected character: {c}"))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || u32::from(c) >= 0x80
}

fn is_ident_char(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize_all(source)
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| !k.is_trivia())
            .collect()
    }

    #[test]
    fn lex_empty() {
        assert_eq!(lex(""), vec![TokenKind::Eof]);
        assert_eq!(lex("  \n\t"), vec![TokenKind::Eof]);
    }

    #[test]
    fn lex_assignment() {
        assert_eq!(
            lex("$x = 1;"),
            vec![
                TokenKind::Variable("x".into()),
                TokenKind::Assign,
                TokenKind::Int(1),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_open_and_close_tags() {
        assert_eq!(
            lex("<p><?php echo 1 ?>\n</p>"),
            vec![
                TokenKind::InlineHtml("<p>".into()),
                TokenKind::Keyword(Keyword::Echo),
                TokenKind::Int(1),
                TokenKind::Semicolon,
                TokenKind::InlineHtml("</p>".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_short_echo_tag() {
        assert_eq!(
            lex("<?= $x ?>"),
            vec![
                TokenKind::Keyword(Keyword::Echo),
                TokenKind::Variable("x".into()),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_numbers() {
        assert_eq!(lex("42")[0], TokenKind::Int(42));
        assert_eq!(lex("0x1F")[0], TokenKind::Int(31));
        assert_eq!(lex("0b101")[0], TokenKind::Int(5));
        assert_eq!(lex("017")[0], TokenKind::Int(15));
        assert_eq!(lex("0o17")[0], TokenKind::Int(15));
        assert_eq!(lex("1_000")[0], TokenKind::Int(1000));
        assert_eq!(lex("1.5")[0], TokenKind::Float(1.5));
        assert_eq!(lex(".5")[0], TokenKind::Float(0.5));
        assert_eq!(lex("1e3")[0], TokenKind::Float(1000.0));
        assert_eq!(lex("9223372036854775808")[0], TokenKind::Float(9.223_372_036_854_776e18));
    }

    #[test]
    fn lex_concat_after_int() {
        assert_eq!(
            lex("1 . 2"),
            vec![TokenKind::Int(1), TokenKind::Dot, TokenKind::Int(2), TokenKind::Eof]
        );
    }

    #[test]
    fn lex_strings() {
        assert_eq!(lex(r"'it\'s'")[0], TokenKind::String("it's".into()));
        assert_eq!(lex(r"'a\nb'")[0], TokenKind::String(r"a\nb".into()));
        assert_eq!(lex(r#""a\tb\x41\u{1F600}""#)[0], TokenKind::String("a\tbA\u{1F600}".into()));
        assert_eq!(lex(r#""\$x""#)[0], TokenKind::String("$x".into()));
    }

    #[test]
    fn lex_interpolation() {
        assert_eq!(
            lex(r#""Hello $name!""#)[0],
            TokenKind::Template(vec![
                Segment::Text("Hello ".into()),
                Segment::Var("name".into()),
                Segment::Text("!".into()),
            ])
        );
        assert_eq!(
            lex(r#""{$a[0]}$b[key]""#)[0],
            TokenKind::Template(vec![
                Segment::Index("a".into(), IndexSegment::Int(0)),
                Segment::Index("b".into(), IndexSegment::Name("key".into())),
            ])
        );
    }

    #[test]
    fn lex_casts() {
        assert_eq!(lex("(int)")[0], TokenKind::Cast(Type::Int));
        assert_eq!(lex("( string )")[0], TokenKind::Cast(Type::String));
        assert_eq!(lex("(unset)")[0], TokenKind::Cast(Type::Null));
        assert_eq!(lex("(foo)")[0], TokenKind::LParen);
    }

    #[test]
    fn lex_operators_longest_match() {
        assert_eq!(
            lex("<=> === !== ??= ** **= <<= ."),
            vec![
                TokenKind::Spaceship,
                TokenKind::EqEqEq,
                TokenKind::NotEqEq,
                TokenKind::CoalesceAssign,
                TokenKind::StarStar,
                TokenKind::AssignOp(Box::new(TokenKind::StarStar)),
                TokenKind::AssignOp(Box::new(TokenKind::ShiftLeft)),
                TokenKind::Dot,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_comments() {
        assert_eq!(
            lex("1 // one\n# two\n/* three */ 2"),
            vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Eof]
        );
    }

    #[test]
    fn lex_keywords_and_idents() {
        assert_eq!(
            lex("WHILE strlen"),
            vec![
                TokenKind::Keyword(Keyword::While),
                TokenKind::Ident("strlen".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_errors() {
        assert!(matches!(lex("'abc")[0], TokenKind::Error(_)));
        assert!(matches!(lex("/* abc")[0], TokenKind::Error(_)));
        assert!(matches!(lex("@")[0], TokenKind::Error(_)));
    }

    #[test]
    fn positions_track_lines() {
        let tokens = Lexer::tokenize_all("$a;\n  $b;");
        let b = &tokens[2];
        assert_eq!(b.kind, TokenKind::Variable("b".into()));
        assert_eq!((b.span.line, b.span.column), (2, 3));
    }
}
