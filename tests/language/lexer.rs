//! Integration tests for the lexer and parser front end.

use sigil_language::token::Keyword;
use sigil_language::{Lexer, StmtKind, TokenKind, parse, parse_expression};

fn kinds(source: &str) -> Vec<TokenKind> {
    Lexer::tokenize_all(source)
        .into_iter()
        .map(|token| token.kind)
        .collect()
}

#[test]
fn code_fragment() {
    assert_eq!(
        kinds("$x = 1.5;"),
        vec![
            TokenKind::Variable("x".into()),
            TokenKind::Assign,
            TokenKind::Float(1.5),
            TokenKind::Semicolon,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn keywords_are_case_insensitive() {
    assert_eq!(kinds("ECHO 1;")[0], TokenKind::Keyword(Keyword::Echo));
    assert_eq!(kinds("Foreach")[0], TokenKind::Keyword(Keyword::Foreach));
    assert_eq!(kinds("strlen")[0], TokenKind::Ident("strlen".into()));
}

#[test]
fn templates_switch_modes() {
    let tokens = kinds("<b><?= $x ?></b>");
    assert_eq!(tokens[0], TokenKind::InlineHtml("<b>".into()));
    assert_eq!(tokens[1], TokenKind::Keyword(Keyword::Echo));
    assert_eq!(tokens[2], TokenKind::Variable("x".into()));
    assert_eq!(tokens[3], TokenKind::Semicolon);
    assert_eq!(tokens[4], TokenKind::InlineHtml("</b>".into()));
}

#[test]
fn parses_statements_in_order() {
    let program = parse("echo 1; $a = 2; function f() {}").unwrap();
    assert_eq!(program.statements.len(), 3);
    assert!(matches!(program.statements[0].kind, StmtKind::Echo(_)));
}

#[test]
fn parse_errors_carry_positions() {
    let err = parse("echo 1;\n$a = ;").unwrap_err();
    assert!(err.to_string().starts_with("parse error at 2:"), "{err}");
    assert!(parse_expression("1 +").is_err());
    assert!(parse_expression("1 + 2;").is_ok());
}
