//! Tokens produced by the lexer.

use sigil_foundation::Type;

use crate::span::Span;

/// A token and where it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    /// What was scanned.
    pub kind: TokenKind,
    /// Source location.
    pub span: Span,
}

impl Token {
    /// Creates a token.
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Reserved words. Matching is case-insensitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Keyword {
    Echo,
    Print,
    If,
    Else,
    ElseIf,
    While,
    Do,
    For,
    Foreach,
    As,
    Function,
    Return,
    Unset,
    Isset,
    Empty,
    Const,
    Array,
    Break,
    Continue,
    And,
    Or,
    Xor,
    Throw,
}

impl Keyword {
    /// Looks up a reserved word.
    #[must_use]
    pub fn from_ident(ident: &str) -> Option<Self> {
        Some(match ident.to_ascii_lowercase().as_str() {
            "echo" => Self::Echo,
            "print" => Self::Print,
            "if" => Self::If,
            "else" => Self::Else,
            "elseif" => Self::ElseIf,
            "while" => Self::While,
            "do" => Self::Do,
            "for" => Self::For,
            "foreach" => Self::Foreach,
            "as" => Self::As,
            "function" => Self::Function,
            "return" => Self::Return,
            "unset" => Self::Unset,
            "isset" => Self::Isset,
            "empty" => Self::Empty,
            "const" => Self::Const,
            "array" => Self::Array,
            "break" => Self::Break,
            "continue" => Self::Continue,
            "and" => Self::And,
            "or" => Self::Or,
            "xor" => Self::Xor,
            "throw" => Self::Throw,
            _ => return None,
        })
    }

    /// Returns the keyword as written in source.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Echo => "echo",
            Self::Print => "print",
            Self::If => "if",
            Self::Else => "else",
            Self::ElseIf => "elseif",
            Self::While => "while",
            Self::Do => "do",
            Self::For => "for",
            Self::Foreach => "foreach",
            Self::As => "as",
            Self::Function => "function",
            Self::Return => "return",
            Self::Unset => "unset",
            Self::Isset => "isset",
            Self::Empty => "empty",
            Self::Const => "const",
            Self::Array => "array",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Throw => "throw",
        }
    }
}

/// One piece of an interpolated double-quoted string.
#[derive(Clone, Debug, PartialEq)]
pub enum Segment {
    /// Literal text.
    Text(String),
    /// `$name`
    Var(String),
    /// `$name[index]`
    Index(String, IndexSegment),
}

/// The key inside a `$name[...]` interpolation.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexSegment {
    /// `$a[0]`
    Int(i64),
    /// `$a[key]`
    Name(String),
    /// `$a[$i]`
    Var(String),
}

/// Token types.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // Delimiters
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `;` (also produced by `?>`)
    Semicolon,
    /// `,`
    Comma,

    // Literals and names
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal without interpolation.
    String(String),
    /// Double-quoted string containing `$` interpolation.
    Template(Vec<Segment>),
    /// Text outside the code tags.
    InlineHtml(String),
    /// `$name`, without the sigil.
    Variable(String),
    /// Bare identifier.
    Ident(String),
    /// Reserved word.
    Keyword(Keyword),
    /// `(int)`, `(string)`, ...; `(unset)` casts to [`Type::Null`].
    Cast(Type),

    // Operators
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `**`
    StarStar,
    /// `.`
    Dot,
    /// `&`
    Amp,
    /// `|`
    Pipe,
    /// `^`
    Caret,
    /// `~`
    Tilde,
    /// `<<`
    ShiftLeft,
    /// `>>`
    ShiftRight,
    /// `!`
    Bang,
    /// `&&`
    AmpAmp,
    /// `||`
    PipePipe,
    /// `?`
    Question,
    /// `:`
    Colon,
    /// `??`
    Coalesce,
    /// `=`
    Assign,
    /// `+=`, `-=`, ... with the underlying binary operator.
    AssignOp(Box<TokenKind>),
    /// `??=`
    CoalesceAssign,
    /// `==`
    EqEq,
    /// `!=` or `<>`
    NotEq,
    /// `===`
    EqEqEq,
    /// `!==`
    NotEqEq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    LtEq,
    /// `>=`
    GtEq,
    /// `<=>`
    Spaceship,
    /// `++`
    PlusPlus,
    /// `--`
    MinusMinus,
    /// `=>`
    DoubleArrow,
    /// `...`
    Ellipsis,

    // Meta
    /// Comment text.
    Comment(String),
    /// End of input.
    Eof,
    /// Lexer error.
    Error(String),
}

impl TokenKind {
    /// Returns true for tokens the parser skips.
    #[must_use]
    pub const fn is_trivia(&self) -> bool {
        matches!(self, Self::Comment(_))
    }

    /// Returns true if this is the given keyword.
    #[must_use]
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self, Self::Keyword(k) if *k == keyword)
    }

    /// Returns a human-readable name for error messages.
    #[must_use]
    pub fn name(&self) -> String {
        let fixed = match self {
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::LBrace => "'{'",
            Self::RBrace => "'}'",
            Self::Semicolon => "';'",
            Self::Comma => "','",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) | Self::Template(_) => "string",
            Self::InlineHtml(_) => "inline html",
            Self::Variable(_) => "variable",
            Self::Ident(_) => "identifier",
            Self::Keyword(k) => return format!("'{}'", k.as_str()),
            Self::Cast(t) => return format!("'({t})'"),
            Self::Plus => "'+'",
            Self::Minus => "'-'",
            Self::Star => "'*'",
            Self::Slash => "'/'",
            Self::Percent => "'%'",
            Self::StarStar => "'**'",
            Self::Dot => "'.'",
            Self::Amp => "'&'",
            Self::Pipe => "'|'",
            Self::Caret => "'^'",
            Self::Tilde => "'~'",
            Self::ShiftLeft => "'<<'",
            Self::ShiftRight => "'>>'",
            Self::Bang => "'!'",
            Self::AmpAmp => "'&&'",
            Self::PipePipe => "'||'",
            Self::Question => "'?'",
            Self::Colon => "':'",
            Self::Coalesce => "'??'",
            Self::Assign => "'='",
            Self::AssignOp(op) => return format!("{}=", op.name().trim_end_matches('\'')) + "'",
            Self::CoalesceAssign => "'??='",
            Self::EqEq => "'=='",
            Self::NotEq => "'!='",
            Self::EqEqEq => "'==='",
            Self::NotEqEq => "'!=='",
            Self::Lt => "'<'",
            Self::Gt => "'>'",
            Self::LtEq => "'<='",
            Self::GtEq => "'>='",
            Self::Spaceship => "'<=>'",
            Self::PlusPlus => "'++'",
            Self::MinusMinus => "'--'",
            Self::DoubleArrow => "'=>'",
            Self::Ellipsis => "'...'",
            Self::Comment(_) => "comment",
            Self::Eof => "end of file",
            Self::Error(_) => "error",
        };
        fixed.to_string()
    }
}
