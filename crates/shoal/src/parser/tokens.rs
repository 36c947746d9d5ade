//! Token types for the lexer

use super::span::Position;

/// A token produced by the lexer.
///
/// `literal` holds the source text the token stands for (the variable name
/// for [`TokenKind::Variable`], the unescaped text for [`TokenKind::Literal`]).
/// `quoted` is set for single-quoted text, escaped characters and anything
/// produced while the lexer is inside double quotes.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub quoted: bool,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            literal: literal.into(),
            quoted: false,
            position,
        }
    }

    pub fn quoted(mut self, quoted: bool) -> Self {
        self.quoted = quoted;
        self
    }
}

/// Token kinds produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// End of input, always the last token of a stream
    Eof,

    /// A run of spaces or tabs outside quotes
    Blank,

    /// Newline character
    Newline,

    /// Plain text (part of a word)
    Literal,

    /// `=` directly after an identifier at the start of a word
    Equals,

    /// `$name` or a special parameter such as `$?`
    Variable,

    /// Double quote, opening or closing
    Quote,

    /// Semicolon (;)
    Semicolon,

    /// Case clause terminator (;;)
    DoubleSemicolon,

    /// Background (&)
    Background,

    /// And (&&)
    And,

    /// Or (||)
    Or,

    /// Pipe (|)
    Pipe,

    /// Pipe stdout and stderr (|&)
    PipeBoth,

    /// Left parenthesis (()
    LeftParen,

    /// Right parenthesis ())
    RightParen,

    /// Redirect input (<)
    RedirectIn,

    /// Redirect output (>)
    RedirectOut,

    /// Redirect output append (>>)
    RedirectAppend,

    /// Redirect both stdout and stderr (&>)
    RedirectBoth,

    /// Redirect and append both stdout and stderr (&>>)
    RedirectBothAppend,

    /// Redirect output with file descriptor (e.g., 2>)
    RedirectFd(u8),

    /// Redirect and append with file descriptor (e.g., 2>>)
    RedirectFdAppend(u8),

    /// Redirect input with file descriptor (e.g., 0<)
    RedirectFdIn(u8),

    /// Duplicate fd onto another (`2>&1`; `>&2` is `DupFd(1, 2)`)
    DupFd(u8, u8),

    /// `$(`
    BeginSubst,

    /// `)` closing a command substitution
    EndSubst,

    /// `$((`
    BeginArith,

    /// `))` closing an arithmetic expansion
    EndArith,

    /// Integer literal inside arithmetic
    Number,

    /// Operator inside arithmetic; the text is in `literal`
    ArithOp,

    /// `${`
    BeginParam,

    /// `}` closing a parameter expansion
    EndParam,

    /// Parameter expansion operator
    ParamOp(ParamOp),

    /// Second `:` of `${name:offset:length}`
    Colon,

    /// Second `/` of `${name/pattern/replacement}`
    Slash,

    /// `{` opening a brace expansion
    BeginBrace,

    /// `,` separating brace alternatives
    Comma,

    /// `..` inside a brace range
    Range,

    /// `}` closing a brace expansion
    EndBrace,

    /// `[[`
    BeginTest,

    /// `]]`
    EndTest,
}

/// Operators recognized inside `${...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamOp {
    /// `#` before the name
    Length,
    /// `:`
    Slice,
    /// `#`
    TrimPrefix,
    /// `##`
    TrimPrefixLong,
    /// `%`
    TrimSuffix,
    /// `%%`
    TrimSuffixLong,
    /// `/`
    Replace,
    /// `//`
    ReplaceAll,
    /// `/#`
    ReplacePrefix,
    /// `/%`
    ReplaceSuffix,
    /// `,`
    LowerFirst,
    /// `,,`
    LowerAll,
    /// `^`
    UpperFirst,
    /// `^^`
    UpperAll,
    /// `:-` or `-`
    UseDefault { colon: bool },
    /// `:=` or `=`
    AssignDefault { colon: bool },
    /// `:+` or `+`
    UseAlternate { colon: bool },
    /// `:?` or `?`
    ErrorIfUnset { colon: bool },
}

impl TokenKind {
    /// Tokens that end a word outside quotes.
    pub fn ends_word(self) -> bool {
        !matches!(
            self,
            TokenKind::Literal
                | TokenKind::Equals
                | TokenKind::Variable
                | TokenKind::Quote
                | TokenKind::BeginSubst
                | TokenKind::BeginArith
                | TokenKind::BeginParam
                | TokenKind::BeginBrace
        )
    }

    /// Redirection operator tokens.
    pub fn is_redirect(self) -> bool {
        matches!(
            self,
            TokenKind::RedirectIn
                | TokenKind::RedirectOut
                | TokenKind::RedirectAppend
                | TokenKind::RedirectBoth
                | TokenKind::RedirectBothAppend
                | TokenKind::RedirectFd(_)
                | TokenKind::RedirectFdAppend(_)
                | TokenKind::RedirectFdIn(_)
                | TokenKind::DupFd(_, _)
        )
    }
}
