//! Lexer for shoal scripts
//!
//! Tokenizes input into a stream of tokens with source position tracking.
//! The lexer keeps a stack of modes; the mode on top decides how the next
//! character is classified:
//!
//! | Mode | Entered by | Left by |
//! |------|------------|---------|
//! | command | start of input, `$(` | `)` at depth 0 |
//! | quoted | `"` | `"` |
//! | parameter | `${` | `}` |
//! | arithmetic | `$((` | `))` |
//! | brace | `{` that looks like `{a,b}` or `{1..3}` | `}` |
//! | test | `[[` | `]]` |
//!
//! Reaching the end of input with anything but the command mode on the
//! stack is an error.

use super::span::Position;
use super::tokens::{ParamOp, Token, TokenKind};
use crate::error::LexError;

/// Where the parameter-expansion mode is within `${...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamState {
    /// Expecting the name (or the `#` length marker)
    Name,
    /// Name read, expecting an operator or `}`
    Operator,
    /// Inside the word argument of an operator
    Word,
    /// Inside `offset[:length]` of a slice
    Slice,
    /// Inside the pattern of a replacement, before the separating `/`
    Replace,
    /// After a case-fold operator, only `}` may follow
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Command,
    Subst { depth: usize },
    Quoted,
    Param(ParamState),
    Arith { depth: usize },
    /// Bare arithmetic text (slice offsets, test operands); ends at EOF.
    ArithText { depth: usize },
    Brace,
    Test,
}

impl Mode {
    fn construct(self) -> &'static str {
        match self {
            Mode::Command => "command",
            Mode::Subst { .. } => "command substitution",
            Mode::Quoted => "double quote",
            Mode::Param(_) => "parameter expansion",
            Mode::Arith { .. } | Mode::ArithText { .. } => "arithmetic expansion",
            Mode::Brace => "brace expansion",
            Mode::Test => "test expression",
        }
    }
}

const ARITH_OPERATORS: &[&str] = &[
    "<<=", ">>=", "**", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=", "-=", "*=", "/=",
    "%=", "&=", "|=", "^=", "+", "-", "*", "/", "%", "<", ">", "&", "|", "^", "!", "~", "?", ":",
    "=",
];

/// Lexer for shoal scripts.
pub struct Lexer {
    chars: Vec<char>,
    index: usize,
    /// Current position in the input
    position: Position,
    /// Mode stack with the position each mode was entered at
    modes: Vec<(Mode, Position)>,
    /// Last consumed character, for word-start and `${#` decisions
    prev: Option<char>,
    /// The previous token was an identifier at the start of a word and
    /// stopped in front of `=`
    assign_candidate: bool,
}

impl Lexer {
    /// Create a new lexer for the given script.
    pub fn new(input: &str) -> Self {
        Self::with_mode(input, Mode::Command)
    }

    /// Create a lexer for bare arithmetic text such as `x + 1`.
    pub fn arithmetic(input: &str) -> Self {
        Self::with_mode(input, Mode::ArithText { depth: 0 })
    }

    fn with_mode(input: &str, mode: Mode) -> Self {
        Self {
            chars: input.chars().collect(),
            index: 0,
            position: Position::new(),
            modes: vec![(mode, Position::new())],
            prev: None,
            assign_candidate: false,
        }
    }

    /// Lex the whole input. The returned stream always ends with
    /// [`TokenKind::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// Get the next token from the input.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        let was_candidate = std::mem::take(&mut self.assign_candidate);
        let token = match self.mode() {
            Mode::Command | Mode::Subst { .. } => self.lex_command(was_candidate),
            Mode::Quoted => self.lex_quoted(),
            Mode::Param(state) => self.lex_param(state),
            Mode::Arith { .. } | Mode::ArithText { .. } => self.lex_arith(),
            Mode::Brace => self.lex_brace(),
            Mode::Test => self.lex_test(),
        }?;
        Ok(token)
    }

    fn mode(&self) -> Mode {
        self.modes.last().map(|(mode, _)| *mode).unwrap_or(Mode::Command)
    }

    fn set_mode(&mut self, mode: Mode) {
        if let Some(top) = self.modes.last_mut() {
            top.0 = mode;
        }
    }

    fn push_mode(&mut self, mode: Mode, at: Position) {
        self.modes.push((mode, at));
    }

    fn pop_mode(&mut self) {
        if self.modes.len() > 1 {
            self.modes.pop();
        }
    }

    /// True while a double quote is open in the current command context.
    /// The operand of `${...}` starts a fresh context, so `"${x%.*}"`
    /// still trims a pattern.
    fn in_quotes(&self) -> bool {
        for (mode, _) in self.modes.iter().rev() {
            match mode {
                Mode::Quoted => return true,
                Mode::Command | Mode::Subst { .. } | Mode::Param(_) => return false,
                _ => {}
            }
        }
        false
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.index + ahead).copied()
    }

    fn starts_with(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.get(self.index).copied()?;
        self.index += 1;
        self.position.advance(ch);
        self.prev = Some(ch);
        Some(ch)
    }

    fn advance_by(&mut self, count: usize) {
        for _ in 0..count {
            self.advance();
        }
    }

    fn token(&self, kind: TokenKind, literal: impl Into<String>, start: Position) -> Token {
        Token::new(kind, literal, start).quoted(self.in_quotes())
    }

    /// Previous character separates words.
    fn at_word_start(&self) -> bool {
        match self.prev {
            None => true,
            Some(c) => matches!(c, ' ' | '\t' | '\n' | ';' | '&' | '|' | '(' | ')' | '<' | '>'),
        }
    }

    fn eof(&self) -> Result<Token, LexError> {
        match self.modes.as_slice() {
            [] | [(Mode::Command, _)] | [(Mode::ArithText { depth: 0 }, _)] => {
                Ok(Token::new(TokenKind::Eof, "", self.position))
            }
            [.., (mode, opened)] => Err(LexError::Unterminated {
                construct: mode.construct(),
                position: *opened,
            }),
        }
    }

    fn unexpected(&self, ch: char) -> LexError {
        LexError::UnexpectedChar {
            ch,
            position: self.position,
        }
    }

    // ---- command mode -------------------------------------------------

    fn lex_command(&mut self, assign_candidate: bool) -> Result<Token, LexError> {
        loop {
            let start = self.position;
            let Some(ch) = self.peek_char() else {
                return self.eof();
            };

            match ch {
                ' ' | '\t' => {
                    while matches!(self.peek_char(), Some(' ') | Some('\t')) {
                        self.advance();
                    }
                    return Ok(self.token(TokenKind::Blank, " ", start));
                }
                '\n' => {
                    self.advance();
                    return Ok(self.token(TokenKind::Newline, "\n", start));
                }
                '\\' if self.peek_at(1) == Some('\n') => {
                    // Line continuation
                    self.advance_by(2);
                    continue;
                }
                '#' if self.at_word_start() => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                    continue;
                }
                '=' if assign_candidate => {
                    self.advance();
                    return Ok(self.token(TokenKind::Equals, "=", start));
                }
                _ => {}
            }

            return match ch {
                '\\' => Ok(self.lex_escape()),
                '\'' => self.lex_single_quoted(),
                '"' => {
                    self.advance();
                    let token = self.token(TokenKind::Quote, "\"", start);
                    self.push_mode(Mode::Quoted, start);
                    Ok(token)
                }
                '$' => Ok(self.lex_dollar()),
                '{' if self.looks_like_brace_expansion() => {
                    self.advance();
                    self.push_mode(Mode::Brace, start);
                    Ok(self.token(TokenKind::BeginBrace, "{", start))
                }
                '[' if self.peek_at(1) == Some('[')
                    && self.at_word_start()
                    && matches!(self.peek_at(2), Some(' ') | Some('\t') | Some('\n')) =>
                {
                    self.advance_by(2);
                    self.push_mode(Mode::Test, start);
                    Ok(self.token(TokenKind::BeginTest, "[[", start))
                }
                ';' => {
                    self.advance();
                    if self.peek_char() == Some(';') {
                        self.advance();
                        Ok(self.token(TokenKind::DoubleSemicolon, ";;", start))
                    } else {
                        Ok(self.token(TokenKind::Semicolon, ";", start))
                    }
                }
                '&' => {
                    self.advance();
                    if self.peek_char() == Some('&') {
                        self.advance();
                        Ok(self.token(TokenKind::And, "&&", start))
                    } else if self.starts_with(">>") {
                        self.advance_by(2);
                        Ok(self.token(TokenKind::RedirectBothAppend, "&>>", start))
                    } else if self.peek_char() == Some('>') {
                        self.advance();
                        Ok(self.token(TokenKind::RedirectBoth, "&>", start))
                    } else {
                        Ok(self.token(TokenKind::Background, "&", start))
                    }
                }
                '|' => {
                    self.advance();
                    if self.peek_char() == Some('|') {
                        self.advance();
                        Ok(self.token(TokenKind::Or, "||", start))
                    } else if self.peek_char() == Some('&') {
                        self.advance();
                        Ok(self.token(TokenKind::PipeBoth, "|&", start))
                    } else {
                        Ok(self.token(TokenKind::Pipe, "|", start))
                    }
                }
                '(' => {
                    self.advance();
                    if let Mode::Subst { depth } = self.mode() {
                        self.set_mode(Mode::Subst { depth: depth + 1 });
                    }
                    Ok(self.token(TokenKind::LeftParen, "(", start))
                }
                ')' => {
                    self.advance();
                    match self.mode() {
                        Mode::Subst { depth: 0 } => {
                            self.pop_mode();
                            Ok(self.token(TokenKind::EndSubst, ")", start))
                        }
                        Mode::Subst { depth } => {
                            self.set_mode(Mode::Subst { depth: depth - 1 });
                            Ok(self.token(TokenKind::RightParen, ")", start))
                        }
                        _ => Ok(self.token(TokenKind::RightParen, ")", start)),
                    }
                }
                '<' => {
                    self.advance();
                    Ok(self.token(TokenKind::RedirectIn, "<", start))
                }
                '>' => Ok(self.lex_output_redirect(1, start)),
                '0'..='9' if self.at_word_start() && self.is_fd_redirect() => {
                    self.lex_fd_redirect(start)
                }
                _ => Ok(self.lex_command_literal(start)),
            };
        }
    }

    /// `>`, `>>` or `>&N`, with `fd` as the source descriptor. The leading
    /// `>` has not been consumed.
    fn lex_output_redirect(&mut self, fd: u8, start: Position) -> Token {
        self.advance();
        if self.peek_char() == Some('>') {
            self.advance();
            return if fd == 1 {
                self.token(TokenKind::RedirectAppend, ">>", start)
            } else {
                self.token(TokenKind::RedirectFdAppend(fd), format!("{fd}>>"), start)
            };
        }
        if self.peek_char() == Some('&') {
            if let Some(target) = self.peek_at(1).and_then(|c| c.to_digit(10)) {
                self.advance_by(2);
                let target = target as u8;
                return self.token(TokenKind::DupFd(fd, target), format!("{fd}>&{target}"), start);
            }
        }
        if fd == 1 {
            self.token(TokenKind::RedirectOut, ">", start)
        } else {
            self.token(TokenKind::RedirectFd(fd), format!("{fd}>"), start)
        }
    }

    /// Single digit directly followed by `>` or `<`.
    fn is_fd_redirect(&self) -> bool {
        matches!(self.peek_at(1), Some('>') | Some('<'))
    }

    fn lex_fd_redirect(&mut self, start: Position) -> Result<Token, LexError> {
        let digit = self.advance().and_then(|c| c.to_digit(10)).unwrap_or(0) as u8;
        if self.peek_char() == Some('<') {
            self.advance();
            return Ok(if digit == 0 {
                self.token(TokenKind::RedirectIn, "<", start)
            } else {
                self.token(TokenKind::RedirectFdIn(digit), format!("{digit}<"), start)
            });
        }
        Ok(self.lex_output_redirect(digit, start))
    }

    fn is_command_special(&self, ch: char) -> bool {
        matches!(
            ch,
            ' ' | '\t' | '\n' | ';' | '&' | '|' | '(' | ')' | '<' | '>' | '\'' | '"' | '$' | '\\'
        )
    }

    fn lex_command_literal(&mut self, start: Position) -> Token {
        let word_start = self.at_word_start();
        let mut text = String::new();

        while let Some(ch) = self.peek_char() {
            if self.is_command_special(ch) {
                break;
            }
            if ch == '{' && !text.is_empty() && self.looks_like_brace_expansion() {
                break;
            }
            if ch == '=' && word_start && is_identifier(&text) {
                self.assign_candidate = true;
                break;
            }
            text.push(ch);
            self.advance();
        }

        self.token(TokenKind::Literal, text, start)
    }

    // ---- shared pieces ------------------------------------------------

    /// `\c` outside double quotes: the character is taken literally.
    fn lex_escape(&mut self) -> Token {
        let start = self.position;
        self.advance();
        match self.advance() {
            Some(c) => Token::new(TokenKind::Literal, c.to_string(), start).quoted(true),
            None => Token::new(TokenKind::Literal, "\\", start).quoted(true),
        }
    }

    fn lex_single_quoted(&mut self) -> Result<Token, LexError> {
        let start = self.position;
        self.advance();
        let mut content = String::new();
        loop {
            match self.advance() {
                Some('\'') => break,
                Some(c) => content.push(c),
                None => {
                    return Err(LexError::Unterminated {
                        construct: "single quote",
                        position: start,
                    });
                }
            }
        }
        Ok(Token::new(TokenKind::Literal, content, start).quoted(true))
    }

    /// Everything that starts with `$`.
    fn lex_dollar(&mut self) -> Token {
        let start = self.position;
        self.advance();

        match self.peek_char() {
            Some('(') if self.peek_at(1) == Some('(') => {
                self.advance_by(2);
                let token = self.token(TokenKind::BeginArith, "$((", start);
                self.push_mode(Mode::Arith { depth: 0 }, start);
                token
            }
            Some('(') => {
                self.advance();
                let token = self.token(TokenKind::BeginSubst, "$(", start);
                self.push_mode(Mode::Subst { depth: 0 }, start);
                token
            }
            Some('{') => {
                self.advance();
                let token = self.token(TokenKind::BeginParam, "${", start);
                self.push_mode(Mode::Param(ParamState::Name), start);
                token
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.token(TokenKind::Variable, name, start)
            }
            Some(c) if is_special_param(c) => {
                self.advance();
                self.token(TokenKind::Variable, c.to_string(), start)
            }
            _ => self.token(TokenKind::Literal, "$", start),
        }
    }

    /// Check if the content starting with { looks like a brace expansion
    /// Brace expansion: {a,b,c} or {1..5} (contains , or ..)
    /// Brace group: { cmd; } (contains spaces, semicolons, newlines)
    fn looks_like_brace_expansion(&self) -> bool {
        if self.peek_char() != Some('{') {
            return false;
        }

        let mut depth = 1;
        let mut has_comma = false;
        let mut has_dot_dot = false;
        let mut prev_char = None;

        for &ch in &self.chars[self.index + 1..] {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return has_comma || has_dot_dot;
                    }
                }
                ',' if depth == 1 => has_comma = true,
                '.' if prev_char == Some('.') && depth == 1 => has_dot_dot = true,
                ' ' | '\t' | '\n' | ';' | '|' | '&' | '"' | '\'' if depth == 1 => return false,
                _ => {}
            }
            prev_char = Some(ch);
        }

        false
    }

    // ---- double quotes ------------------------------------------------

    fn lex_quoted(&mut self) -> Result<Token, LexError> {
        let start = self.position;
        let Some(ch) = self.peek_char() else {
            return self.eof();
        };

        match ch {
            '"' => {
                self.advance();
                let token = self.token(TokenKind::Quote, "\"", start);
                self.pop_mode();
                Ok(token)
            }
            '$' => Ok(self.lex_dollar()),
            _ => {
                let mut text = String::new();
                while let Some(c) = self.peek_char() {
                    match c {
                        '"' | '$' => break,
                        '\\' => {
                            self.advance();
                            match self.peek_char() {
                                Some(next @ ('\\' | ';' | '"' | '$')) => {
                                    text.push(next);
                                    self.advance();
                                }
                                _ => text.push('\\'),
                            }
                        }
                        _ => {
                            text.push(c);
                            self.advance();
                        }
                    }
                }
                Ok(self.token(TokenKind::Literal, text, start))
            }
        }
    }

    // ---- ${...} -------------------------------------------------------

    fn lex_param(&mut self, state: ParamState) -> Result<Token, LexError> {
        let start = self.position;
        let Some(ch) = self.peek_char() else {
            return self.eof();
        };

        match state {
            ParamState::Name => self.lex_param_name(ch, start),
            ParamState::Operator => self.lex_param_operator(ch, start),
            ParamState::Close => {
                if ch == '}' {
                    self.advance();
                    self.pop_mode();
                    Ok(self.token(TokenKind::EndParam, "}", start))
                } else {
                    Err(self.unexpected(ch))
                }
            }
            ParamState::Slice => self.lex_param_slice(ch, start),
            ParamState::Word | ParamState::Replace => self.lex_param_word(ch, state, start),
        }
    }

    fn lex_param_name(&mut self, ch: char, start: Position) -> Result<Token, LexError> {
        // `${#name}` is the length operator; `${#}` is the positional count
        if ch == '#' && self.prev == Some('{') && !matches!(self.peek_at(1), Some('}') | None) {
            self.advance();
            return Ok(self.token(TokenKind::ParamOp(ParamOp::Length), "#", start));
        }

        let mut name = String::new();
        if ch.is_ascii_alphabetic() || ch == '_' {
            while let Some(c) = self.peek_char() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    name.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        } else if ch.is_ascii_digit() {
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    name.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        } else if is_special_param(ch) {
            name.push(ch);
            self.advance();
        } else {
            return Err(self.unexpected(ch));
        }

        self.set_mode(Mode::Param(ParamState::Operator));
        Ok(self.token(TokenKind::Literal, name, start))
    }

    fn lex_param_operator(&mut self, ch: char, start: Position) -> Result<Token, LexError> {
        let next = self.peek_at(1);
        let (op, len, state) = match (ch, next) {
            ('}', _) => {
                self.advance();
                self.pop_mode();
                return Ok(self.token(TokenKind::EndParam, "}", start));
            }
            (':', Some('-')) => (ParamOp::UseDefault { colon: true }, 2, ParamState::Word),
            (':', Some('=')) => (ParamOp::AssignDefault { colon: true }, 2, ParamState::Word),
            (':', Some('+')) => (ParamOp::UseAlternate { colon: true }, 2, ParamState::Word),
            (':', Some('?')) => (ParamOp::ErrorIfUnset { colon: true }, 2, ParamState::Word),
            (':', _) => (ParamOp::Slice, 1, ParamState::Slice),
            ('-', _) => (ParamOp::UseDefault { colon: false }, 1, ParamState::Word),
            ('=', _) => (ParamOp::AssignDefault { colon: false }, 1, ParamState::Word),
            ('+', _) => (ParamOp::UseAlternate { colon: false }, 1, ParamState::Word),
            ('?', _) => (ParamOp::ErrorIfUnset { colon: false }, 1, ParamState::Word),
            ('#', Some('#')) => (ParamOp::TrimPrefixLong, 2, ParamState::Word),
            ('#', _) => (ParamOp::TrimPrefix, 1, ParamState::Word),
            ('%', Some('%')) => (ParamOp::TrimSuffixLong, 2, ParamState::Word),
            ('%', _) => (ParamOp::TrimSuffix, 1, ParamState::Word),
            ('/', Some('/')) => (ParamOp::ReplaceAll, 2, ParamState::Replace),
            ('/', Some('#')) => (ParamOp::ReplacePrefix, 2, ParamState::Replace),
            ('/', Some('%')) => (ParamOp::ReplaceSuffix, 2, ParamState::Replace),
            ('/', _) => (ParamOp::Replace, 1, ParamState::Replace),
            (',', Some(',')) => (ParamOp::LowerAll, 2, ParamState::Close),
            (',', _) => (ParamOp::LowerFirst, 1, ParamState::Close),
            ('^', Some('^')) => (ParamOp::UpperAll, 2, ParamState::Close),
            ('^', _) => (ParamOp::UpperFirst, 1, ParamState::Close),
            _ => return Err(self.unexpected(ch)),
        };

        let text: String = self.chars[self.index..self.index + len].iter().collect();
        self.advance_by(len);
        self.set_mode(Mode::Param(state));
        Ok(self.token(TokenKind::ParamOp(op), text, start))
    }

    fn lex_param_slice(&mut self, ch: char, start: Position) -> Result<Token, LexError> {
        match ch {
            '}' => {
                self.advance();
                self.pop_mode();
                Ok(self.token(TokenKind::EndParam, "}", start))
            }
            ':' => {
                self.advance();
                Ok(self.token(TokenKind::Colon, ":", start))
            }
            _ => {
                let mut text = String::new();
                let mut depth = 0usize;
                while let Some(c) = self.peek_char() {
                    match c {
                        '{' => depth += 1,
                        '}' if depth == 0 => break,
                        '}' => depth -= 1,
                        ':' if depth == 0 => break,
                        _ => {}
                    }
                    text.push(c);
                    self.advance();
                }
                Ok(self.token(TokenKind::Literal, text, start))
            }
        }
    }

    fn lex_param_word(
        &mut self,
        ch: char,
        state: ParamState,
        start: Position,
    ) -> Result<Token, LexError> {
        match ch {
            '}' => {
                self.advance();
                self.pop_mode();
                Ok(self.token(TokenKind::EndParam, "}", start))
            }
            '/' if state == ParamState::Replace => {
                self.advance();
                self.set_mode(Mode::Param(ParamState::Word));
                Ok(self.token(TokenKind::Slash, "/", start))
            }
            '$' => Ok(self.lex_dollar()),
            '"' => {
                self.advance();
                let token = self.token(TokenKind::Quote, "\"", start);
                self.push_mode(Mode::Quoted, start);
                Ok(token)
            }
            '\'' => self.lex_single_quoted(),
            '\\' => Ok(self.lex_escape()),
            _ => {
                let mut text = String::new();
                while let Some(c) = self.peek_char() {
                    if matches!(c, '}' | '$' | '"' | '\'' | '\\')
                        || (c == '/' && state == ParamState::Replace)
                    {
                        break;
                    }
                    text.push(c);
                    self.advance();
                }
                Ok(self.token(TokenKind::Literal, text, start))
            }
        }
    }

    // ---- $(( )) -------------------------------------------------------

    fn lex_arith(&mut self) -> Result<Token, LexError> {
        while matches!(self.peek_char(), Some(' ') | Some('\t') | Some('\n')) {
            self.advance();
        }

        let start = self.position;
        let Some(ch) = self.peek_char() else {
            return self.eof();
        };

        match ch {
            '$' => Ok(self.lex_dollar()),
            '(' => {
                self.advance();
                match self.mode() {
                    Mode::Arith { depth } => self.set_mode(Mode::Arith { depth: depth + 1 }),
                    Mode::ArithText { depth } => {
                        self.set_mode(Mode::ArithText { depth: depth + 1 })
                    }
                    _ => {}
                }
                Ok(self.token(TokenKind::LeftParen, "(", start))
            }
            ')' => match self.mode() {
                Mode::Arith { depth: 0 } if self.peek_at(1) == Some(')') => {
                    self.advance_by(2);
                    self.pop_mode();
                    Ok(self.token(TokenKind::EndArith, "))", start))
                }
                Mode::Arith { depth } if depth > 0 => {
                    self.advance();
                    self.set_mode(Mode::Arith { depth: depth - 1 });
                    Ok(self.token(TokenKind::RightParen, ")", start))
                }
                Mode::ArithText { depth } if depth > 0 => {
                    self.advance();
                    self.set_mode(Mode::ArithText { depth: depth - 1 });
                    Ok(self.token(TokenKind::RightParen, ")", start))
                }
                _ => Err(self.unexpected(ch)),
            },
            c if c.is_ascii_digit() => {
                let mut text = String::new();
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '#' || c == '@' {
                        text.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
                Ok(self.token(TokenKind::Number, text, start))
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut text = String::new();
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        text.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
                Ok(self.token(TokenKind::Literal, text, start))
            }
            _ => {
                for op in ARITH_OPERATORS {
                    if self.starts_with(op) {
                        self.advance_by(op.chars().count());
                        return Ok(self.token(TokenKind::ArithOp, *op, start));
                    }
                }
                Err(self.unexpected(ch))
            }
        }
    }

    // ---- {a,b} {1..3} -------------------------------------------------

    fn lex_brace(&mut self) -> Result<Token, LexError> {
        let start = self.position;
        let Some(ch) = self.peek_char() else {
            return self.eof();
        };

        match ch {
            ',' => {
                self.advance();
                Ok(self.token(TokenKind::Comma, ",", start))
            }
            '.' if self.peek_at(1) == Some('.') => {
                self.advance_by(2);
                Ok(self.token(TokenKind::Range, "..", start))
            }
            '}' => {
                self.advance();
                self.pop_mode();
                Ok(self.token(TokenKind::EndBrace, "}", start))
            }
            '{' if self.looks_like_brace_expansion() => {
                self.advance();
                self.push_mode(Mode::Brace, start);
                Ok(self.token(TokenKind::BeginBrace, "{", start))
            }
            '$' => Ok(self.lex_dollar()),
            '\'' => self.lex_single_quoted(),
            '\\' => Ok(self.lex_escape()),
            '"' => {
                self.advance();
                let token = self.token(TokenKind::Quote, "\"", start);
                self.push_mode(Mode::Quoted, start);
                Ok(token)
            }
            _ => {
                let mut text = String::new();
                while let Some(c) = self.peek_char() {
                    if matches!(c, ',' | '}' | '$' | '\'' | '"' | '\\')
                        || (c == '.' && self.peek_at(1) == Some('.'))
                        || (c == '{' && self.looks_like_brace_expansion())
                    {
                        break;
                    }
                    text.push(c);
                    self.advance();
                }
                Ok(self.token(TokenKind::Literal, text, start))
            }
        }
    }

    // ---- [[ ]] --------------------------------------------------------

    fn lex_test(&mut self) -> Result<Token, LexError> {
        let start = self.position;
        let Some(ch) = self.peek_char() else {
            return self.eof();
        };

        match ch {
            ' ' | '\t' | '\n' => {
                while matches!(self.peek_char(), Some(' ') | Some('\t') | Some('\n')) {
                    self.advance();
                }
                Ok(self.token(TokenKind::Blank, " ", start))
            }
            ']' if self.peek_at(1) == Some(']')
                && self.at_word_start()
                && matches!(
                    self.peek_at(2),
                    None | Some(' ' | '\t' | '\n' | ';' | '&' | '|' | ')')
                ) =>
            {
                self.advance_by(2);
                self.pop_mode();
                Ok(self.token(TokenKind::EndTest, "]]", start))
            }
            '&' if self.peek_at(1) == Some('&') => {
                self.advance_by(2);
                Ok(self.token(TokenKind::And, "&&", start))
            }
            '|' if self.peek_at(1) == Some('|') => {
                self.advance_by(2);
                Ok(self.token(TokenKind::Or, "||", start))
            }
            '(' => {
                self.advance();
                Ok(self.token(TokenKind::LeftParen, "(", start))
            }
            ')' => {
                self.advance();
                Ok(self.token(TokenKind::RightParen, ")", start))
            }
            '<' | '>' => {
                self.advance();
                Ok(self.token(TokenKind::Literal, ch.to_string(), start))
            }
            '$' => Ok(self.lex_dollar()),
            '\'' => self.lex_single_quoted(),
            '\\' => Ok(self.lex_escape()),
            '"' => {
                self.advance();
                let token = self.token(TokenKind::Quote, "\"", start);
                self.push_mode(Mode::Quoted, start);
                Ok(token)
            }
            _ => {
                let mut text = String::new();
                while let Some(c) = self.peek_char() {
                    if matches!(
                        c,
                        ' ' | '\t' | '\n' | '$' | '\'' | '"' | '\\' | '(' | ')' | '<' | '>'
                    ) || self.starts_with("&&")
                        || self.starts_with("||")
                    {
                        break;
                    }
                    text.push(c);
                    self.advance();
                }
                if text.is_empty() {
                    return Err(self.unexpected(ch));
                }
                Ok(self.token(TokenKind::Literal, text, start))
            }
        }
    }
}

/// `$?`, `$$`, `$@`, `$*`, `$#`, `$!`, `$-` and `$0`..`$9`.
fn is_special_param(c: char) -> bool {
    matches!(c, '?' | '$' | '@' | '*' | '#' | '!' | '-') || c.is_ascii_digit()
}

/// Shell identifier: a letter or underscore followed by alphanumerics.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn literals(input: &str) -> Vec<(TokenKind, String)> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| (t.kind, t.literal))
            .collect()
    }

    #[test]
    fn test_simple_words() {
        use TokenKind::*;
        assert_eq!(
            kinds("echo hello world"),
            vec![Literal, Blank, Literal, Blank, Literal, Eof]
        );
    }

    #[test]
    fn test_empty_input_is_eof() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_single_quoted_string() {
        let tokens = Lexer::new("echo 'a $b \\c'").tokenize().unwrap();
        assert_eq!(tokens[2].kind, TokenKind::Literal);
        assert_eq!(tokens[2].literal, "a $b \\c");
        assert!(tokens[2].quoted);
    }

    #[test]
    fn test_double_quoted_string() {
        use TokenKind::*;
        let tokens = Lexer::new("\"hi $x\"").tokenize().unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![Quote, Literal, Variable, Quote, Eof]);
        assert!(tokens[1].quoted);
        assert!(tokens[2].quoted);
        assert_eq!(tokens[1].literal, "hi ");
    }

    #[test]
    fn test_double_quote_escapes() {
        let tokens = Lexer::new(r#""a\"b\$c\n""#).tokenize().unwrap();
        assert_eq!(tokens[1].literal, "a\"b$c\\n");
    }

    #[test]
    fn test_unterminated_double_quote() {
        let err = Lexer::new("echo \"unterminated").tokenize().unwrap_err();
        assert!(matches!(
            err,
            LexError::Unterminated {
                construct: "double quote",
                ..
            }
        ));
    }

    #[test]
    fn test_unterminated_single_quote() {
        let err = Lexer::new("echo 'oops").tokenize().unwrap_err();
        assert!(matches!(
            err,
            LexError::Unterminated {
                construct: "single quote",
                ..
            }
        ));
    }

    #[test]
    fn test_unterminated_substitution() {
        let err = Lexer::new("echo $(echo hi").tokenize().unwrap_err();
        assert!(matches!(
            err,
            LexError::Unterminated {
                construct: "command substitution",
                ..
            }
        ));
    }

    #[test]
    fn test_operators() {
        use TokenKind::*;
        assert_eq!(
            kinds("a|b&&c||d;e&f|&g;;"),
            vec![
                Literal,
                Pipe,
                Literal,
                And,
                Literal,
                Or,
                Literal,
                Semicolon,
                Literal,
                Background,
                Literal,
                PipeBoth,
                Literal,
                DoubleSemicolon,
                Eof
            ]
        );
    }

    #[test]
    fn test_redirects() {
        use TokenKind::*;
        let got: Vec<_> = kinds("a > b >> c < d 2> e 2>> f &> g &>> h >&2 2>&1")
            .into_iter()
            .filter(|k| *k != Blank)
            .collect();
        assert_eq!(
            got,
            vec![
                Literal,
                RedirectOut,
                Literal,
                RedirectAppend,
                Literal,
                RedirectIn,
                Literal,
                RedirectFd(2),
                Literal,
                RedirectFdAppend(2),
                Literal,
                RedirectBoth,
                Literal,
                RedirectBothAppend,
                Literal,
                DupFd(1, 2),
                DupFd(2, 1),
                Eof
            ]
        );
    }

    #[test]
    fn test_digit_word_is_not_redirect() {
        assert_eq!(
            literals("echo 2x"),
            vec![
                (TokenKind::Literal, "echo".into()),
                (TokenKind::Blank, " ".into()),
                (TokenKind::Literal, "2x".into()),
                (TokenKind::Eof, "".into()),
            ]
        );
    }

    #[test]
    fn test_comment() {
        use TokenKind::*;
        assert_eq!(
            kinds("echo hi # note\necho a#b"),
            vec![Literal, Blank, Literal, Blank, Newline, Literal, Blank, Literal, Eof]
        );
    }

    #[test]
    fn test_assignment_equals() {
        assert_eq!(
            literals("x=1"),
            vec![
                (TokenKind::Literal, "x".into()),
                (TokenKind::Equals, "=".into()),
                (TokenKind::Literal, "1".into()),
                (TokenKind::Eof, "".into()),
            ]
        );
        // not at word start of an identifier: plain text
        assert_eq!(literals("1=2")[0], (TokenKind::Literal, "1=2".into()));
    }

    #[test]
    fn test_parameter_length_vs_comment() {
        use TokenKind::*;
        assert_eq!(
            kinds("${#x}"),
            vec![BeginParam, ParamOp(super::ParamOp::Length), Literal, EndParam, Eof]
        );
        // `${#}` is the positional count, not a length
        assert_eq!(kinds("${#}"), vec![BeginParam, Literal, EndParam, Eof]);
    }

    #[test]
    fn test_parameter_operators() {
        use super::ParamOp as P;
        use TokenKind::*;
        let cases = [
            ("${x:-d}", P::UseDefault { colon: true }),
            ("${x:=d}", P::AssignDefault { colon: true }),
            ("${x:+d}", P::UseAlternate { colon: true }),
            ("${x:?d}", P::ErrorIfUnset { colon: true }),
            ("${x-d}", P::UseDefault { colon: false }),
            ("${x##d}", P::TrimPrefixLong),
            ("${x%d}", P::TrimSuffix),
        ];
        for (input, op) in cases {
            assert_eq!(
                kinds(input),
                vec![BeginParam, Literal, ParamOp(op), Literal, EndParam, Eof],
                "{input}"
            );
        }
    }

    #[test]
    fn test_parameter_replace_and_slice() {
        use super::ParamOp as P;
        use TokenKind::*;
        assert_eq!(
            kinds("${x//a/b}"),
            vec![BeginParam, Literal, ParamOp(P::ReplaceAll), Literal, Slash, Literal, EndParam, Eof]
        );
        assert_eq!(
            literals("${x:1:2}")
                .into_iter()
                .map(|(k, _)| k)
                .collect::<Vec<_>>(),
            vec![BeginParam, Literal, ParamOp(P::Slice), Literal, Colon, Literal, EndParam, Eof]
        );
        assert_eq!(
            kinds("${x^^}"),
            vec![BeginParam, Literal, ParamOp(P::UpperAll), EndParam, Eof]
        );
    }

    #[test]
    fn test_parameter_operator_chars_are_literal_outside() {
        assert_eq!(literals("a:b/c%d,e^f")[0].1, "a:b/c%d,e^f");
    }

    #[test]
    fn test_command_substitution_tokens() {
        use TokenKind::*;
        assert_eq!(
            kinds("$(echo (a))"),
            vec![BeginSubst, Literal, Blank, LeftParen, Literal, RightParen, EndSubst, Eof]
        );
    }

    #[test]
    fn test_arithmetic_tokens() {
        let tokens = literals("$(( (1 + x) ** 2 ))");
        let kinds: Vec<_> = tokens.iter().map(|(k, _)| *k).collect();
        use TokenKind::*;
        assert_eq!(
            kinds,
            vec![BeginArith, LeftParen, Number, ArithOp, Literal, RightParen, ArithOp, Number, EndArith, Eof]
        );
        assert_eq!(tokens[6].1, "**");
    }

    #[test]
    fn test_brace_tokens() {
        use TokenKind::*;
        assert_eq!(
            kinds("a{b,c}d"),
            vec![Literal, BeginBrace, Literal, Comma, Literal, EndBrace, Literal, Eof]
        );
        assert_eq!(
            kinds("{1..5..2}"),
            vec![BeginBrace, Literal, Range, Literal, Range, Literal, EndBrace, Eof]
        );
        // no comma or range: plain text
        assert_eq!(kinds("{abc}"), vec![Literal, Eof]);
    }

    #[test]
    fn test_test_tokens() {
        use TokenKind::*;
        assert_eq!(
            kinds("[[ -f x && a < b ]]"),
            vec![
                BeginTest, Blank, Literal, Blank, Literal, Blank, And, Blank, Literal, Blank,
                Literal, Blank, Literal, Blank, EndTest, Eof
            ]
        );
    }

    #[test]
    fn test_unterminated_test() {
        assert!(Lexer::new("[[ -f x").tokenize().is_err());
    }

    #[test]
    fn test_escape_outside_quotes() {
        let tokens = Lexer::new("a\\ b").tokenize().unwrap();
        assert_eq!(tokens[1].literal, " ");
        assert!(tokens[1].quoted);
        assert_eq!(tokens.len(), 4);
    }

    #[test]
    fn test_line_continuation() {
        assert_eq!(
            kinds("echo \\\nhi"),
            vec![TokenKind::Literal, TokenKind::Blank, TokenKind::Literal, TokenKind::Eof]
        );
    }

    #[test]
    fn test_arithmetic_text_mode() {
        let tokens = Lexer::arithmetic("x + 1").tokenize().unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TokenKind::Literal, TokenKind::ArithOp, TokenKind::Number, TokenKind::Eof]
        );
    }

    #[test]
    fn test_positions() {
        let tokens = Lexer::new("a\n  b").tokenize().unwrap();
        let b = tokens.iter().find(|t| t.literal == "b").unwrap();
        assert_eq!(b.position.line, 2);
        assert_eq!(b.position.column, 3);
    }
}
