//! Parser module for shoal
//!
//! Implements a recursive descent parser for shoal scripts. The arithmetic
//! and `[[ ]]` sub-grammars use precedence climbing and live in their own
//! files ([`arith`] and [`test`]).

mod arith;
mod ast;
mod lexer;
mod span;
mod tokens;

pub use arith::{parse_arithmetic, parse_integer};
pub use ast::*;
pub use lexer::{is_identifier, Lexer};
pub use span::Position;
pub use tokens::{ParamOp, Token, TokenKind};

use tracing::debug;

use crate::error::{Error, ParseError, Result};

/// Words that open or close control structures when they appear unquoted
/// in command position.
const RESERVED: &[&str] = &[
    "if", "then", "elif", "else", "fi", "for", "while", "until", "do", "done", "case", "esac",
    "{", "}", "break", "continue",
];

/// Parser for shoal scripts.
pub struct Parser {
    source: String,
    tokens: Vec<Token>,
    pos: usize,
    eof: Token,
    /// Number of enclosing loop bodies
    loop_depth: usize,
    /// Between an opening and closing double quote
    in_quote: bool,
}

impl Parser {
    /// Create a new parser for the given input.
    pub fn new(input: &str) -> Self {
        Self {
            source: input.to_string(),
            tokens: Vec::new(),
            pos: 0,
            eof: Token::new(TokenKind::Eof, "", Position::new()),
            loop_depth: 0,
            in_quote: false,
        }
    }

    fn from_tokens(tokens: Vec<Token>) -> Self {
        let eof_position = tokens.last().map(|t| t.position).unwrap_or_default();
        Self {
            source: String::new(),
            tokens,
            pos: 0,
            eof: Token::new(TokenKind::Eof, "", eof_position),
            loop_depth: 0,
            in_quote: false,
        }
    }

    /// Parse the input and return the AST.
    pub fn parse(mut self) -> Result<Script> {
        self.tokens = Lexer::new(&self.source).tokenize()?;
        if let Some(last) = self.tokens.last() {
            self.eof.position = last.position;
        }

        let commands = self.parse_compound_list(&[])?;
        let token = self.peek();
        if token.kind != TokenKind::Eof {
            return Err(self.unexpected(token).into());
        }
        Ok(Script { commands })
    }

    // ---- token helpers ------------------------------------------------

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.eof)
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_nth(&self, n: usize) -> &Token {
        self.tokens.get(self.pos + n).unwrap_or(&self.eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn skip_blanks(&mut self) {
        while self.peek_kind() == TokenKind::Blank {
            self.advance();
        }
    }

    /// Skip blanks and newlines (after `&&`, `|`, ...).
    fn skip_linebreaks(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Blank | TokenKind::Newline) {
            self.advance();
        }
    }

    /// Skip statement separators between commands.
    fn skip_separators(&mut self) {
        loop {
            match self.peek_kind() {
                TokenKind::Blank | TokenKind::Newline | TokenKind::Semicolon => {}
                TokenKind::Background => {
                    debug!(position = %self.peek().position, "'&' runs the statement in the foreground");
                }
                _ => return,
            }
            self.advance();
        }
    }

    fn unexpected(&self, token: &Token) -> ParseError {
        let what = match token.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Newline => "newline".to_string(),
            _ => format!("'{}'", token.literal),
        };
        ParseError::at(format!("unexpected {what}"), token.position)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        let token = self.peek();
        if token.kind == kind {
            Ok(self.advance())
        } else {
            let found = self.unexpected(token);
            Err(ParseError::at(format!("expected {what}, {}", found.message), found.position).into())
        }
    }

    /// The current token is an unquoted literal forming a whole word.
    fn peek_keyword(&self) -> Option<&str> {
        let token = self.peek();
        if token.kind == TokenKind::Literal && !token.quoted && self.peek_nth(1).kind.ends_word() {
            Some(token.literal.as_str())
        } else {
            None
        }
    }

    fn at_keyword(&self, keywords: &[&str]) -> bool {
        self.peek_keyword().is_some_and(|k| keywords.contains(&k))
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        self.skip_separators();
        if self.at_keyword(&[keyword]) {
            self.advance();
            Ok(())
        } else {
            let found = self.unexpected(self.peek());
            Err(ParseError::at(
                format!("expected '{keyword}', {}", found.message),
                found.position,
            )
            .into())
        }
    }

    // ---- statements ---------------------------------------------------

    /// Parse statements until one of `terminators` appears in command
    /// position, or a token that closes the surrounding construct.
    fn parse_compound_list(&mut self, terminators: &[&str]) -> Result<Vec<Executer>> {
        let mut commands = Vec::new();
        loop {
            self.skip_separators();
            if self.at_keyword(terminators) || self.at_list_end() {
                break;
            }
            commands.push(self.parse_and_or()?);
            self.skip_blanks();
            match self.peek_kind() {
                TokenKind::Semicolon | TokenKind::Newline | TokenKind::Background => continue,
                _ if self.at_list_end() => break,
                _ => return Err(self.unexpected(self.peek()).into()),
            }
        }
        Ok(commands)
    }

    fn at_list_end(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Eof | TokenKind::RightParen | TokenKind::EndSubst | TokenKind::DoubleSemicolon
        )
    }

    /// Parse an and/or chain (left-associative).
    fn parse_and_or(&mut self) -> Result<Executer> {
        let mut left = self.parse_pipeline()?;
        loop {
            self.skip_blanks();
            let and = match self.peek_kind() {
                TokenKind::And => true,
                TokenKind::Or => false,
                _ => return Ok(left),
            };
            self.advance();
            self.skip_linebreaks();
            let right = self.parse_pipeline()?;
            left = if and {
                Executer::And(Box::new(left), Box::new(right))
            } else {
                Executer::Or(Box::new(left), Box::new(right))
            };
        }
    }

    /// Parse a pipeline (commands connected by `|` or `|&`).
    fn parse_pipeline(&mut self) -> Result<Executer> {
        let first = self.parse_command()?;
        let mut stages = vec![PipelineStage {
            command: first,
            merge_stderr: false,
        }];

        loop {
            self.skip_blanks();
            let merge_stderr = match self.peek_kind() {
                TokenKind::Pipe => false,
                TokenKind::PipeBoth => true,
                _ => break,
            };
            self.advance();
            if let Some(last) = stages.last_mut() {
                last.merge_stderr = merge_stderr;
            }
            self.skip_linebreaks();
            stages.push(PipelineStage {
                command: self.parse_command()?,
                merge_stderr: false,
            });
        }

        if stages.len() == 1 {
            if let Some(stage) = stages.pop() {
                return Ok(stage.command);
            }
        }
        Ok(Executer::Pipeline(stages))
    }

    fn parse_command(&mut self) -> Result<Executer> {
        self.skip_blanks();

        let compound = match self.peek_kind() {
            TokenKind::BeginTest => Executer::Test(self.parse_test_command()?),
            TokenKind::LeftParen => {
                self.advance();
                let body = self.parse_compound_list(&[])?;
                self.expect(TokenKind::RightParen, "')'")?;
                Executer::Subshell(body)
            }
            _ => match self.peek_keyword() {
                Some("if") => self.parse_if()?,
                Some("for") => self.parse_for()?,
                Some("while") => Executer::While(self.parse_loop()?),
                Some("until") => Executer::Until(self.parse_loop()?),
                Some("case") => self.parse_case()?,
                Some("{") => {
                    self.advance();
                    let body = self.parse_compound_list(&["}"])?;
                    self.expect_keyword("}")?;
                    Executer::List(body)
                }
                Some(keyword @ ("break" | "continue")) => {
                    let is_break = keyword == "break";
                    let token = self.advance();
                    if self.loop_depth == 0 {
                        return Err(ParseError::at(
                            format!("'{}' outside of a loop", token.literal),
                            token.position,
                        )
                        .into());
                    }
                    return Ok(if is_break {
                        Executer::Break
                    } else {
                        Executer::Continue
                    });
                }
                Some(keyword) if RESERVED.contains(&keyword) => {
                    return Err(self.unexpected(self.peek()).into());
                }
                _ => return self.parse_simple(),
            },
        };

        let redirects = self.parse_trailing_redirects()?;
        if redirects.is_empty() {
            Ok(compound)
        } else {
            Ok(Executer::Redirected(Box::new(compound), redirects))
        }
    }

    fn parse_trailing_redirects(&mut self) -> Result<Vec<Redirect>> {
        let mut redirects = Vec::new();
        loop {
            self.skip_blanks();
            if !self.peek_kind().is_redirect() {
                return Ok(redirects);
            }
            redirects.extend(self.parse_redirect()?);
        }
    }

    fn parse_simple(&mut self) -> Result<Executer> {
        let mut cmd = SimpleCommand::default();
        let start = self.peek().clone();

        loop {
            self.skip_blanks();
            let token = self.peek();
            if token.kind.is_redirect() {
                let redirects = self.parse_redirect()?;
                cmd.redirects.extend(redirects);
                continue;
            }
            if token.kind.ends_word() {
                break;
            }
            if cmd.words.is_empty()
                && token.kind == TokenKind::Literal
                && !token.quoted
                && self.peek_nth(1).kind == TokenKind::Equals
            {
                let name = self.advance().literal;
                self.advance();
                let value = self.parse_word()?;
                cmd.assignments.push(Assignment { name, value });
                continue;
            }
            let word = self.parse_word()?;
            cmd.words.push(word);
        }

        if cmd.words.is_empty() && cmd.redirects.is_empty() {
            let mut assignments: Vec<Executer> =
                cmd.assignments.into_iter().map(Executer::Assign).collect();
            return match assignments.len() {
                0 => Err(self.unexpected(&start).into()),
                1 => Ok(assignments.remove(0)),
                _ => Ok(Executer::List(assignments)),
            };
        }

        Ok(Executer::Simple(cmd))
    }

    fn parse_redirect(&mut self) -> Result<Vec<Redirect>> {
        let token = self.advance();
        let kind = token.kind;

        if let TokenKind::DupFd(fd, target) = kind {
            return Ok(vec![Redirect {
                fd,
                op: RedirectOp::Dup(target),
            }]);
        }

        self.skip_blanks();
        if self.peek_kind().ends_word() {
            let found = self.unexpected(self.peek());
            return Err(ParseError::at(
                format!("expected redirection target, {}", found.message),
                found.position,
            )
            .into());
        }
        let target = self.parse_word()?;

        let redirects = match kind {
            TokenKind::RedirectIn => vec![Redirect {
                fd: 0,
                op: RedirectOp::Read(target),
            }],
            TokenKind::RedirectFdIn(fd) => vec![Redirect {
                fd,
                op: RedirectOp::Read(target),
            }],
            TokenKind::RedirectOut => vec![Redirect {
                fd: 1,
                op: RedirectOp::Write(target),
            }],
            TokenKind::RedirectAppend => vec![Redirect {
                fd: 1,
                op: RedirectOp::Append(target),
            }],
            TokenKind::RedirectFd(fd) => vec![Redirect {
                fd,
                op: RedirectOp::Write(target),
            }],
            TokenKind::RedirectFdAppend(fd) => vec![Redirect {
                fd,
                op: RedirectOp::Append(target),
            }],
            TokenKind::RedirectBoth => vec![
                Redirect {
                    fd: 1,
                    op: RedirectOp::Write(target),
                },
                Redirect {
                    fd: 2,
                    op: RedirectOp::Dup(1),
                },
            ],
            TokenKind::RedirectBothAppend => vec![
                Redirect {
                    fd: 1,
                    op: RedirectOp::Append(target),
                },
                Redirect {
                    fd: 2,
                    op: RedirectOp::Dup(1),
                },
            ],
            _ => return Err(self.unexpected(&token).into()),
        };
        Ok(redirects)
    }

    // ---- control structures -------------------------------------------

    /// `if` or `elif` up to and including the closing `fi`.
    fn parse_if(&mut self) -> Result<Executer> {
        let keyword = self.advance();
        let condition = self.parse_compound_list(&["then"])?;
        if condition.is_empty() {
            return Err(ParseError::at(
                format!("expected command after '{}'", keyword.literal),
                keyword.position,
            )
            .into());
        }
        self.expect_keyword("then")?;
        let consequence = self.parse_compound_list(&["elif", "else", "fi"])?;

        let alternative = match self.peek_keyword() {
            Some("elif") => Some(vec![self.parse_if()?]),
            Some("else") => {
                self.advance();
                let body = self.parse_compound_list(&["fi"])?;
                self.expect_keyword("fi")?;
                Some(body)
            }
            _ => {
                self.expect_keyword("fi")?;
                None
            }
        };

        Ok(Executer::If(IfCommand {
            condition,
            consequence,
            alternative,
        }))
    }

    fn parse_for(&mut self) -> Result<Executer> {
        self.advance();
        self.skip_blanks();
        let token = self.peek().clone();
        let variable = match self.peek_keyword() {
            Some(name) if is_identifier(name) => name.to_string(),
            _ => {
                return Err(ParseError::at(
                    format!("expected loop variable, {}", self.unexpected(&token).message),
                    token.position,
                )
                .into())
            }
        };
        self.advance();
        self.skip_blanks();

        let words = if self.at_keyword(&["in"]) {
            self.advance();
            let mut words = Vec::new();
            loop {
                self.skip_blanks();
                if self.peek_kind().ends_word() {
                    break;
                }
                words.push(self.parse_word()?);
            }
            Some(words)
        } else {
            None
        };

        self.expect_keyword("do")?;
        let (body, otherwise) = self.parse_loop_body()?;
        Ok(Executer::For(ForLoop {
            variable,
            words,
            body,
            otherwise,
        }))
    }

    /// `while` or `until`; the caller picks the variant.
    fn parse_loop(&mut self) -> Result<Loop> {
        let keyword = self.advance();
        let condition = self.parse_compound_list(&["do"])?;
        if condition.is_empty() {
            return Err(ParseError::at(
                format!("expected command after '{}'", keyword.literal),
                keyword.position,
            )
            .into());
        }
        self.expect_keyword("do")?;
        let (body, otherwise) = self.parse_loop_body()?;
        Ok(Loop {
            condition,
            body,
            otherwise,
        })
    }

    /// Body after `do`, an optional `else` part, and the closing `done`.
    fn parse_loop_body(&mut self) -> Result<(Vec<Executer>, Option<Vec<Executer>>)> {
        self.loop_depth += 1;
        let body = self.parse_compound_list(&["done", "else"]);
        self.loop_depth -= 1;
        let body = body?;

        let otherwise = if self.at_keyword(&["else"]) {
            self.advance();
            Some(self.parse_compound_list(&["done"])?)
        } else {
            None
        };
        self.expect_keyword("done")?;
        Ok((body, otherwise))
    }

    fn parse_case(&mut self) -> Result<Executer> {
        self.advance();
        self.skip_blanks();
        if self.peek_kind().ends_word() {
            return Err(self.unexpected(self.peek()).into());
        }
        let word = self.parse_word()?;
        self.skip_linebreaks();
        self.expect_keyword("in")?;

        let mut clauses = Vec::new();
        let mut default = None;

        loop {
            self.skip_separators();
            if self.at_keyword(&["esac"]) {
                self.advance();
                break;
            }
            if self.peek_kind() == TokenKind::LeftParen {
                self.advance();
            }

            let mut patterns = Vec::new();
            loop {
                self.skip_blanks();
                if self.peek_kind().ends_word() {
                    return Err(self.unexpected(self.peek()).into());
                }
                patterns.extend(split_on_commas(self.parse_word()?));
                self.skip_blanks();
                if self.peek_kind() == TokenKind::Pipe {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::RightParen, "')' after case pattern")?;

            let body = self.parse_compound_list(&["esac"])?;
            if self.peek_kind() == TokenKind::DoubleSemicolon {
                self.advance();
            } else if !self.at_keyword(&["esac"]) {
                return Err(self.unexpected(self.peek()).into());
            }

            if patterns.iter().any(|p| p.as_bare() == Some("*")) {
                default.get_or_insert(body);
            } else {
                clauses.push(CaseClause { patterns, body });
            }
        }

        Ok(Executer::Case(CaseCommand {
            word,
            clauses,
            default,
        }))
    }

    // ---- words --------------------------------------------------------

    /// Parse one word: the longest run of word-part tokens.
    fn parse_word(&mut self) -> Result<Word> {
        let mut parts = Vec::new();
        while self.parse_part(&mut parts)? {}
        Ok(Word { parts })
    }

    /// Parse the word part at the current token into `parts`. Returns
    /// false when the token does not continue a word.
    fn parse_part(&mut self, parts: &mut Vec<Expander>) -> Result<bool> {
        let token = self.peek().clone();
        let quoted = token.quoted || self.in_quote;

        match token.kind {
            TokenKind::Literal | TokenKind::Equals => {
                self.advance();
                parts.push(Expander::Literal {
                    text: token.literal,
                    quoted,
                });
            }
            TokenKind::Variable => {
                self.advance();
                parts.push(Expander::Variable {
                    name: token.literal,
                    quoted,
                });
            }
            TokenKind::Quote => {
                if self.in_quote {
                    return Ok(false);
                }
                self.advance();
                self.in_quote = true;
                let start = parts.len();
                while self.peek_kind() != TokenKind::Quote {
                    if !self.parse_part(parts)? {
                        self.in_quote = false;
                        return Err(self.unexpected(self.peek()).into());
                    }
                }
                self.advance();
                self.in_quote = false;
                if parts.len() == start {
                    parts.push(Expander::Literal {
                        text: String::new(),
                        quoted: true,
                    });
                }
            }
            TokenKind::BeginSubst => {
                self.advance();
                let saved_depth = std::mem::replace(&mut self.loop_depth, 0);
                let saved_quote = std::mem::replace(&mut self.in_quote, false);
                let commands = self.parse_compound_list(&[]);
                self.loop_depth = saved_depth;
                let commands = commands?;
                let end = self.expect(TokenKind::EndSubst, "')'");
                self.in_quote = saved_quote;
                end?;
                parts.push(Expander::CommandSubst {
                    script: Script { commands },
                    quoted,
                });
            }
            TokenKind::BeginArith => {
                self.advance();
                let expr = if self.peek_kind() == TokenKind::EndArith {
                    Expr::Number(0)
                } else {
                    self.parse_arith(0)?
                };
                self.expect(TokenKind::EndArith, "'))'")?;
                parts.push(Expander::Arithmetic { expr, quoted });
            }
            TokenKind::BeginParam => {
                let saved_quote = std::mem::replace(&mut self.in_quote, false);
                let part = self.parse_parameter(quoted);
                self.in_quote = saved_quote;
                parts.push(part?);
            }
            TokenKind::BeginBrace => {
                if self.in_quote {
                    return Err(ParseError::at(
                        "brace expansion inside double quotes",
                        token.position,
                    )
                    .into());
                }
                parts.push(self.parse_brace()?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// `${...}` starting at the `${` token.
    fn parse_parameter(&mut self, quoted: bool) -> Result<Expander> {
        self.advance();

        if self.peek_kind() == TokenKind::ParamOp(ParamOp::Length) {
            self.advance();
            let name = self.expect(TokenKind::Literal, "parameter name")?.literal;
            self.expect(TokenKind::EndParam, "'}'")?;
            return Ok(Expander::Length { name, quoted });
        }

        let name = self.expect(TokenKind::Literal, "parameter name")?.literal;
        let token = self.advance();
        let op = match token.kind {
            TokenKind::EndParam => return Ok(Expander::Variable { name, quoted }),
            TokenKind::ParamOp(op) => op,
            _ => return Err(bad_substitution(&token)),
        };

        let expander = match op {
            ParamOp::Length => return Err(bad_substitution(&token)),
            ParamOp::Slice => {
                let offset = self.parse_slice_operand()?;
                let length = if self.peek_kind() == TokenKind::Colon {
                    self.advance();
                    Some(self.parse_slice_operand()?)
                } else {
                    None
                };
                Expander::Slice {
                    name,
                    offset,
                    length,
                    quoted,
                }
            }
            ParamOp::TrimPrefix
            | ParamOp::TrimPrefixLong
            | ParamOp::TrimSuffix
            | ParamOp::TrimSuffixLong => {
                let side = if matches!(op, ParamOp::TrimPrefix | ParamOp::TrimPrefixLong) {
                    TrimSide::Prefix
                } else {
                    TrimSide::Suffix
                };
                Expander::Trim {
                    name,
                    pattern: self.parse_word()?,
                    side,
                    greedy: matches!(op, ParamOp::TrimPrefixLong | ParamOp::TrimSuffixLong),
                    quoted,
                }
            }
            ParamOp::Replace
            | ParamOp::ReplaceAll
            | ParamOp::ReplacePrefix
            | ParamOp::ReplaceSuffix => {
                let pattern = self.parse_word()?;
                let replacement = if self.peek_kind() == TokenKind::Slash {
                    self.advance();
                    self.parse_word()?
                } else {
                    Word::default()
                };
                let mode = match op {
                    ParamOp::ReplaceAll => ReplaceMode::All,
                    ParamOp::ReplacePrefix => ReplaceMode::Prefix,
                    ParamOp::ReplaceSuffix => ReplaceMode::Suffix,
                    _ => ReplaceMode::First,
                };
                Expander::Replace {
                    name,
                    pattern,
                    replacement,
                    mode,
                    quoted,
                }
            }
            ParamOp::LowerFirst | ParamOp::LowerAll | ParamOp::UpperFirst | ParamOp::UpperAll => {
                let scope = if matches!(op, ParamOp::LowerFirst | ParamOp::UpperFirst) {
                    FoldScope::First
                } else {
                    FoldScope::All
                };
                let direction = if matches!(op, ParamOp::UpperFirst | ParamOp::UpperAll) {
                    FoldDirection::Upper
                } else {
                    FoldDirection::Lower
                };
                Expander::CaseFold {
                    name,
                    scope,
                    direction,
                    quoted,
                }
            }
            ParamOp::UseDefault { colon }
            | ParamOp::AssignDefault { colon }
            | ParamOp::UseAlternate { colon }
            | ParamOp::ErrorIfUnset { colon } => {
                let kind = match op {
                    ParamOp::UseDefault { .. } => DefaultKind::Use,
                    ParamOp::AssignDefault { .. } => DefaultKind::Assign,
                    ParamOp::UseAlternate { .. } => DefaultKind::Alternate,
                    _ => DefaultKind::Error,
                };
                Expander::Default {
                    name,
                    kind,
                    colon,
                    word: self.parse_word()?,
                    quoted,
                }
            }
        };

        self.expect(TokenKind::EndParam, "'}'")?;
        Ok(expander)
    }

    /// Offset or length of `${name:offset:length}`; empty means 0.
    fn parse_slice_operand(&mut self) -> Result<Expr> {
        if self.peek_kind() == TokenKind::Literal {
            let token = self.advance();
            if token.literal.trim().is_empty() {
                return Ok(Expr::Number(0));
            }
            return parse_arithmetic(&token.literal);
        }
        Ok(Expr::Number(0))
    }

    /// `{a,b}` or `{from..to[..step]}` starting at the `{` token.
    fn parse_brace(&mut self) -> Result<Expander> {
        let open = self.advance();
        let first = self.parse_word()?;

        if self.peek_kind() == TokenKind::Range {
            self.advance();
            let to = self.parse_word()?;
            let step = if self.peek_kind() == TokenKind::Range {
                self.advance();
                Some(self.parse_word()?)
            } else {
                None
            };
            self.expect(TokenKind::EndBrace, "'}'")?;
            return brace_range(&first, &to, step.as_ref(), &open);
        }

        let mut alternatives = vec![first];
        while self.peek_kind() == TokenKind::Comma {
            self.advance();
            alternatives.push(self.parse_word()?);
        }
        self.expect(TokenKind::EndBrace, "'}'")?;
        Ok(Expander::ListBrace { alternatives })
    }
}

fn bad_substitution(token: &Token) -> Error {
    ParseError::at(format!("bad substitution near '{}'", token.literal), token.position).into()
}

/// Text of a word made only of literal parts.
fn literal_text(word: &Word) -> Option<String> {
    let mut text = String::new();
    for part in &word.parts {
        match part {
            Expander::Literal { text: t, .. } => text.push_str(t),
            _ => return None,
        }
    }
    Some(text)
}

fn brace_range(from: &Word, to: &Word, step: Option<&Word>, open: &Token) -> Result<Expander> {
    let invalid = || -> Error {
        ParseError::at(
            format!(
                "invalid brace range '{{{from}..{to}{}}}'",
                step.map(|s| format!("..{s}")).unwrap_or_default()
            ),
            open.position,
        )
        .into()
    };
    let int = |word: &Word| -> Option<(i64, String)> {
        let text = literal_text(word)?;
        text.parse::<i64>().ok().map(|n| (n, text))
    };

    let (from_value, from_text) = int(from).ok_or_else(invalid)?;
    let (to_value, _) = int(to).ok_or_else(invalid)?;
    let step_value = match step {
        Some(word) => int(word).ok_or_else(invalid)?.0,
        None => 1,
    };

    let digits = from_text.trim_start_matches('-');
    let width = if digits.len() > 1 && digits.starts_with('0') {
        from_text.len()
    } else {
        0
    };

    Ok(Expander::RangeBrace {
        from: from_value,
        to: to_value,
        step: step_value,
        width,
    })
}

/// `a,b)` in a case clause lists two patterns.
fn split_on_commas(word: Word) -> Vec<Word> {
    let mut words = vec![Word::default()];
    for part in word.parts {
        match part {
            Expander::Literal {
                text,
                quoted: false,
            } if text.contains(',') => {
                for (i, piece) in text.split(',').enumerate() {
                    if i > 0 {
                        words.push(Word::default());
                    }
                    if !piece.is_empty() {
                        if let Some(current) = words.last_mut() {
                            current.parts.push(Expander::Literal {
                                text: piece.to_string(),
                                quoted: false,
                            });
                        }
                    }
                }
            }
            part => {
                if let Some(current) = words.last_mut() {
                    current.parts.push(part);
                }
            }
        }
    }
    words.retain(|w| !w.parts.is_empty());
    words
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Vec<Executer> {
        Parser::new(input).parse().unwrap().commands
    }

    fn parse_err(input: &str) -> Error {
        Parser::new(input).parse().unwrap_err()
    }

    fn lit(text: &str) -> Expander {
        Expander::Literal {
            text: text.into(),
            quoted: false,
        }
    }

    fn simple(words: &[&str]) -> Executer {
        Executer::Simple(SimpleCommand {
            assignments: vec![],
            words: words.iter().map(|w| Word::literal(*w)).collect(),
            redirects: vec![],
        })
    }

    #[test]
    fn test_parse_simple_command() {
        assert_eq!(parse("echo hello world"), vec![simple(&["echo", "hello", "world"])]);
    }

    #[test]
    fn test_parse_empty_and_comments() {
        assert!(parse("").is_empty());
        assert!(parse("\n\n# only a comment\n").is_empty());
    }

    #[test]
    fn test_parse_sequence() {
        assert_eq!(
            parse("a; b\nc &"),
            vec![simple(&["a"]), simple(&["b"]), simple(&["c"])]
        );
    }

    #[test]
    fn test_parse_pipeline() {
        let commands = parse("a | b |& c");
        let Executer::Pipeline(stages) = &commands[0] else {
            panic!("expected pipeline, got {:?}", commands[0]);
        };
        assert_eq!(stages.len(), 3);
        assert!(!stages[0].merge_stderr);
        assert!(stages[1].merge_stderr);
        assert!(!stages[2].merge_stderr);
    }

    #[test]
    fn test_pipe_binds_tighter_than_and_or() {
        let commands = parse("a | b && c || d");
        let Executer::Or(left, right) = &commands[0] else {
            panic!("expected or");
        };
        assert_eq!(**right, simple(&["d"]));
        let Executer::And(pipeline, c) = &**left else {
            panic!("expected and");
        };
        assert!(matches!(**pipeline, Executer::Pipeline(_)));
        assert_eq!(**c, simple(&["c"]));
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse("x=1"),
            vec![Executer::Assign(Assignment {
                name: "x".into(),
                value: Word::literal("1"),
            })]
        );

        let commands = parse("A=1 B= env");
        let Executer::Simple(cmd) = &commands[0] else {
            panic!("expected simple command");
        };
        assert_eq!(cmd.assignments.len(), 2);
        assert_eq!(cmd.assignments[1].value, Word::default());
        assert_eq!(cmd.words, vec![Word::literal("env")]);
    }

    #[test]
    fn test_equals_in_argument_is_literal() {
        let commands = parse("echo a=b");
        let Executer::Simple(cmd) = &commands[0] else {
            panic!("expected simple command");
        };
        assert_eq!(cmd.words[1].parts, vec![lit("a"), lit("="), lit("b")]);
    }

    #[test]
    fn test_parse_quoted_word() {
        let commands = parse("echo \"a $x\" ''");
        let Executer::Simple(cmd) = &commands[0] else {
            panic!("expected simple command");
        };
        assert_eq!(
            cmd.words[1].parts,
            vec![
                Expander::Literal {
                    text: "a ".into(),
                    quoted: true
                },
                Expander::Variable {
                    name: "x".into(),
                    quoted: true
                },
            ]
        );
        assert_eq!(
            cmd.words[2].parts,
            vec![Expander::Literal {
                text: "".into(),
                quoted: true
            }]
        );
    }

    #[test]
    fn test_parse_redirects() {
        let commands = parse("cmd < in > out 2>&1 &> both");
        let Executer::Simple(cmd) = &commands[0] else {
            panic!("expected simple command");
        };
        assert_eq!(
            cmd.redirects,
            vec![
                Redirect {
                    fd: 0,
                    op: RedirectOp::Read(Word::literal("in"))
                },
                Redirect {
                    fd: 1,
                    op: RedirectOp::Write(Word::literal("out"))
                },
                Redirect {
                    fd: 2,
                    op: RedirectOp::Dup(1)
                },
                Redirect {
                    fd: 1,
                    op: RedirectOp::Write(Word::literal("both"))
                },
                Redirect {
                    fd: 2,
                    op: RedirectOp::Dup(1)
                },
            ]
        );
    }

    #[test]
    fn test_missing_redirect_target() {
        assert!(matches!(parse_err("echo >"), Error::Parse(_)));
    }

    #[test]
    fn test_parse_if_elif_else() {
        let commands = parse("if a; then b; elif c; then d; else e; fi");
        let Executer::If(outer) = &commands[0] else {
            panic!("expected if");
        };
        assert_eq!(outer.condition, vec![simple(&["a"])]);
        let alternative = outer.alternative.as_ref().unwrap();
        let Executer::If(inner) = &alternative[0] else {
            panic!("expected nested if");
        };
        assert_eq!(inner.condition, vec![simple(&["c"])]);
        assert_eq!(inner.alternative, Some(vec![simple(&["e"])]));
    }

    #[test]
    fn test_parse_for_with_else() {
        let commands = parse("for x in a b; do echo $x; else echo none; done");
        let Executer::For(for_loop) = &commands[0] else {
            panic!("expected for");
        };
        assert_eq!(for_loop.variable, "x");
        assert_eq!(
            for_loop.words,
            Some(vec![Word::literal("a"), Word::literal("b")])
        );
        assert_eq!(for_loop.otherwise, Some(vec![simple(&["echo", "none"])]));
    }

    #[test]
    fn test_parse_for_without_in() {
        let commands = parse("for x; do echo; done");
        let Executer::For(for_loop) = &commands[0] else {
            panic!("expected for");
        };
        assert_eq!(for_loop.words, None);

        let commands = parse("for x in ; do echo; done");
        let Executer::For(for_loop) = &commands[0] else {
            panic!("expected for");
        };
        assert_eq!(for_loop.words, Some(vec![]));
    }

    #[test]
    fn test_parse_while_until() {
        let commands = parse("while a\ndo\n  b\ndone\nuntil c; do d; else e; done");
        assert!(matches!(commands[0], Executer::While(_)));
        let Executer::Until(until) = &commands[1] else {
            panic!("expected until");
        };
        assert_eq!(until.otherwise, Some(vec![simple(&["e"])]));
    }

    #[test]
    fn test_parse_case() {
        let commands = parse("case $x in\n  a|b) one ;;\n  (c,d) two ;;\n  *) other ;;\nesac");
        let Executer::Case(case) = &commands[0] else {
            panic!("expected case");
        };
        assert_eq!(case.clauses.len(), 2);
        assert_eq!(
            case.clauses[0].patterns,
            vec![Word::literal("a"), Word::literal("b")]
        );
        assert_eq!(
            case.clauses[1].patterns,
            vec![Word::literal("c"), Word::literal("d")]
        );
        assert_eq!(case.default, Some(vec![simple(&["other"])]));
    }

    #[test]
    fn test_break_outside_loop() {
        let err = parse_err("break");
        assert!(err.to_string().contains("outside of a loop"), "{err}");
        assert!(Parser::new("while true; do break; done").parse().is_ok());
    }

    #[test]
    fn test_break_in_substitution_resets_loop_depth() {
        assert!(Parser::new("while true; do echo $(break); done")
            .parse()
            .is_err());
    }

    #[test]
    fn test_unexpected_keyword() {
        assert!(matches!(parse_err("fi"), Error::Parse(_)));
        assert!(matches!(parse_err("if true; then echo"), Error::Parse(_)));
        assert!(matches!(parse_err("echo )"), Error::Parse(_)));
    }

    #[test]
    fn test_keywords_are_plain_words_as_arguments() {
        assert_eq!(parse("echo if then fi"), vec![simple(&["echo", "if", "then", "fi"])]);
    }

    #[test]
    fn test_parse_subshell_and_group() {
        let commands = parse("(a; b) > out\n{ c; }");
        let Executer::Redirected(inner, redirects) = &commands[0] else {
            panic!("expected redirected subshell");
        };
        assert!(matches!(**inner, Executer::Subshell(ref body) if body.len() == 2));
        assert_eq!(redirects.len(), 1);
        assert_eq!(commands[1], Executer::List(vec![simple(&["c"])]));
    }

    #[test]
    fn test_parse_parameter_operators() {
        let commands = parse("echo ${x:-d} ${#y} ${z//a/b} ${w^^} ${v:1:2} ${u%.*}");
        let Executer::Simple(cmd) = &commands[0] else {
            panic!("expected simple command");
        };
        assert!(matches!(
            &cmd.words[1].parts[0],
            Expander::Default {
                kind: DefaultKind::Use,
                colon: true,
                ..
            }
        ));
        assert_eq!(
            cmd.words[2].parts[0],
            Expander::Length {
                name: "y".into(),
                quoted: false
            }
        );
        assert!(matches!(
            &cmd.words[3].parts[0],
            Expander::Replace {
                mode: ReplaceMode::All,
                ..
            }
        ));
        assert!(matches!(
            &cmd.words[4].parts[0],
            Expander::CaseFold {
                scope: FoldScope::All,
                direction: FoldDirection::Upper,
                ..
            }
        ));
        assert_eq!(
            cmd.words[5].parts[0],
            Expander::Slice {
                name: "v".into(),
                offset: Expr::Number(1),
                length: Some(Expr::Number(2)),
                quoted: false,
            }
        );
        let Expander::Trim { pattern, .. } = &cmd.words[6].parts[0] else {
            panic!("expected trim");
        };
        assert_eq!(pattern.parts, vec![lit(".*")]);
    }

    #[test]
    fn test_pattern_inside_quoted_parameter_stays_unquoted() {
        let commands = parse("echo \"${f%.*}\"");
        let Executer::Simple(cmd) = &commands[0] else {
            panic!("expected simple command");
        };
        let Expander::Trim { pattern, quoted, .. } = &cmd.words[1].parts[0] else {
            panic!("expected trim");
        };
        assert!(quoted);
        assert_eq!(pattern.parts, vec![lit(".*")]);
    }

    #[test]
    fn test_length_records_quoting() {
        let commands = parse("echo \"${#x}\" ${#x}");
        let Executer::Simple(cmd) = &commands[0] else {
            panic!("expected simple command");
        };
        assert!(cmd.words[1].parts[0].is_quoted());
        assert!(!cmd.words[2].parts[0].is_quoted());
    }

    #[test]
    fn test_bad_substitution() {
        assert!(Parser::new("echo ${}").parse().is_err());
        assert!(Parser::new("echo ${x^^y}").parse().is_err());
    }

    #[test]
    fn test_parse_brace_expansion() {
        let commands = parse("echo {A,B}{1..3} {01..10..3}");
        let Executer::Simple(cmd) = &commands[0] else {
            panic!("expected simple command");
        };
        assert_eq!(
            cmd.words[1].parts,
            vec![
                Expander::ListBrace {
                    alternatives: vec![Word::literal("A"), Word::literal("B")]
                },
                Expander::RangeBrace {
                    from: 1,
                    to: 3,
                    step: 1,
                    width: 0
                },
            ]
        );
        assert_eq!(
            cmd.words[2].parts,
            vec![Expander::RangeBrace {
                from: 1,
                to: 10,
                step: 3,
                width: 2
            }]
        );
    }

    #[test]
    fn test_bad_brace_range() {
        let err = parse_err("echo {1..x}");
        assert!(err.to_string().contains("invalid brace range"), "{err}");
    }

    #[test]
    fn test_parse_command_substitution() {
        let commands = parse("x=$(echo hi | tr a b)");
        let Executer::Assign(assign) = &commands[0] else {
            panic!("expected assignment");
        };
        let Expander::CommandSubst { script, quoted } = &assign.value.parts[0] else {
            panic!("expected substitution");
        };
        assert!(!quoted);
        assert!(matches!(script.commands[0], Executer::Pipeline(_)));
    }

    #[test]
    fn test_parse_arithmetic_expansion() {
        let commands = parse("echo $((1 + 2 * 3))");
        let Executer::Simple(cmd) = &commands[0] else {
            panic!("expected simple command");
        };
        assert_eq!(
            cmd.words[1].parts[0],
            Expander::Arithmetic {
                expr: Expr::Binary(
                    BinaryOp::Add,
                    Box::new(Expr::Number(1)),
                    Box::new(Expr::Binary(
                        BinaryOp::Mul,
                        Box::new(Expr::Number(2)),
                        Box::new(Expr::Number(3))
                    ))
                ),
                quoted: false,
            }
        );
    }

    #[test]
    fn test_lex_error_surfaces() {
        assert!(matches!(parse_err("echo \"unterminated"), Error::Lex(_)));
    }
}
