//! AST types for parsed shoal scripts
//!
//! Four closed trees make up a script:
//! - [`Executer`]: statements and control structures
//! - [`Word`] / [`Expander`]: one shell word and the expansions inside it
//! - [`Expr`]: arithmetic
//! - [`Tester`]: `[[ ]]` conditions
//!
//! The parser builds these once; nothing mutates them afterwards.

use std::fmt;

/// A complete script.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub commands: Vec<Executer>,
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Executer {
    /// A simple command (e.g., `A=1 echo hello > out`)
    Simple(SimpleCommand),

    /// Two or more commands joined by `|` or `|&`
    Pipeline(Vec<PipelineStage>),

    /// `left && right`
    And(Box<Executer>, Box<Executer>),

    /// `left || right`
    Or(Box<Executer>, Box<Executer>),

    /// Statements run in sequence (`{ a; b; }` bodies, `a; b` on one line)
    List(Vec<Executer>),

    /// `name=value` with no command
    Assign(Assignment),

    /// `( ... )`
    Subshell(Vec<Executer>),

    /// `for name in words; do body [else alt] done`
    For(ForLoop),

    /// `while cond; do body [else alt] done`
    While(Loop),

    /// `until cond; do body [else alt] done`
    Until(Loop),

    /// `if / elif / else / fi`
    If(IfCommand),

    /// `case word in ... esac`
    Case(CaseCommand),

    /// `[[ ... ]]`
    Test(Tester),

    /// A compound command followed by redirections (`while ...; done < in`)
    Redirected(Box<Executer>, Vec<Redirect>),

    Break,
    Continue,
}

/// A simple command with arguments and redirections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimpleCommand {
    /// Variable assignments before the command
    pub assignments: Vec<Assignment>,
    /// Command name followed by its arguments
    pub words: Vec<Word>,
    /// Redirections, applied in source order
    pub redirects: Vec<Redirect>,
}

/// One command in a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStage {
    pub command: Executer,
    /// Stage was followed by `|&`: its stderr goes into the pipe too
    pub merge_stderr: bool,
}

/// Variable assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub value: Word,
}

/// For loop. `words` is `None` for `for name; do`, which iterates the
/// positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub variable: String,
    pub words: Option<Vec<Word>>,
    pub body: Vec<Executer>,
    /// Runs when there was nothing to iterate
    pub otherwise: Option<Vec<Executer>>,
}

/// While or until loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    pub condition: Vec<Executer>,
    pub body: Vec<Executer>,
    /// Runs when the body never ran
    pub otherwise: Option<Vec<Executer>>,
}

/// If statement. `elif` chains nest another [`Executer::If`] as the sole
/// statement of `alternative`.
#[derive(Debug, Clone, PartialEq)]
pub struct IfCommand {
    pub condition: Vec<Executer>,
    pub consequence: Vec<Executer>,
    pub alternative: Option<Vec<Executer>>,
}

/// Case statement.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseCommand {
    pub word: Word,
    pub clauses: Vec<CaseClause>,
    /// Body of the `*)` clause
    pub default: Option<Vec<Executer>>,
}

/// A single case clause.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseClause {
    pub patterns: Vec<Word>,
    pub body: Vec<Executer>,
}

/// I/O redirection on logical descriptor `fd` (0, 1 or 2).
#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    pub fd: u8,
    pub op: RedirectOp,
}

/// What a descriptor is redirected to.
#[derive(Debug, Clone, PartialEq)]
pub enum RedirectOp {
    /// `< file`
    Read(Word),
    /// `> file`
    Write(Word),
    /// `>> file`
    Append(Word),
    /// `>&N`: copy whatever descriptor N points at right now
    Dup(u8),
}

/// A word (potentially with expansions).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Word {
    pub parts: Vec<Expander>,
}

impl Word {
    /// Create a simple literal word.
    pub fn literal(s: impl Into<String>) -> Self {
        Self {
            parts: vec![Expander::Literal {
                text: s.into(),
                quoted: false,
            }],
        }
    }

    /// The text of a word made of exactly one unquoted literal.
    ///
    /// Keywords and alias names are only recognized in this form.
    pub fn as_bare(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [Expander::Literal {
                text,
                quoted: false,
            }] => Some(text),
            _ => None,
        }
    }

    /// Word contains a brace expansion at its top level.
    pub fn has_brace(&self) -> bool {
        self.parts.iter().any(|p| {
            matches!(
                p,
                Expander::ListBrace { .. } | Expander::RangeBrace { .. }
            )
        })
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

/// Parts of a word.
#[derive(Debug, Clone, PartialEq)]
pub enum Expander {
    /// Literal text. Quoted text is never split or globbed.
    Literal { text: String, quoted: bool },

    /// `$name` or `${name}`
    Variable { name: String, quoted: bool },

    /// `${#name}`
    Length { name: String, quoted: bool },

    /// `${name:offset[:length]}`
    Slice {
        name: String,
        offset: Expr,
        length: Option<Expr>,
        quoted: bool,
    },

    /// `${name#pat}`, `${name##pat}`, `${name%pat}`, `${name%%pat}`
    Trim {
        name: String,
        pattern: Word,
        side: TrimSide,
        greedy: bool,
        quoted: bool,
    },

    /// `${name/pat/rep}` and its `//`, `/#`, `/%` forms
    Replace {
        name: String,
        pattern: Word,
        replacement: Word,
        mode: ReplaceMode,
        quoted: bool,
    },

    /// `${name,}`, `${name,,}`, `${name^}`, `${name^^}`
    CaseFold {
        name: String,
        scope: FoldScope,
        direction: FoldDirection,
        quoted: bool,
    },

    /// `${name:-word}` and the rest of the default family
    Default {
        name: String,
        kind: DefaultKind,
        /// `:` form: an empty value counts as unset
        colon: bool,
        word: Word,
        quoted: bool,
    },

    /// `{a,b,c}`
    ListBrace { alternatives: Vec<Word> },

    /// `{from..to[..step]}`
    RangeBrace {
        from: i64,
        to: i64,
        step: i64,
        /// Zero padding width, from a `from` literal with a leading zero
        width: usize,
    },

    /// `$(( expr ))`
    Arithmetic { expr: Expr, quoted: bool },

    /// `$( script )`
    CommandSubst { script: Script, quoted: bool },
}

impl Expander {
    /// The expansion result is exempt from field splitting and globbing.
    pub fn is_quoted(&self) -> bool {
        match self {
            Expander::Literal { quoted, .. }
            | Expander::Variable { quoted, .. }
            | Expander::Length { quoted, .. }
            | Expander::Slice { quoted, .. }
            | Expander::Trim { quoted, .. }
            | Expander::Replace { quoted, .. }
            | Expander::CaseFold { quoted, .. }
            | Expander::Default { quoted, .. }
            | Expander::Arithmetic { quoted, .. }
            | Expander::CommandSubst { quoted, .. } => *quoted,
            Expander::ListBrace { .. } | Expander::RangeBrace { .. } => false,
        }
    }
}

impl fmt::Display for Expander {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expander::Literal { text, .. } => write!(f, "{text}"),
            Expander::Variable { name, .. } => write!(f, "${name}"),
            Expander::Length { name, .. } => write!(f, "${{#{name}}}"),
            Expander::Slice { name, .. } => write!(f, "${{{name}:...}}"),
            Expander::Trim {
                name,
                pattern,
                side,
                greedy,
                ..
            } => {
                let op = match (side, greedy) {
                    (TrimSide::Prefix, false) => "#",
                    (TrimSide::Prefix, true) => "##",
                    (TrimSide::Suffix, false) => "%",
                    (TrimSide::Suffix, true) => "%%",
                };
                write!(f, "${{{name}{op}{pattern}}}")
            }
            Expander::Replace {
                name,
                pattern,
                replacement,
                mode,
                ..
            } => {
                let op = match mode {
                    ReplaceMode::First => "/",
                    ReplaceMode::All => "//",
                    ReplaceMode::Prefix => "/#",
                    ReplaceMode::Suffix => "/%",
                };
                write!(f, "${{{name}{op}{pattern}/{replacement}}}")
            }
            Expander::CaseFold {
                name,
                scope,
                direction,
                ..
            } => {
                let op = match (direction, scope) {
                    (FoldDirection::Lower, FoldScope::First) => ",",
                    (FoldDirection::Lower, FoldScope::All) => ",,",
                    (FoldDirection::Upper, FoldScope::First) => "^",
                    (FoldDirection::Upper, FoldScope::All) => "^^",
                };
                write!(f, "${{{name}{op}}}")
            }
            Expander::Default {
                name,
                kind,
                colon,
                word,
                ..
            } => {
                let colon = if *colon { ":" } else { "" };
                let op = match kind {
                    DefaultKind::Use => "-",
                    DefaultKind::Assign => "=",
                    DefaultKind::Alternate => "+",
                    DefaultKind::Error => "?",
                };
                write!(f, "${{{name}{colon}{op}{word}}}")
            }
            Expander::ListBrace { alternatives } => {
                write!(f, "{{")?;
                for (i, alt) in alternatives.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{alt}")?;
                }
                write!(f, "}}")
            }
            Expander::RangeBrace { from, to, step, .. } => {
                write!(f, "{{{from}..{to}..{step}}}")
            }
            Expander::Arithmetic { .. } => write!(f, "$((...))"),
            Expander::CommandSubst { .. } => write!(f, "$(...)"),
        }
    }
}

/// Which end of the value a trim works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimSide {
    Prefix,
    Suffix,
}

/// Which occurrences a replacement touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceMode {
    First,
    All,
    /// Only a match anchored at the start
    Prefix,
    /// Only a match anchored at the end
    Suffix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldScope {
    First,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldDirection {
    Upper,
    Lower,
}

/// The default-value family of parameter operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultKind {
    /// `-`: substitute the word when unset
    Use,
    /// `=`: substitute and assign the word when unset
    Assign,
    /// `+`: substitute the word only when set
    Alternate,
    /// `?`: raise with the word as message when unset
    Error,
}

/// Arithmetic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(i64),
    Variable(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    /// `name = value` or a compound form such as `name += value`
    Assign(String, Option<BinaryOp>, Box<Expr>),
    /// `${...}` or `$(...)`: expanded, then evaluated as arithmetic text
    Expansion(Word),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    /// `!`
    Not,
    /// `~`
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Shl,
    Shr,
    BitAnd,
    BitXor,
    BitOr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    /// Operator for the text of an arithmetic operator token.
    pub fn from_operator(op: &str) -> Option<Self> {
        Some(match op {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            "**" => BinaryOp::Pow,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            "&" => BinaryOp::BitAnd,
            "^" => BinaryOp::BitXor,
            "|" => BinaryOp::BitOr,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "&&" => BinaryOp::And,
            "||" => BinaryOp::Or,
            _ => return None,
        })
    }

    /// Operator of a compound assignment such as `+=`.
    pub fn from_compound_assign(op: &str) -> Option<Self> {
        op.strip_suffix('=')
            .filter(|base| !base.is_empty() && !matches!(*base, "=" | "!" | "<" | ">"))
            .and_then(Self::from_operator)
    }
}

/// `[[ ]]` condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Tester {
    /// Bare word: true when it expands to a non-empty string
    Single(Word),
    Unary(UnaryTest, Word),
    Not(Box<Tester>),
    Binary(BinaryTest, Word, Word),
    And(Box<Tester>, Box<Tester>),
    Or(Box<Tester>, Box<Tester>),
}

/// Unary `[[ ]]` predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryTest {
    /// `-e`, `-a`
    Exists,
    /// `-r`
    Readable,
    /// `-w`
    Writable,
    /// `-x`
    Executable,
    /// `-f`
    RegularFile,
    /// `-d`
    Directory,
    /// `-L`, `-h`
    Symlink,
    /// `-s`
    NonEmptyFile,
    /// `-z`
    EmptyString,
    /// `-n`
    NonEmptyString,
    /// `-v`
    VariableSet,
}

impl UnaryTest {
    pub fn from_flag(flag: &str) -> Option<Self> {
        Some(match flag {
            "-e" | "-a" => UnaryTest::Exists,
            "-r" => UnaryTest::Readable,
            "-w" => UnaryTest::Writable,
            "-x" => UnaryTest::Executable,
            "-f" => UnaryTest::RegularFile,
            "-d" => UnaryTest::Directory,
            "-L" | "-h" => UnaryTest::Symlink,
            "-s" => UnaryTest::NonEmptyFile,
            "-z" => UnaryTest::EmptyString,
            "-n" => UnaryTest::NonEmptyString,
            "-v" => UnaryTest::VariableSet,
            _ => return None,
        })
    }
}

/// Binary `[[ ]]` operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryTest {
    /// `==`, `=`
    StrEq,
    /// `!=`
    StrNe,
    /// `<`
    StrLt,
    /// `>`
    StrGt,
    /// `=~`
    Matches,
    NumEq,
    NumNe,
    NumLt,
    NumLe,
    NumGt,
    NumGe,
    /// `-nt`
    NewerThan,
    /// `-ot`
    OlderThan,
    /// `-ef`
    SameFile,
}

impl BinaryTest {
    pub fn from_operator(op: &str) -> Option<Self> {
        Some(match op {
            "==" | "=" => BinaryTest::StrEq,
            "!=" => BinaryTest::StrNe,
            "<" => BinaryTest::StrLt,
            ">" => BinaryTest::StrGt,
            "=~" => BinaryTest::Matches,
            "-eq" => BinaryTest::NumEq,
            "-ne" => BinaryTest::NumNe,
            "-lt" => BinaryTest::NumLt,
            "-le" => BinaryTest::NumLe,
            "-gt" => BinaryTest::NumGt,
            "-ge" => BinaryTest::NumGe,
            "-nt" => BinaryTest::NewerThan,
            "-ot" => BinaryTest::OlderThan,
            "-ef" => BinaryTest::SameFile,
            _ => return None,
        })
    }
}
