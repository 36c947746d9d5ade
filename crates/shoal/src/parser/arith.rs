//! Arithmetic sub-grammar
//!
//! Precedence climbing over binding powers, loosest first:
//!
//! ```text
//! =  op=         right-assoc
//! ?:             right-assoc
//! ||
//! &&
//! == !=
//! < <= > >=
//! |
//! ^
//! &
//! << >>
//! + -
//! * / %
//! **             right-assoc
//! unary + - ! ~
//! ```

use super::ast::{BinaryOp, Expr, UnaryOp, Word};
use super::lexer::Lexer;
use super::tokens::TokenKind;
use super::Parser;
use crate::error::{ParseError, Result};

/// Binding power of prefix operators.
const PREFIX_BP: u8 = 27;

/// Left and right binding power of an infix operator.
fn infix_bp(op: BinaryOp) -> (u8, u8) {
    match op {
        BinaryOp::Or => (5, 6),
        BinaryOp::And => (7, 8),
        BinaryOp::Eq | BinaryOp::Ne => (9, 10),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => (11, 12),
        BinaryOp::BitOr => (13, 14),
        BinaryOp::BitXor => (15, 16),
        BinaryOp::BitAnd => (17, 18),
        BinaryOp::Shl | BinaryOp::Shr => (19, 20),
        BinaryOp::Add | BinaryOp::Sub => (21, 22),
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => (23, 24),
        BinaryOp::Pow => (26, 25),
    }
}

const ASSIGN_BP: (u8, u8) = (2, 1);
const TERNARY_BP: (u8, u8) = (4, 3);

/// Parse bare arithmetic text such as the offset of `${x:1+1}`.
pub fn parse_arithmetic(text: &str) -> Result<Expr> {
    let tokens = Lexer::arithmetic(text).tokenize()?;
    let mut parser = Parser::from_tokens(tokens);
    if parser.peek_kind() == TokenKind::Eof {
        return Ok(Expr::Number(0));
    }
    let expr = parser.parse_arith(0)?;
    let token = parser.peek();
    if token.kind != TokenKind::Eof {
        return Err(parser.unexpected(token).into());
    }
    Ok(expr)
}

/// Parse an integer literal: decimal, `0x` hex, leading-zero octal or
/// `base#digits` with a base from 2 to 64. A leading sign is accepted.
pub fn parse_integer(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    if digits.is_empty() {
        return None;
    }

    let value = if let Some((base, rest)) = digits.split_once('#') {
        let base: u32 = base.parse().ok()?;
        parse_based(rest, base)?
    } else if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };

    Some(if negative { value.wrapping_neg() } else { value })
}

/// Digits `0-9a-zA-Z@_` for bases up to 64; letters are case-insensitive
/// up to base 36.
fn parse_based(digits: &str, base: u32) -> Option<i64> {
    if !(2..=64).contains(&base) || digits.is_empty() {
        return None;
    }
    let mut value: i64 = 0;
    for c in digits.chars() {
        let digit = match c {
            '0'..='9' => c as u32 - '0' as u32,
            'a'..='z' => c as u32 - 'a' as u32 + 10,
            'A'..='Z' if base <= 36 => c as u32 - 'A' as u32 + 10,
            'A'..='Z' => c as u32 - 'A' as u32 + 36,
            '@' => 62,
            '_' => 63,
            _ => return None,
        };
        if digit >= base {
            return None;
        }
        value = value.checked_mul(base as i64)?.checked_add(digit as i64)?;
    }
    Some(value)
}

impl Parser {
    /// Parse an arithmetic expression whose operators bind at least as
    /// tightly as `min_bp`.
    pub(super) fn parse_arith(&mut self, min_bp: u8) -> Result<Expr> {
        let mut lhs = self.parse_arith_prefix()?;

        loop {
            let token = self.peek();
            if token.kind != TokenKind::ArithOp {
                break;
            }
            let op = token.literal.clone();
            let position = token.position;

            if op == "?" {
                if TERNARY_BP.0 < min_bp {
                    break;
                }
                self.advance();
                let then = self.parse_arith(0)?;
                let colon = self.peek();
                if !(colon.kind == TokenKind::ArithOp && colon.literal == ":") {
                    let found = self.unexpected(colon);
                    return Err(ParseError::at(
                        format!("expected ':' in conditional expression, {}", found.message),
                        found.position,
                    )
                    .into());
                }
                self.advance();
                let otherwise = self.parse_arith(TERNARY_BP.1)?;
                lhs = Expr::Ternary(Box::new(lhs), Box::new(then), Box::new(otherwise));
                continue;
            }

            let compound = BinaryOp::from_compound_assign(&op);
            if op == "=" || compound.is_some() {
                if ASSIGN_BP.0 < min_bp {
                    break;
                }
                let Expr::Variable(name) = lhs else {
                    return Err(ParseError::at(
                        format!("attempted assignment to non-variable with '{op}'"),
                        position,
                    )
                    .into());
                };
                self.advance();
                let value = self.parse_arith(ASSIGN_BP.1)?;
                lhs = Expr::Assign(name, compound, Box::new(value));
                continue;
            }

            let Some(binary) = BinaryOp::from_operator(&op) else {
                break;
            };
            let (left_bp, right_bp) = infix_bp(binary);
            if left_bp < min_bp {
                break;
            }
            self.advance();
            let rhs = self.parse_arith(right_bp)?;
            lhs = Expr::Binary(binary, Box::new(lhs), Box::new(rhs));
        }

        Ok(lhs)
    }

    fn parse_arith_prefix(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number => {
                self.advance();
                parse_integer(&token.literal).map(Expr::Number).ok_or_else(|| {
                    crate::error::ExpansionError::BadNumber(token.literal.clone()).into()
                })
            }
            TokenKind::Literal | TokenKind::Variable => {
                self.advance();
                Ok(Expr::Variable(token.literal))
            }
            TokenKind::ArithOp => {
                let op = match token.literal.as_str() {
                    "+" => UnaryOp::Plus,
                    "-" => UnaryOp::Minus,
                    "!" => UnaryOp::Not,
                    "~" => UnaryOp::BitNot,
                    _ => return Err(self.unexpected(&token).into()),
                };
                self.advance();
                let operand = self.parse_arith(PREFIX_BP)?;
                Ok(Expr::Unary(op, Box::new(operand)))
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_arith(0)?;
                self.expect(TokenKind::RightParen, "')'")?;
                Ok(expr)
            }
            TokenKind::BeginArith => {
                self.advance();
                let expr = self.parse_arith(0)?;
                self.expect(TokenKind::EndArith, "'))'")?;
                Ok(expr)
            }
            TokenKind::BeginParam | TokenKind::BeginSubst => {
                let mut parts = Vec::new();
                self.parse_part(&mut parts)?;
                Ok(Expr::Expansion(Word { parts }))
            }
            _ => {
                let found = self.unexpected(&token);
                Err(ParseError::at(
                    format!("expected arithmetic operand, {}", found.message),
                    found.position,
                )
                .into())
            }
        }
    }
}
