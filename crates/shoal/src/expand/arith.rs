//! Arithmetic evaluation
//!
//! All arithmetic is 64-bit signed and wraps on overflow. A variable whose
//! value is not a number is itself evaluated as an expression, so
//! `a=b; b=3; echo $((a + 1))` prints 4.

use futures_util::future::BoxFuture;
use tracing::trace;

use crate::error::{ExpansionError, Result};
use crate::io::Io;
use crate::parser::{parse_arithmetic, parse_integer, BinaryOp, Expr, UnaryOp};
use crate::shell::{Environment, Shell};

/// Limit on variables referring to expressions referring to variables.
const MAX_DEPTH: usize = 64;

/// Evaluate an expression over `env`. Assignments write back to it.
///
/// `${...}` and `$(...)` operands need a shell to expand them and are an
/// error here; see [`Shell::eval_arith`].
pub fn evaluate(expr: &Expr, env: &mut dyn Environment) -> Result<i64> {
    Evaluator { env, depth: 0 }.eval(expr)
}

struct Evaluator<'a> {
    env: &'a mut dyn Environment,
    depth: usize,
}

impl Evaluator<'_> {
    fn eval(&mut self, expr: &Expr) -> Result<i64> {
        match expr {
            Expr::Number(n) => Ok(*n),
            Expr::Variable(name) => self.variable(name),
            Expr::Unary(op, operand) => Ok(unary(*op, self.eval(operand)?)),
            Expr::Binary(BinaryOp::And, lhs, rhs) => {
                Ok(i64::from(self.eval(lhs)? != 0 && self.eval(rhs)? != 0))
            }
            Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                Ok(i64::from(self.eval(lhs)? != 0 || self.eval(rhs)? != 0))
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                apply(*op, lhs, rhs)
            }
            Expr::Ternary(cond, then, otherwise) => {
                if self.eval(cond)? != 0 {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Assign(name, op, rhs) => {
                let rhs = self.eval(rhs)?;
                let value = match op {
                    Some(op) => apply(*op, self.variable(name)?, rhs)?,
                    None => rhs,
                };
                self.env.define(name, vec![value.to_string()])?;
                Ok(value)
            }
            Expr::Expansion(word) => {
                Err(ExpansionError::ArithmeticSyntax(format!("unexpanded {word}")).into())
            }
        }
    }

    fn variable(&mut self, name: &str) -> Result<i64> {
        let Some(fields) = self.env.resolve(name) else {
            return Ok(0);
        };
        let joined = fields.join(" ");
        let text = joined.trim();
        if text.is_empty() {
            return Ok(0);
        }
        if let Some(n) = parse_integer(text) {
            return Ok(n);
        }
        if self.depth >= MAX_DEPTH {
            return Err(ExpansionError::TooDeep(name.to_string()).into());
        }
        let expr = parse_arithmetic(text)?;
        self.depth += 1;
        let value = self.eval(&expr);
        self.depth -= 1;
        value
    }
}

fn unary(op: UnaryOp, value: i64) -> i64 {
    match op {
        UnaryOp::Plus => value,
        UnaryOp::Minus => value.wrapping_neg(),
        UnaryOp::Not => i64::from(value == 0),
        UnaryOp::BitNot => !value,
    }
}

/// Apply a binary operator to two evaluated operands.
fn apply(op: BinaryOp, lhs: i64, rhs: i64) -> Result<i64> {
    let value = match op {
        BinaryOp::Add => lhs.wrapping_add(rhs),
        BinaryOp::Sub => lhs.wrapping_sub(rhs),
        BinaryOp::Mul => lhs.wrapping_mul(rhs),
        BinaryOp::Div | BinaryOp::Rem if rhs == 0 => {
            return Err(ExpansionError::DivisionByZero.into())
        }
        BinaryOp::Div => lhs.wrapping_div(rhs),
        BinaryOp::Rem => lhs.wrapping_rem(rhs),
        BinaryOp::Pow if rhs < 0 => return Err(ExpansionError::NegativeExponent.into()),
        BinaryOp::Pow => lhs.wrapping_pow(u32::try_from(rhs).unwrap_or(u32::MAX)),
        BinaryOp::Shl => lhs.wrapping_shl((rhs & 63) as u32),
        BinaryOp::Shr => lhs.wrapping_shr((rhs & 63) as u32),
        BinaryOp::BitAnd => lhs & rhs,
        BinaryOp::BitXor => lhs ^ rhs,
        BinaryOp::BitOr => lhs | rhs,
        BinaryOp::Lt => i64::from(lhs < rhs),
        BinaryOp::Le => i64::from(lhs <= rhs),
        BinaryOp::Gt => i64::from(lhs > rhs),
        BinaryOp::Ge => i64::from(lhs >= rhs),
        BinaryOp::Eq => i64::from(lhs == rhs),
        BinaryOp::Ne => i64::from(lhs != rhs),
        BinaryOp::And => i64::from(lhs != 0 && rhs != 0),
        BinaryOp::Or => i64::from(lhs != 0 || rhs != 0),
    };
    Ok(value)
}

impl Shell {
    /// Evaluate an arithmetic expression in this shell.
    ///
    /// `${...}` and `$(...)` operands are expanded only when evaluation
    /// reaches them, so the skipped side of `&&`, `||` and `?:` runs
    /// nothing.
    pub async fn eval_arith(&mut self, expr: &Expr, io: &Io) -> Result<i64> {
        let value = self.eval_expanding(expr, io, 0).await?;
        trace!(value, "arithmetic");
        Ok(value)
    }

    fn eval_expanding<'a>(
        &'a mut self,
        expr: &'a Expr,
        io: &'a Io,
        depth: usize,
    ) -> BoxFuture<'a, Result<i64>> {
        Box::pin(async move {
            match expr {
                Expr::Expansion(word) => {
                    let text = self.expand_single(word, io).await?;
                    let text = text.trim();
                    if text.is_empty() {
                        return Ok(0);
                    }
                    if depth >= MAX_DEPTH {
                        return Err(ExpansionError::TooDeep(word.to_string()).into());
                    }
                    let parsed = parse_arithmetic(text)?;
                    self.eval_expanding(&parsed, io, depth + 1).await
                }
                Expr::Unary(op, operand) => {
                    Ok(unary(*op, self.eval_expanding(operand, io, depth).await?))
                }
                Expr::Binary(BinaryOp::And, lhs, rhs) => {
                    if self.eval_expanding(lhs, io, depth).await? == 0 {
                        return Ok(0);
                    }
                    Ok(i64::from(self.eval_expanding(rhs, io, depth).await? != 0))
                }
                Expr::Binary(BinaryOp::Or, lhs, rhs) => {
                    if self.eval_expanding(lhs, io, depth).await? != 0 {
                        return Ok(1);
                    }
                    Ok(i64::from(self.eval_expanding(rhs, io, depth).await? != 0))
                }
                Expr::Binary(op, lhs, rhs) => {
                    let lhs = self.eval_expanding(lhs, io, depth).await?;
                    let rhs = self.eval_expanding(rhs, io, depth).await?;
                    apply(*op, lhs, rhs)
                }
                Expr::Ternary(cond, then, otherwise) => {
                    let branch = if self.eval_expanding(cond, io, depth).await? != 0 {
                        then
                    } else {
                        otherwise
                    };
                    self.eval_expanding(branch, io, depth).await
                }
                Expr::Assign(name, op, rhs) => {
                    let rhs = self.eval_expanding(rhs, io, depth).await?;
                    let value = match op {
                        Some(op) => {
                            let current = evaluate(&Expr::Variable(name.clone()), self)?;
                            apply(*op, current, rhs)?
                        }
                        None => rhs,
                    };
                    self.define(name, vec![value.to_string()])?;
                    Ok(value)
                }
                Expr::Number(_) | Expr::Variable(_) => evaluate(expr, self),
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn eval_with(text: &str, env: &mut HashMap<String, Vec<String>>) -> Result<i64> {
        evaluate(&parse_arithmetic(text)?, env)
    }

    fn eval(text: &str) -> i64 {
        eval_with(text, &mut HashMap::new()).unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3"), 7);
        assert_eq!(eval("(1 + 2) * 3"), 9);
        assert_eq!(eval("2 ** 3 ** 2"), 512);
        assert_eq!(eval("-2 ** 2"), 4);
        assert_eq!(eval("10 - 4 - 3"), 3);
        assert_eq!(eval("1 < 2 && 3 > 2"), 1);
        assert_eq!(eval("7 % 3"), 1);
        assert_eq!(eval("1 ? 10 : 20"), 10);
        assert_eq!(eval("0 ? 10 : 20"), 20);
        assert_eq!(eval("~0"), -1);
        assert_eq!(eval("!5"), 0);
        assert_eq!(eval("1 << 4 | 1"), 17);
    }

    #[test]
    fn test_wrapping() {
        assert_eq!(eval("9223372036854775807 + 1"), i64::MIN);
        assert_eq!(eval("-9223372036854775807 - 1 - 1"), i64::MAX);
    }

    #[test]
    fn test_errors() {
        let mut env = HashMap::new();
        assert!(matches!(
            eval_with("1 / 0", &mut env),
            Err(crate::Error::Expansion(ExpansionError::DivisionByZero))
        ));
        assert!(matches!(
            eval_with("5 % 0", &mut env),
            Err(crate::Error::Expansion(ExpansionError::DivisionByZero))
        ));
        assert!(matches!(
            eval_with("2 ** -1", &mut env),
            Err(crate::Error::Expansion(ExpansionError::NegativeExponent))
        ));
    }

    #[test]
    fn test_short_circuit() {
        assert_eq!(eval("0 && 1 / 0"), 0);
        assert_eq!(eval("1 || 1 / 0"), 1);
    }

    #[test]
    fn test_variables() {
        let mut env = HashMap::new();
        env.insert("x".to_string(), vec!["5".to_string()]);
        env.insert("y".to_string(), vec!["x * 2".to_string()]);
        env.insert("z".to_string(), vec!["".to_string()]);
        assert_eq!(eval_with("x + 1", &mut env).unwrap(), 6);
        assert_eq!(eval_with("y + 1", &mut env).unwrap(), 11);
        assert_eq!(eval_with("z + missing", &mut env).unwrap(), 0);
    }

    #[test]
    fn test_assignment() {
        let mut env = HashMap::new();
        assert_eq!(eval_with("a = 3", &mut env).unwrap(), 3);
        assert_eq!(eval_with("a += 4", &mut env).unwrap(), 7);
        assert_eq!(eval_with("a <<= 1", &mut env).unwrap(), 14);
        assert_eq!(env.get("a"), Some(&vec!["14".to_string()]));
    }

    #[test]
    fn test_self_reference_is_bounded() {
        let mut env = HashMap::new();
        env.insert("loop".to_string(), vec!["loop + 1".to_string()]);
        assert!(matches!(
            eval_with("loop", &mut env),
            Err(crate::Error::Expansion(ExpansionError::TooDeep(_)))
        ));
    }

    #[tokio::test]
    async fn test_expansions_inside_arithmetic() {
        let mut shell = crate::ShellBuilder::new().build();
        shell.set_var("n", "4").unwrap();
        let expr = parse_arithmetic("${n} * $(echo 3)").unwrap();
        assert_eq!(shell.eval_arith(&expr, &Io::default()).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_skipped_operands_are_not_expanded() {
        let mut shell = crate::ShellBuilder::new().build();
        let io = Io::default();
        for text in ["0 && ${a:=1}", "1 || ${b:=1}", "1 ? 2 : ${c:=1}", "0 ? ${d:=1} : 3"] {
            let expr = parse_arithmetic(text).unwrap();
            shell.eval_arith(&expr, &io).await.unwrap();
        }
        for name in ["a", "b", "c", "d"] {
            assert_eq!(shell.var(name), None, "{name} was assigned");
        }

        let expr = parse_arithmetic("1 && ${e:=4}").unwrap();
        assert_eq!(shell.eval_arith(&expr, &io).await.unwrap(), 1);
        assert_eq!(shell.var("e").as_deref(), Some("4"));
    }
}
