use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;

use log::{debug, trace};

use crate::ast::*;
use crate::error::RenderError;
use crate::parser::parse_condition;
use crate::scope::Scope;
use crate::tag::{Token, TokenKind};
use crate::value::Value;

/// Renders a token slice against a scope. Loop and `if` bodies are
/// rendered by recursing over sub-slices; each loop iteration gets its own
/// child scope, so nothing bound inside a block survives it.
///
/// Conditions are parsed once, when the evaluator is built, and reused for
/// every loop iteration that reaches them. Parse failures are kept and
/// only reported if the `if` is actually evaluated.
#[derive(Debug, Default)]
pub struct Evaluator<'t> {
    conditions: HashMap<&'t str, Result<Expr, String>>,
}

impl<'t> Evaluator<'t> {
    pub fn new(tokens: &[Token<'t>]) -> Self {
        let mut conditions = HashMap::new();
        for token in tokens {
            if let TokenKind::IfOpen { condition } = token.kind {
                conditions
                    .entry(condition)
                    .or_insert_with(|| parse_condition(condition));
            }
        }
        debug!("parsed {} distinct conditions", conditions.len());
        Self { conditions }
    }

    pub fn render(&self, tokens: &[Token<'_>], scope: &Scope<'_>) -> Result<String, RenderError> {
        let mut output = String::new();
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            match token.kind {
                TokenKind::Text => output.push_str(token.raw),
                TokenKind::Variable { name } => {
                    if let Some(value) = scope.get(name) {
                        output.push_str(&value.to_string());
                    }
                }
                TokenKind::ForOpen { var, iterable } => {
                    let close = find_close(tokens, i)?;
                    let body = &tokens[i + 1..close];
                    let items = match scope.get(iterable) {
                        Some(Value::Array(items)) => items,
                        other => {
                            return Err(RenderError::IterableType {
                                name: iterable.to_string(),
                                found: other.map_or("nothing", Value::type_name),
                            })
                        }
                    };
                    trace!(
                        "for {var} in {iterable}: {} items at depth {}",
                        items.len(),
                        scope.depth()
                    );
                    for item in items {
                        let child = scope.bind(var, item);
                        output.push_str(&self.render(body, &child)?);
                    }
                    i = close;
                }
                TokenKind::IfOpen { condition } => {
                    let close = find_close(tokens, i)?;
                    let holds = self.condition(condition, scope)?;
                    trace!("if {condition}: {holds}");
                    if holds {
                        output.push_str(&self.render(&tokens[i + 1..close], scope)?);
                    }
                    i = close;
                }
                TokenKind::ForClose | TokenKind::IfClose => return Err(token.unmatched()),
            }
            i += 1;
        }
        Ok(output)
    }

    /// Evaluates an `if` condition to a boolean. Conditions not seen by
    /// [`Evaluator::new`] are parsed on the spot.
    pub fn condition(&self, condition: &str, scope: &Scope<'_>) -> Result<bool, RenderError> {
        let fail = |reason: String| RenderError::Expression {
            expr: condition.to_string(),
            reason,
        };
        let parsed;
        let expr = match self.conditions.get(condition) {
            Some(Ok(expr)) => expr,
            Some(Err(reason)) => return Err(fail(reason.clone())),
            None => {
                parsed = parse_condition(condition).map_err(fail)?;
                &parsed
            }
        };
        let value = self.eval_expr(expr, scope).map_err(fail)?;
        Ok(value.is_truthy())
    }

    fn eval_expr<'x>(&self, expr: &'x Expr, scope: &Scope<'x>) -> Result<Cow<'x, Value>, String> {
        match expr {
            Expr::Literal(value) => Ok(Cow::Borrowed(value)),
            Expr::Var(name) => scope
                .get(name)
                .map(Cow::Borrowed)
                .ok_or_else(|| format!("`{name}` is not defined")),
            Expr::Not(inner) => {
                let value = self.eval_expr(inner, scope)?;
                Ok(Cow::Owned(Value::Bool(!value.is_truthy())))
            }
            Expr::And(operands) => {
                for operand in operands {
                    if !self.eval_expr(operand, scope)?.is_truthy() {
                        return Ok(Cow::Owned(Value::Bool(false)));
                    }
                }
                Ok(Cow::Owned(Value::Bool(true)))
            }
            Expr::Or(operands) => {
                for operand in operands {
                    if self.eval_expr(operand, scope)?.is_truthy() {
                        return Ok(Cow::Owned(Value::Bool(true)));
                    }
                }
                Ok(Cow::Owned(Value::Bool(false)))
            }
            Expr::BinOp(lhs, op, rhs) => {
                let l = self.eval_expr(lhs, scope)?;
                let r = self.eval_expr(rhs, scope)?;
                let holds = match op {
                    BinOp::Eq => l.loose_eq(&r),
                    BinOp::NotEq => !l.loose_eq(&r),
                    _ => {
                        let ordering = l.compare(&r).ok_or_else(|| {
                            format!("cannot order {} and {}", l.type_name(), r.type_name())
                        })?;
                        match op {
                            BinOp::Lt => ordering == Ordering::Less,
                            BinOp::LtEq => ordering != Ordering::Greater,
                            BinOp::Gt => ordering == Ordering::Greater,
                            _ => ordering != Ordering::Less,
                        }
                    }
                };
                Ok(Cow::Owned(Value::Bool(holds)))
            }
        }
    }
}

/// Index of the close tag matching the open tag at `open`. Nested blocks of
/// the same type are skipped by counting depth.
pub fn find_close(tokens: &[Token<'_>], open: usize) -> Result<usize, RenderError> {
    let opener = &tokens[open];
    let mut depth = 0usize;
    for (idx, token) in tokens.iter().enumerate().skip(open + 1) {
        if !opener.same_block(token) {
            continue;
        }
        if token.is_open() {
            depth += 1;
        } else if depth == 0 {
            return Ok(idx);
        } else {
            depth -= 1;
        }
    }
    Err(opener.unmatched())
}
