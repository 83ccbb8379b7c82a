use crate::ast::*;
use crate::lexer::{ExprLexer, ExprToken};
use crate::value::Value;
use std::collections::VecDeque;

const MAX_NESTING: usize = 64;

/// Recursive-descent parser for `if` conditions.
pub struct Parser {
    buffer: VecDeque<ExprToken>,
    nesting: usize,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self, String> {
        let mut lexer = ExprLexer::new(input);
        let mut buffer = VecDeque::new();
        while let Some(token) = lexer.next_token()? {
            buffer.push_back(token);
        }
        Ok(Self {
            buffer,
            nesting: 0,
        })
    }

    fn peek(&self) -> Option<&ExprToken> {
        self.buffer.front()
    }

    fn consume(&mut self) -> Option<ExprToken> {
        self.buffer.pop_front()
    }

    fn expect(&mut self, token: ExprToken) -> Result<(), String> {
        match self.consume() {
            Some(t) if t == token => Ok(()),
            Some(t) => Err(format!("expected {:?}, got {:?}", token, t)),
            None => Err(format!("expected {:?}, got end of input", token)),
        }
    }

    fn enter(&mut self) -> Result<(), String> {
        if self.nesting == MAX_NESTING {
            return Err("expression nests too deeply".to_string());
        }
        self.nesting += 1;
        Ok(())
    }

    /// Parses the whole input as one expression.
    pub fn parse(&mut self) -> Result<Expr, String> {
        let expr = self.parse_or()?;
        match self.peek() {
            None => Ok(expr),
            Some(t) => Err(format!("unexpected {:?} after expression", t)),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut operands = vec![self.parse_and()?];
        while let Some(ExprToken::Or) = self.peek() {
            self.consume();
            operands.push(self.parse_and()?);
        }
        Ok(flatten(operands, Expr::Or))
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut operands = vec![self.parse_not()?];
        while let Some(ExprToken::And) = self.peek() {
            self.consume();
            operands.push(self.parse_not()?);
        }
        Ok(flatten(operands, Expr::And))
    }

    fn parse_not(&mut self) -> Result<Expr, String> {
        if let Some(ExprToken::Not) = self.peek() {
            self.consume();
            self.enter()?;
            let inner = self.parse_not()?;
            self.nesting -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr, String> {
        let lhs = self.parse_primary()?;
        let Some(op) = self.peek().and_then(comparison) else {
            return Ok(lhs);
        };
        self.consume();
        let rhs = self.parse_primary()?;
        if let Some(t) = self.peek().filter(|t| comparison(t).is_some()) {
            return Err(format!("chained comparison at {:?} is not supported", t));
        }
        Ok(Expr::BinOp(Box::new(lhs), op, Box::new(rhs)))
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.consume() {
            Some(ExprToken::StringLit(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(ExprToken::Int(i)) => Ok(Expr::Literal(Value::Int(i))),
            Some(ExprToken::Float(x)) => Ok(Expr::Literal(Value::Float(x))),
            Some(ExprToken::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(ExprToken::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(ExprToken::None) => Ok(Expr::Literal(Value::Null)),
            Some(ExprToken::Ident(name)) => Ok(Expr::Var(name)),
            Some(ExprToken::LParen) => {
                self.enter()?;
                let e = self.parse_or()?;
                self.expect(ExprToken::RParen)?;
                self.nesting -= 1;
                Ok(e)
            }
            Some(t) => Err(format!("expected a value, got {:?}", t)),
            None => Err("expected a value, got end of input".to_string()),
        }
    }
}

fn flatten(mut operands: Vec<Expr>, chain: fn(Vec<Expr>) -> Expr) -> Expr {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        chain(operands)
    }
}

fn comparison(token: &ExprToken) -> Option<BinOp> {
    match token {
        ExprToken::EqEq => Some(BinOp::Eq),
        ExprToken::NotEq => Some(BinOp::NotEq),
        ExprToken::Lt => Some(BinOp::Lt),
        ExprToken::LtEq => Some(BinOp::LtEq),
        ExprToken::Gt => Some(BinOp::Gt),
        ExprToken::GtEq => Some(BinOp::GtEq),
        _ => None,
    }
}

/// Parses a condition string.
pub fn parse_condition(input: &str) -> Result<Expr, String> {
    Parser::new(input)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Var(name.to_string()))
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr = parse_condition("a or b and c").unwrap();
        assert_eq!(
            expr,
            Expr::Or(vec![*var("a"), Expr::And(vec![*var("b"), *var("c")])])
        );
    }

    #[test]
    fn chains_stay_flat() {
        let input = vec!["a"; 10_000].join(" or ");
        match parse_condition(&input).unwrap() {
            Expr::Or(operands) => {
                assert_eq!(operands.len(), 10_000);
                assert!(operands.iter().all(|e| *e == Expr::Var("a".into())));
            }
            other => panic!("expected a flat or-chain, got {other:?}"),
        }

        let input = vec!["x == 1"; 10_000].join(" and ");
        assert!(matches!(parse_condition(&input), Ok(Expr::And(ops)) if ops.len() == 10_000));
    }

    #[test]
    fn not_applies_to_comparison() {
        let expr = parse_condition("not x == 1").unwrap();
        assert_eq!(
            expr,
            Expr::Not(Box::new(Expr::BinOp(
                var("x"),
                BinOp::Eq,
                Box::new(Expr::Literal(Value::Int(1)))
            )))
        );
    }

    #[test]
    fn parentheses_group() {
        let expr = parse_condition("(a or b) and c").unwrap();
        assert_eq!(
            expr,
            Expr::And(vec![Expr::Or(vec![*var("a"), *var("b")]), *var("c")])
        );
    }

    #[test]
    fn rejects_malformed_input() {
        for input in ["", "a ==", "(a", "a b", "a < b < c", "and", "a)"] {
            assert!(parse_condition(input).is_err(), "{input:?}");
        }
    }

    #[test]
    fn rejects_runaway_nesting() {
        let input = format!("{}a{}", "(".repeat(100), ")".repeat(100));
        assert!(parse_condition(&input).is_err());

        let input = format!("{}a{}", "(".repeat(10), ")".repeat(10));
        assert_eq!(parse_condition(&input), Ok(Expr::Var("a".into())));

        assert!(parse_condition(&format!("{}a", "not ".repeat(100))).is_err());
    }
}
