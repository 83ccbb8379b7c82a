use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

/// Parsed `if` condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Not(Box<Expr>),
    /// Comparison of two operands.
    BinOp(Box<Expr>, BinOp, Box<Expr>),
    /// `a and b and ...` as one flat operand list.
    And(Vec<Expr>),
    Or(Vec<Expr>),
}
