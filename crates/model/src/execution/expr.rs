use crate::core::value::Value;
use serde::{Deserialize, Serialize};

/// Compiled expression ready for runtime evaluation.
///
/// Used for CHECK constraints, parameter default expressions and the bodies
/// of declarative transform functions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CompiledExpression {
    Literal(Value),
    /// Column reference, resolved against the row under evaluation.
    Column(String),
    /// Positional argument `$n` (1-based).
    Param(usize),
    Binary {
        left: Box<CompiledExpression>,
        op: BinaryOp,
        right: Box<CompiledExpression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<CompiledExpression>,
    },
    FunctionCall {
        name: String,
        args: Vec<CompiledExpression>,
    },
    When {
        branches: Vec<WhenBranch>,
        else_expr: Option<Box<CompiledExpression>>,
    },
    IsNull(Box<CompiledExpression>),
    IsNotNull(Box<CompiledExpression>),
    Grouped(Box<CompiledExpression>),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Concat,
    // Comparison
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    // Logical
    And,
    Or,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WhenBranch {
    pub condition: CompiledExpression,
    pub value: CompiledExpression,
}

impl CompiledExpression {
    /// Highest `$n` referenced by the expression, 0 if none.
    pub fn max_param(&self) -> usize {
        match self {
            CompiledExpression::Literal(_) | CompiledExpression::Column(_) => 0,
            CompiledExpression::Param(n) => *n,
            CompiledExpression::Binary { left, right, .. } => left.max_param().max(right.max_param()),
            CompiledExpression::Unary { operand, .. } => operand.max_param(),
            CompiledExpression::FunctionCall { args, .. } => {
                args.iter().map(Self::max_param).max().unwrap_or(0)
            }
            CompiledExpression::When {
                branches,
                else_expr,
            } => branches
                .iter()
                .map(|b| b.condition.max_param().max(b.value.max_param()))
                .chain(else_expr.iter().map(|e| e.max_param()))
                .max()
                .unwrap_or(0),
            CompiledExpression::IsNull(inner)
            | CompiledExpression::IsNotNull(inner)
            | CompiledExpression::Grouped(inner) => inner.max_param(),
        }
    }

    /// True when the expression reads no row or argument data.
    pub fn is_constant(&self) -> bool {
        match self {
            CompiledExpression::Literal(_) => true,
            CompiledExpression::Column(_) | CompiledExpression::Param(_) => false,
            CompiledExpression::Binary { left, right, .. } => left.is_constant() && right.is_constant(),
            CompiledExpression::Unary { operand, .. } => operand.is_constant(),
            CompiledExpression::FunctionCall { args, .. } => args.iter().all(Self::is_constant),
            CompiledExpression::When {
                branches,
                else_expr,
            } => {
                branches
                    .iter()
                    .all(|b| b.condition.is_constant() && b.value.is_constant())
                    && else_expr.iter().all(|e| e.is_constant())
            }
            CompiledExpression::IsNull(inner)
            | CompiledExpression::IsNotNull(inner)
            | CompiledExpression::Grouped(inner) => inner.is_constant(),
        }
    }
}
