use super::binary::BinaryOpEvaluator;
use crate::{
    context::EvalContext,
    error::{ExpressionError, Result},
    functions::FunctionRegistry,
};
use model::{
    core::value::Value,
    execution::expr::{BinaryOp, CompiledExpression, UnaryOp},
};

/// Trait for evaluating compiled expressions against an [`EvalContext`].
pub trait Evaluator {
    fn evaluate(&self, ctx: &mut EvalContext) -> Result<Value>;

    /// Evaluates a predicate the way CHECK constraints do: only an explicit
    /// `false` fails, null passes.
    fn evaluate_check(&self, ctx: &mut EvalContext) -> Result<bool> {
        match self.evaluate(ctx)? {
            Value::Boolean(b) => Ok(b),
            Value::Null => Ok(true),
            other => Err(ExpressionError::TypeMismatch {
                op: "CHECK".to_string(),
                left: other.to_string(),
                right: "boolean".to_string(),
            }),
        }
    }
}

impl Evaluator for CompiledExpression {
    fn evaluate(&self, ctx: &mut EvalContext) -> Result<Value> {
        match self {
            CompiledExpression::Literal(value) => Ok(value.clone()),

            CompiledExpression::Column(name) => ctx.column(name),

            CompiledExpression::Param(index) => ctx.param(*index),

            CompiledExpression::Binary {
                left,
                op: BinaryOp::And,
                right,
            } => eval_and(left, right, ctx),

            CompiledExpression::Binary {
                left,
                op: BinaryOp::Or,
                right,
            } => eval_or(left, right, ctx),

            CompiledExpression::Binary { left, op, right } => {
                let left_val = left.evaluate(ctx)?;
                let right_val = right.evaluate(ctx)?;
                BinaryOpEvaluator::new(&left_val, &right_val, *op).evaluate()
            }

            CompiledExpression::Unary { op, operand } => {
                let value = operand.evaluate(ctx)?;
                eval_unary(*op, value)
            }

            CompiledExpression::FunctionCall { name, args } => {
                let evaluated_args = args
                    .iter()
                    .map(|arg| arg.evaluate(ctx))
                    .collect::<Result<Vec<_>>>()?;
                FunctionRegistry::global().call(name, &evaluated_args, ctx)
            }

            CompiledExpression::Grouped(expr) => expr.evaluate(ctx),

            CompiledExpression::When {
                branches,
                else_expr,
            } => {
                for branch in branches {
                    if let Value::Boolean(true) = branch.condition.evaluate(ctx)? {
                        return branch.value.evaluate(ctx);
                    }
                }
                match else_expr {
                    Some(e) => e.evaluate(ctx),
                    None => Ok(Value::Null),
                }
            }

            CompiledExpression::IsNull(expr) => Ok(Value::Boolean(expr.evaluate(ctx)?.is_null())),

            CompiledExpression::IsNotNull(expr) => {
                Ok(Value::Boolean(!expr.evaluate(ctx)?.is_null()))
            }
        }
    }
}

/// Three-valued truth of an operand: `None` is unknown (null).
fn truth(value: Value) -> Result<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Boolean(b) => Ok(Some(b)),
        other => Err(ExpressionError::TypeMismatch {
            op: "boolean".to_string(),
            left: other.to_string(),
            right: "boolean".to_string(),
        }),
    }
}

fn eval_and(
    left: &CompiledExpression,
    right: &CompiledExpression,
    ctx: &mut EvalContext,
) -> Result<Value> {
    let l = truth(left.evaluate(ctx)?)?;
    if l == Some(false) {
        return Ok(Value::Boolean(false));
    }
    let r = truth(right.evaluate(ctx)?)?;
    Ok(match (l, r) {
        (_, Some(false)) => Value::Boolean(false),
        (Some(true), Some(true)) => Value::Boolean(true),
        _ => Value::Null,
    })
}

fn eval_or(
    left: &CompiledExpression,
    right: &CompiledExpression,
    ctx: &mut EvalContext,
) -> Result<Value> {
    let l = truth(left.evaluate(ctx)?)?;
    if l == Some(true) {
        return Ok(Value::Boolean(true));
    }
    let r = truth(right.evaluate(ctx)?)?;
    Ok(match (l, r) {
        (_, Some(true)) => Value::Boolean(true),
        (Some(false), Some(false)) => Value::Boolean(false),
        _ => Value::Null,
    })
}

fn eval_unary(op: UnaryOp, value: Value) -> Result<Value> {
    match (op, value) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (UnaryOp::Negate, Value::Int(i)) => {
            i.checked_neg().map(Value::Int).ok_or(ExpressionError::Overflow)
        }
        (UnaryOp::Negate, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Negate, Value::Decimal(d)) => Ok(Value::Decimal(-d)),
        (op, other) => Err(ExpressionError::TypeMismatch {
            op: format!("{op:?}"),
            left: other.to_string(),
            right: String::new(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{parser::parse_expression, session::Session};
    use model::core::{
        data_type::{DataType, TypeModifier},
        shape::Shape,
    };

    fn eval_row(expr: &str, values: &[Value]) -> Result<Value> {
        let shape = Shape::new(
            None,
            vec![
                model::core::shape::ColumnDescriptor::new("id", DataType::Int, 1),
                model::core::shape::ColumnDescriptor::new("name", DataType::String, 2),
            ],
        );
        let mut ctx = EvalContext::for_row(&shape, values);
        parse_expression(expr).unwrap().evaluate(&mut ctx)
    }

    #[test]
    fn test_column_references() {
        let values = [Value::Int(4), Value::String("x".into())];
        assert_eq!(eval_row("id * 2 + 1", &values), Ok(Value::Int(9)));
        assert_eq!(eval_row("name || '!'", &values), Ok(Value::String("x!".into())));
        assert_eq!(
            eval_row("missing", &values),
            Err(ExpressionError::UnknownColumn("missing".into()))
        );
    }

    #[test]
    fn test_three_valued_logic() {
        let values = [Value::Null, Value::String("x".into())];
        assert_eq!(eval_row("id > 0 AND name = 'x'", &values), Ok(Value::Null));
        assert_eq!(eval_row("id > 0 OR name = 'x'", &values), Ok(Value::Boolean(true)));
        assert_eq!(eval_row("id > 0 AND name = 'y'", &values), Ok(Value::Boolean(false)));
    }

    #[test]
    fn test_check_semantics() {
        let shape = Shape::from_types(&[(DataType::Int, TypeModifier::None)]);
        let expr = parse_expression("$1 > 0").unwrap();
        let mut session = Session::new();
        let args = [Value::Null];
        let mut ctx = EvalContext::for_call(&args, &mut session);
        assert_eq!(expr.evaluate_check(&mut ctx), Ok(true));

        let check = parse_expression("\"$1\" > 0").unwrap();
        let values = [Value::Int(-1)];
        let mut ctx = EvalContext::for_row(&shape, &values);
        assert_eq!(check.evaluate_check(&mut ctx), Ok(false));
    }

    #[test]
    fn test_case_and_params() {
        let mut session = Session::new();
        let args = [Value::Int(-3)];
        let mut ctx = EvalContext::for_call(&args, &mut session);
        let expr = parse_expression("CASE WHEN $1 < 0 THEN -$1 ELSE $1 END").unwrap();
        assert_eq!(expr.evaluate(&mut ctx), Ok(Value::Int(3)));
        let missing = parse_expression("$2").unwrap();
        assert_eq!(
            missing.evaluate(&mut ctx),
            Err(ExpressionError::MissingParameter(2))
        );
    }
}
