use model::{
    core::{data_type::DataType, value::Value},
    execution::expr::{BinaryOp, CompiledExpression},
};
use tracing::warn;

/// What an expression may refer to while its type is inferred.
pub enum TypeScope<'a> {
    /// Column names of a row.
    Columns(&'a dyn Fn(&str) -> Option<DataType>),
    /// Positional parameter types, `$1` first.
    Params(&'a [DataType]),
}

/// Infers the static result type of an expression, `None` when it depends on
/// runtime values (e.g. a bare NULL or `coalesce` over unknown types).
pub fn infer_expression_type(expr: &CompiledExpression, scope: &TypeScope) -> Option<DataType> {
    match expr {
        CompiledExpression::Column(name) => match scope {
            TypeScope::Columns(lookup) => lookup(name),
            TypeScope::Params(_) => None,
        },

        CompiledExpression::Param(index) => match scope {
            TypeScope::Params(types) => index.checked_sub(1).and_then(|i| types.get(i)).cloned(),
            TypeScope::Columns(_) => None,
        },

        CompiledExpression::Literal(value) => match value {
            Value::Null => None,
            Value::Int(_) => Some(DataType::Int),
            other => other.data_type(),
        },

        CompiledExpression::Binary { left, op, right } => match op {
            BinaryOp::Concat => Some(DataType::String),
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::GreaterThan
            | BinaryOp::LessThan
            | BinaryOp::GreaterOrEqual
            | BinaryOp::LessOrEqual
            | BinaryOp::And
            | BinaryOp::Or => Some(DataType::Boolean),
            _ => {
                let lt = infer_expression_type(left, scope)?;
                let rt = infer_expression_type(right, scope)?;
                Some(get_numeric_type(&lt, &rt))
            }
        },

        CompiledExpression::FunctionCall { name, args } => {
            match name.to_ascii_lowercase().as_str() {
                "lower" | "upper" | "trim" | "concat" | "current_setting" | "set_config" => {
                    Some(DataType::String)
                }
                "length" => Some(DataType::Int),
                "coalesce" | "nullif" => args.iter().find_map(|a| infer_expression_type(a, scope)),
                _ => None,
            }
        }

        CompiledExpression::Unary { operand, .. } => infer_expression_type(operand, scope),

        CompiledExpression::Grouped(expr) => infer_expression_type(expr, scope),

        CompiledExpression::When {
            branches,
            else_expr,
        } => branches
            .iter()
            .map(|b| &b.value)
            .chain(else_expr.as_deref())
            .find_map(|e| infer_expression_type(e, scope)),

        CompiledExpression::IsNull(_) | CompiledExpression::IsNotNull(_) => Some(DataType::Boolean),
    }
}

fn get_numeric_type(left: &DataType, right: &DataType) -> DataType {
    use DataType::*;
    match (left, right) {
        (Short | Int, Short | Int) => Int,
        (Short | Int | Long, Short | Int | Long) => Long,
        (Float | Double, _) | (_, Float | Double) => Double,
        (Decimal, _) | (_, Decimal) => Decimal,
        _ => {
            warn!(
                "Incompatible types for arithmetic operation: {:?} and {:?}",
                left, right
            );
            String
        }
    }
}
