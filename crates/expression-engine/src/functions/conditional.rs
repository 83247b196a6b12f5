use super::expect_args;
use crate::{
    context::EvalContext,
    error::{ExpressionError, Result},
};
use model::core::value::Value;

/// First non-null argument
pub fn eval_coalesce(args: &[Value], _ctx: &mut EvalContext) -> Result<Value> {
    Ok(args
        .iter()
        .find(|v| !v.is_null())
        .cloned()
        .unwrap_or(Value::Null))
}

/// Null when both arguments are equal, else the first
pub fn eval_nullif(args: &[Value], _ctx: &mut EvalContext) -> Result<Value> {
    expect_args("nullif", args, 2)?;
    if !args[0].is_null() && args[0].equal(&args[1]) {
        return Ok(Value::Null);
    }
    Ok(args[0].clone())
}

/// Fails the evaluation with the given message
pub fn eval_raise(args: &[Value], _ctx: &mut EvalContext) -> Result<Value> {
    expect_args("raise", args, 1)?;
    let message = args[0]
        .to_text()
        .unwrap_or_else(|| "raise called with null message".to_string());
    Err(ExpressionError::Raised(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coalesce_and_nullif() {
        let mut ctx = EvalContext::constant();
        assert_eq!(
            eval_coalesce(&[Value::Null, Value::Int(2), Value::Int(3)], &mut ctx),
            Ok(Value::Int(2))
        );
        assert_eq!(eval_coalesce(&[], &mut ctx), Ok(Value::Null));
        assert_eq!(
            eval_nullif(&[Value::String("".into()), Value::String("".into())], &mut ctx),
            Ok(Value::Null)
        );
        assert_eq!(
            eval_nullif(&[Value::Int(1), Value::Int(2)], &mut ctx),
            Ok(Value::Int(1))
        );
    }

    #[test]
    fn test_raise() {
        let mut ctx = EvalContext::constant();
        assert_eq!(
            eval_raise(&[Value::String("bad row".into())], &mut ctx),
            Err(ExpressionError::Raised("bad row".into()))
        );
    }
}
