use super::expect_args;
use crate::{
    context::EvalContext,
    error::{ExpressionError, Result},
};
use model::core::value::Value;

fn text_arg(function: &str, args: &[Value]) -> Result<Option<String>> {
    expect_args(function, args, 1)?;
    match &args[0] {
        Value::Null => Ok(None),
        Value::Composite(_) => Err(ExpressionError::invalid_args(
            function,
            "expected a scalar argument",
        )),
        other => Ok(other.to_text()),
    }
}

/// Convert string to lowercase
pub fn eval_lower(args: &[Value], _ctx: &mut EvalContext) -> Result<Value> {
    Ok(text_arg("lower", args)?
        .map(|s| Value::String(s.to_lowercase()))
        .unwrap_or(Value::Null))
}

/// Convert string to uppercase
pub fn eval_upper(args: &[Value], _ctx: &mut EvalContext) -> Result<Value> {
    Ok(text_arg("upper", args)?
        .map(|s| Value::String(s.to_uppercase()))
        .unwrap_or(Value::Null))
}

pub fn eval_trim(args: &[Value], _ctx: &mut EvalContext) -> Result<Value> {
    Ok(text_arg("trim", args)?
        .map(|s| Value::String(s.trim().to_string()))
        .unwrap_or(Value::Null))
}

/// Length in characters
pub fn eval_length(args: &[Value], _ctx: &mut EvalContext) -> Result<Value> {
    Ok(text_arg("length", args)?
        .map(|s| Value::Int(s.chars().count() as i64))
        .unwrap_or(Value::Null))
}

/// Concatenate text forms of all arguments, skipping nulls
pub fn eval_concat(args: &[Value], _ctx: &mut EvalContext) -> Result<Value> {
    let concatenated = args
        .iter()
        .filter_map(Value::to_text)
        .collect::<Vec<_>>()
        .join("");
    Ok(Value::String(concatenated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: fn(&[Value], &mut EvalContext) -> Result<Value>, args: &[Value]) -> Result<Value> {
        let mut ctx = EvalContext::constant();
        f(args, &mut ctx)
    }

    #[test]
    fn test_case_conversion() {
        assert_eq!(
            call(eval_lower, &[Value::String("HELLO".into())]),
            Ok(Value::String("hello".into()))
        );
        assert_eq!(
            call(eval_upper, &[Value::String("world".into())]),
            Ok(Value::String("WORLD".into()))
        );
        assert_eq!(call(eval_upper, &[Value::Null]), Ok(Value::Null));
    }

    #[test]
    fn test_trim_and_length() {
        assert_eq!(
            call(eval_trim, &[Value::String("  a b ".into())]),
            Ok(Value::String("a b".into()))
        );
        assert_eq!(call(eval_length, &[Value::String("héllo".into())]), Ok(Value::Int(5)));
        assert!(call(eval_length, &[]).is_err());
    }

    #[test]
    fn test_concat_skips_nulls() {
        let args = vec![
            Value::String("Count: ".into()),
            Value::Null,
            Value::Int(42),
        ];
        assert_eq!(call(eval_concat, &args), Ok(Value::String("Count: 42".into())));
    }
}
