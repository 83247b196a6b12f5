use super::expect_args;
use crate::{
    context::EvalContext,
    error::{ExpressionError, Result},
};
use model::core::value::Value;

/// `set_config(key, value)`: stores a session setting and returns the value
pub fn eval_set_config(args: &[Value], ctx: &mut EvalContext) -> Result<Value> {
    expect_args("set_config", args, 2)?;
    let key = args[0]
        .to_text()
        .ok_or_else(|| ExpressionError::invalid_args("set_config", "key must not be null"))?;
    let session = ctx
        .session_mut()
        .ok_or_else(|| ExpressionError::invalid_args("set_config", "no session available"))?;
    session.set(&key, args[1].clone());
    Ok(args[1].clone())
}

/// `current_setting(key)`: reads a session setting
pub fn eval_current_setting(args: &[Value], ctx: &mut EvalContext) -> Result<Value> {
    expect_args("current_setting", args, 1)?;
    let key = args[0].to_text().ok_or_else(|| {
        ExpressionError::invalid_args("current_setting", "key must not be null")
    })?;
    ctx.session()
        .and_then(|s| s.get(&key))
        .cloned()
        .ok_or(ExpressionError::UnknownSetting(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;

    #[test]
    fn test_set_then_read() {
        let mut session = Session::new();
        let mut ctx = EvalContext::for_call(&[], &mut session);
        let args = [Value::String("app.tag".into()), Value::Int(7)];
        assert_eq!(eval_set_config(&args, &mut ctx), Ok(Value::Int(7)));
        assert_eq!(
            eval_current_setting(&[Value::String("app.tag".into())], &mut ctx),
            Ok(Value::Int(7))
        );
        assert_eq!(session.get("app.tag"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_unknown_setting() {
        let mut ctx = EvalContext::constant();
        assert!(matches!(
            eval_current_setting(&[Value::String("nope".into())], &mut ctx),
            Err(ExpressionError::UnknownSetting(_))
        ));
        assert!(eval_set_config(&[Value::String("k".into()), Value::Null], &mut ctx).is_err());
    }
}
