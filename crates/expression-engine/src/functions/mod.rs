pub mod conditional;
pub mod session;
pub mod string;

use crate::{
    context::EvalContext,
    error::{ExpressionError, Result},
};
use lazy_static::lazy_static;
use model::core::value::Value;
use std::collections::HashMap;

/// Type alias for function implementations
pub type FunctionImpl = fn(&[Value], &mut EvalContext) -> Result<Value>;

lazy_static! {
    static ref BUILTINS: FunctionRegistry = FunctionRegistry::new();
}

/// Registry of the built-in expression functions
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionImpl>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        registry.register("lower", string::eval_lower);
        registry.register("upper", string::eval_upper);
        registry.register("trim", string::eval_trim);
        registry.register("length", string::eval_length);
        registry.register("concat", string::eval_concat);
        registry.register("coalesce", conditional::eval_coalesce);
        registry.register("nullif", conditional::eval_nullif);
        registry.register("raise", conditional::eval_raise);
        registry.register("set_config", session::eval_set_config);
        registry.register("current_setting", session::eval_current_setting);

        registry
    }

    /// Shared registry used by the evaluator.
    pub fn global() -> &'static FunctionRegistry {
        &BUILTINS
    }

    pub fn register(&mut self, name: &str, func: FunctionImpl) {
        self.functions.insert(name.to_lowercase(), func);
    }

    pub fn call(&self, name: &str, args: &[Value], ctx: &mut EvalContext) -> Result<Value> {
        let func = self
            .functions
            .get(&name.to_lowercase())
            .ok_or_else(|| ExpressionError::UnknownFunction(name.to_string()))?;

        func(args, ctx)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_lowercase())
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.functions.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared arity check for built-ins.
pub(crate) fn expect_args(function: &str, args: &[Value], count: usize) -> Result<()> {
    if args.len() != count {
        return Err(ExpressionError::invalid_args(
            function,
            format!("expected {count} argument(s), got {}", args.len()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_builtin_functions() {
        let registry = FunctionRegistry::global();
        for name in ["lower", "upper", "trim", "length", "coalesce", "raise", "set_config"] {
            assert!(registry.has_function(name), "{name} missing");
        }
        assert!(registry.has_function("UPPER"));
    }

    #[test]
    fn test_unknown_function() {
        let mut ctx = EvalContext::constant();
        let result = FunctionRegistry::global().call("unknown_func", &[], &mut ctx);
        assert!(matches!(result, Err(ExpressionError::UnknownFunction(_))));
    }

    #[test]
    fn test_custom_function_registration() {
        let mut registry = FunctionRegistry::new();

        fn custom_func(args: &[Value], _ctx: &mut EvalContext) -> Result<Value> {
            Ok(Value::Int(args.len() as i64))
        }

        registry.register("custom", custom_func);
        let mut ctx = EvalContext::constant();
        assert_eq!(
            registry.call("custom", &[Value::Null], &mut ctx),
            Ok(Value::Int(1))
        );
    }
}
