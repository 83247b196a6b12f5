//! Optional transform step between forming and checking.

pub mod function;
pub mod scope;

use crate::error::{LoadError, RecordError};
use expression_engine::{EvalContext, Evaluator};
use function::{ReturnType, TransformFunction};
use model::{
    core::{input::coerce_value, shape::Shape, value::Value},
    records::record::Record,
};
use scope::IsolatedScope;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use function::TransformRegistry;

pub struct Filter {
    function: TransformFunction,
    param_shape: Shape,
    destination: Arc<Shape>,
    /// Typed default per argument, evaluated once at setup.
    defaults: Vec<Option<Value>>,
    /// Result rows are known to fit the destination; no per-call check.
    row_matched: bool,
    scope: IsolatedScope,
}

impl Filter {
    pub fn new(
        function: TransformFunction,
        destination: Arc<Shape>,
        cancel: CancellationToken,
    ) -> Result<Self, LoadError> {
        if function.returns_set {
            return Err(LoadError::Setup(
                "filter function must not return set".to_string(),
            ));
        }
        if function
            .arg_types
            .iter()
            .any(|(t, _)| t.is_polymorphic() || t.is_internal())
        {
            return Err(LoadError::Setup(format!(
                "filter function does not support a polymorphic function and having a internal pseudo-type argument function: {}",
                function.name
            )));
        }
        if function.variadic {
            return Err(LoadError::Setup(format!(
                "filter function does not support a variadic function {}",
                function.name
            )));
        }

        let row_matched = match &function.returns {
            ReturnType::Scalar(_) => {
                return Err(LoadError::Setup(RecordError::ReturnType.to_string()));
            }
            ReturnType::Composite(shape)
                if shape.type_name().is_some() && shape.type_name() == destination.type_name() =>
            {
                true
            }
            ReturnType::Composite(shape) | ReturnType::Record { out: Some(shape) } => {
                shape
                    .check_compatible(&destination)
                    .map_err(|e| LoadError::Setup(RecordError::ShapeMismatch(e).to_string()))?;
                true
            }
            ReturnType::Record { out: None } => false,
        };

        let defaults = function
            .defaults
            .iter()
            .zip(&function.arg_types)
            .enumerate()
            .map(|(i, (expr, (data_type, modifier)))| {
                let Some(expr) = expr else {
                    return Ok(None);
                };
                let value = expr
                    .evaluate(&mut EvalContext::constant())
                    .map_err(|e| e.to_string())
                    .and_then(|v| coerce_value(v, data_type, *modifier).map_err(|e| e.to_string()))
                    .map_err(|e| {
                        LoadError::Setup(format!(
                            "default value of argument {} of {} is not a constant: {e}",
                            i + 1,
                            function.name
                        ))
                    })?;
                Ok(Some(value))
            })
            .collect::<Result<Vec<_>, LoadError>>()?;

        info!(
            function = %function.signature(),
            strict = function.strict,
            defaults = defaults.iter().filter(|d| d.is_some()).count(),
            row_matched,
            "Filter function initialized"
        );

        Ok(Self {
            param_shape: function.param_shape(),
            function,
            destination,
            defaults,
            row_matched,
            scope: IsolatedScope::new(cancel),
        })
    }

    /// Shape the input records are formed to.
    pub fn param_shape(&self) -> &Shape {
        &self.param_shape
    }

    pub fn arity(&self) -> usize {
        self.function.arity()
    }

    pub fn function(&self) -> &TransformFunction {
        &self.function
    }

    /// Calls the function on a formed record. `None` stands for an all-null
    /// destination row: a strict function saw a null argument, or the
    /// function returned null.
    pub fn invoke(&mut self, mut record: Record) -> Result<Option<Record>, RecordError> {
        let arity = self.arity();

        for (position, default) in self.defaults.iter().enumerate().skip(record.supplied()) {
            if let Some(value) = default {
                record.set(position, value.clone());
            }
        }

        if self.function.strict && (0..arity).any(|i| record.is_null(i)) {
            debug!(function = %self.function.name, "Strict function skipped on null argument");
            return Ok(None);
        }

        let args = &record.values()[..arity.min(record.len())];
        let function = &self.function;
        let result = self.scope.run(|session| function.call(args, session))?;

        let row = match result {
            Value::Null => return Ok(None),
            Value::Composite(row) => row,
            _ => return Err(RecordError::ReturnType),
        };

        if !self.row_matched {
            row.shape.check_compatible(&self.destination)?;
            if row.shape.type_name().is_some() {
                self.row_matched = true;
            }
        }

        let values = self
            .destination
            .columns()
            .iter()
            .zip(row.values)
            .map(|(column, value)| {
                if column.dropped {
                    return Ok(Value::Null);
                }
                coerce_value(value, &column.data_type, column.modifier).map_err(|e| {
                    RecordError::Transform(format!("column \"{}\": {e}", column.name))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Record::from_values(values)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expression_engine::{Session, parse_expression};
    use model::core::{
        data_type::{DataType, TypeModifier},
        shape::ColumnDescriptor,
        value::CompositeValue,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn destination() -> Arc<Shape> {
        Arc::new(Shape::new(
            Some("target".into()),
            vec![
                ColumnDescriptor::new("id", DataType::Int, 1),
                ColumnDescriptor::new("label", DataType::String, 2),
            ],
        ))
    }

    fn args(types: &[DataType]) -> Vec<(DataType, TypeModifier)> {
        types.iter().map(|t| (t.clone(), TypeModifier::None)).collect()
    }

    fn row(shape: &Arc<Shape>, values: Vec<Value>) -> Value {
        Value::Composite(CompositeValue {
            shape: shape.clone(),
            values,
        })
    }

    fn echo(dest: Arc<Shape>) -> TransformFunction {
        let shape = dest.clone();
        TransformFunction::native(
            "echo",
            args(&[DataType::Int, DataType::String]),
            ReturnType::Composite(dest),
            move |args, _| Ok(row(&shape, args.to_vec())),
        )
    }

    #[test]
    fn test_setup_rejections() {
        let dest = destination();
        let mut set = echo(dest.clone());
        set.returns_set = true;
        assert_eq!(
            Filter::new(set, dest.clone(), CancellationToken::new())
                .err()
                .unwrap()
                .to_string(),
            "filter function must not return set"
        );

        let mut variadic = echo(dest.clone());
        variadic.variadic = true;
        assert!(Filter::new(variadic, dest.clone(), CancellationToken::new()).is_err());

        let poly = TransformFunction::native(
            "poly",
            args(&[DataType::Polymorphic("anyelement".into())]),
            ReturnType::Composite(dest.clone()),
            |_, _| Ok(Value::Null),
        );
        let err = Filter::new(poly, dest.clone(), CancellationToken::new()).err().unwrap();
        assert!(err.to_string().contains("polymorphic"));

        let scalar = TransformFunction::native(
            "scalar",
            args(&[DataType::Int]),
            ReturnType::Scalar(DataType::Int),
            |_, _| Ok(Value::Null),
        );
        let err = Filter::new(scalar, dest, CancellationToken::new()).err().unwrap();
        assert_eq!(
            err.to_string(),
            "function return data type and target table data type do not match"
        );
    }

    #[test]
    fn test_out_columns_checked_at_setup() {
        let dest = destination();
        let out = Arc::new(Shape::from_types(&args(&[DataType::Int])));
        let function = TransformFunction::native(
            "narrow",
            args(&[DataType::Int]),
            ReturnType::Record { out: Some(out) },
            |_, _| Ok(Value::Null),
        );
        let err = Filter::new(function, dest, CancellationToken::new()).err().unwrap();
        assert!(err.to_string().starts_with("function return row and target table row do not match"));
    }

    #[test]
    fn test_strict_function_is_not_called_on_null() {
        let dest = destination();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let shape = dest.clone();
        let function = TransformFunction::native(
            "strict_fn",
            args(&[DataType::Int, DataType::String]),
            ReturnType::Composite(dest.clone()),
            move |args, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(row(&shape, args.to_vec()))
            },
        )
        .strict(true);
        let mut filter = Filter::new(function, dest, CancellationToken::new()).unwrap();

        let input = Record::from_values(vec![Value::Null, Value::String("5".into())]);
        assert_eq!(filter.invoke(input).unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let input = Record::from_values(vec![Value::Int(1), Value::String("5".into())]);
        assert!(filter.invoke(input).unwrap().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_defaults_fill_missing_arguments() {
        let dest = destination();
        let function = echo(dest.clone()).with_default(1, parse_expression("'n/a'").unwrap());
        let mut filter = Filter::new(function, dest, CancellationToken::new()).unwrap();

        let input = Record::new(vec![Value::Int(4), Value::Null], 1);
        let output = filter.invoke(input).unwrap().unwrap();
        assert_eq!(output.values(), &[Value::Int(4), Value::String("n/a".into())]);

        let input = Record::new(vec![Value::Int(4), Value::Null], 2);
        let output = filter.invoke(input).unwrap().unwrap();
        assert_eq!(output.values(), &[Value::Int(4), Value::Null]);
    }

    #[test]
    fn test_non_constant_default_is_rejected() {
        let dest = destination();
        let function = echo(dest.clone()).with_default(1, parse_expression("$1").unwrap());
        let err = Filter::new(function, dest, CancellationToken::new()).err().unwrap();
        assert!(err.to_string().starts_with("default value of argument 2"));
    }

    #[test]
    fn test_failure_does_not_leak_session_changes() {
        let dest = destination();
        let shape = dest.clone();
        let function = TransformFunction::native(
            "counting",
            args(&[DataType::Int, DataType::String]),
            ReturnType::Composite(dest.clone()),
            move |args, session: &mut Session| {
                let seen = session.get("load.seen").and_then(Value::as_i64).unwrap_or(0);
                session.set("load.seen", Value::Int(seen + 1));
                if args[0] == Value::Int(0) {
                    return Err("zero is not allowed".to_string());
                }
                Ok(row(&shape, vec![Value::Int(seen + 1), args[1].clone()]))
            },
        );
        let mut filter = Filter::new(function, dest, CancellationToken::new()).unwrap();

        let ok = |id| Record::from_values(vec![Value::Int(id), Value::String("x".into())]);
        assert_eq!(filter.invoke(ok(1)).unwrap().unwrap()[0], Value::Int(1));

        let err = filter.invoke(ok(0)).unwrap_err();
        assert_eq!(err.field(), Some(0));
        assert_eq!(err.to_string(), "zero is not allowed");

        assert_eq!(filter.invoke(ok(2)).unwrap().unwrap()[0], Value::Int(2));
    }

    #[test]
    fn test_anonymous_result_is_checked_each_call() {
        let dest = destination();
        let function = TransformFunction::native(
            "anon",
            args(&[DataType::Int]),
            ReturnType::Record { out: None },
            |args, _| {
                let types = if args[0] == Value::Int(1) {
                    vec![DataType::Int, DataType::String]
                } else {
                    vec![DataType::Int]
                };
                let shape = Arc::new(Shape::from_types(
                    &types.into_iter().map(|t| (t, TypeModifier::None)).collect::<Vec<_>>(),
                ));
                let values = vec![Value::Int(1); shape.len()];
                Ok(row(&shape, values))
            },
        );
        let mut filter = Filter::new(function, dest, CancellationToken::new()).unwrap();

        assert!(filter.invoke(Record::from_values(vec![Value::Int(1)])).is_ok());
        let err = filter
            .invoke(Record::from_values(vec![Value::Int(2)]))
            .unwrap_err();
        assert!(matches!(err, RecordError::ShapeMismatch(_)));
        assert!(!err.is_content());
    }

    #[test]
    fn test_null_result_and_scalar_result() {
        let dest = destination();
        let function = TransformFunction::native(
            "maybe",
            args(&[DataType::Int]),
            ReturnType::Record { out: None },
            |args, _| match args[0] {
                Value::Int(0) => Ok(Value::Null),
                _ => Ok(Value::Int(7)),
            },
        );
        let mut filter = Filter::new(function, dest, CancellationToken::new()).unwrap();
        assert_eq!(filter.invoke(Record::from_values(vec![Value::Int(0)])).unwrap(), None);
        let err = filter
            .invoke(Record::from_values(vec![Value::Int(3)]))
            .unwrap_err();
        assert!(matches!(err, RecordError::ReturnType));
    }
}
