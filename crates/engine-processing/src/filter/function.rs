use crate::error::LoadError;
use connectors::catalog::{Catalog, build_shape, defs::FunctionDef};
use expression_engine::{
    EvalContext, Evaluator, Session, TypeScope, infer_expression_type, parse_expression,
};
use model::{
    core::{
        data_type::{DataType, TypeModifier},
        input::coerce_value,
        shape::{ColumnDescriptor, Shape},
        value::{CompositeValue, Value},
    },
    execution::expr::CompiledExpression,
};
use std::{fmt, sync::Arc};
use tracing::debug;

/// Body of a function registered from Rust code. Errors are reported as
/// messages, like a raised exception.
pub type NativeFn = Arc<dyn Fn(&[Value], &mut Session) -> Result<Value, String> + Send + Sync>;

#[derive(Debug, Clone)]
pub enum ReturnType {
    /// A named row type.
    Composite(Arc<Shape>),
    /// `record`, optionally with declared OUT columns.
    Record { out: Option<Arc<Shape>> },
    Scalar(DataType),
}

#[derive(Clone)]
pub enum FunctionBody {
    /// One expression per result column, and an optional predicate that
    /// makes the call return null.
    Declarative {
        columns: Vec<CompiledExpression>,
        null_if: Option<CompiledExpression>,
    },
    Native(NativeFn),
}

impl fmt::Debug for FunctionBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionBody::Declarative { columns, null_if } => f
                .debug_struct("Declarative")
                .field("columns", &columns.len())
                .field("null_if", &null_if.is_some())
                .finish(),
            FunctionBody::Native(_) => f.write_str("Native"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransformFunction {
    pub name: String,
    pub arg_types: Vec<(DataType, TypeModifier)>,
    /// Default expression per argument, if declared.
    pub defaults: Vec<Option<CompiledExpression>>,
    pub strict: bool,
    pub returns_set: bool,
    pub variadic: bool,
    pub returns: ReturnType,
    pub body: FunctionBody,
}

impl TransformFunction {
    pub fn native<F>(
        name: impl Into<String>,
        arg_types: Vec<(DataType, TypeModifier)>,
        returns: ReturnType,
        body: F,
    ) -> Self
    where
        F: Fn(&[Value], &mut Session) -> Result<Value, String> + Send + Sync + 'static,
    {
        let arity = arg_types.len();
        Self {
            name: name.into(),
            arg_types,
            defaults: vec![None; arity],
            strict: false,
            returns_set: false,
            variadic: false,
            returns,
            body: FunctionBody::Native(Arc::new(body)),
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Declares a default for the 0-based argument `index`.
    pub fn with_default(mut self, index: usize, expr: CompiledExpression) -> Self {
        if let Some(slot) = self.defaults.get_mut(index) {
            *slot = Some(expr);
        }
        self
    }

    pub fn arity(&self) -> usize {
        self.arg_types.len()
    }

    /// `name(type, ...)`, as used in messages and the parameter dump.
    pub fn signature(&self) -> String {
        let types = self
            .arg_types
            .iter()
            .map(|(t, m)| m.format_type(t))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({types})", self.name)
    }

    pub fn param_shape(&self) -> Shape {
        Shape::from_types(&self.arg_types)
    }

    /// Runs the body. Null means the function returned null.
    pub fn call(&self, args: &[Value], session: &mut Session) -> Result<Value, String> {
        match &self.body {
            FunctionBody::Native(f) => f(args, session),
            FunctionBody::Declarative { columns, null_if } => {
                let mut ctx = EvalContext::for_call(args, session);
                if let Some(predicate) = null_if {
                    let value = predicate.evaluate(&mut ctx).map_err(|e| e.to_string())?;
                    if value == Value::Boolean(true) {
                        return Ok(Value::Null);
                    }
                }
                let values = columns
                    .iter()
                    .map(|expr| expr.evaluate(&mut ctx))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| e.to_string())?;
                self.build_result(values)
            }
        }
    }

    fn build_result(&self, values: Vec<Value>) -> Result<Value, String> {
        let shape = match &self.returns {
            ReturnType::Composite(shape) | ReturnType::Record { out: Some(shape) } => {
                shape.clone()
            }
            ReturnType::Record { out: None } => Arc::new(self.anonymous_shape(&values)),
            ReturnType::Scalar(data_type) => {
                let value = values.into_iter().next().unwrap_or(Value::Null);
                return coerce_value(value, data_type, TypeModifier::None)
                    .map_err(|e| e.to_string());
            }
        };

        let values = shape
            .columns()
            .iter()
            .zip(values)
            .map(|(column, value)| coerce_value(value, &column.data_type, column.modifier))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;
        Ok(Value::Composite(CompositeValue { shape, values }))
    }

    /// Row type of a `record` result without OUT columns: each column takes
    /// its statically inferred type, falling back to the runtime type and
    /// to `text` for nulls.
    fn anonymous_shape(&self, values: &[Value]) -> Shape {
        let FunctionBody::Declarative { columns, .. } = &self.body else {
            return Shape::default();
        };
        let param_types = self
            .arg_types
            .iter()
            .map(|(t, _)| t.clone())
            .collect::<Vec<_>>();
        let scope = TypeScope::Params(&param_types);
        let columns = columns
            .iter()
            .zip(values)
            .enumerate()
            .map(|(i, (expr, value))| {
                let data_type = infer_expression_type(expr, &scope)
                    .or_else(|| value.data_type())
                    .unwrap_or(DataType::String);
                ColumnDescriptor::new(format!("column{}", i + 1), data_type, i + 1)
            })
            .collect();
        Shape::new(None, columns)
    }

    fn from_def(def: &FunctionDef, catalog: &Catalog) -> Result<Self, LoadError> {
        let setup = |message: String| LoadError::Setup(format!("function {}: {message}", def.name));

        let arg_types = def
            .args
            .iter()
            .map(|arg| DataType::parse_declared(&arg.type_name))
            .collect::<Result<Vec<_>, _>>()
            .map_err(setup)?;

        let defaults = def
            .args
            .iter()
            .map(|arg| arg.default.as_deref().map(parse_expression).transpose())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| setup(e.to_string()))?;

        let returns = if def.returns.trim().eq_ignore_ascii_case("record") {
            let out = if def.out.is_empty() {
                None
            } else {
                Some(Arc::new(build_shape(None, &def.out)?))
            };
            ReturnType::Record { out }
        } else {
            match DataType::parse_declared(&def.returns).map_err(setup)? {
                (DataType::Composite(name), _) => ReturnType::Composite(catalog.resolve_type(&name)?),
                (data_type, _) => ReturnType::Scalar(data_type),
            }
        };

        let columns = def
            .body
            .iter()
            .map(|text| parse_expression(text))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| setup(e.to_string()))?;
        let null_if = def
            .null_if
            .as_deref()
            .map(parse_expression)
            .transpose()
            .map_err(|e| setup(e.to_string()))?;

        let expected = match &returns {
            ReturnType::Composite(shape) | ReturnType::Record { out: Some(shape) } => shape.len(),
            ReturnType::Record { out: None } => columns.len(),
            ReturnType::Scalar(_) => 1,
        };
        if columns.len() != expected {
            return Err(setup(format!(
                "body returns {} column(s), but its result type has {expected}",
                columns.len()
            )));
        }

        Ok(Self {
            name: def.name.clone(),
            arg_types,
            defaults,
            strict: def.strict,
            returns_set: def.returns_set,
            variadic: def.variadic,
            returns,
            body: FunctionBody::Declarative { columns, null_if },
        })
    }
}

/// Transform functions available to `FILTER`.
#[derive(Debug, Default, Clone)]
pub struct TransformRegistry {
    functions: Vec<TransformFunction>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every declarative function of the catalog.
    pub fn from_catalog(catalog: &Catalog) -> Result<Self, LoadError> {
        let functions = catalog
            .functions()
            .iter()
            .map(|def| TransformFunction::from_def(def, catalog))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = functions.len(), "Transform functions registered");
        Ok(Self { functions })
    }

    pub fn register(&mut self, function: TransformFunction) {
        self.functions.push(function);
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Finds a function by `name` or `name(type, ...)`. An unqualified name
    /// must match exactly one function.
    pub fn lookup(&self, spec: &str) -> Result<&TransformFunction, LoadError> {
        let (name, arg_types) = parse_signature(spec)?;
        let mut candidates = self.functions.iter().filter(|f| {
            f.name.eq_ignore_ascii_case(&name)
                && arg_types.as_ref().is_none_or(|types| {
                    types.len() == f.arg_types.len()
                        && types.iter().zip(&f.arg_types).all(|(a, (b, _))| a == b)
                })
        });

        let found = candidates
            .next()
            .ok_or_else(|| LoadError::Setup(format!("function {spec} does not exist")))?;
        if candidates.next().is_some() {
            return Err(LoadError::Setup(format!(
                "function name \"{name}\" is not unique"
            )));
        }
        Ok(found)
    }
}

fn parse_signature(spec: &str) -> Result<(String, Option<Vec<DataType>>), LoadError> {
    let invalid = || LoadError::Setup(format!("invalid function name \"{spec}\""));
    let spec = spec.trim();
    let Some(open) = spec.find('(') else {
        return Ok((spec.to_string(), None));
    };
    let inner = spec[open + 1..].strip_suffix(')').ok_or_else(invalid)?;
    let name = spec[..open].trim();
    if name.is_empty() {
        return Err(invalid());
    }

    let mut types = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                types.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if !inner.trim().is_empty() {
        types.push(&inner[start..]);
    }

    let types = types
        .into_iter()
        .map(|t| {
            DataType::parse_declared(t)
                .map(|(data_type, _)| data_type)
                .map_err(|_| invalid())
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((name.to_string(), Some(types)))
}
