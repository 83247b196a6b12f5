use crate::{
    error::{ExpressionError, Result},
    session::Session,
};
use model::core::{shape::Shape, value::Value};

/// Everything an expression may read or, through session functions, write.
pub struct EvalContext<'a> {
    row: Option<(&'a Shape, &'a [Value])>,
    params: &'a [Value],
    session: Option<&'a mut Session>,
}

impl<'a> EvalContext<'a> {
    /// Context for constant expressions such as parameter defaults.
    pub fn constant() -> Self {
        Self {
            row: None,
            params: &[],
            session: None,
        }
    }

    /// Context evaluating against one row, e.g. a CHECK constraint.
    pub fn for_row(shape: &'a Shape, values: &'a [Value]) -> Self {
        Self {
            row: Some((shape, values)),
            params: &[],
            session: None,
        }
    }

    /// Context for a function body with positional arguments.
    pub fn for_call(params: &'a [Value], session: &'a mut Session) -> Self {
        Self {
            row: None,
            params,
            session: Some(session),
        }
    }

    pub fn column(&self, name: &str) -> Result<Value> {
        let (shape, values) = self
            .row
            .ok_or_else(|| ExpressionError::UnknownColumn(name.to_string()))?;
        let index = shape
            .index_of(name)
            .ok_or_else(|| ExpressionError::UnknownColumn(name.to_string()))?;
        Ok(values.get(index).cloned().unwrap_or(Value::Null))
    }

    pub fn param(&self, index: usize) -> Result<Value> {
        index
            .checked_sub(1)
            .and_then(|i| self.params.get(i))
            .cloned()
            .ok_or(ExpressionError::MissingParameter(index))
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_deref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_deref_mut()
    }
}
