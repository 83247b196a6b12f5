//! Typed record construction from raw field sets.

pub mod resolver;

use crate::{checker::Checker, error::RecordError};
use model::{
    core::{shape::Shape, value::Value},
    records::{field_set::FieldSet, record::Record},
};
pub use resolver::{ResolvedColumn, TypedColumnResolver};

/// Converts field sets into records of the active shape: the transform
/// function's parameters when one is configured, the destination otherwise.
#[derive(Debug)]
pub struct TupleFormer {
    columns: Vec<ResolvedColumn>,
    width: usize,
    destination_len: usize,
}

impl TupleFormer {
    pub fn new(active: &Shape, destination: &Shape) -> Result<Self, String> {
        let columns = TypedColumnResolver::resolve(active)?;
        Ok(Self {
            columns,
            width: active.len().max(destination.len()),
            destination_len: destination.len(),
        })
    }

    /// Number of fields a record may supply.
    pub fn max_fields(&self) -> usize {
        self.columns.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Converts every supplied field with its column's input function.
    /// Positions past the supplied fields stay null.
    pub fn form(&self, fields: &FieldSet, checker: &Checker) -> Result<Record, RecordError> {
        if fields.len() > self.columns.len() {
            return Err(RecordError::ExtraData {
                field: self.columns.len() + 1,
            });
        }

        let mut values = vec![Value::Null; self.width];
        let mut supplied = 0;
        for (index, (field, column)) in fields.iter().zip(&self.columns).enumerate() {
            let field_no = index + 1;
            supplied = column.position + 1;
            let Some(bytes) = field else {
                continue;
            };
            let text = checker
                .check_encoding(bytes)
                .map_err(|message| RecordError::Encoding {
                    field: field_no,
                    message,
                })?;
            values[column.position] = (column.input)(&text, column.modifier).map_err(|source| {
                RecordError::Coercion {
                    field: field_no,
                    source,
                }
            })?;
        }

        Ok(Record::new(values, supplied))
    }

    /// Record of the destination shape with every position null.
    pub fn form_all_null(&self) -> Record {
        Record::all_null(self.destination_len)
    }
}
