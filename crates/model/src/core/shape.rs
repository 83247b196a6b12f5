use crate::core::data_type::{DataType, TypeModifier};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub modifier: TypeModifier,
    #[serde(default)]
    pub not_null: bool,
    /// Dropped columns keep their slot but never receive data.
    #[serde(default)]
    pub dropped: bool,
    /// 1-based position within the owning shape.
    pub position: usize,
}

/// Ordered column signature of a table row, a composite type, a function's
/// parameter list or a function's result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Shape {
    type_name: Option<String>,
    columns: Vec<ColumnDescriptor>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeMismatch {
    #[error(
        "function return row and query-specified return row do not match: returned row contains {returned} attributes, but query expects {expected}"
    )]
    ColumnCount { returned: usize, expected: usize },

    #[error(
        "function return row and query-specified return row do not match: returned type {returned} at ordinal position {position}, but query expects {expected}"
    )]
    ColumnType {
        position: usize,
        returned: String,
        expected: String,
    },
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: DataType, position: usize) -> Self {
        Self {
            name: name.into(),
            data_type,
            modifier: TypeModifier::None,
            not_null: false,
            dropped: false,
            position,
        }
    }

    pub fn with_modifier(mut self, modifier: TypeModifier) -> Self {
        self.modifier = modifier;
        self
    }

    pub fn with_not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    pub fn with_dropped(mut self, dropped: bool) -> Self {
        self.dropped = dropped;
        self
    }

    pub fn formatted_type(&self) -> String {
        self.modifier.format_type(&self.data_type)
    }
}

impl Shape {
    /// Builds a shape, renumbering positions from 1.
    pub fn new(type_name: Option<String>, columns: Vec<ColumnDescriptor>) -> Self {
        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(i, mut column)| {
                column.position = i + 1;
                column
            })
            .collect();
        Self { type_name, columns }
    }

    /// Shape built from bare types, e.g. a function's argument list.
    pub fn from_types(types: &[(DataType, TypeModifier)]) -> Self {
        let columns = types
            .iter()
            .enumerate()
            .map(|(i, (data_type, modifier))| {
                ColumnDescriptor::new(format!("${}", i + 1), data_type.clone(), i + 1)
                    .with_modifier(*modifier)
            })
            .collect();
        Self::new(None, columns)
    }

    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&ColumnDescriptor> {
        self.columns.get(index)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn live_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| !c.dropped)
    }

    pub fn live_len(&self) -> usize {
        self.live_columns().count()
    }

    pub fn has_not_null(&self) -> bool {
        self.live_columns().any(|c| c.not_null)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| !c.dropped && c.name.eq_ignore_ascii_case(name))
    }

    /// Checks that rows of `self` can be stored as rows of `destination`.
    ///
    /// Column counts must agree. Each column must have the same type as the
    /// destination column, unless the destination column is dropped, in which
    /// case only the physical storage has to agree.
    pub fn check_compatible(&self, destination: &Shape) -> Result<(), ShapeMismatch> {
        if self.len() != destination.len() {
            return Err(ShapeMismatch::ColumnCount {
                returned: self.len(),
                expected: destination.len(),
            });
        }

        for (src, dst) in self.columns.iter().zip(destination.columns.iter()) {
            if src.data_type == dst.data_type {
                continue;
            }
            if dst.dropped && src.data_type.storage() == dst.data_type.storage() {
                continue;
            }
            return Err(ShapeMismatch::ColumnType {
                position: dst.position,
                returned: src.data_type.name().into_owned(),
                expected: dst.data_type.name().into_owned(),
            });
        }

        Ok(())
    }
}
