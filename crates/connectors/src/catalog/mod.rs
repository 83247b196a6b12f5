pub mod defs;

use crate::{encoding::CharEncoding, error::CatalogError};
use defs::{CatalogDef, ColumnDef, FunctionDef, TableDef};
use expression_engine::parse_expression;
use model::{
    core::{
        data_type::DataType,
        shape::{ColumnDescriptor, Shape},
    },
    execution::expr::CompiledExpression,
};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::debug;

/// Destination catalog loaded from a JSON file. Resolves table identifiers
/// to shapes and constraint metadata.
#[derive(Debug, Clone)]
pub struct Catalog {
    def: CatalogDef,
    base_dir: PathBuf,
    encoding: CharEncoding,
}

/// Everything the loader needs to know about the destination table.
#[derive(Debug, Clone)]
pub struct TargetTable {
    pub database: String,
    pub schema: String,
    pub name: String,
    pub shape: Arc<Shape>,
    pub unique_keys: Vec<UniqueKey>,
    pub checks: Vec<CheckConstraint>,
    pub data_file: Option<PathBuf>,
    pub encoding: CharEncoding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub name: String,
    /// 0-based column indexes into the table shape.
    pub columns: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct CheckConstraint {
    pub name: String,
    pub expr: CompiledExpression,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let def: CatalogDef = serde_json::from_str(&text).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_def(def, base_dir)
    }

    pub fn from_def(def: CatalogDef, base_dir: PathBuf) -> Result<Self, CatalogError> {
        let encoding = CharEncoding::from_label(&def.encoding)
            .ok_or_else(|| CatalogError::UnknownEncoding(def.encoding.clone()))?;
        debug!(
            database = %def.database,
            tables = def.tables.len(),
            functions = def.functions.len(),
            "Catalog loaded"
        );
        Ok(Self {
            def,
            base_dir,
            encoding,
        })
    }

    pub fn database(&self) -> &str {
        &self.def.database
    }

    pub fn encoding(&self) -> CharEncoding {
        self.encoding
    }

    pub fn functions(&self) -> &[FunctionDef] {
        &self.def.functions
    }

    /// Resolves `table` or `schema.table` (schema defaults to `public`).
    pub fn resolve_table(&self, identifier: &str) -> Result<TargetTable, CatalogError> {
        let table = self.find_table(identifier)?;
        let shape = Arc::new(build_shape(Some(table.name.clone()), &table.columns)?);

        let unique_keys = table
            .unique
            .iter()
            .map(|cols| {
                let columns = cols
                    .iter()
                    .map(|c| {
                        shape.index_of(c).ok_or_else(|| CatalogError::UnknownColumn {
                            table: table.name.clone(),
                            column: c.clone(),
                            context: "unique key".to_string(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(UniqueKey {
                    name: format!("{}_{}_key", table.name, cols.join("_")),
                    columns,
                })
            })
            .collect::<Result<Vec<_>, CatalogError>>()?;

        let checks = table
            .checks
            .iter()
            .map(|check| {
                parse_expression(&check.expr)
                    .map(|expr| CheckConstraint {
                        name: check.name.clone(),
                        expr,
                    })
                    .map_err(|source| CatalogError::InvalidCheck {
                        name: check.name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let data_file = table.data_file.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                self.base_dir.join(p)
            }
        });

        Ok(TargetTable {
            database: self.def.database.clone(),
            schema: table.schema.clone(),
            name: table.name.clone(),
            shape,
            unique_keys,
            checks,
            data_file,
            encoding: self.encoding,
        })
    }

    /// Row type by name: a standalone composite type or a table's row type.
    pub fn resolve_type(&self, name: &str) -> Result<Arc<Shape>, CatalogError> {
        if let Some(t) = self
            .def
            .types
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
        {
            return Ok(Arc::new(build_shape(Some(t.name.clone()), &t.columns)?));
        }
        match self.find_table(name) {
            Ok(table) => Ok(Arc::new(build_shape(Some(table.name.clone()), &table.columns)?)),
            Err(_) => Err(CatalogError::UnknownType(name.to_string())),
        }
    }

    fn find_table(&self, identifier: &str) -> Result<&TableDef, CatalogError> {
        let (schema, name) = match identifier.split_once('.') {
            Some((schema, name)) => (unquote(schema), unquote(name)),
            None => ("public".to_string(), unquote(identifier)),
        };
        self.def
            .tables
            .iter()
            .find(|t| t.schema.eq_ignore_ascii_case(&schema) && t.name.eq_ignore_ascii_case(&name))
            .ok_or_else(|| CatalogError::UnknownTable(identifier.to_string()))
    }
}

impl TargetTable {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

fn unquote(ident: &str) -> String {
    let trimmed = ident.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(trimmed)
        .to_string()
}

/// Builds a shape from catalog column definitions.
pub fn build_shape(type_name: Option<String>, columns: &[ColumnDef]) -> Result<Shape, CatalogError> {
    let columns = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let (data_type, modifier) =
                DataType::parse_declared(&c.type_name).map_err(|reason| CatalogError::InvalidType {
                    column: c.name.clone(),
                    type_name: c.type_name.clone(),
                    reason,
                })?;
            Ok(ColumnDescriptor::new(c.name.clone(), data_type, i + 1)
                .with_modifier(modifier)
                .with_not_null(c.not_null)
                .with_dropped(c.dropped))
        })
        .collect::<Result<Vec<_>, CatalogError>>()?;
    Ok(Shape::new(type_name, columns))
}
