//! On-disk JSON layout of the destination catalog.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_schema() -> String {
    "public".to_string()
}

fn default_encoding() -> String {
    "UTF8".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogDef {
    pub database: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default)]
    pub tables: Vec<TableDef>,
    #[serde(default)]
    pub types: Vec<TypeDef>,
    #[serde(default)]
    pub functions: Vec<FunctionDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDef {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub name: String,
    #[serde(default)]
    pub data_file: Option<PathBuf>,
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub unique: Vec<Vec<String>>,
    #[serde(default)]
    pub checks: Vec<CheckDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub dropped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckDef {
    pub name: String,
    pub expr: String,
}

/// Standalone composite type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

/// Declarative transform function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub args: Vec<ArgDef>,
    /// Scalar type, `record`, or a composite/table type name.
    pub returns: String,
    /// OUT columns of a function returning `record`.
    #[serde(default)]
    pub out: Vec<ColumnDef>,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub returns_set: bool,
    #[serde(default)]
    pub variadic: bool,
    /// One expression per result column, over `$1..$n`.
    #[serde(default)]
    pub body: Vec<String>,
    /// When this evaluates to true the function returns null.
    #[serde(default)]
    pub null_if: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgDef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub default: Option<String>,
}
