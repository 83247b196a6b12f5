use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, collections::HashMap, fmt};

/// Declared type of a column, function argument or function result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DataType {
    Boolean,
    Short,
    Int,
    Long,
    Float,
    Double,
    Decimal,
    Char,
    VarChar,
    String,
    Bytea,
    Date,
    Timestamp,
    Json,
    Uuid,
    /// Anonymous row type; the concrete columns travel with each value.
    Record,
    /// Named row type (a table's row type or a standalone composite type).
    Composite(String),
    /// `anyelement`, `anyarray` and friends.
    Polymorphic(String),
    Internal,
}

/// Type modifier attached to a declared type, e.g. the `20` in `varchar(20)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TypeModifier {
    #[default]
    None,
    Length(usize),
    Numeric { precision: u32, scale: u32 },
}

/// Physical storage of a type, compared when a dropped destination column
/// is matched against a different source type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Storage {
    /// Fixed width in bytes, `-1` for variable length.
    pub length: i16,
    pub align: Alignment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Char,
    Short,
    Int,
    Double,
}

lazy_static! {
    static ref TYPE_NAME_MAP: HashMap<&'static str, DataType> = build_type_name_map();
}

impl DataType {
    /// Parses a declared type such as `integer`, `varchar(20)` or `numeric(10,2)`.
    ///
    /// Names that are not built in are treated as composite type names.
    pub fn parse_declared(type_name: &str) -> Result<(Self, TypeModifier), String> {
        let trimmed = type_name.trim();
        if trimmed.is_empty() {
            return Err("empty type name".to_string());
        }

        let (base, modifier) = match trimmed.find('(') {
            Some(open) => {
                let close = trimmed
                    .rfind(')')
                    .filter(|close| *close > open)
                    .ok_or_else(|| format!("invalid type name \"{type_name}\""))?;
                let args = &trimmed[open + 1..close];
                (trimmed[..open].trim(), Some(args))
            }
            None => (trimmed, None),
        };

        let normalized = Self::normalize_type_name(base);
        let data_type = TYPE_NAME_MAP
            .get(normalized.as_str())
            .cloned()
            .unwrap_or_else(|| DataType::Composite(normalized.clone()));

        let modifier = match modifier {
            None => TypeModifier::None,
            Some(args) => data_type.parse_modifier(args).ok_or_else(|| {
                format!("type modifier is not allowed or invalid for type \"{type_name}\"")
            })?,
        };

        Ok((data_type, modifier))
    }

    fn parse_modifier(&self, args: &str) -> Option<TypeModifier> {
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        match self {
            DataType::Char | DataType::VarChar => match parts.as_slice() {
                [len] => len
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .map(TypeModifier::Length),
                _ => None,
            },
            DataType::Decimal => {
                let precision = parts.first()?.parse::<u32>().ok()?;
                let scale = match parts.get(1) {
                    Some(s) => s.parse::<u32>().ok()?,
                    None => 0,
                };
                if parts.len() > 2 || precision == 0 || scale > precision {
                    return None;
                }
                Some(TypeModifier::Numeric { precision, scale })
            }
            _ => None,
        }
    }

    fn normalize_type_name(name: &str) -> String {
        name.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase()
    }

    pub fn name(&self) -> Cow<'_, str> {
        match self {
            DataType::Boolean => Cow::Borrowed("boolean"),
            DataType::Short => Cow::Borrowed("smallint"),
            DataType::Int => Cow::Borrowed("integer"),
            DataType::Long => Cow::Borrowed("bigint"),
            DataType::Float => Cow::Borrowed("real"),
            DataType::Double => Cow::Borrowed("double precision"),
            DataType::Decimal => Cow::Borrowed("numeric"),
            DataType::Char => Cow::Borrowed("character"),
            DataType::VarChar => Cow::Borrowed("character varying"),
            DataType::String => Cow::Borrowed("text"),
            DataType::Bytea => Cow::Borrowed("bytea"),
            DataType::Date => Cow::Borrowed("date"),
            DataType::Timestamp => Cow::Borrowed("timestamp without time zone"),
            DataType::Json => Cow::Borrowed("json"),
            DataType::Uuid => Cow::Borrowed("uuid"),
            DataType::Record => Cow::Borrowed("record"),
            DataType::Composite(name) | DataType::Polymorphic(name) => Cow::Borrowed(name),
            DataType::Internal => Cow::Borrowed("internal"),
        }
    }

    pub fn is_polymorphic(&self) -> bool {
        matches!(self, DataType::Polymorphic(_))
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, DataType::Internal)
    }

    /// Row-valued types: anonymous records and named composites.
    pub fn is_row_type(&self) -> bool {
        matches!(self, DataType::Record | DataType::Composite(_))
    }

    pub fn storage(&self) -> Storage {
        let (length, align) = match self {
            DataType::Boolean => (1, Alignment::Char),
            DataType::Short => (2, Alignment::Short),
            DataType::Int | DataType::Float | DataType::Date => (4, Alignment::Int),
            DataType::Long | DataType::Double | DataType::Timestamp => (8, Alignment::Double),
            DataType::Uuid => (16, Alignment::Char),
            DataType::Record | DataType::Composite(_) => (-1, Alignment::Double),
            DataType::Internal => (8, Alignment::Double),
            DataType::Decimal
            | DataType::Char
            | DataType::VarChar
            | DataType::String
            | DataType::Bytea
            | DataType::Json
            | DataType::Polymorphic(_) => (-1, Alignment::Int),
        };
        Storage { length, align }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl TypeModifier {
    /// Renders the declared type the way error messages quote it.
    pub fn format_type(&self, data_type: &DataType) -> String {
        match self {
            TypeModifier::None => data_type.name().into_owned(),
            TypeModifier::Length(n) => format!("{}({n})", data_type.name()),
            TypeModifier::Numeric { precision, scale } => {
                format!("{}({precision},{scale})", data_type.name())
            }
        }
    }
}

fn build_type_name_map() -> HashMap<&'static str, DataType> {
    use DataType::*;
    HashMap::from([
        ("boolean", Boolean),
        ("bool", Boolean),
        ("smallint", Short),
        ("int2", Short),
        ("integer", Int),
        ("int", Int),
        ("int4", Int),
        ("bigint", Long),
        ("int8", Long),
        ("real", Float),
        ("float4", Float),
        ("double precision", Double),
        ("float8", Double),
        ("numeric", Decimal),
        ("decimal", Decimal),
        ("character", Char),
        ("char", Char),
        ("bpchar", Char),
        ("character varying", VarChar),
        ("varchar", VarChar),
        ("text", String),
        ("bytea", Bytea),
        ("date", Date),
        ("timestamp", Timestamp),
        ("timestamp without time zone", Timestamp),
        ("json", Json),
        ("jsonb", Json),
        ("uuid", Uuid),
        ("record", Record),
        ("anyelement", Polymorphic("anyelement".to_string())),
        ("anyarray", Polymorphic("anyarray".to_string())),
        ("anynonarray", Polymorphic("anynonarray".to_string())),
        ("anyenum", Polymorphic("anyenum".to_string())),
        ("internal", Internal),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_declared_with_modifiers() {
        assert_eq!(
            DataType::parse_declared("varchar(20)").unwrap(),
            (DataType::VarChar, TypeModifier::Length(20))
        );
        assert_eq!(
            DataType::parse_declared("NUMERIC(10, 2)").unwrap(),
            (
                DataType::Decimal,
                TypeModifier::Numeric {
                    precision: 10,
                    scale: 2
                }
            )
        );
        assert_eq!(
            DataType::parse_declared("double   precision").unwrap(),
            (DataType::Double, TypeModifier::None)
        );
    }

    #[test]
    fn test_unknown_names_are_composites() {
        let (data_type, _) = DataType::parse_declared("customers").unwrap();
        assert_eq!(data_type, DataType::Composite("customers".to_string()));
        assert!(data_type.is_row_type());
    }

    #[test]
    fn test_invalid_modifier_rejected() {
        assert!(DataType::parse_declared("integer(4)").is_err());
        assert!(DataType::parse_declared("numeric(2,5)").is_err());
        assert!(DataType::parse_declared("varchar(").is_err());
    }

    #[test]
    fn test_pseudo_types() {
        let (any, _) = DataType::parse_declared("anyelement").unwrap();
        assert!(any.is_polymorphic());
        let (internal, _) = DataType::parse_declared("internal").unwrap();
        assert!(internal.is_internal());
    }

    #[test]
    fn test_format_type() {
        assert_eq!(
            TypeModifier::Length(3).format_type(&DataType::Char),
            "character(3)"
        );
        assert_eq!(
            TypeModifier::None.format_type(&DataType::Int),
            "integer"
        );
    }
}
