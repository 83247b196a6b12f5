//! Encoding validation of raw fields and constraint checks of formed rows.

use crate::error::RecordError;
use connectors::{
    catalog::{CheckConstraint, TargetTable},
    encoding::CharEncoding,
};
use expression_engine::{EvalContext, Evaluator};
use model::{core::shape::Shape, records::record::Record};
use std::sync::Arc;
use tracing::debug;

pub struct Checker {
    table: String,
    shape: Arc<Shape>,
    checks: Vec<CheckConstraint>,
    source: CharEncoding,
    destination: CharEncoding,
    has_not_null: bool,
    check_constraints: bool,
}

impl Checker {
    /// `source_encoding` of `None` means the input is in the destination's
    /// encoding. CHECK constraints are only evaluated when
    /// `check_constraints` is set; NOT NULL is always enforced.
    pub fn new(
        table: &TargetTable,
        source_encoding: Option<CharEncoding>,
        check_constraints: bool,
    ) -> Self {
        let destination = table.encoding;
        let source = source_encoding.unwrap_or(destination);
        let check_constraints = check_constraints && !table.checks.is_empty();
        debug!(
            table = %table.qualified_name(),
            source = %source,
            destination = %destination,
            check_constraints,
            "Checker initialized"
        );
        Self {
            table: table.name.clone(),
            shape: table.shape.clone(),
            checks: table.checks.clone(),
            source,
            destination,
            has_not_null: table.shape.has_not_null(),
            check_constraints,
        }
    }

    pub fn needs_conversion(&self) -> bool {
        self.source != self.destination
    }

    pub fn has_constraints(&self) -> bool {
        self.has_not_null || self.check_constraints
    }

    /// Decodes a raw field. With equal encodings the bytes are only
    /// validated; otherwise they are converted and the result must be
    /// representable in the destination encoding. A SQL_ASCII source is
    /// never converted, its bytes are validated against the destination.
    pub fn check_encoding(&self, bytes: &[u8]) -> Result<String, String> {
        let reading = match self.source {
            CharEncoding::SqlAscii => self.destination,
            source => source,
        };
        let text = reading.decode(bytes).ok_or_else(|| {
            format!("invalid byte sequence for encoding \"{}\"", reading.name())
        })?;

        if self.needs_conversion() && self.source != CharEncoding::SqlAscii {
            if let Err(c) = self.destination.encode(&text) {
                return Err(format!(
                    "character '{c}' of encoding \"{}\" has no equivalent in encoding \"{}\"",
                    self.source.name(),
                    self.destination.name()
                ));
            }
        }
        Ok(text)
    }

    /// NOT NULL first, then CHECK constraints in catalog order. Stops at
    /// the first violation.
    pub fn check_constraints(&self, record: &Record) -> Result<(), RecordError> {
        if !self.has_constraints() {
            return Ok(());
        }

        if self.has_not_null {
            for (index, column) in self.shape.columns().iter().enumerate() {
                if column.not_null && !column.dropped && record.is_null(index) {
                    return Err(RecordError::NotNull {
                        column: column.name.clone(),
                    });
                }
            }
        }

        if self.check_constraints {
            for check in &self.checks {
                let mut ctx = EvalContext::for_row(&self.shape, record.values());
                let passed = check.expr.evaluate_check(&mut ctx).map_err(|source| {
                    RecordError::CheckFailed {
                        constraint: check.name.clone(),
                        source,
                    }
                })?;
                if !passed {
                    return Err(RecordError::Check {
                        table: self.table.clone(),
                        constraint: check.name.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expression_engine::parse_expression;
    use model::core::{
        data_type::DataType,
        shape::ColumnDescriptor,
        value::Value,
    };

    fn table(encoding: CharEncoding) -> TargetTable {
        TargetTable {
            database: "db".into(),
            schema: "public".into(),
            name: "accounts".into(),
            shape: Arc::new(Shape::new(
                Some("accounts".into()),
                vec![
                    ColumnDescriptor::new("c1", DataType::Int, 1),
                    ColumnDescriptor::new("c2", DataType::String, 2).with_not_null(true),
                    ColumnDescriptor::new("gone", DataType::Int, 3)
                        .with_not_null(true)
                        .with_dropped(true),
                ],
            )),
            unique_keys: vec![],
            checks: vec![CheckConstraint {
                name: "c1_positive".into(),
                expr: parse_expression("c1 > 0").unwrap(),
            }],
            data_file: None,
            encoding,
        }
    }

    fn latin1() -> CharEncoding {
        CharEncoding::from_label("LATIN1").unwrap()
    }

    #[test]
    fn test_validation_without_conversion() {
        let checker = Checker::new(&table(CharEncoding::utf8()), None, false);
        assert!(!checker.needs_conversion());
        assert_eq!(checker.check_encoding("héllo".as_bytes()), Ok("héllo".into()));
        assert_eq!(
            checker.check_encoding(&[0x61, 0xff]),
            Err("invalid byte sequence for encoding \"UTF-8\"".into())
        );
    }

    #[test]
    fn test_conversion_from_source_encoding() {
        let checker = Checker::new(&table(CharEncoding::utf8()), Some(latin1()), false);
        assert!(checker.needs_conversion());
        assert_eq!(checker.check_encoding(&[0x63, 0x61, 0x66, 0xe9]), Ok("café".into()));
    }

    #[test]
    fn test_unrepresentable_character() {
        let checker = Checker::new(&table(latin1()), Some(CharEncoding::utf8()), false);
        let err = checker.check_encoding("price: 日本".as_bytes()).unwrap_err();
        assert!(err.contains("has no equivalent in encoding"));
    }

    #[test]
    fn test_sql_ascii_source_is_validated_against_destination() {
        let utf8 = Checker::new(&table(CharEncoding::utf8()), Some(CharEncoding::SqlAscii), false);
        assert_eq!(utf8.check_encoding(b"plain"), Ok("plain".into()));
        assert_eq!(
            utf8.check_encoding(b"caf\xe9"),
            Err("invalid byte sequence for encoding \"UTF-8\"".into())
        );

        let latin = Checker::new(&table(latin1()), Some(CharEncoding::SqlAscii), false);
        let text = latin.check_encoding(b"caf\xe9").unwrap();
        assert_eq!(text, "café");
        assert_eq!(latin1().encode(&text), Ok(b"caf\xe9".to_vec()));
    }

    #[test]
    fn test_encoding_check_is_idempotent() {
        let converting = Checker::new(&table(latin1()), Some(CharEncoding::utf8()), false);
        let text = converting.check_encoding("naïve".as_bytes()).unwrap();
        let stored = latin1().encode(&text).unwrap();

        let validating = Checker::new(&table(latin1()), None, false);
        let again = validating.check_encoding(&stored).unwrap();
        assert_eq!(again, text);
        assert_eq!(latin1().encode(&again).unwrap(), stored);
    }

    #[test]
    fn test_not_null_violation_names_column() {
        let checker = Checker::new(&table(CharEncoding::utf8()), None, false);
        let record = Record::from_values(vec![Value::Int(1), Value::Null, Value::Null]);
        let err = checker.check_constraints(&record).unwrap_err();
        assert_eq!(
            err.to_string(),
            "null value in column \"c2\" violates not-null constraint"
        );
        assert_eq!(err.field(), Some(0));
    }

    #[test]
    fn test_check_constraints_only_when_requested() {
        let record = Record::from_values(vec![Value::Int(-5), Value::String("x".into()), Value::Null]);

        let lenient = Checker::new(&table(CharEncoding::utf8()), None, false);
        assert!(lenient.check_constraints(&record).is_ok());

        let strict = Checker::new(&table(CharEncoding::utf8()), None, true);
        let err = strict.check_constraints(&record).unwrap_err();
        assert!(matches!(err, RecordError::Check { ref constraint, .. } if constraint == "c1_positive"));

        let unknown = Record::from_values(vec![Value::Null, Value::String("x".into()), Value::Null]);
        assert!(strict.check_constraints(&unknown).is_ok());
    }
}
