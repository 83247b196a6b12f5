use crate::error::{ExpressionError, Result};
use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive, Zero};
use model::{core::value::Value, execution::expr::BinaryOp};
use std::cmp::Ordering;

/// Evaluates a non-logical binary operator over two already evaluated
/// operands. Null on either side yields null.
pub(crate) struct BinaryOpEvaluator<'a> {
    left: &'a Value,
    right: &'a Value,
    op: BinaryOp,
}

impl<'a> BinaryOpEvaluator<'a> {
    pub fn new(left: &'a Value, right: &'a Value, op: BinaryOp) -> Self {
        Self { left, right, op }
    }

    pub fn evaluate(&self) -> Result<Value> {
        use Value::*;

        if self.left.is_null() || self.right.is_null() {
            return Ok(Null);
        }

        match self.op {
            BinaryOp::Concat => self.eval_concat(),
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::GreaterThan
            | BinaryOp::LessThan
            | BinaryOp::GreaterOrEqual
            | BinaryOp::LessOrEqual => self.eval_comparison(),
            BinaryOp::And | BinaryOp::Or => Err(self.mismatch()),
            _ => match (self.left, self.right) {
                (Int(l), Int(r)) => self.eval_int(*l, *r),
                (Float(_), Int(_) | Float(_) | Decimal(_)) | (Int(_) | Decimal(_), Float(_)) => {
                    self.eval_float()
                }
                (Decimal(_), Decimal(_) | Int(_)) | (Int(_), Decimal(_)) => self.eval_decimal(),
                _ => Err(self.mismatch()),
            },
        }
    }

    fn eval_int(&self, l: i64, r: i64) -> Result<Value> {
        let result = match self.op {
            BinaryOp::Add => l.checked_add(r),
            BinaryOp::Subtract => l.checked_sub(r),
            BinaryOp::Multiply => l.checked_mul(r),
            BinaryOp::Divide | BinaryOp::Modulo if r == 0 => {
                return Err(ExpressionError::DivisionByZero)
            }
            BinaryOp::Divide => l.checked_div(r),
            BinaryOp::Modulo => l.checked_rem(r),
            _ => return Err(self.mismatch()),
        };
        result.map(Value::Int).ok_or(ExpressionError::Overflow)
    }

    fn eval_float(&self) -> Result<Value> {
        let l = self.as_float(self.left)?;
        let r = self.as_float(self.right)?;

        Ok(Value::Float(match self.op {
            BinaryOp::Add => l + r,
            BinaryOp::Subtract => l - r,
            BinaryOp::Multiply => l * r,
            BinaryOp::Divide | BinaryOp::Modulo if r == 0.0 => {
                return Err(ExpressionError::DivisionByZero)
            }
            BinaryOp::Divide => l / r,
            BinaryOp::Modulo => l % r,
            _ => return Err(self.mismatch()),
        }))
    }

    fn eval_decimal(&self) -> Result<Value> {
        let l = self.as_decimal(self.left)?;
        let r = self.as_decimal(self.right)?;

        Ok(Value::Decimal(match self.op {
            BinaryOp::Add => l + r,
            BinaryOp::Subtract => l - r,
            BinaryOp::Multiply => l * r,
            BinaryOp::Divide | BinaryOp::Modulo if r.is_zero() => {
                return Err(ExpressionError::DivisionByZero)
            }
            BinaryOp::Divide => l / r,
            BinaryOp::Modulo => l % r,
            _ => return Err(self.mismatch()),
        }))
    }

    fn eval_comparison(&self) -> Result<Value> {
        let ordering = self.left.compare(self.right).ok_or_else(|| self.mismatch())?;
        Ok(Value::Boolean(match self.op {
            BinaryOp::Equal => ordering == Ordering::Equal,
            BinaryOp::NotEqual => ordering != Ordering::Equal,
            BinaryOp::GreaterThan => ordering == Ordering::Greater,
            BinaryOp::LessThan => ordering == Ordering::Less,
            BinaryOp::GreaterOrEqual => ordering != Ordering::Less,
            _ => ordering != Ordering::Greater,
        }))
    }

    fn eval_concat(&self) -> Result<Value> {
        let l = self.left.to_text().unwrap_or_default();
        let r = self.right.to_text().unwrap_or_default();
        Ok(Value::String(l + &r))
    }

    fn as_float(&self, v: &Value) -> Result<f64> {
        match v {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            Value::Decimal(d) => d.to_f64().ok_or(ExpressionError::Overflow),
            _ => Err(self.mismatch()),
        }
    }

    fn as_decimal(&self, v: &Value) -> Result<BigDecimal> {
        match v {
            Value::Int(i) => Ok(BigDecimal::from(*i)),
            Value::Decimal(d) => Ok(d.clone()),
            Value::Float(f) => BigDecimal::from_f64(*f).ok_or(ExpressionError::Overflow),
            _ => Err(self.mismatch()),
        }
    }

    fn mismatch(&self) -> ExpressionError {
        let type_name = |v: &Value| {
            v.data_type()
                .map(|t| t.name().into_owned())
                .unwrap_or_else(|| "unknown".to_string())
        };
        ExpressionError::TypeMismatch {
            op: format!("{:?}", self.op),
            left: type_name(self.left),
            right: type_name(self.right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn eval(l: Value, op: BinaryOp, r: Value) -> Result<Value> {
        BinaryOpEvaluator::new(&l, &r, op).evaluate()
    }

    #[test]
    fn test_int_arithmetic() {
        assert_eq!(eval(Value::Int(7), BinaryOp::Modulo, Value::Int(3)), Ok(Value::Int(1)));
        assert_eq!(
            eval(Value::Int(1), BinaryOp::Divide, Value::Int(0)),
            Err(ExpressionError::DivisionByZero)
        );
        assert_eq!(
            eval(Value::Int(i64::MAX), BinaryOp::Add, Value::Int(1)),
            Err(ExpressionError::Overflow)
        );
    }

    #[test]
    fn test_decimal_arithmetic_is_exact() {
        let a = Value::Decimal(BigDecimal::from_str("0.1").unwrap());
        let b = Value::Decimal(BigDecimal::from_str("0.2").unwrap());
        assert_eq!(
            eval(a, BinaryOp::Add, b),
            Ok(Value::Decimal(BigDecimal::from_str("0.3").unwrap()))
        );
    }

    #[test]
    fn test_null_propagates() {
        assert_eq!(eval(Value::Null, BinaryOp::Equal, Value::Int(1)), Ok(Value::Null));
        assert_eq!(
            eval(Value::String("a".into()), BinaryOp::Concat, Value::Null),
            Ok(Value::Null)
        );
    }

    #[test]
    fn test_comparison_and_mismatch() {
        assert_eq!(
            eval(Value::String("b".into()), BinaryOp::GreaterThan, Value::String("a".into())),
            Ok(Value::Boolean(true))
        );
        assert!(matches!(
            eval(Value::String("b".into()), BinaryOp::Add, Value::Int(1)),
            Err(ExpressionError::TypeMismatch { .. })
        ));
    }
}
