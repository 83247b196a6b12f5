//! Text input functions: one per built-in type, each honouring the declared
//! type modifier. These turn a raw field string into a typed [`Value`].

use crate::core::{
    data_type::{DataType, TypeModifier},
    value::Value,
};
use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{NaiveDate, NaiveDateTime};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub type InputFn = fn(&str, TypeModifier) -> Result<Value, InputError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("invalid input syntax for type {type_name}: \"{input}\"")]
    Syntax { type_name: String, input: String },

    #[error("value \"{input}\" is out of range for type {type_name}")]
    OutOfRange { type_name: String, input: String },

    #[error("value too long for type {0}")]
    TooLong(String),

    #[error(
        "numeric field overflow: a field with precision {precision}, scale {scale} must round to an absolute value less than 10^{}",
        precision - scale
    )]
    NumericOverflow { precision: u32, scale: u32 },

    #[error("invalid hexadecimal data: \"{0}\"")]
    InvalidHex(String),
}

fn syntax(type_name: &str, input: &str) -> InputError {
    InputError::Syntax {
        type_name: type_name.to_string(),
        input: input.to_string(),
    }
}

/// Looks up the input function of a declared type.
///
/// Pseudo types and row types have no text input function.
pub fn resolve_input(data_type: &DataType) -> Result<InputFn, String> {
    let input: InputFn = match data_type {
        DataType::Boolean => bool_in,
        DataType::Short => int2_in,
        DataType::Int => int4_in,
        DataType::Long => int8_in,
        DataType::Float => float4_in,
        DataType::Double => float8_in,
        DataType::Decimal => numeric_in,
        DataType::Char => bpchar_in,
        DataType::VarChar => varchar_in,
        DataType::String => text_in,
        DataType::Bytea => bytea_in,
        DataType::Date => date_in,
        DataType::Timestamp => timestamp_in,
        DataType::Json => json_in,
        DataType::Uuid => uuid_in,
        DataType::Record
        | DataType::Composite(_)
        | DataType::Polymorphic(_)
        | DataType::Internal => {
            return Err(format!("no input function available for type {data_type}"));
        }
    };
    Ok(input)
}

/// Converts a value produced by an expression or native function into the
/// declared type, going through the text form when the runtime type differs.
pub fn coerce_value(
    value: Value,
    data_type: &DataType,
    modifier: TypeModifier,
) -> Result<Value, InputError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    if let (Value::Composite(_), DataType::Record | DataType::Composite(_)) = (&value, data_type) {
        return Ok(value);
    }
    let Ok(input) = resolve_input(data_type) else {
        return Err(syntax(&data_type.name(), &value.to_string()));
    };
    match (&value, data_type, modifier) {
        (Value::Boolean(_), DataType::Boolean, _)
        | (Value::Float(_), DataType::Double, _)
        | (Value::Json(_), DataType::Json, _)
        | (Value::Uuid(_), DataType::Uuid, _)
        | (Value::Bytes(_), DataType::Bytea, _)
        | (Value::Date(_), DataType::Date, _)
        | (Value::Timestamp(_), DataType::Timestamp, _)
        | (Value::Int(_), DataType::Long, _)
        | (Value::String(_), DataType::String, _) => Ok(value),
        _ => match value.to_text() {
            Some(text) => input(&text, modifier),
            None => Ok(Value::Null),
        },
    }
}

fn bool_in(input: &str, _: TypeModifier) -> Result<Value, InputError> {
    match input.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Ok(Value::Boolean(true)),
        "f" | "false" | "n" | "no" | "off" | "0" => Ok(Value::Boolean(false)),
        _ => Err(syntax("boolean", input)),
    }
}

fn int_in(input: &str, type_name: &str, min: i64, max: i64) -> Result<Value, InputError> {
    let trimmed = input.trim();
    let is_numeric = !trimmed.is_empty()
        && trimmed
            .trim_start_matches(['+', '-'])
            .chars()
            .all(|c| c.is_ascii_digit())
        && trimmed.len() > usize::from(trimmed.starts_with(['+', '-']));
    if !is_numeric {
        return Err(syntax(type_name, input));
    }
    match trimmed.parse::<i64>() {
        Ok(v) if (min..=max).contains(&v) => Ok(Value::Int(v)),
        _ => Err(InputError::OutOfRange {
            type_name: type_name.to_string(),
            input: input.to_string(),
        }),
    }
}

fn int2_in(input: &str, _: TypeModifier) -> Result<Value, InputError> {
    int_in(input, "smallint", i16::MIN as i64, i16::MAX as i64)
}

fn int4_in(input: &str, _: TypeModifier) -> Result<Value, InputError> {
    int_in(input, "integer", i32::MIN as i64, i32::MAX as i64)
}

fn int8_in(input: &str, _: TypeModifier) -> Result<Value, InputError> {
    int_in(input, "bigint", i64::MIN, i64::MAX)
}

fn float_in(input: &str, type_name: &str, single: bool) -> Result<Value, InputError> {
    let parsed = input
        .trim()
        .parse::<f64>()
        .map_err(|_| syntax(type_name, input))?;
    if single && parsed.is_finite() && parsed.abs() > f32::MAX as f64 {
        return Err(InputError::OutOfRange {
            type_name: type_name.to_string(),
            input: input.to_string(),
        });
    }
    Ok(Value::Float(if single { parsed as f32 as f64 } else { parsed }))
}

fn float4_in(input: &str, _: TypeModifier) -> Result<Value, InputError> {
    float_in(input, "real", true)
}

fn float8_in(input: &str, _: TypeModifier) -> Result<Value, InputError> {
    float_in(input, "double precision", false)
}

fn numeric_in(input: &str, modifier: TypeModifier) -> Result<Value, InputError> {
    let parsed =
        BigDecimal::from_str(input.trim()).map_err(|_| syntax("numeric", input))?;

    let TypeModifier::Numeric { precision, scale } = modifier else {
        return Ok(Value::Decimal(parsed));
    };

    let rounded = parsed.with_scale_round(scale as i64, RoundingMode::HalfUp);
    let integral = rounded.abs().with_scale(0).to_string();
    let integral_digits = integral.trim_start_matches('0').len() as u32;
    if integral_digits > precision - scale {
        return Err(InputError::NumericOverflow { precision, scale });
    }
    Ok(Value::Decimal(rounded))
}

/// Shared length rule of `char(n)` and `varchar(n)`: excess characters are
/// only tolerated when they are all blanks, and are then cut off.
fn bounded_text(
    input: &str,
    modifier: TypeModifier,
    data_type: &DataType,
) -> Result<String, InputError> {
    let TypeModifier::Length(max) = modifier else {
        return Ok(input.to_string());
    };
    let char_count = input.chars().count();
    if char_count <= max {
        return Ok(input.to_string());
    }
    let (cut, _) = input.char_indices().nth(max).unwrap_or((input.len(), ' '));
    if input[cut..].chars().all(|c| c == ' ') {
        Ok(input[..cut].to_string())
    } else {
        Err(InputError::TooLong(modifier.format_type(data_type)))
    }
}

fn bpchar_in(input: &str, modifier: TypeModifier) -> Result<Value, InputError> {
    let mut text = bounded_text(input, modifier, &DataType::Char)?;
    if let TypeModifier::Length(len) = modifier {
        let pad = len.saturating_sub(text.chars().count());
        text.extend(std::iter::repeat_n(' ', pad));
    }
    Ok(Value::String(text))
}

fn varchar_in(input: &str, modifier: TypeModifier) -> Result<Value, InputError> {
    bounded_text(input, modifier, &DataType::VarChar).map(Value::String)
}

fn text_in(input: &str, _: TypeModifier) -> Result<Value, InputError> {
    Ok(Value::String(input.to_string()))
}

fn bytea_in(input: &str, _: TypeModifier) -> Result<Value, InputError> {
    let Some(hex) = input.strip_prefix("\\x") else {
        return Ok(Value::Bytes(input.as_bytes().to_vec()));
    };
    if !hex.is_ascii() || hex.len() % 2 != 0 {
        return Err(InputError::InvalidHex(input.to_string()));
    }
    let bytes = hex
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
        })
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| InputError::InvalidHex(input.to_string()))?;
    Ok(Value::Bytes(bytes))
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
];

fn date_in(input: &str, _: TypeModifier) -> Result<Value, InputError> {
    let trimmed = input.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .map(Value::Date)
        .ok_or_else(|| syntax("date", input))
}

fn timestamp_in(input: &str, _: TypeModifier) -> Result<Value, InputError> {
    let trimmed = input.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(Value::Timestamp)
        .ok_or_else(|| syntax("timestamp without time zone", input))
}

fn json_in(input: &str, _: TypeModifier) -> Result<Value, InputError> {
    serde_json::from_str(input)
        .map(Value::Json)
        .map_err(|_| syntax("json", input))
}

fn uuid_in(input: &str, _: TypeModifier) -> Result<Value, InputError> {
    Uuid::parse_str(input.trim())
        .map(Value::Uuid)
        .map_err(|_| syntax("uuid", input))
}
