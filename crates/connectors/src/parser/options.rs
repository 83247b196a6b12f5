use super::{Parser, csv::CsvParser, fixed::FixedParser, tuple::TupleParser};
use crate::error::ParserError;
use std::{collections::HashSet, path::Path};

/// Input formats selectable with `TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    Csv,
    /// Fixed-width records; `FIXED` is an alias.
    Binary,
    /// JSON Lines of already separated values.
    Tuple,
}

impl ParserKind {
    pub const CHOICES: [&'static str; 4] = ["CSV", "BINARY", "FIXED", "TUPLE"];

    pub fn from_choice(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "CSV" => Some(ParserKind::Csv),
            "BINARY" | "FIXED" => Some(ParserKind::Binary),
            "TUPLE" => Some(ParserKind::Tuple),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ParserKind::Csv => "CSV",
            ParserKind::Binary => "BINARY",
            ParserKind::Tuple => "TUPLE",
        }
    }
}

/// Options every parser accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonOptions {
    /// Transform function, `name` or `name(type, ...)`.
    pub filter: Option<String>,
    /// Source encoding label.
    pub encoding: Option<String>,
    pub check_constraints: bool,
    /// Leading records to skip.
    pub skip: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub quote: u8,
    pub escape: u8,
    pub null: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            escape: b'"',
            null: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedOptions {
    /// Byte width of each column, in order.
    pub widths: Vec<usize>,
    pub preserve_blanks: bool,
    pub null: Option<String>,
}

impl FixedOptions {
    pub fn record_len(&self) -> usize {
        self.widths.iter().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOptions {
    Csv(CsvOptions),
    Binary(FixedOptions),
    Tuple,
}

/// Parser configuration collected from control-file keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    pub kind: ParserKind,
    pub common: CommonOptions,
    pub format: FormatOptions,
    seen: HashSet<String>,
}

/// `YES/NO/TRUE/FALSE/ON/OFF/1/0`, case-insensitive.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_uppercase().as_str() {
        "YES" | "TRUE" | "ON" | "1" | "Y" | "T" => Some(true),
        "NO" | "FALSE" | "OFF" | "0" | "N" | "F" => Some(false),
        _ => None,
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ParserError {
    ParserError::InvalidParam {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn single_byte(key: &str, value: &str) -> Result<u8, ParserError> {
    match value.as_bytes() {
        [b] => Ok(*b),
        _ => Err(invalid(key, value, "must be a single one-byte character")),
    }
}

/// Parses a `COL` width: `N` or `CHAR(N)`.
fn parse_width(value: &str) -> Option<usize> {
    let trimmed = value.trim();
    let upper = trimmed.to_ascii_uppercase();
    let digits = upper
        .strip_prefix("CHAR(")
        .and_then(|rest| rest.strip_suffix(')'))
        .unwrap_or(&upper);
    digits.trim().parse::<usize>().ok().filter(|w| *w > 0)
}

impl ParserOptions {
    pub fn new(kind: ParserKind) -> Self {
        let format = match kind {
            ParserKind::Csv => FormatOptions::Csv(CsvOptions::default()),
            ParserKind::Binary => FormatOptions::Binary(FixedOptions::default()),
            ParserKind::Tuple => FormatOptions::Tuple,
        };
        Self {
            kind,
            common: CommonOptions::default(),
            format,
            seen: HashSet::new(),
        }
    }

    fn once(&mut self, key: &str) -> Result<(), ParserError> {
        if !self.seen.insert(key.to_string()) {
            return Err(ParserError::Setup(format!("duplicate {key} specified")));
        }
        Ok(())
    }

    /// Offers a control keyword to the parser. `Ok(false)` means the keyword
    /// is not one of the parser's.
    pub fn report_parameter(&mut self, key: &str, value: &str) -> Result<bool, ParserError> {
        let key = key.to_ascii_uppercase();

        match key.as_str() {
            "FILTER" if self.kind != ParserKind::Tuple => {
                self.once("FILTER")?;
                if value.trim().is_empty() {
                    return Err(invalid("FILTER", value, "function name is empty"));
                }
                self.common.filter = Some(value.trim().to_string());
                return Ok(true);
            }
            "ENCODING" => {
                self.once("ENCODING")?;
                self.common.encoding = Some(value.trim().to_string());
                return Ok(true);
            }
            "CHECK_CONSTRAINTS" => {
                self.once("CHECK_CONSTRAINTS")?;
                self.common.check_constraints =
                    parse_bool(value).ok_or_else(|| invalid(&key, value, "expected a boolean"))?;
                return Ok(true);
            }
            "SKIP" | "OFFSET" => {
                self.once("SKIP")?;
                self.common.skip = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| invalid(&key, value, "expected a non-negative integer"))?;
                return Ok(true);
            }
            _ => {}
        }

        let accepted = match &mut self.format {
            FormatOptions::Csv(csv) => match key.as_str() {
                "DELIMITER" => {
                    csv.delimiter = single_byte(&key, value)?;
                    true
                }
                "QUOTE" => {
                    csv.quote = single_byte(&key, value)?;
                    true
                }
                "ESCAPE" => {
                    csv.escape = single_byte(&key, value)?;
                    true
                }
                "NULL" => {
                    csv.null = value.to_string();
                    true
                }
                _ => false,
            },
            FormatOptions::Binary(fixed) => match key.as_str() {
                "COL" => {
                    let width = parse_width(value)
                        .ok_or_else(|| invalid(&key, value, "expected N or CHAR(N)"))?;
                    fixed.widths.push(width);
                    // repeatable
                    return Ok(true);
                }
                "PRESERVE_BLANKS" => {
                    fixed.preserve_blanks =
                        parse_bool(value).ok_or_else(|| invalid(&key, value, "expected a boolean"))?;
                    true
                }
                "NULL" => {
                    fixed.null = Some(value.to_string());
                    true
                }
                _ => false,
            },
            FormatOptions::Tuple => false,
        };

        if accepted {
            self.once(&key)?;
        }
        Ok(accepted)
    }

    /// Checks option combinations once all keywords are in.
    pub fn validate(&self) -> Result<(), ParserError> {
        match &self.format {
            FormatOptions::Csv(csv) => {
                if csv.delimiter == csv.quote {
                    return Err(ParserError::Setup(
                        "DELIMITER cannot be the same as QUOTE".to_string(),
                    ));
                }
                if csv.null.as_bytes().contains(&csv.delimiter) {
                    return Err(ParserError::Setup(
                        "DELIMITER must not appear in the NULL specification".to_string(),
                    ));
                }
            }
            FormatOptions::Binary(fixed) => {
                if fixed.widths.is_empty() {
                    return Err(ParserError::Setup("no COL specified".to_string()));
                }
            }
            FormatOptions::Tuple => {}
        }
        Ok(())
    }

    /// `KEY = VALUE` pairs of the parser's settings, for the load log.
    pub fn dump_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("TYPE".to_string(), self.kind.name().to_string())];
        if let Some(filter) = &self.common.filter {
            params.push(("FILTER".to_string(), filter.clone()));
        }
        if let Some(encoding) = &self.common.encoding {
            params.push(("ENCODING".to_string(), encoding.clone()));
        }
        params.push((
            "CHECK_CONSTRAINTS".to_string(),
            if self.common.check_constraints { "YES" } else { "NO" }.to_string(),
        ));
        params.push(("SKIP".to_string(), self.common.skip.to_string()));

        match &self.format {
            FormatOptions::Csv(csv) => {
                params.push(("DELIMITER".to_string(), (csv.delimiter as char).to_string()));
                params.push(("QUOTE".to_string(), (csv.quote as char).to_string()));
                params.push(("ESCAPE".to_string(), (csv.escape as char).to_string()));
                params.push(("NULL".to_string(), csv.null.clone()));
            }
            FormatOptions::Binary(fixed) => {
                for width in &fixed.widths {
                    params.push(("COL".to_string(), width.to_string()));
                }
                params.push((
                    "PRESERVE_BLANKS".to_string(),
                    if fixed.preserve_blanks { "YES" } else { "NO" }.to_string(),
                ));
                if let Some(null) = &fixed.null {
                    params.push(("NULL".to_string(), null.clone()));
                }
            }
            FormatOptions::Tuple => {}
        }
        params
    }

    /// Opens the input and builds the parser for it.
    pub fn open(&self, path: &Path) -> Result<Box<dyn Parser>, ParserError> {
        self.validate()?;
        let parser: Box<dyn Parser> = match &self.format {
            FormatOptions::Csv(csv) => Box::new(CsvParser::open(path, csv.clone(), self.common.skip)?),
            FormatOptions::Binary(fixed) => {
                Box::new(FixedParser::open(path, fixed.clone(), self.common.skip)?)
            }
            FormatOptions::Tuple => Box::new(TupleParser::open(path, self.common.skip)?),
        };
        Ok(parser)
    }
}
