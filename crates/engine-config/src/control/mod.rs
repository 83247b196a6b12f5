//! Control-file grammar: `KEY = VALUE` lines with `#` comments and
//! optionally double-quoted values.

use crate::error::ConfigError;
use std::{fmt, fs, path::Path};

/// Longest accepted line, newline included.
pub const MAX_LINE_LEN: usize = 1024;

const QUOTE: char = '"';
const ESCAPE: char = '\\';

/// One `KEY = VALUE` entry and where it came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlLine {
    pub number: usize,
    pub keyword: String,
    pub value: String,
}

impl fmt::Display for ControlLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.keyword.is_empty() {
            write!(f, "line {}", self.number)
        } else {
            write!(f, "line {}: \"{} = {}\"", self.number, self.keyword, self.value)
        }
    }
}

/// Byte offset of the first `target` outside double quotes.
fn find_unquoted(text: &str, target: char) -> Option<usize> {
    let mut in_quote = false;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if in_quote && c == ESCAPE {
            escaped = true;
        } else if c == QUOTE {
            in_quote = !in_quote;
        } else if !in_quote && c == target {
            return Some(i);
        }
    }
    None
}

/// Strips surrounding quotes and resolves `\` escapes. `None` when the
/// closing quote is missing.
fn unquote(text: &str) -> Option<String> {
    let Some(rest) = text.strip_prefix(QUOTE) else {
        return Some(text.to_string());
    };

    let mut out = String::with_capacity(rest.len());
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            ESCAPE => out.push(chars.next()?),
            QUOTE => {
                out.push_str(chars.as_str().trim());
                return Some(out);
            }
            c => out.push(c),
        }
    }
    None
}

/// Parses one line. Blank and comment-only lines give `Ok(None)`.
pub fn parse_line(number: usize, raw: &str) -> Result<Option<ControlLine>, ConfigError> {
    let syntax = |message: String| ConfigError::Syntax {
        line: number,
        message,
    };

    let line = raw.strip_suffix('\n').unwrap_or(raw);
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.len() + 1 >= MAX_LINE_LEN {
        return Err(syntax(format!("too long line \"{line}\"")));
    }

    let content = match find_unquoted(line, '#') {
        Some(pos) => &line[..pos],
        None => line,
    };
    let content = content.trim();
    if content.is_empty() {
        return Ok(None);
    }

    let Some(eq) = find_unquoted(content, '=') else {
        return Err(syntax(format!("invalid input \"{content}\"")));
    };
    let keyword = content[..eq].trim();
    let value = unquote(content[eq + 1..].trim())
        .ok_or_else(|| syntax("unterminated quoted field".to_string()))?;

    Ok(Some(ControlLine {
        number,
        keyword: keyword.to_string(),
        value,
    }))
}

/// Parses every line of `text`, numbering from `first_line`.
pub fn parse_lines<'a>(
    lines: impl IntoIterator<Item = &'a str>,
    first_line: usize,
) -> Result<Vec<ControlLine>, ConfigError> {
    let mut parsed = Vec::new();
    for (i, raw) in lines.into_iter().enumerate() {
        if let Some(line) = parse_line(first_line + i, raw)? {
            parsed.push(line);
        }
    }
    Ok(parsed)
}

/// Reads a control file. The path must be absolute.
pub fn read_control_file(path: &Path) -> Result<(Vec<ControlLine>, usize), ConfigError> {
    if !path.is_absolute() {
        return Err(ConfigError::RelativeControlFile(path.to_path_buf()));
    }
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let count = text.lines().count();
    Ok((parse_lines(text.lines(), 1)?, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(raw: &str) -> ControlLine {
        parse_line(1, raw).unwrap().unwrap()
    }

    #[test]
    fn test_keyword_and_value() {
        let parsed = line("  TABLE = public.orders  \n");
        assert_eq!(parsed.keyword, "TABLE");
        assert_eq!(parsed.value, "public.orders");
    }

    #[test]
    fn test_comments_and_blank_lines() {
        assert_eq!(parse_line(1, "# only a comment").unwrap(), None);
        assert_eq!(parse_line(1, "   \n").unwrap(), None);
        assert_eq!(line("LIMIT = 10 # trailing").value, "10");
    }

    #[test]
    fn test_quoted_values() {
        assert_eq!(line("NULL = \"# not a comment\"").value, "# not a comment");
        assert_eq!(line("DELIMITER = \"=\"").value, "=");
        assert_eq!(line(r#"INFILE = "/tmp/a \"b\".csv""#).value, "/tmp/a \"b\".csv");
        assert_eq!(line("NULL = \"\"").value, "");
    }

    #[test]
    fn test_syntax_errors() {
        let err = parse_line(3, "TABLE orders").unwrap_err();
        assert_eq!(err.to_string(), "invalid input \"TABLE orders\" (line 3)");

        let err = parse_line(4, "NULL = \"open").unwrap_err();
        assert!(err.to_string().starts_with("unterminated quoted field"));

        let long = format!("INFILE = {}", "x".repeat(MAX_LINE_LEN));
        let err = parse_line(5, &long).unwrap_err();
        assert!(err.to_string().starts_with("too long line"));
    }

    #[test]
    fn test_line_numbers_continue() {
        let lines = parse_lines(["TYPE = CSV", "", "LIMIT = 3"], 7).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].number, 9);
        assert_eq!(lines[1].to_string(), "line 9: \"LIMIT = 3\"");
    }

    #[test]
    fn test_control_file_must_be_absolute() {
        assert!(matches!(
            read_control_file(Path::new("load.ctl")),
            Err(ConfigError::RelativeControlFile(_))
        ));
    }
}
