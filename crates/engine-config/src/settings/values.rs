//! Value syntax of the scalar keywords.

use model::execution::policy::Bound;

/// Error thresholds: an integer `>= -1`, where `-1` and `INFINITE` mean no
/// limit.
pub fn parse_threshold(value: &str) -> Result<Bound, String> {
    parse_bound(value, -1)
}

/// Record limit: an integer `>= 0` or `INFINITE`.
pub fn parse_limit(value: &str) -> Result<Bound, String> {
    parse_bound(value, 0)
}

fn parse_bound(value: &str, min: i64) -> Result<Bound, String> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("INFINITE") {
        return Ok(Bound::Unbounded);
    }
    let n = trimmed
        .parse::<i64>()
        .map_err(|_| format!("invalid input syntax for integer: \"{value}\""))?;
    if n < min {
        return Err(format!("value \"{value}\" is out of range"));
    }
    Ok(match u64::try_from(n) {
        Ok(count) => Bound::Count(count),
        Err(_) => Bound::Unbounded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        assert_eq!(parse_threshold("0"), Ok(Bound::Count(0)));
        assert_eq!(parse_threshold(" 12 "), Ok(Bound::Count(12)));
        assert_eq!(parse_threshold("-1"), Ok(Bound::Unbounded));
        assert_eq!(parse_threshold("infinite"), Ok(Bound::Unbounded));
        assert!(parse_threshold("-2").is_err());
        assert!(parse_threshold("many").is_err());
    }

    #[test]
    fn test_limit() {
        assert_eq!(parse_limit("0"), Ok(Bound::Count(0)));
        assert_eq!(parse_limit("INFINITE"), Ok(Bound::Unbounded));
        assert_eq!(
            parse_limit("-1"),
            Err("value \"-1\" is out of range".to_string())
        );
    }
}
