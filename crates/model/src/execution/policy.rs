use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// What to do when an incoming record collides with an existing row on a
/// unique key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum OnDuplicate {
    /// Reject the incoming record and report it as a duplicate error.
    #[default]
    Error,
    /// Keep the existing row, discard the new one.
    RemoveNew,
    /// Remove the existing row(s) and keep the new one.
    RemoveOld,
}

impl OnDuplicate {
    pub const NAMES: [&'static str; 3] = ["ERROR", "REMOVE_NEW", "REMOVE_OLD"];

    pub fn name(&self) -> &'static str {
        match self {
            OnDuplicate::Error => Self::NAMES[0],
            OnDuplicate::RemoveNew => Self::NAMES[1],
            OnDuplicate::RemoveOld => Self::NAMES[2],
        }
    }
}

impl FromStr for OnDuplicate {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ERROR" => Ok(OnDuplicate::Error),
            "REMOVE_NEW" => Ok(OnDuplicate::RemoveNew),
            "REMOVE_OLD" => Ok(OnDuplicate::RemoveOld),
            _ => Err(()),
        }
    }
}

impl fmt::Display for OnDuplicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A count that may be unbounded. Used for error thresholds and the record
/// limit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Bound {
    Count(u64),
    Unbounded,
}

impl Bound {
    /// Threshold reading: `Count(k)` tolerates `k` errors and trips on the next.
    pub fn is_exceeded_by(&self, observed: u64) -> bool {
        match self {
            Bound::Count(max) => observed > *max,
            Bound::Unbounded => false,
        }
    }

    /// Limit reading: `Count(n)` is reached once `n` items were produced.
    pub fn is_reached_by(&self, produced: u64) -> bool {
        match self {
            Bound::Count(max) => produced >= *max,
            Bound::Unbounded => false,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Count(n) => write!(f, "{n}"),
            Bound::Unbounded => f.write_str("INFINITE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_trips_after_k() {
        let threshold = Bound::Count(2);
        assert!(!threshold.is_exceeded_by(2));
        assert!(threshold.is_exceeded_by(3));
        assert!(Bound::Count(0).is_exceeded_by(1));
        assert!(!Bound::Unbounded.is_exceeded_by(u64::MAX));
    }

    #[test]
    fn test_limit() {
        assert!(Bound::Count(0).is_reached_by(0));
        assert!(!Bound::Count(3).is_reached_by(2));
        assert_eq!(Bound::Unbounded.to_string(), "INFINITE");
    }

    #[test]
    fn test_on_duplicate_names() {
        assert_eq!("remove_old".parse::<OnDuplicate>(), Ok(OnDuplicate::RemoveOld));
        assert!("keep".parse::<OnDuplicate>().is_err());
        assert_eq!(OnDuplicate::RemoveNew.to_string(), "REMOVE_NEW");
    }
}
