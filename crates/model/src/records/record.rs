use crate::core::value::Value;
use std::ops::Index;

/// One typed row. Positions beyond what the source supplied hold
/// [`Value::Null`]; `supplied` remembers how many positions came from input.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    values: Vec<Value>,
    supplied: usize,
}

impl Record {
    pub fn new(values: Vec<Value>, supplied: usize) -> Self {
        let supplied = supplied.min(values.len());
        Self { values, supplied }
    }

    /// A record whose every position is null.
    pub fn all_null(len: usize) -> Self {
        Self {
            values: vec![Value::Null; len],
            supplied: 0,
        }
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        let supplied = values.len();
        Self { values, supplied }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn supplied(&self) -> usize {
        self.supplied
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn is_null(&self, index: usize) -> bool {
        self.values.get(index).is_none_or(Value::is_null)
    }

    pub fn is_all_null(&self) -> bool {
        self.values.iter().all(Value::is_null)
    }

    pub fn set(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [Value] {
        &mut self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Text form of every position, `None` for nulls.
    pub fn to_text_fields(&self) -> Vec<Option<String>> {
        self.values.iter().map(Value::to_text).collect()
    }
}

impl Index<usize> for Record {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_null() {
        let record = Record::all_null(3);
        assert_eq!(record.len(), 3);
        assert!(record.is_all_null());
        assert_eq!(record.supplied(), 0);
    }

    #[test]
    fn test_supplied_is_clamped() {
        let record = Record::new(vec![Value::Int(1), Value::Null], 5);
        assert_eq!(record.supplied(), 2);
        assert!(record.is_null(1));
        assert!(record.is_null(9));
        assert_eq!(record.to_text_fields(), vec![Some("1".to_string()), None]);
    }
}
