/// Raw fields of one source record as produced by a parser, before any
/// encoding check or type coercion. `None` is a null field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    fields: Vec<Option<Vec<u8>>>,
}

impl FieldSet {
    pub fn new(fields: Vec<Option<Vec<u8>>>) -> Self {
        Self { fields }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, field: Option<Vec<u8>>) {
        self.fields.push(field);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.fields.get(index).and_then(|f| f.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&[u8]>> {
        self.fields.iter().map(|f| f.as_deref())
    }
}

impl From<Vec<Option<&str>>> for FieldSet {
    fn from(fields: Vec<Option<&str>>) -> Self {
        Self::new(
            fields
                .into_iter()
                .map(|f| f.map(|s| s.as_bytes().to_vec()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_fields() {
        let fields = FieldSet::from(vec![Some("1"), None, Some("")]);
        assert_eq!(fields.len(), 3);
        assert_eq!(fields.get(0), Some(&b"1"[..]));
        assert_eq!(fields.get(1), None);
        assert_eq!(fields.get(2), Some(&b""[..]));
        assert_eq!(fields.iter().filter(|f| f.is_none()).count(), 1);
    }
}
