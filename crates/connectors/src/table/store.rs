use super::{DuplicateKind, DuplicateRow};
use crate::{
    catalog::{TargetTable, UniqueKey},
    encoding::CharEncoding,
    error::SinkError,
};
use csv::{ReaderBuilder, WriterBuilder};
use model::{
    core::{input::resolve_input, shape::Shape, value::Value},
    execution::policy::OnDuplicate,
};
use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Null marker in data files. Stored text starting with a backslash gets
/// one more, so no value is ever written as the bare marker.
const NULL_MARKER: &str = "\\N";

fn stored_field(value: &Value) -> String {
    match value.to_text() {
        None => NULL_MARKER.to_string(),
        Some(text) if text.starts_with('\\') => format!("\\{text}"),
        Some(text) => text,
    }
}

fn stored_text(field: &str) -> Option<&str> {
    if field == NULL_MARKER {
        return None;
    }
    match field.strip_prefix('\\') {
        Some(rest) if rest.starts_with('\\') => Some(rest),
        _ => Some(field),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Existing,
    Loaded(u64),
}

#[derive(Debug)]
struct StoredRow {
    values: Vec<Value>,
    origin: Origin,
}

/// Result of offering one row to the store.
#[derive(Debug, Default)]
pub struct InsertOutcome {
    pub accepted: bool,
    pub duplicates: Vec<DuplicateRow>,
}

pub struct TableStore {
    name: String,
    shape: Arc<Shape>,
    keys: Vec<UniqueKey>,
    data_file: Option<PathBuf>,
    encoding: CharEncoding,
    rows: Vec<Option<StoredRow>>,
    indexes: Vec<HashMap<Vec<Value>, usize>>,
    on_duplicate: OnDuplicate,
    loaded: u64,
}

impl TableStore {
    /// Opens the table, reading existing rows from its data file if any.
    pub fn open(table: &TargetTable, on_duplicate: OnDuplicate) -> Result<Self, SinkError> {
        let mut store = Self {
            name: table.qualified_name(),
            shape: table.shape.clone(),
            keys: table.unique_keys.clone(),
            data_file: table.data_file.clone(),
            encoding: table.encoding,
            rows: Vec::new(),
            indexes: vec![HashMap::new(); table.unique_keys.len()],
            on_duplicate,
            loaded: 0,
        };

        if let Some(path) = store.data_file.clone() {
            if path.exists() {
                store.load_existing(&path)?;
            }
        }

        debug!(
            table = %store.name,
            rows = store.len(),
            unique_keys = store.keys.len(),
            "Opened table store"
        );
        Ok(store)
    }

    fn load_existing(&mut self, path: &Path) -> Result<(), SinkError> {
        let bytes = fs::read(path).map_err(|source| SinkError::DataFile {
            path: path.to_path_buf(),
            source,
        })?;
        let text = self
            .encoding
            .decode(&bytes)
            .ok_or_else(|| SinkError::InvalidStoredRow {
                path: path.to_path_buf(),
                line: 0,
                message: format!("data is not valid {}", self.encoding),
            })?;

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .from_reader(text.as_bytes());

        for (i, result) in reader.records().enumerate() {
            let line = i as u64 + 1;
            let record = result?;
            let invalid = |message: String| SinkError::InvalidStoredRow {
                path: path.to_path_buf(),
                line,
                message,
            };
            if record.len() != self.shape.len() {
                return Err(invalid(format!(
                    "expected {} fields, found {}",
                    self.shape.len(),
                    record.len()
                )));
            }

            let mut values = Vec::with_capacity(record.len());
            for (column, field) in self.shape.columns().iter().zip(record.iter()) {
                let Some(field) = stored_text(field).filter(|_| !column.dropped) else {
                    values.push(Value::Null);
                    continue;
                };
                let input = resolve_input(&column.data_type).map_err(&invalid)?;
                let value = input(field, column.modifier)
                    .map_err(|e| invalid(format!("column \"{}\": {e}", column.name)))?;
                values.push(value);
            }

            let id = self.rows.len();
            self.index_row(id, &values);
            self.rows.push(Some(StoredRow {
                values,
                origin: Origin::Existing,
            }));
        }
        Ok(())
    }

    /// Live rows in the table.
    pub fn len(&self) -> usize {
        self.rows.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn on_duplicate(&self) -> OnDuplicate {
        self.on_duplicate
    }

    /// Rows accepted by this store since it was opened, net of removals.
    pub fn loaded(&self) -> u64 {
        self.loaded
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Value]> {
        self.rows.iter().flatten().map(|r| r.values.as_slice())
    }

    /// Key of `values` under `key`, `None` if any key column is null.
    fn key_of(key: &UniqueKey, values: &[Value]) -> Option<Vec<Value>> {
        key.columns
            .iter()
            .map(|&c| values.get(c).filter(|v| !v.is_null()).cloned())
            .collect()
    }

    fn index_row(&mut self, id: usize, values: &[Value]) {
        for (key, index) in self.keys.iter().zip(self.indexes.iter_mut()) {
            if let Some(k) = Self::key_of(key, values) {
                index.insert(k, id);
            }
        }
    }

    fn unindex_row(&mut self, values: &[Value]) {
        for (key, index) in self.keys.iter().zip(self.indexes.iter_mut()) {
            if let Some(k) = Self::key_of(key, values) {
                index.remove(&k);
            }
        }
    }

    fn violation(&self, key: &UniqueKey, values: &[Value]) -> (String, String) {
        let columns = key
            .columns
            .iter()
            .filter_map(|&c| self.shape.column(c).map(|col| col.name.clone()))
            .collect::<Vec<_>>()
            .join(", ");
        let key_values = key
            .columns
            .iter()
            .map(|&c| {
                values
                    .get(c)
                    .and_then(Value::to_text)
                    .unwrap_or_else(|| "null".to_string())
            })
            .collect::<Vec<_>>()
            .join(", ");
        (
            format!("duplicate key value violates unique constraint \"{}\"", key.name),
            format!("Key ({columns})=({key_values}) already exists."),
        )
    }

    /// Inserts the row read as input record `ordinal`, resolving unique key
    /// conflicts under the store's duplicate policy.
    pub fn insert(&mut self, ordinal: u64, values: Vec<Value>) -> Result<InsertOutcome, SinkError> {
        if values.len() != self.shape.len() {
            return Err(SinkError::Arity {
                expected: self.shape.len(),
                actual: values.len(),
            });
        }

        let mut conflicts: Vec<(usize, usize)> = Vec::new();
        for (k, (key, index)) in self.keys.iter().zip(self.indexes.iter()).enumerate() {
            if let Some(id) = Self::key_of(key, &values).and_then(|kv| index.get(&kv).copied()) {
                if !conflicts.iter().any(|(_, c)| *c == id) {
                    conflicts.push((k, id));
                }
            }
        }

        if let Some(&(k, _)) = conflicts.first() {
            if self.on_duplicate != OnDuplicate::RemoveOld {
                let (message, details) = self.violation(&self.keys[k], &values);
                return Ok(InsertOutcome {
                    accepted: false,
                    duplicates: vec![DuplicateRow {
                        kind: DuplicateKind::Rejected,
                        input_record: ordinal,
                        values,
                        message,
                        details,
                    }],
                });
            }
        }

        let mut duplicates = Vec::with_capacity(conflicts.len());
        for (k, id) in conflicts {
            let Some(old) = self.rows.get_mut(id).and_then(Option::take) else {
                continue;
            };
            self.unindex_row(&old.values);
            let (message, details) = self.violation(&self.keys[k], &old.values);
            let (kind, input_record) = match old.origin {
                Origin::Existing => (DuplicateKind::Replaced, ordinal),
                Origin::Loaded(loaded_as) => {
                    self.loaded = self.loaded.saturating_sub(1);
                    (DuplicateKind::Unloaded, loaded_as)
                }
            };
            duplicates.push(DuplicateRow {
                kind,
                input_record,
                values: old.values,
                message,
                details,
            });
        }

        let id = self.rows.len();
        self.index_row(id, &values);
        self.rows.push(Some(StoredRow {
            values,
            origin: Origin::Loaded(ordinal),
        }));
        self.loaded += 1;

        Ok(InsertOutcome {
            accepted: true,
            duplicates,
        })
    }

    /// Writes every live row back to the data file, replacing it atomically.
    /// A table without a data file is kept in memory only.
    pub fn persist(&self) -> Result<(), SinkError> {
        let Some(path) = &self.data_file else {
            return Ok(());
        };

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
        for row in self.rows() {
            writer.write_record(row.iter().map(stored_field))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| SinkError::Io(e.into_error()))?;
        let text = String::from_utf8_lossy(&bytes);
        let encoded = self
            .encoding
            .encode(&text)
            .map_err(|c| SinkError::Unrepresentable(format!("{c:?} ({})", self.encoding)))?;

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir).map_err(|source| SinkError::DataFile {
            path: path.clone(),
            source,
        })?;
        tmp.write_all(&encoded)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| SinkError::DataFile {
            path: path.clone(),
            source: e.error,
        })?;

        info!(table = %self.name, rows = self.len(), path = %path.display(), "Persisted table");
        Ok(())
    }
}
