use model::core::value::Value;
use std::{collections::HashMap, sync::Arc};

/// Settings visible to expressions through `set_config` / `current_setting`.
///
/// Cloning is cheap: the map is shared until the first write, so a clone
/// taken before running user code is a complete snapshot to restore from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    settings: Arc<HashMap<String, Value>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.settings.get(&key.to_ascii_lowercase())
    }

    pub fn set(&mut self, key: &str, value: Value) {
        Arc::make_mut(&mut self.settings).insert(key.to_ascii_lowercase(), value);
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Captures the current state.
    pub fn snapshot(&self) -> Session {
        self.clone()
    }

    /// Puts back a state captured with [`Session::snapshot`].
    pub fn restore(&mut self, snapshot: Session) {
        *self = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_restore() {
        let mut session = Session::new();
        session.set("app.mode", Value::String("a".into()));
        let snapshot = session.snapshot();

        session.set("app.mode", Value::String("b".into()));
        session.set("app.other", Value::Int(1));
        assert_eq!(snapshot.get("app.mode"), Some(&Value::String("a".into())));

        session.restore(snapshot);
        assert_eq!(session.get("APP.MODE"), Some(&Value::String("a".into())));
        assert_eq!(session.get("app.other"), None);
        assert_eq!(session.len(), 1);
    }
}
