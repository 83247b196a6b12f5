#![allow(dead_code)]

use chrono::{Local, TimeZone};
use connectors::catalog::Catalog;
use engine_config::settings::load_configuration;
use engine_processing::{error::LoadError, filter::function::TransformRegistry, reader::Reader};
use model::execution::report::LoadResult;
use serde_json::{Value as Json, json};
use std::{fs, path::PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Destination used by most scenarios: `items(id, label, qty)` with a
/// unique `id`, a positive `qty` check and two transform functions.
pub fn items_catalog() -> Json {
    json!({
        "database": "shop",
        "encoding": "UTF8",
        "tables": [{
            "name": "items",
            "data_file": "items.dat",
            "columns": [
                {"name": "id", "type": "integer", "not_null": true},
                {"name": "label", "type": "varchar(8)"},
                {"name": "qty", "type": "integer"}
            ],
            "unique": [["id"]],
            "checks": [{"name": "items_qty_check", "expr": "qty > 0"}]
        }],
        "functions": [
            {
                "name": "pad",
                "args": [
                    {"name": "id", "type": "integer"},
                    {"name": "label", "type": "text", "default": "'none'"},
                    {"name": "qty", "type": "integer", "default": "1"}
                ],
                "returns": "items",
                "body": ["$1", "$2", "$3"]
            },
            {
                "name": "tag",
                "args": [{"type": "integer"}, {"type": "text"}],
                "returns": "items",
                "body": [
                    "$1",
                    "CASE WHEN $2 = 'bad' THEN set_config('prev', $2) || raise('bad label') WHEN $2 = 'show' THEN current_setting('prev') ELSE set_config('prev', $2) END",
                    "1"
                ]
            }
        ]
    })
}

/// A scratch directory holding a catalog, its data file and the load
/// input, with every output file pinned inside it.
pub struct LoadWorkspace {
    pub dir: TempDir,
    pub catalog: Catalog,
}

impl LoadWorkspace {
    pub fn new(catalog: Json, existing_rows: Option<&str>) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("catalog.json");
        fs::write(&path, catalog.to_string()).expect("write catalog");
        if let Some(rows) = existing_rows {
            fs::write(dir.path().join("items.dat"), rows).expect("write data file");
        }
        let catalog = Catalog::load(&path).expect("load catalog");
        Self { dir, catalog }
    }

    pub fn items(existing_rows: Option<&str>) -> Self {
        Self::new(items_catalog(), existing_rows)
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write_input(&self, bytes: impl AsRef<[u8]>) {
        fs::write(self.path("input.dat"), bytes).expect("write input");
    }

    /// Contents of a file in the workspace, empty if it was never created.
    /// Bad files keep raw input bytes, so invalid UTF-8 is replaced.
    pub fn read(&self, name: &str) -> String {
        fs::read(self.path(name))
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default()
    }

    /// Number of `#` cause lines in a bad record file.
    pub fn bad_entries(&self, name: &str) -> usize {
        self.read(name)
            .lines()
            .filter(|line| line.starts_with("# "))
            .count()
    }

    pub fn options(&self, extra: &[&str]) -> Vec<String> {
        let mut options = vec![
            "TABLE = items".to_string(),
            format!("INFILE = {}", self.path("input.dat").display()),
            format!("LOGFILE = {}", self.path("load.log").display()),
            format!("PARSE_BADFILE = {}", self.path("parse.bad").display()),
            format!("DUPLICATE_BADFILE = {}", self.path("duplicate.bad").display()),
        ];
        options.extend(extra.iter().map(|line| line.to_string()));
        options
    }

    pub async fn run(&self, extra: &[&str]) -> Result<LoadResult, LoadError> {
        let registry = TransformRegistry::from_catalog(&self.catalog)?;
        self.run_with(&registry, extra).await
    }

    pub async fn run_with(
        &self,
        registry: &TransformRegistry,
        extra: &[&str],
    ) -> Result<LoadResult, LoadError> {
        let config = load_configuration(
            None,
            &self.options(extra),
            &self.catalog,
            self.dir.path(),
            Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap(),
        )?;
        let reader = Reader::open(config, registry, CancellationToken::new())?;
        reader.run().await
    }
}
