use super::definition::{DefinitionError, TableDefinition};
use super::traits::{Store, StoreError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("no creation statement returned for {0}")]
    MissingDefinition(String),

    #[error("cannot parse definition of {table}: {source}")]
    Definition {
        table: String,
        #[source]
        source: DefinitionError,
    },

    #[error("{table} uses engine {engine}, which is not in the merge-tree family")]
    UnsupportedEngine { table: String, engine: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Rows were copied through `FINAL` and the tables swapped
    Finalized { table: String, old: String, temp: String },
    /// Plain `MergeTree`: nothing to collapse
    Skipped { table: String },
}

/// Fully qualified name, temp copy and old copy of a table
#[derive(Debug, Clone, PartialEq, Eq)]
struct TableNames {
    full: String,
    temp: String,
    old: String,
}

impl TableNames {
    fn new(table: &str, default_database: &str) -> Self {
        let full = match table.split_once('.') {
            Some(_) => table.to_string(),
            None => format!("{}.{}", default_database, table),
        };
        Self {
            temp: format!("{}_temp", full),
            old: format!("{}_old", full),
            full,
        }
    }
}

/// Materialize the deduplicated state of `table`.
///
/// The definition is read and parsed before anything is changed, so a
/// table that cannot be handled is left untouched.
pub async fn finalize(store: &dyn Store, table: &str) -> Result<FinalizeOutcome, FinalizeError> {
    let names = TableNames::new(table, store.database());
    info!(table = %names.full, "Finalizing table");

    let response = store
        .fetch_json(&format!("SHOW CREATE TABLE {}", names.full))
        .await?;
    let statement = response
        .get("data")
        .and_then(|data| data.get(0))
        .and_then(|row| row.get("statement"))
        .and_then(|s| s.as_str())
        .ok_or_else(|| FinalizeError::MissingDefinition(names.full.clone()))?;

    let definition =
        TableDefinition::parse(statement).map_err(|source| FinalizeError::Definition {
            table: names.full.clone(),
            source,
        })?;

    if !definition.engine.is_merge_tree_family() {
        return Err(FinalizeError::UnsupportedEngine {
            table: names.full,
            engine: definition.engine.name,
        });
    }
    if !definition.engine.deduplicates() {
        warn!(table = %names.full, engine = %definition.engine.name, "Engine has nothing to collapse, skipping");
        return Ok(FinalizeOutcome::Skipped { table: names.full });
    }

    let statements = [
        definition.renamed(&names.temp),
        format!("INSERT INTO {} SELECT * FROM {} FINAL", names.temp, names.full),
        format!("RENAME TABLE {} TO {}", names.full, names.old),
        format!("RENAME TABLE {} TO {}", names.temp, names.full),
        format!("DROP TABLE {}", names.old),
    ];
    for statement in &statements {
        store.execute(statement).await?;
    }

    info!(table = %names.full, "Table finalized");
    Ok(FinalizeOutcome::Finalized {
        table: names.full,
        old: names.old,
        temp: names.temp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::path::Path;
    use std::sync::Mutex;

    struct RecordingStore {
        definition: Value,
        executed: Mutex<Vec<String>>,
        fetched: Mutex<Vec<String>>,
    }

    impl RecordingStore {
        fn with_statement(statement: &str) -> Self {
            Self {
                definition: json!({ "data": [{ "statement": statement }] }),
                executed: Mutex::new(Vec::new()),
                fetched: Mutex::new(Vec::new()),
            }
        }

        fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Store for RecordingStore {
        fn database(&self) -> &str {
            "analytics"
        }

        async fn execute(&self, statement: &str) -> Result<(), StoreError> {
            self.executed.lock().unwrap().push(statement.to_string());
            Ok(())
        }

        async fn fetch_json(&self, statement: &str) -> Result<Value, StoreError> {
            self.fetched.lock().unwrap().push(statement.to_string());
            Ok(self.definition.clone())
        }

        async fn import_file(&self, _path: &Path) -> Result<(), StoreError> {
            Ok(())
        }
    }

    const REPLACING: &str = "CREATE TABLE analytics.clicks (`d` Date, `id` UInt64) ENGINE = ReplacingMergeTree(d, intHash32(id), (d, intHash32(id)), 8192)";

    #[tokio::test]
    async fn test_finalize_issues_swap_sequence() {
        let store = RecordingStore::with_statement(REPLACING);
        let outcome = finalize(&store, "clicks").await.unwrap();

        assert_eq!(
            outcome,
            FinalizeOutcome::Finalized {
                table: "analytics.clicks".to_string(),
                old: "analytics.clicks_old".to_string(),
                temp: "analytics.clicks_temp".to_string(),
            }
        );
        assert_eq!(
            store.fetched.lock().unwrap().clone(),
            vec!["SHOW CREATE TABLE analytics.clicks".to_string()]
        );
        assert_eq!(
            store.executed(),
            vec![
                "CREATE TABLE analytics.clicks_temp (`d` Date, `id` UInt64) ENGINE = ReplacingMergeTree(d, intHash32(id), (d, intHash32(id)), 8192)".to_string(),
                "INSERT INTO analytics.clicks_temp SELECT * FROM analytics.clicks FINAL".to_string(),
                "RENAME TABLE analytics.clicks TO analytics.clicks_old".to_string(),
                "RENAME TABLE analytics.clicks_temp TO analytics.clicks".to_string(),
                "DROP TABLE analytics.clicks_old".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_plain_merge_tree_is_noop() {
        let store = RecordingStore::with_statement(
            "CREATE TABLE other.raw (`d` Date) ENGINE = MergeTree(d, (d), 8192)",
        );
        let outcome = finalize(&store, "other.raw").await.unwrap();
        assert_eq!(
            outcome,
            FinalizeOutcome::Skipped {
                table: "other.raw".to_string()
            }
        );
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_engine_mutates_nothing() {
        let store = RecordingStore::with_statement("CREATE TABLE analytics.m (a String) ENGINE = Memory");
        let err = finalize(&store, "m").await.unwrap_err();
        assert!(matches!(err, FinalizeError::UnsupportedEngine { ref engine, .. } if engine == "Memory"));
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_definition_mutates_nothing() {
        let store = RecordingStore::with_statement("CREATE TABLE analytics.t (a UInt8");
        let err = finalize(&store, "t").await.unwrap_err();
        assert!(matches!(err, FinalizeError::Definition { .. }));
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn test_missing_definition() {
        let store = RecordingStore {
            definition: Value::Null,
            executed: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
        };
        let err = finalize(&store, "t").await.unwrap_err();
        assert!(matches!(err, FinalizeError::MissingDefinition(ref t) if t == "analytics.t"));
    }
}
