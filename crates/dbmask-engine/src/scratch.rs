use std::collections::BTreeMap;

use tracing::debug;

use dbmask_core::{Database, DbError, Result, SqlValue, quote_ident, quote_literal};

/// Run-scoped key/value store backing the deterministic cache.
pub trait ScratchStore {
    /// Name of the backing object, for logs.
    fn name(&self) -> &str;
    /// Create an empty store, replacing any leftover from an earlier run.
    fn create(&mut self) -> Result<()>;
    fn lookup(&self, key: &str) -> Result<Option<String>>;
    /// Insert unless the key already exists; returns whether a row was written.
    fn insert(&mut self, key: &str, value: &str) -> Result<bool>;
    fn entries(&self) -> Result<Vec<(String, String)>>;
    fn len(&self) -> Result<u64>;
    fn drop_store(&mut self) -> Result<()>;
}

/// Store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryScratchStore {
    name: String,
    entries: BTreeMap<String, String>,
    dropped: bool,
}

impl MemoryScratchStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
            dropped: false,
        }
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped
    }
}

impl ScratchStore for MemoryScratchStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&mut self) -> Result<()> {
        self.entries.clear();
        self.dropped = false;
        Ok(())
    }

    fn lookup(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn insert(&mut self, key: &str, value: &str) -> Result<bool> {
        if self.entries.contains_key(key) {
            return Ok(false);
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    fn entries(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .entries
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn len(&self) -> Result<u64> {
        Ok(self.entries.len() as u64)
    }

    fn drop_store(&mut self) -> Result<()> {
        self.entries.clear();
        self.dropped = true;
        Ok(())
    }
}

/// Store kept in a table of a scratch database (`tempdb` by default).
pub struct SqlScratchStore<D: Database> {
    db: D,
    scratch_database: String,
    table: String,
}

impl<D: Database> SqlScratchStore<D> {
    pub fn new(db: D, scratch_database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            db,
            scratch_database: scratch_database.into(),
            table: table.into(),
        }
    }

    fn qualified(&self) -> Result<String> {
        Ok(format!(
            "{}.[dbo].{}",
            quote_ident(&self.scratch_database)?,
            quote_ident(&self.table)?
        ))
    }

    fn object_id_check(&self) -> String {
        let path = format!("{}.dbo.{}", self.scratch_database, self.table);
        format!("OBJECT_ID({}, N'U')", quote_literal(&path, true))
    }
}

impl<D: Database> ScratchStore for SqlScratchStore<D> {
    fn name(&self) -> &str {
        &self.table
    }

    fn create(&mut self) -> Result<()> {
        let sql = format!(
            "IF {check} IS NOT NULL DROP TABLE {table};\n\
             CREATE TABLE {table} (ValueKey NVARCHAR(450) NOT NULL PRIMARY KEY, NewValue NVARCHAR(MAX) NULL);",
            check = self.object_id_check(),
            table = self.qualified()?
        );
        self.db.execute_non_query(&sql)?;
        debug!(store = %self.table, database = %self.scratch_database, "scratch store created");
        Ok(())
    }

    fn lookup(&self, key: &str) -> Result<Option<String>> {
        let sql = format!(
            "SELECT NewValue FROM {} WHERE ValueKey = {};",
            self.qualified()?,
            quote_literal(key, true)
        );
        let rows = self.db.execute_query(&sql)?;
        Ok(rows
            .first()
            .and_then(|row| row.get(0))
            .and_then(SqlValue::canonical))
    }

    fn insert(&mut self, key: &str, value: &str) -> Result<bool> {
        let key = quote_literal(key, true);
        let sql = format!(
            "IF NOT EXISTS (SELECT 1 FROM {table} WHERE ValueKey = {key}) \
             INSERT INTO {table} (ValueKey, NewValue) VALUES ({key}, {value});",
            table = self.qualified()?,
            value = quote_literal(value, true)
        );
        Ok(self.db.execute_non_query(&sql)? > 0)
    }

    fn entries(&self) -> Result<Vec<(String, String)>> {
        let sql = format!(
            "SELECT ValueKey, NewValue FROM {} ORDER BY ValueKey;",
            self.qualified()?
        );
        self.db
            .execute_query(&sql)?
            .into_iter()
            .map(|row| {
                let key = row.get(0).and_then(SqlValue::canonical).ok_or_else(|| {
                    DbError::query("dictionary row without ValueKey", sql.clone())
                })?;
                let value = row.get(1).and_then(SqlValue::canonical).unwrap_or_default();
                Ok((key, value))
            })
            .collect()
    }

    fn len(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT_BIG(*) FROM {};", self.qualified()?);
        let rows = self.db.execute_query(&sql)?;
        Ok(rows
            .first()
            .and_then(|row| row.get(0))
            .and_then(SqlValue::as_i64)
            .map(|count| count.max(0) as u64)
            .unwrap_or(0))
    }

    fn drop_store(&mut self) -> Result<()> {
        let sql = format!(
            "IF {check} IS NOT NULL DROP TABLE {table};",
            check = self.object_id_check(),
            table = self.qualified()?
        );
        self.db.execute_non_query(&sql)?;
        debug!(store = %self.table, "scratch store dropped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use dbmask_core::Row;

    use super::*;

    #[derive(Default)]
    struct RecordingDb {
        statements: RefCell<Vec<String>>,
        affected: u64,
    }

    impl Database for RecordingDb {
        fn database_name(&self) -> &str {
            "tempdb"
        }

        fn execute_query(&self, sql: &str) -> Result<Vec<Row>> {
            self.statements.borrow_mut().push(sql.to_string());
            Ok(vec![Row::new(vec![SqlValue::Text("masked".to_string())])])
        }

        fn execute_non_query(&self, sql: &str) -> Result<u64> {
            self.statements.borrow_mut().push(sql.to_string());
            Ok(self.affected)
        }
    }

    #[test]
    fn memory_store_is_first_write_wins() {
        let mut store = MemoryScratchStore::new("dict");
        store.create().expect("create");
        assert!(store.insert("a", "1").expect("insert"));
        assert!(!store.insert("a", "2").expect("insert"));
        assert_eq!(store.lookup("a").expect("lookup").as_deref(), Some("1"));
        store.drop_store().expect("drop");
        assert!(store.is_dropped());
        assert_eq!(store.len().expect("len"), 0);
    }

    #[test]
    fn sql_store_quotes_keys_and_recreates_table() {
        let db = RecordingDb {
            affected: 1,
            ..RecordingDb::default()
        };
        let mut store = SqlScratchStore::new(&db, "tempdb", "dbmask_dict_Shop_ab12cd34");
        store.create().expect("create");
        assert!(store.insert("O'Brien", "Smith").expect("insert"));
        assert_eq!(
            store.lookup("O'Brien").expect("lookup").as_deref(),
            Some("masked")
        );

        let statements = db.statements.borrow();
        assert!(statements[0].starts_with(
            "IF OBJECT_ID(N'tempdb.dbo.dbmask_dict_Shop_ab12cd34', N'U') IS NOT NULL DROP TABLE [tempdb].[dbo].[dbmask_dict_Shop_ab12cd34];"
        ));
        assert!(statements[0].contains("ValueKey NVARCHAR(450) NOT NULL PRIMARY KEY"));
        assert!(statements[1].contains("WHERE ValueKey = N'O''Brien'"));
        assert!(statements[1].contains("VALUES (N'O''Brien', N'Smith')"));
    }
}
