use tracing::{debug, warn};

use dbmask_core::{DbError, TableInfo, TableName};

use crate::target::MaskTarget;

/// Names of the objects a run creates, derived from the run id so that
/// concurrent or crashed runs never collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldNames {
    pub ordinal_column: String,
    pub index: String,
    pub dictionary_table: String,
}

impl ScaffoldNames {
    pub fn new(run_id: &str, database: &str) -> Self {
        let token: String = run_id
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(8)
            .collect::<String>()
            .to_lowercase();
        let database: String = database
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
            .collect();
        Self {
            ordinal_column: format!("dbmask_rownr_{token}"),
            index: format!("ix_dbmask_{token}"),
            dictionary_table: format!("dbmask_dict_{database}_{token}"),
        }
    }
}

/// Stable row addressing for one table.
///
/// Reuses the table's identity column when there is one, otherwise adds a
/// temporary `BIGINT IDENTITY` column. A supporting index on the ordinal lives
/// as long as the cursor. [`RowCursor::close`] removes both; dropping an open
/// cursor does the same and logs any failure.
pub struct RowCursor<'t, T: MaskTarget> {
    target: &'t T,
    table: TableName,
    ordinal: String,
    provisioned: bool,
    index: Option<String>,
    closed: bool,
}

impl<'t, T: MaskTarget> RowCursor<'t, T> {
    pub fn open(
        target: &'t T,
        info: &TableInfo,
        names: &ScaffoldNames,
    ) -> Result<Self, DbError> {
        let (ordinal, provisioned) = match info.identity_column() {
            Some(identity) => (identity.name.clone(), false),
            None => {
                target.add_ordinal_column(&info.name, &names.ordinal_column)?;
                (names.ordinal_column.clone(), true)
            }
        };
        let mut cursor = Self {
            target,
            table: info.name.clone(),
            ordinal,
            provisioned,
            index: None,
            closed: false,
        };
        target.create_index(&cursor.table, &names.index, &cursor.ordinal)?;
        cursor.index = Some(names.index.clone());
        debug!(
            table = %cursor.table,
            ordinal = %cursor.ordinal,
            provisioned,
            "row cursor opened"
        );
        Ok(cursor)
    }

    /// Column that addresses rows for this table.
    pub fn ordinal(&self) -> &str {
        &self.ordinal
    }

    /// Whether the ordinal column was added by this cursor.
    pub fn is_provisioned(&self) -> bool {
        self.provisioned
    }

    /// Remove the scaffolding; returns the first failure.
    pub fn close(mut self) -> Result<(), DbError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), DbError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut first_error = None;
        if let Some(index) = self.index.take()
            && let Err(err) = self.target.drop_index(&self.table, &index)
        {
            warn!(table = %self.table, index = %index, error = %err, "failed to drop scaffold index");
            first_error.get_or_insert(err);
        }
        if self.provisioned
            && let Err(err) = self.target.drop_column(&self.table, &self.ordinal)
        {
            warn!(
                table = %self.table,
                column = %self.ordinal,
                error = %err,
                "failed to drop ordinal column"
            );
            first_error.get_or_insert(err);
        }
        debug!(table = %self.table, "row cursor closed");
        first_error.map_or(Ok(()), Err)
    }
}

impl<T: MaskTarget> Drop for RowCursor<'_, T> {
    fn drop(&mut self) {
        if !self.closed && self.release().is_err() {
            warn!(table = %self.table, "row cursor dropped with scaffolding left behind");
        }
    }
}
