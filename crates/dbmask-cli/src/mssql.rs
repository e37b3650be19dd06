//! SQL Server connection behind the synchronous [`Database`] trait.
//!
//! The masking engine is sequential and blocking, so the tiberius client is
//! driven from a private current-thread runtime. Every command runs under the
//! configured timeout.
//!
//! A timed-out command is abandoned by dropping the client, which closes the
//! socket; SQL Server then rolls back the statement it was running. The
//! connection is reopened before the timeout is reported so cleanup and later
//! tables get a clean session. When reopening fails the timeout surfaces as a
//! connection error and every later command fails the same way.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::{Client, ColumnData, Config, FromSql};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info, warn};

use dbmask_core::{Database, DbError, Result, Row, SqlValue};

type TdsClient = Client<Compat<TcpStream>>;

pub struct SqlServerConnection {
    runtime: Runtime,
    config: Config,
    /// `None` once a timed-out session could not be reopened.
    client: Mutex<Option<TdsClient>>,
    database: String,
    timeout: Duration,
}

async fn open_client(config: Config) -> Result<TdsClient> {
    let tcp = TcpStream::connect(config.get_addr())
        .await
        .map_err(|err| DbError::Connection(err.to_string()))?;
    tcp.set_nodelay(true).ok();
    Client::connect(config, tcp.compat_write())
        .await
        .map_err(|err| DbError::Connection(err.to_string()))
}

impl SqlServerConnection {
    /// Connect with an ADO.NET style connection string.
    pub fn connect(connection_string: &str, command_timeout_secs: u64) -> Result<Self> {
        let config = Config::from_ado_string(connection_string)
            .map_err(|err| DbError::Connection(err.to_string()))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| DbError::Connection(err.to_string()))?;
        let client = runtime.block_on(open_client(config.clone()))?;

        let mut connection = Self {
            runtime,
            config,
            client: Mutex::new(Some(client)),
            database: String::new(),
            timeout: Duration::from_secs(command_timeout_secs.max(1)),
        };
        connection.database = connection
            .execute_query("SELECT DB_NAME();")?
            .first()
            .and_then(|row| row.get(0))
            .and_then(SqlValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| DbError::Connection("could not determine the current database".into()))?;
        info!(database = %connection.database, "connected to sql server");
        Ok(connection)
    }

    fn client(&self) -> Result<MutexGuard<'_, Option<TdsClient>>> {
        self.client
            .lock()
            .map_err(|_| DbError::Connection("connection lock poisoned".to_string()))
    }

    /// Run `future` under the command timeout; `None` means it timed out.
    fn block_on<T, F>(&self, future: F) -> Option<tiberius::Result<T>>
    where
        F: Future<Output = tiberius::Result<T>>,
    {
        self.runtime
            .block_on(tokio::time::timeout(self.timeout, future))
            .ok()
    }

    fn settle<T>(
        &self,
        slot: &mut Option<TdsClient>,
        sql: &str,
        outcome: Option<tiberius::Result<T>>,
    ) -> Result<T> {
        match outcome {
            Some(Ok(value)) => Ok(value),
            Some(Err(err)) => Err(map_error(err, sql)),
            None => {
                *slot = None;
                let seconds = self.timeout.as_secs();
                warn!(seconds, "command timed out, reopening the connection");
                let reopen = open_client(self.config.clone());
                let reopened = self
                    .runtime
                    .block_on(tokio::time::timeout(self.timeout, reopen));
                match reopened {
                    Ok(Ok(client)) => {
                        *slot = Some(client);
                        Err(DbError::Timeout {
                            seconds,
                            sql: sql.to_string(),
                        })
                    }
                    Ok(Err(err)) => Err(DbError::Connection(format!(
                        "command timed out after {seconds}s and reconnecting failed: {err}"
                    ))),
                    Err(_) => Err(DbError::Connection(format!(
                        "command timed out after {seconds}s and reconnecting timed out"
                    ))),
                }
            }
        }
    }
}

fn closed() -> DbError {
    DbError::Connection("connection was closed after a timeout".to_string())
}

impl Database for SqlServerConnection {
    fn database_name(&self) -> &str {
        &self.database
    }

    fn execute_query(&self, sql: &str) -> Result<Vec<Row>> {
        let mut slot = self.client()?;
        let client = slot.as_mut().ok_or_else(closed)?;
        let outcome = self.block_on(async {
            client.simple_query(sql).await?.into_first_result().await
        });
        let rows = self.settle(&mut slot, sql, outcome)?;
        debug!(rows = rows.len(), "query finished");
        rows.into_iter().map(convert_row).collect()
    }

    fn execute_non_query(&self, sql: &str) -> Result<u64> {
        let mut slot = self.client()?;
        let client = slot.as_mut().ok_or_else(closed)?;
        let outcome = self.block_on(async { client.execute(sql, &[]).await });
        Ok(self.settle(&mut slot, sql, outcome)?.total())
    }
}

fn map_error(err: tiberius::error::Error, sql: &str) -> DbError {
    match err {
        tiberius::error::Error::Io { message, .. } => DbError::Connection(message),
        tiberius::error::Error::Tls(message) => DbError::Connection(message),
        other => DbError::query(other.to_string(), sql),
    }
}

fn convert_row(row: tiberius::Row) -> Result<Row> {
    row.into_iter()
        .map(convert_value)
        .collect::<Result<Vec<_>>>()
        .map(Row::new)
}

fn temporal<T: for<'a> FromSql<'a>>(data: &ColumnData<'static>) -> Result<Option<T>> {
    T::from_sql(data).map_err(|err| DbError::query(err.to_string(), String::new()))
}

fn convert_value(data: ColumnData<'static>) -> Result<SqlValue> {
    let value = match data {
        ColumnData::U8(value) => value.map(|value| SqlValue::Int(i64::from(value))),
        ColumnData::I16(value) => value.map(|value| SqlValue::Int(i64::from(value))),
        ColumnData::I32(value) => value.map(|value| SqlValue::Int(i64::from(value))),
        ColumnData::I64(value) => value.map(SqlValue::Int),
        ColumnData::F32(value) => value.map(|value| SqlValue::Float(f64::from(value))),
        ColumnData::F64(value) => value.map(SqlValue::Float),
        ColumnData::Bit(value) => value.map(SqlValue::Bool),
        ColumnData::String(value) => value.map(|value| SqlValue::Text(value.into_owned())),
        ColumnData::Guid(value) => value.map(|value| SqlValue::Uuid(value.to_string())),
        ColumnData::Numeric(value) => value.map(|value| SqlValue::Decimal(value.to_string())),
        ColumnData::Binary(value) => {
            value.map(|value| SqlValue::Text(format!("0x{}", hex::encode(value.as_ref()))))
        }
        ColumnData::Date(_) => temporal::<NaiveDate>(&data)?.map(SqlValue::Date),
        ColumnData::Time(_) => temporal::<NaiveTime>(&data)?.map(SqlValue::Time),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            temporal::<NaiveDateTime>(&data)?.map(SqlValue::DateTime)
        }
        ColumnData::DateTimeOffset(_) => temporal::<DateTime<FixedOffset>>(&data)?
            .map(|value| SqlValue::DateTime(value.naive_local())),
        other => {
            return Err(DbError::Unsupported(format!(
                "column data {other:?} cannot be masked"
            )));
        }
    };
    Ok(value.unwrap_or(SqlValue::Null))
}
