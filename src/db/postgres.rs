//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresConnector`, which opens one `PgConnection` per target
//! database using the shared server settings, and the `PostgresClient` that
//! implements the `DatabaseClient` trait on top of it using sqlx.

use crate::config::ServerConfig;
use crate::db::{Connector, DatabaseClient, Row, Value};
use crate::error::{GoldError, Result};
use async_trait::async_trait;
use sqlx::postgres::types::{Oid, PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgTypeInfo, PgTypeKind, Postgres};
use sqlx::types::chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::{BigDecimal, Decimal, JsonValue, Uuid};
use sqlx::{Column as _, Connection as _, Executor as _, Row as _, Statement as _, TypeInfo as _};
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Opens PostgreSQL connections on one server, choosing the database per call.
#[derive(Debug, Clone)]
pub struct PostgresConnector {
    config: ServerConfig,
}

impl PostgresConnector {
    /// Creates a connector for the server described by `config`.
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    async fn connect(&self, db_id: &str) -> Result<Box<dyn DatabaseClient>> {
        let client = PostgresClient::connect(&self.config, db_id).await?;
        Ok(Box::new(client))
    }
}

/// A single PostgreSQL connection to one database.
#[derive(Debug)]
pub struct PostgresClient {
    conn: Option<PgConnection>,
}

impl PostgresClient {
    /// Connects to `database` on the configured server.
    ///
    /// Transient failures (refused, reset, timed out) are retried with
    /// exponential backoff; everything else fails immediately.
    pub async fn connect(config: &ServerConfig, database: &str) -> Result<Self> {
        let options = connect_options(config, database);

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!(
                "Connecting to {database} ({}), attempt {} of {}",
                config.display_string(),
                attempt,
                MAX_RETRY_ATTEMPTS
            );

            match PgConnection::connect_with(&options).await {
                Ok(conn) => {
                    return Ok(Self { conn: Some(conn) });
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    } else {
                        break;
                    }
                }
            }
        }

        match last_error {
            Some(e) => Err(map_connection_error(e, config, database)),
            None => Err(GoldError::internal("no connection attempt was made")),
        }
    }

    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| GoldError::internal("connection already closed"))
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn describe(&mut self, sql: &str) -> Result<Vec<String>> {
        let statement = self
            .conn()?
            .prepare(sql)
            .await
            .map_err(|e| GoldError::query(format_query_error(e)))?;

        Ok(statement
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect())
    }

    async fn fetch_rows(&mut self, sql: &str) -> Result<Vec<Row>> {
        let rows: Vec<PgRow> = sqlx::query(sql)
            .fetch_all(self.conn()?)
            .await
            .map_err(map_fetch_error)?;

        rows.iter().map(convert_row).collect()
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let done = sqlx::query(sql)
            .execute(self.conn()?)
            .await
            .map_err(|e| GoldError::query(format_query_error(e)))?;

        Ok(done.rows_affected())
    }

    async fn close(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => conn
                .close()
                .await
                .map_err(|e| GoldError::connection(format!("Failed to close connection: {e}"))),
            None => Ok(()),
        }
    }
}

fn connect_options(config: &ServerConfig, database: &str) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(database)
}

/// Maps a fetch failure, keeping "nothing to fetch" apart from real query errors.
fn map_fetch_error(error: sqlx::Error) -> GoldError {
    match error {
        sqlx::Error::RowNotFound => GoldError::NoResultSet,
        other => GoldError::query(format_query_error(other)),
    }
}

/// Converts a sqlx PgRow to our Row type.
///
/// A column that cannot be decoded fails the whole row rather than being
/// written as NULL.
fn convert_row(row: &PgRow) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info()))
        .collect()
}

fn decode_error(index: usize, type_name: &str, error: sqlx::Error) -> GoldError {
    GoldError::query(format!(
        "Cannot decode column {index} of type {type_name}: {error}"
    ))
}

/// Decodes column `index` as `Option<T>` and wraps it.
fn decode<'r, T, F>(row: &'r PgRow, index: usize, type_name: &str, wrap: F) -> Result<Value>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    F: FnOnce(T) -> Value,
{
    row.try_get::<Option<T>, _>(index)
        .map(|v| v.map_or(Value::Null, wrap))
        .map_err(|e| decode_error(index, type_name, e))
}

fn decode_array<'r, T>(row: &'r PgRow, index: usize, type_name: &str) -> Result<Value>
where
    T: Into<Value>,
    Vec<Option<T>>: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    decode::<Vec<Option<T>>, _>(row, index, type_name, |items| {
        Value::Array(items.into_iter().map(Value::from).collect())
    })
}

fn decode_array_with<'r, T, F>(
    row: &'r PgRow,
    index: usize,
    type_name: &str,
    item: F,
) -> Result<Value>
where
    Vec<Option<T>>: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    F: Fn(T) -> Value,
{
    decode::<Vec<Option<T>>, _>(row, index, type_name, |items| {
        Value::Array(
            items
                .into_iter()
                .map(|v| v.map_or(Value::Null, &item))
                .collect(),
        )
    })
}

/// NUMERIC goes through `Decimal` and falls back to `BigDecimal` for values
/// wider than 28 digits. `NaN` fits neither and is a decode error.
fn decode_numeric(row: &PgRow, index: usize, type_name: &str) -> Result<Value> {
    match row.try_get::<Option<Decimal>, _>(index) {
        Ok(v) => Ok(v.map_or(Value::Null, |d| Value::Decimal(d.to_string()))),
        Err(_) => decode::<BigDecimal, _>(row, index, type_name, |v| {
            Value::Decimal(v.to_plain_string())
        }),
    }
}

fn decode_numeric_array(row: &PgRow, index: usize, type_name: &str) -> Result<Value> {
    match row.try_get::<Option<Vec<Option<Decimal>>>, _>(index) {
        Ok(Some(items)) => Ok(Value::Array(
            items
                .into_iter()
                .map(|v| v.map_or(Value::Null, |d| Value::Decimal(d.to_string())))
                .collect(),
        )),
        Ok(None) => Ok(Value::Null),
        Err(_) => decode_array_with::<BigDecimal, _>(row, index, type_name, |v| {
            Value::Decimal(v.to_plain_string())
        }),
    }
}

fn text<T: ToString>(v: T) -> Value {
    Value::Text(v.to_string())
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_info: &PgTypeInfo) -> Result<Value> {
    let type_name = type_info.name();

    // The binary form of an enum is its label.
    if let PgTypeKind::Enum(_) = type_info.kind() {
        return row
            .try_get_unchecked::<Option<String>, _>(index)
            .map(|v| v.map_or(Value::Null, Value::Text))
            .map_err(|e| decode_error(index, type_name, e));
    }

    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => decode::<bool, _>(row, index, type_name, Value::Bool),

        "INT2" | "SMALLINT" => {
            decode::<i16, _>(row, index, type_name, |v| Value::Int(v as i64))
        }

        "INT4" | "INT" | "INTEGER" => decode::<i32, _>(row, index, type_name, Value::from),

        "INT8" | "BIGINT" => decode::<i64, _>(row, index, type_name, Value::Int),

        "OID" => decode::<Oid, _>(row, index, type_name, |v| Value::Int(v.0 as i64)),

        "FLOAT4" | "REAL" => {
            decode::<f32, _>(row, index, type_name, |v| Value::Float(v as f64))
        }

        "FLOAT8" | "DOUBLE PRECISION" => decode::<f64, _>(row, index, type_name, Value::Float),

        "NUMERIC" => decode_numeric(row, index, type_name),

        "MONEY" => decode::<PgMoney, _>(row, index, type_name, |v| {
            Value::Decimal(v.to_decimal(2).to_string())
        }),

        "\"CHAR\"" => decode::<i8, _>(row, index, type_name, |v| text(v as u8 as char)),

        "DATE" => decode::<NaiveDate, _>(row, index, type_name, text),

        "TIME" => decode::<NaiveTime, _>(row, index, type_name, text),

        "TIMETZ" => {
            decode::<PgTimeTz<NaiveTime, FixedOffset>, _>(row, index, type_name, |v| {
                Value::Text(format!("{}{}", v.time, v.offset))
            })
        }

        "TIMESTAMP" => decode::<NaiveDateTime, _>(row, index, type_name, text),

        "TIMESTAMPTZ" => decode::<DateTime<Utc>, _>(row, index, type_name, |v| {
            Value::Text(v.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string())
        }),

        "INTERVAL" => decode::<PgInterval, _>(row, index, type_name, |v| {
            Value::Text(format_interval(&v))
        }),

        "UUID" => decode::<Uuid, _>(row, index, type_name, text),

        "JSON" | "JSONB" => decode::<JsonValue, _>(row, index, type_name, Value::Json),

        "BYTEA" => decode::<Vec<u8>, _>(row, index, type_name, Value::from),

        "BOOL[]" => decode_array::<bool>(row, index, type_name),
        "INT2[]" => {
            decode_array_with::<i16, _>(row, index, type_name, |v| Value::Int(v as i64))
        }
        "INT4[]" => decode_array::<i32>(row, index, type_name),
        "INT8[]" => decode_array::<i64>(row, index, type_name),
        "FLOAT4[]" => {
            decode_array_with::<f32, _>(row, index, type_name, |v| Value::Float(v as f64))
        }
        "FLOAT8[]" => decode_array::<f64>(row, index, type_name),
        "NUMERIC[]" => decode_numeric_array(row, index, type_name),
        "DATE[]" => decode_array_with::<NaiveDate, _>(row, index, type_name, text),
        "TIMESTAMP[]" => decode_array_with::<NaiveDateTime, _>(row, index, type_name, text),
        "UUID[]" => decode_array_with::<Uuid, _>(row, index, type_name, text),
        "TEXT[]" | "VARCHAR[]" | "NAME[]" | "BPCHAR[]" => {
            decode_array::<String>(row, index, type_name)
        }

        // Text-like types (TEXT, VARCHAR, BPCHAR, NAME, ...). Anything the
        // driver will not hand over as a string is a decode error.
        _ => decode::<String, _>(row, index, type_name, Value::from),
    }
}

/// Renders an interval the way psql does, e.g. `1 mon 2 days 03:04:05`.
fn format_interval(interval: &PgInterval) -> String {
    let mut parts = Vec::new();

    let years = interval.months / 12;
    let months = interval.months % 12;
    if years != 0 {
        parts.push(format!("{years} year{}", plural(years as i64)));
    }
    if months != 0 {
        parts.push(format!("{months} mon{}", plural(months as i64)));
    }
    if interval.days != 0 {
        parts.push(format!(
            "{} day{}",
            interval.days,
            plural(interval.days as i64)
        ));
    }

    let micros = interval.microseconds;
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let micros = micros.unsigned_abs();
        let secs = micros / 1_000_000;
        let frac = micros % 1_000_000;
        let mut time = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
        if frac != 0 {
            let digits = format!("{frac:06}");
            time.push('.');
            time.push_str(digits.trim_end_matches('0'));
        }
        parts.push(time);
    }

    parts.join(" ")
}

fn plural(n: i64) -> &'static str {
    if n.abs() == 1 {
        ""
    } else {
        "s"
    }
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    // Authentication and database-not-found errors are not transient
    if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
        || error_str.contains("does not exist")
    {
        return false;
    }

    error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
}

/// Maps sqlx connection errors to operator-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ServerConfig, database: &str) -> GoldError {
    let host = &config.host;
    let port = config.port;
    let user = &config.user;

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        GoldError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        GoldError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        GoldError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        GoldError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        GoldError::connection(error.to_string())
    }
}

/// Formats a query error with detail and hint lines if available.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }

        if let Some(table) = pg_error.table() {
            result.push_str("\n  TABLE: ");
            result.push_str(table);
        }

        if let Some(column) = pg_error.column() {
            result.push_str("\n  COLUMN: ");
            result.push_str(column);
        }
    }

    result
}
