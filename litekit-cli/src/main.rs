//! `litekit` developer CLI.
//!
//! Opens one `SQLite` database (in memory by default) and runs a single
//! subcommand against it: a short demo, a SQL script, a parameterised query
//! or an online backup into another file.

use std::time::Duration;

use clap::{Parser, Subcommand};
use eyre::{bail, Result, WrapErr};
use litekit_db::{Backup, Connection, Reader, Statement, Value, MEMORY};
use tracing_subscriber::EnvFilter;

/// LiteKit - safe `SQLite` from the command line
#[derive(Parser, Debug)]
#[command(name = "litekit", version, about, long_about = None)]
struct Cli {
    /// Database file to open (`:memory:` for a private in-memory database)
    #[arg(short, long, global = true, default_value = MEMORY, env = "LITEKIT_DATABASE")]
    database: String,

    /// Log the run time of every statement
    #[arg(long, global = true, env = "LITEKIT_PROFILE")]
    profile: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a `Users` table, insert a row and read it back
    Demo,
    /// Run one or more semicolon-separated statements
    Exec {
        /// SQL script
        sql: String,
    },
    /// Run a single statement and print its rows
    Query {
        /// SQL text with `?` placeholders
        sql: String,
        /// Placeholder values in order: integers, floats, `NULL`, `x'hex'`
        /// blobs, anything else as text
        #[arg(short, long = "param", value_parser = parse_value)]
        params: Vec<Value>,
    },
    /// Copy the database into another file
    Backup {
        /// Destination database file
        destination: String,
        /// Pages per step; negative copies everything at once
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        pages: i32,
    },
}

fn main() -> Result<()> {
    tracing_log::LogTracer::init().wrap_err("failed to bridge log records")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut conn = Connection::new(&cli.database)
        .wrap_err_with(|| format!("failed to open {}", cli.database))?;
    if cli.profile {
        conn.profile(log_profile)?;
    }

    match cli.command {
        Command::Demo => demo(&conn),
        Command::Exec { sql } => {
            conn.execute_batch(&sql)?;
            tracing::info!(changes = conn.changes(), row_id = conn.row_id(), "executed");
            Ok(())
        }
        Command::Query { sql, params } => {
            let (columns, rows) = query(&conn, &sql, &params)?;
            println!("{}", columns.join("\t"));
            for row in rows {
                let cells: Vec<String> = row.iter().map(render).collect();
                println!("{}", cells.join("\t"));
            }
            Ok(())
        }
        Command::Backup { destination, pages } => {
            let copied = backup(&conn, &destination, pages)?;
            tracing::info!(pages = copied, %destination, "backup complete");
            Ok(())
        }
    }
}

fn log_profile(sql: &str, elapsed: Duration) {
    tracing::info!(target: "litekit::profile", ?elapsed, sql);
}

fn demo(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS Users (Name TEXT)")?;
    Statement::new(conn, "INSERT INTO Users VALUES (?)", ("Joe",))?.execute()?;
    tracing::info!(row_id = conn.row_id(), "inserted");

    let mut select = Statement::new(conn, "SELECT Name FROM Users", ())?;
    let mut rows = select.rows()?;
    while let Some(row) = rows.next()? {
        println!("{} ({} bytes)", row.get_string(0), row.get_string_length(0));
    }
    Ok(())
}

/// Runs `sql` and collects the column names and every row.
fn query(
    conn: &Connection,
    sql: &str,
    params: &[Value],
) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
    let mut stmt = Statement::new(conn, sql, params)?;
    if !stmt.is_valid() {
        bail!("no statement in {sql:?}");
    }
    let columns: Vec<String> = (0..stmt.column_count())
        .map(|i| stmt.column_name(i).unwrap_or_default().to_string())
        .collect();
    let rows: Vec<Vec<Value>> = stmt
        .query_map(|row| {
            Ok((0..row.column_count())
                .map(|i| row.get_value(i))
                .collect::<Vec<_>>())
        })?
        .collect::<litekit_db::DbResult<_>>()?;
    Ok((columns, rows))
}

/// Backs `conn` up into `destination`, returning the source page count.
fn backup(conn: &Connection, destination: &str, pages: i32) -> Result<usize> {
    let target = Connection::new(destination)
        .wrap_err_with(|| format!("failed to open {destination}"))?;
    let mut backup = Backup::new(&target, conn)?;
    while backup.step(pages)? {
        tracing::debug!(
            remaining = backup.remaining(),
            total = backup.page_count(),
            "backup step"
        );
    }
    Ok(backup.page_count())
}

fn parse_value(raw: &str) -> Result<Value, String> {
    if raw.eq_ignore_ascii_case("null") {
        return Ok(Value::Null);
    }
    if let Ok(int) = raw.parse::<i64>() {
        return Ok(Value::Integer(int));
    }
    if let Ok(float) = raw.parse::<f64>() {
        return Ok(Value::Float(float));
    }
    let hex = raw
        .strip_prefix("x'")
        .or_else(|| raw.strip_prefix("X'"))
        .and_then(|rest| rest.strip_suffix('\''));
    match hex {
        Some(digits) => parse_hex(digits).map(Value::Blob),
        None => Ok(Value::Text(raw.to_string())),
    }
}

fn parse_hex(digits: &str) -> Result<Vec<u8>, String> {
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in x'{digits}'"));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("invalid hex digits in x'{digits}'"))
        })
        .collect()
}

fn render(value: &Value) -> String {
    match value {
        Value::Integer(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Text(v) => v.clone(),
        Value::Blob(v) => {
            let hex: String = v.iter().map(|b| format!("{b:02X}")).collect();
            format!("x'{hex}'")
        }
        Value::Null => "NULL".to_string(),
    }
}
