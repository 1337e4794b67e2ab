//! Unit tests for the safe `SQLite` wrapper.

use std::cell::RefCell;
use std::rc::Rc;

use super::*;

fn users() -> Connection {
    let conn = Connection::memory().expect("open in-memory db");
    execute(&conn, "CREATE TABLE Users (Name TEXT)", ()).expect("create table");
    conn
}

fn names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn.prepare("SELECT Name FROM Users ORDER BY rowid").expect("prepare");
    stmt.query_map(|row| Ok(row.get_string(0).into_owned()))
        .expect("query")
        .collect::<DbResult<Vec<_>>>()
        .expect("collect")
}

// ── Connection ──────────────────────────────────────────────────────────

#[test]
fn test_default_connection_is_not_open() {
    let conn = Connection::default();
    assert!(!conn.is_valid());
    assert_eq!(conn.row_id(), 0);
    assert_eq!(conn.changes(), 0);
}

#[test]
fn test_memory_and_wide_memory_open() {
    assert!(Connection::memory().expect("narrow").is_valid());
    assert!(Connection::wide_memory().expect("wide").is_valid());
    assert_eq!(String::from_utf16_lossy(&WIDE_MEMORY), MEMORY);
}

#[test]
fn test_failed_open_leaves_connection_untouched() {
    let mut conn = users();
    execute(&conn, "INSERT INTO Users VALUES ('Ann')", ()).expect("insert");

    let err = conn
        .open("/nonexistent-directory/for/litekit/test.db")
        .expect_err("open must fail");
    assert_ne!(err.code.0, 0);
    assert!(!err.message.is_empty());

    assert!(conn.is_valid());
    assert_eq!(names(&conn), ["Ann"]);
}

#[test]
fn test_open_replaces_previous_database() {
    let mut conn = users();
    conn.open(MEMORY).expect("reopen");
    let err = conn.prepare("SELECT Name FROM Users").expect_err("table is gone");
    assert!(err.message.contains("no such table"), "{err}");
}

#[test]
fn test_open_rejects_interior_nul() {
    let mut conn = Connection::default();
    let err = conn.open("bad\0name").expect_err("nul in name");
    assert_eq!(err.code.0, ffi::SQLITE_MISUSE);
    assert!(!conn.is_valid());

    let err = conn.open_wide(&[0x61, 0, 0x62]).expect_err("nul in wide name");
    assert_eq!(err.code.0, ffi::SQLITE_MISUSE);
}

#[test]
fn test_failed_wide_open_leaves_connection_untouched() {
    let mut conn = users();
    execute(&conn, "INSERT INTO Users VALUES ('Ann')", ()).expect("insert");

    let missing: Vec<u16> = "/nonexistent-directory/for/litekit/test.db"
        .encode_utf16()
        .collect();
    let err = conn.open_wide(&missing).expect_err("open must fail");
    assert_ne!(err.code.0, 0);
    assert!(!err.message.is_empty());

    assert!(conn.is_valid());
    assert_eq!(names(&conn), ["Ann"]);
}

#[cfg(unix)]
#[test]
fn test_open_path_rejects_non_utf8_path() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let path = std::path::Path::new(OsStr::from_bytes(b"/tmp/litekit-\xff.db"));
    let err = Connection::open_path(path, OpenMode::ReadWriteCreate).expect_err("non-utf8 path");
    assert_eq!(err.code.0, ffi::SQLITE_MISUSE);
    assert!(!path.exists());
}

#[test]
fn test_connection_closes_with_statement_still_open() {
    let conn = users();
    let stmt = conn.prepare("SELECT Name FROM Users").expect("prepare");
    std::mem::forget(stmt);
    drop(conn);
}

#[test]
fn test_row_id_tracks_inserts() {
    let conn = users();
    assert_eq!(conn.row_id(), 0);
    execute(&conn, "INSERT INTO Users VALUES ('a')", ()).expect("insert");
    execute(&conn, "INSERT INTO Users VALUES ('b')", ()).expect("insert");
    assert_eq!(conn.row_id(), 2);
}

#[test]
fn test_execute_reports_changes() {
    let conn = users();
    conn.execute_batch("INSERT INTO Users VALUES ('a'); INSERT INTO Users VALUES ('b');")
        .expect("batch");
    let changed = conn
        .execute("UPDATE Users SET Name = ?", ("z",))
        .expect("update");
    assert_eq!(changed, 2);
}

#[test]
fn test_sql_without_statement_runs_as_empty() {
    let conn = users();
    execute(&conn, "INSERT INTO Users VALUES ('a')", ()).expect("insert");

    assert_eq!(conn.execute("-- nothing", ()).expect("comment only"), 0);
    execute(&conn, "   ", ()).expect("whitespace only");
    let row = conn
        .query_row_optional("/* nothing */", (), |row| Ok(row.get_int(0)))
        .expect("query");
    assert!(row.is_none());

    let mut stmt = Statement::new(&conn, "-- nothing", ()).expect("prepare");
    assert!(!stmt.is_valid());
    assert!(!stmt.step().expect("step"));
    assert!(stmt.rows().expect("begin").is_end());
}

#[test]
fn test_execute_batch_error_carries_message() {
    let conn = Connection::memory().expect("open");
    let err = conn.execute_batch("CREATE TABLE;").expect_err("syntax error");
    assert_eq!(err.code.primary(), 1);
    assert!(err.message.contains("syntax error"), "{err}");
}

#[test]
fn test_query_row_optional_none() {
    let conn = users();
    let result = conn
        .query_row_optional("SELECT Name FROM Users", (), |row| {
            Ok(row.get_string(0).into_owned())
        })
        .expect("query");
    assert!(result.is_none());
    let err = conn
        .query_row("SELECT Name FROM Users", (), |row| Ok(row.get_int(0)))
        .expect_err("no rows");
    assert_eq!(err.code.0, ffi::SQLITE_DONE);
}

#[test]
fn test_profile_reports_finished_statements() {
    let mut conn = Connection::memory().expect("open");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    conn.profile(move |sql, _elapsed| sink.borrow_mut().push(sql.to_string()))
        .expect("install profiler");

    conn.execute_batch("CREATE TABLE t (x)").expect("create");
    conn.clear_profile();
    conn.execute_batch("DROP TABLE t").expect("drop");

    let seen = seen.borrow();
    assert!(seen.iter().any(|sql| sql == "CREATE TABLE t (x)"), "{seen:?}");
    assert!(!seen.iter().any(|sql| sql.starts_with("DROP")), "{seen:?}");
}

#[test]
fn test_profile_requires_open_connection() {
    let mut conn = Connection::default();
    assert!(conn.profile(|_, _| {}).is_err());
}

// ── Statement ───────────────────────────────────────────────────────────

#[test]
fn test_execute_ddl_produces_no_rows() {
    let conn = Connection::memory().expect("open");
    let mut stmt = Statement::new(&conn, "CREATE TABLE T(x)", ()).expect("prepare");
    stmt.execute().expect("execute");
}

#[test]
fn test_empty_table_yields_empty_sequence() {
    let conn = users();
    let mut stmt = conn.prepare("SELECT Name FROM Users").expect("prepare");
    let mut rows = stmt.rows().expect("begin");
    assert!(rows.is_end());
    assert_eq!(rows, Rows::end());
    let mut iterations = 0;
    while rows.next().expect("next").is_some() {
        iterations += 1;
    }
    assert_eq!(iterations, 0);
}

#[test]
fn test_sequence_is_not_restartable() {
    let conn = users();
    execute(&conn, "INSERT INTO Users VALUES ('Ann')", ()).expect("insert");
    let mut stmt = conn.prepare("SELECT Name FROM Users").expect("prepare");
    let mut rows = stmt.rows().expect("begin");
    assert!(!rows.is_end());
    assert_ne!(rows, Rows::end());
    assert_eq!(rows.next().expect("first").expect("row").get_string(0), "Ann");
    assert!(rows.next().expect("second").is_none());
    assert!(rows.is_end());
    assert!(rows.next().expect("past end").is_none());
}

#[test]
fn test_bound_text_round_trip() {
    let conn = users();
    Statement::new(&conn, "INSERT INTO Users values(?)", ("Joe",))
        .expect("prepare")
        .execute()
        .expect("insert");

    let mut stmt = Statement::new(&conn, "SELECT Name FROM Users", ()).expect("prepare");
    let mut rows = stmt.rows().expect("begin");
    let row = rows.next().expect("step").expect("one row");
    assert_eq!(row.get_string(0), "Joe");
    assert_eq!(row.get_bytes(0), b"Joe");
    assert_eq!(row.get_string_length(0), 3);
    assert_eq!(row.get_type(0), ValueKind::Text);
}

#[test]
fn test_borrowed_text_binds_without_copy() {
    let name = String::from("Borrowed");
    let wide: Vec<u16> = "Wide".encode_utf16().collect();
    let conn = users();
    let mut stmt = conn.prepare("INSERT INTO Users VALUES (?)").expect("prepare");
    stmt.bind_borrowed_text(1, &name).expect("bind");
    stmt.execute().expect("insert");
    stmt.reset((Borrowed(wide.as_slice()),)).expect("reset");
    stmt.execute().expect("insert wide");
    drop(stmt);
    assert_eq!(names(&conn), ["Borrowed", "Wide"]);
}

#[test]
fn test_wide_text_round_trip() {
    let conn = Connection::wide_memory().expect("open");
    let sql: Vec<u16> = "CREATE TABLE Users (Name TEXT)".encode_utf16().collect();
    Statement::new_wide(&conn, &sql, ()).expect("prepare").execute().expect("create");

    let joe: Vec<u16> = "Jö€".encode_utf16().collect();
    execute(&conn, "INSERT INTO Users VALUES (?)", (joe.as_slice(),)).expect("insert");

    let mut stmt = conn.prepare("SELECT Name FROM Users").expect("prepare");
    assert!(stmt.step().expect("step"));
    assert_eq!(stmt.get_wide_string(0), joe);
    assert_eq!(stmt.get_wide_string_length(0), 3);
    assert_eq!(stmt.get_string(0), "Jö€");
    assert_eq!(stmt.get_string_length(0), "Jö€".len());
}

#[test]
fn test_bind_all_uses_argument_positions() {
    let conn = Connection::memory().expect("open");
    let mut stmt = Statement::new(
        &conn,
        "SELECT ?, ?, ?, ?, ?",
        (7, 9_000_000_000_i64, 1.5, "txt", Null),
    )
    .expect("prepare");
    assert_eq!(stmt.parameter_count(), 5);
    assert!(stmt.step().expect("step"));
    assert_eq!(stmt.get_int(0), 7);
    assert_eq!(stmt.get_int64(1), 9_000_000_000);
    assert!((stmt.get_double(2) - 1.5).abs() < f64::EPSILON);
    assert_eq!(stmt.get_string(3), "txt");
    assert!(stmt.is_null(4));
    assert_eq!(stmt.column_count(), 5);
}

#[test]
fn test_dynamic_params_and_values() {
    let conn = Connection::memory().expect("open");
    let blob = vec![0xDE, 0xAD, 0xBE, 0xEF];
    let mut stmt = Statement::new(
        &conn,
        "SELECT ?1 AS i, ?2 AS f, ?3 AS b, ?4 AS t, ?5 AS n",
        params![5_i64, 2.5, blob.as_slice(), "text", Value::Null],
    )
    .expect("prepare");
    assert!(stmt.step().expect("step"));
    assert_eq!(stmt.get_value(0), Value::Integer(5));
    assert_eq!(stmt.get_value(1), Value::Float(2.5));
    assert_eq!(stmt.get_value(2), Value::Blob(blob.clone()));
    assert_eq!(stmt.get_value(3), Value::Text("text".into()));
    assert_eq!(stmt.get_value(4), Value::Null);
    assert_eq!(stmt.get_blob(2), blob.as_slice());
    for column in 0..stmt.column_count() {
        assert_eq!(stmt.get_value(column).kind(), stmt.get_type(column));
    }
    assert_eq!(stmt.column_name(2), Some("b"));
    assert_eq!(stmt.column_name(9), None);
}

#[test]
fn test_reset_reproduces_fresh_statement() {
    let conn = users();
    conn.execute_batch(
        "INSERT INTO Users VALUES ('Ann'); INSERT INTO Users VALUES ('Bob');
         INSERT INTO Users VALUES ('Cid');",
    )
    .expect("insert");
    let sql = "SELECT Name FROM Users WHERE Name >= ? ORDER BY Name";

    let mut reused = Statement::new(&conn, sql, ("A",)).expect("prepare");
    assert!(reused.step().expect("step"));
    reused.reset(("B",)).expect("reset");
    let from_reset: Vec<String> = reused
        .query_map(|row| Ok(row.get_string(0).into_owned()))
        .expect("query")
        .collect::<DbResult<_>>()
        .expect("rows");

    let mut fresh = Statement::new(&conn, sql, ("B",)).expect("prepare");
    let from_fresh: Vec<String> = fresh
        .query_map(|row| Ok(row.get_string(0).into_owned()))
        .expect("query")
        .collect::<DbResult<_>>()
        .expect("rows");

    assert_eq!(from_reset, ["Bob", "Cid"]);
    assert_eq!(from_reset, from_fresh);
}

#[test]
fn test_invalid_sql_leaves_statement_unprepared() {
    let conn = Connection::memory().expect("open");
    let mut stmt = Statement::default();
    let err = stmt
        .prepare(&conn, "SELEKT nonsense", ())
        .expect_err("invalid sql");
    assert_ne!(err.code.0, 0);
    assert!(!err.message.is_empty());
    assert!(!stmt.is_valid());
}

#[test]
fn test_bind_out_of_range_reports_connection_error() {
    let conn = Connection::memory().expect("open");
    let mut stmt = conn.prepare("SELECT ?").expect("prepare");
    let err = stmt.bind_int(2, 1).expect_err("out of range");
    assert_eq!(err.code.0, 25);
    assert!(!err.message.is_empty());
}

#[test]
fn test_step_failure_surfaces_constraint_error() {
    let conn = Connection::memory().expect("open");
    conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)").expect("create");
    let mut stmt = conn.prepare("INSERT INTO t VALUES (1)").expect("prepare");
    stmt.execute().expect("first insert");
    let mut again = conn.prepare("INSERT INTO t VALUES (1)").expect("prepare");
    let err = again.execute().expect_err("duplicate key");
    assert_eq!(err.code.primary(), 19);
    assert!(err.message.contains("UNIQUE"), "{err}");
}

#[test]
fn test_reset_surfaces_previous_step_error() {
    let conn = Connection::memory().expect("open");
    conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY); INSERT INTO t VALUES (1);")
        .expect("setup");
    let mut stmt = conn.prepare("INSERT INTO t VALUES (?)").expect("prepare");
    stmt.bind_int(1, 1).expect("bind");
    stmt.execute().expect_err("duplicate key");

    let err = stmt.reset((2,)).expect_err("reset repeats the step error");
    assert_eq!(err.code.primary(), 19);

    stmt.reset((2,)).expect("statement is usable again");
    stmt.execute().expect("insert");
    assert_eq!(conn.row_id(), 2);
}

#[test]
fn test_statement_reports_sql_and_clears_bindings() {
    let conn = Connection::memory().expect("open");
    let mut stmt = Statement::new(&conn, "SELECT ?", (42,)).expect("prepare");
    assert_eq!(stmt.sql(), Some("SELECT ?"));
    stmt.clear_bindings().expect("clear");
    assert!(stmt.step().expect("step"));
    assert!(stmt.is_null(0));
}

#[test]
fn test_reader_on_unpositioned_statement_reads_null() {
    let conn = Connection::memory().expect("open");
    let stmt = conn.prepare("SELECT 1").expect("prepare");
    assert_eq!(stmt.get_type(0), ValueKind::Null);
    assert!(stmt.get_bytes(0).is_empty());

    let unprepared = Statement::default();
    assert_eq!(unprepared.get_int(0), 0);
    assert_eq!(unprepared.column_count(), 0);
    assert_eq!(unprepared.sql(), None);
}

#[test]
fn test_mapped_rows_are_fused() {
    let conn = Connection::memory().expect("open");
    let mut stmt = conn
        .prepare("SELECT value FROM (SELECT 1 AS value UNION ALL SELECT 2)")
        .expect("prepare");
    let mut mapped = stmt.query_map(|row| Ok(row.get_int(0))).expect("query");
    assert_eq!(mapped.next().map(Result::ok), Some(Some(1)));
    assert_eq!(mapped.next().map(Result::ok), Some(Some(2)));
    assert!(mapped.next().is_none());
    assert!(mapped.next().is_none());
}

// ── Transaction ─────────────────────────────────────────────────────────

#[test]
fn test_transaction_commit() {
    let conn = users();
    {
        let tx = conn.transaction().expect("begin tx");
        tx.execute("INSERT INTO Users VALUES (?)", ("kept",)).expect("insert");
        tx.commit().expect("commit");
    }
    assert_eq!(names(&conn), ["kept"]);
}

#[test]
fn test_transaction_rollback_on_drop() {
    let conn = users();
    {
        let tx = conn.transaction_immediate().expect("begin tx");
        tx.execute("INSERT INTO Users VALUES (?)", ("dropped",)).expect("insert");
    }
    assert!(names(&conn).is_empty());
}

#[test]
fn test_transaction_explicit_rollback() {
    let conn = users();
    let tx = conn.transaction().expect("begin tx");
    tx.execute("INSERT INTO Users VALUES (?)", ("undone",)).expect("insert");
    tx.rollback().expect("rollback");
    assert!(names(&conn).is_empty());
}

// ── Backup ──────────────────────────────────────────────────────────────

#[test]
fn test_backup_between_memory_databases() {
    let source = users();
    execute(&source, "INSERT INTO Users VALUES ('Ann')", ()).expect("insert");
    let destination = Connection::memory().expect("open destination");

    let mut backup = Backup::new(&destination, &source).expect("init");
    assert!(!backup.step_all().expect("step"));
    assert!(backup.page_count() > 0);
    assert_eq!(backup.remaining(), 0);
    drop(backup);

    assert_eq!(names(&destination), ["Ann"]);
}

#[test]
fn test_backup_init_failure_reports_destination_error() {
    let source = Connection::memory().expect("open source");
    let destination = Connection::memory().expect("open destination");
    let err = Backup::with_names(&destination, &source, "main", "nonexistent")
        .expect_err("unknown source schema");
    assert_ne!(err.code.0, 0);
    assert!(!err.message.is_empty());
}

#[test]
fn test_connections_close_with_backup_still_open() {
    let source = users();
    let destination = Connection::memory().expect("open destination");
    let backup = Backup::new(&destination, &source).expect("init");
    std::mem::forget(backup);
    drop(source);
    drop(destination);
}
