use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::Connection;

use crate::record::{ConvictionRecord, Field};

const TABLE: &str = "data";

pub fn connect(path: &Path) -> Result<Connection> {
    let conn =
        Connection::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

fn table_exists(conn: &Connection) -> rusqlite::Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [TABLE],
        |r| r.get(0),
    )?;
    Ok(n > 0)
}

fn table_columns(conn: &Connection) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", TABLE))?;
    let cols = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(cols)
}

/// Links already stored. A missing table (first run) is an empty set.
pub fn existing_links(conn: &Connection) -> rusqlite::Result<HashSet<String>> {
    if !table_exists(conn)? {
        return Ok(HashSet::new());
    }
    let mut stmt = conn.prepare(&format!("SELECT link FROM {}", TABLE))?;
    let links = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<HashSet<String>, _>>()?;
    Ok(links)
}

// ── Saving ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Text(Field),
    Lat,
    Lng,
}

impl Column {
    fn name(self) -> &'static str {
        match self {
            Column::Text(f) => f.column(),
            Column::Lat => "lat",
            Column::Lng => "lng",
        }
    }

    fn sql_type(self) -> &'static str {
        match self {
            Column::Text(_) => "TEXT",
            Column::Lat | Column::Lng => "REAL",
        }
    }

    fn value(self, record: &ConvictionRecord) -> Value {
        match self {
            Column::Text(f) => record
                .get(f)
                .map_or(Value::Null, |v| Value::Text(v.to_string())),
            Column::Lat => record.location.map_or(Value::Null, |c| Value::Real(c.lat)),
            Column::Lng => record.location.map_or(Value::Null, |c| Value::Real(c.lng)),
        }
    }
}

/// Union of the columns any record in the batch carries, in canonical order.
fn batch_columns(records: &[ConvictionRecord]) -> Vec<Column> {
    let mut cols: Vec<Column> = Field::ALL
        .iter()
        .filter(|f| records.iter().any(|r| r.get(**f).is_some()))
        .map(|f| Column::Text(*f))
        .collect();
    if records.iter().any(|r| r.location.is_some()) {
        cols.push(Column::Lat);
        cols.push(Column::Lng);
    }
    cols
}

/// Upsert records keyed by `link`, growing the table for unseen columns.
pub fn save_records(conn: &Connection, records: &[ConvictionRecord]) -> rusqlite::Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }
    let columns = batch_columns(records);

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (link TEXT PRIMARY KEY)",
        TABLE
    ))?;
    let present = table_columns(&tx)?;
    for col in &columns {
        if !present.contains(col.name()) {
            tx.execute_batch(&format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                TABLE,
                col.name(),
                col.sql_type()
            ))?;
        }
    }

    let names: Vec<&str> = std::iter::once("link")
        .chain(columns.iter().map(|c| c.name()))
        .collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
        TABLE,
        names.join(", "),
        placeholders.join(", ")
    );

    let mut count = 0;
    {
        let mut stmt = tx.prepare(&sql)?;
        for r in records {
            let values = std::iter::once(Value::Text(r.link.clone()))
                .chain(columns.iter().map(|c| c.value(r)));
            count += stmt.execute(rusqlite::params_from_iter(values))?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub geocoded: usize,
    pub without_location: usize,
}

pub fn get_stats(conn: &Connection) -> rusqlite::Result<Stats> {
    if !table_exists(conn)? {
        return Ok(Stats {
            total: 0,
            geocoded: 0,
            without_location: 0,
        });
    }
    let total: usize =
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", TABLE), [], |r| r.get(0))?;
    let geocoded: usize = if table_columns(conn)?.contains("lat") {
        conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE lat IS NOT NULL", TABLE),
            [],
            |r| r.get(0),
        )?
    } else {
        0
    };
    Ok(Stats {
        total,
        geocoded,
        without_location: total - geocoded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Coordinates, IndexEntry};

    fn record(link: &str, fields: &[(Field, &str)], location: Option<(f64, f64)>) -> ConvictionRecord {
        let mut entry = IndexEntry::new(link);
        for (f, v) in fields {
            entry.summary.insert(*f, v.to_string());
        }
        let mut r = ConvictionRecord::from_entry(entry);
        r.location = location.map(|(lat, lng)| Coordinates { lat, lng });
        r
    }

    #[test]
    fn missing_table_means_no_links() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(existing_links(&conn).unwrap().is_empty());
        let s = get_stats(&conn).unwrap();
        assert_eq!(s.total, 0);
    }

    #[test]
    fn save_then_read_links() {
        let conn = Connection::open_in_memory().unwrap();
        let n = save_records(
            &conn,
            &[
                record("a", &[(Field::TradingName, "A")], Some((-37.0, 145.0))),
                record("b", &[(Field::Court, "County Court")], None),
            ],
        )
        .unwrap();
        assert_eq!(n, 2);

        let links = existing_links(&conn).unwrap();
        assert!(links.contains("a") && links.contains("b"));

        // sparse rows: fields absent from a record are NULL
        let court: Option<String> = conn
            .query_row("SELECT court FROM data WHERE link = 'a'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(court, None);
        let lat: Option<f64> = conn
            .query_row("SELECT lat FROM data WHERE link = 'b'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(lat, None);

        let s = get_stats(&conn).unwrap();
        assert_eq!((s.total, s.geocoded, s.without_location), (2, 1, 1));
    }

    #[test]
    fn schema_grows_across_batches() {
        let conn = Connection::open_in_memory().unwrap();
        save_records(&conn, &[record("a", &[(Field::TradingName, "A")], None)]).unwrap();
        assert!(!table_columns(&conn).unwrap().contains("lat"));
        assert_eq!(get_stats(&conn).unwrap().geocoded, 0);

        save_records(
            &conn,
            &[record("b", &[(Field::Description, "- one\n- two")], Some((1.5, 2.5)))],
        )
        .unwrap();
        let cols = table_columns(&conn).unwrap();
        for c in ["link", "trading_name", "description", "lat", "lng"] {
            assert!(cols.contains(c), "missing column {}", c);
        }
        let lng: f64 = conn
            .query_row("SELECT lng FROM data WHERE link = 'b'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(lng, 2.5);
    }

    #[test]
    fn saving_same_link_updates_row() {
        let conn = Connection::open_in_memory().unwrap();
        save_records(&conn, &[record("a", &[(Field::Court, "Old")], None)]).unwrap();
        save_records(&conn, &[record("a", &[(Field::Court, "New")], None)]).unwrap();
        let (count, court): (i64, String) = conn
            .query_row("SELECT COUNT(*), MAX(court) FROM data", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(court, "New");
    }

    #[test]
    fn empty_batch_creates_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(save_records(&conn, &[]).unwrap(), 0);
        assert!(!table_exists(&conn).unwrap());
    }
}
