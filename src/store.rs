use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::model::{FinalUnitRecord, ProfessionalRecord};
use crate::util::{ensure_parent, now_utc_string};

pub const DB_SCHEMA_VERSION: &str = "0.1.0";

pub fn open(db_path: &Path) -> Result<Connection> {
    ensure_parent(db_path)?;
    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;
    Ok(connection)
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS units (
              row_seq INTEGER PRIMARY KEY,
              unit_id TEXT NOT NULL,
              unit_name TEXT NOT NULL,
              address TEXT NOT NULL,
              listed_phone TEXT NOT NULL,
              phone TEXT NOT NULL,
              matched_directory_name TEXT NOT NULL,
              match_score REAL,
              detail_url TEXT NOT NULL,
              professional_count INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_units_unit_id ON units(unit_id);

            CREATE TABLE IF NOT EXISTS professionals (
              row_seq INTEGER PRIMARY KEY,
              unit_id TEXT NOT NULL,
              person_id TEXT NOT NULL,
              secondary_id TEXT NOT NULL,
              full_name TEXT NOT NULL,
              role_code TEXT NOT NULL,
              role_text TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_professionals_unit_id ON professionals(unit_id);
            CREATE INDEX IF NOT EXISTS idx_professionals_person_id ON professionals(person_id);
            ",
        )
        .context("failed to create schema")?;

    connection
        .execute(
            "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![DB_SCHEMA_VERSION],
        )
        .context("failed to record schema version")?;

    Ok(())
}

/// Replaces the whole units table with `records`, in one transaction.
pub fn replace_units(connection: &mut Connection, records: &[FinalUnitRecord]) -> Result<usize> {
    let tx = connection.transaction()?;
    tx.execute("DELETE FROM units", [])
        .context("failed to clear units")?;

    {
        let mut statement = tx.prepare(
            "INSERT INTO units(
               row_seq, unit_id, unit_name, address, listed_phone, phone,
               matched_directory_name, match_score, detail_url, professional_count
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;

        for (index, record) in records.iter().enumerate() {
            statement
                .execute(params![
                    index as i64 + 1,
                    record.unit_id,
                    record.unit_name,
                    record.address,
                    record.listed_phone,
                    record.phone,
                    record.matched_directory_name,
                    record.match_score,
                    record.detail_url,
                    record.professional_count as i64,
                ])
                .with_context(|| format!("failed to insert unit {}", record.unit_id))?;
        }
    }

    tx.execute(
        "INSERT INTO metadata(key, value) VALUES('units_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![now_utc_string()],
    )?;
    tx.commit().context("failed to commit units")?;

    Ok(records.len())
}

pub fn replace_professionals(
    connection: &mut Connection,
    records: &[ProfessionalRecord],
) -> Result<usize> {
    let tx = connection.transaction()?;
    tx.execute("DELETE FROM professionals", [])
        .context("failed to clear professionals")?;

    {
        let mut statement = tx.prepare(
            "INSERT INTO professionals(
               row_seq, unit_id, person_id, secondary_id, full_name, role_code, role_text
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;

        for (index, record) in records.iter().enumerate() {
            statement
                .execute(params![
                    index as i64 + 1,
                    record.unit_id,
                    record.person_id,
                    record.secondary_id,
                    record.full_name,
                    record.role_code,
                    record.role_text,
                ])
                .with_context(|| {
                    format!(
                        "failed to insert professional {} at unit {}",
                        record.person_id, record.unit_id
                    )
                })?;
        }
    }

    tx.commit().context("failed to commit professionals")?;

    Ok(records.len())
}

pub fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}

pub fn schema_version(connection: &Connection) -> Result<Option<String>> {
    let mut statement =
        connection.prepare("SELECT value FROM metadata WHERE key = 'db_schema_version'")?;
    let mut rows = statement.query([])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn final_unit(unit_id: &str, score: Option<f64>) -> FinalUnitRecord {
        FinalUnitRecord {
            unit_id: unit_id.to_string(),
            unit_name: format!("UNIDADE {unit_id}"),
            address: "RUA A, CAMPO GRANDE - MS".to_string(),
            listed_phone: String::new(),
            phone: "6733330000".to_string(),
            matched_directory_name: "Unidade".to_string(),
            match_score: score,
            detail_url: String::new(),
            professional_count: 3,
        }
    }

    fn professional(unit_id: &str, person_id: &str) -> ProfessionalRecord {
        ProfessionalRecord {
            unit_id: unit_id.to_string(),
            unit_name: String::new(),
            person_id: person_id.to_string(),
            secondary_id: "700".to_string(),
            full_name: "MARIA".to_string(),
            role_code: "225125".to_string(),
            role_text: "MEDICO CLINICO".to_string(),
        }
    }

    #[test]
    fn open_creates_schema_and_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        let connection = open(&dir.path().join("nested").join("roster.sqlite")).expect("open db");

        assert_eq!(
            schema_version(&connection).expect("query version").as_deref(),
            Some(DB_SCHEMA_VERSION)
        );
        assert_eq!(count_rows(&connection, "SELECT COUNT(*) FROM units").expect("count"), 0);
    }

    #[test]
    fn replace_tables_overwrites_previous_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("roster.sqlite");
        let mut connection = open(&db_path).expect("open db");

        replace_units(
            &mut connection,
            &[final_unit("1", Some(0.5)), final_unit("2", None)],
        )
        .expect("first write");
        replace_units(&mut connection, &[final_unit("3", None)]).expect("second write");
        replace_professionals(
            &mut connection,
            &[professional("3", "12345678901"), professional("3", "10987654321")],
        )
        .expect("professionals write");

        assert_eq!(count_rows(&connection, "SELECT COUNT(*) FROM units").expect("count"), 1);
        assert_eq!(
            count_rows(&connection, "SELECT COUNT(*) FROM professionals").expect("count"),
            2
        );

        let score: Option<f64> = connection
            .query_row("SELECT match_score FROM units WHERE unit_id = '3'", [], |row| {
                row.get(0)
            })
            .expect("score row");
        assert_eq!(score, None);
    }

    #[test]
    fn reopen_keeps_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("roster.sqlite");
        {
            let mut connection = open(&db_path).expect("open db");
            replace_units(&mut connection, &[final_unit("9", Some(1.2))]).expect("write");
        }

        let connection = open(&db_path).expect("reopen db");
        let score: f64 = connection
            .query_row("SELECT match_score FROM units", [], |row| row.get(0))
            .expect("score row");
        assert!((score - 1.2).abs() < 1e-9);
    }
}
