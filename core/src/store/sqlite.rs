//! SQLite-backed record store.

use super::{RecordStore, RecordUpdate, UserRecord};
use crate::error::{PersistenceError, PersistenceResult, SimResult};
use rusqlite::{params, Connection, OptionalExtension};

pub struct SimStore {
    conn: Connection,
}

impl SimStore {
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_user_record.sql"))?;
        Ok(())
    }

    pub fn record_count(&self) -> SimResult<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM user_record", [], |row| row.get(0))?;
        Ok(n)
    }
}

fn to_sql_int(field: &str, value: u64) -> PersistenceResult<i64> {
    i64::try_from(value)
        .map_err(|_| PersistenceError::Rejected(format!("{field} {value} out of range")))
}

fn from_sql_int<T: TryFrom<i64>>(field: &str, value: i64) -> PersistenceResult<T> {
    T::try_from(value)
        .map_err(|_| PersistenceError::Rejected(format!("stored {field} {value} out of range")))
}

impl RecordStore for SimStore {
    fn get_user_record(&mut self, identity: &str) -> PersistenceResult<Option<UserRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT username, first_name, balance, energy, max_energy, inventory_json, plots_json
                 FROM user_record WHERE identity = ?1",
                params![identity],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((username, first_name, balance, energy, max_energy, inventory_json, plots_json)) =
            row
        else {
            return Ok(None);
        };

        let plots = match plots_json {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        };

        Ok(Some(UserRecord {
            identity: identity.to_string(),
            username,
            first_name,
            balance: from_sql_int("balance", balance)?,
            energy: from_sql_int("energy", energy)?,
            max_energy: from_sql_int("max_energy", max_energy)?,
            inventory: serde_json::from_str(&inventory_json)?,
            plots,
        }))
    }

    fn create_user_record(&mut self, record: &UserRecord) -> PersistenceResult<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let plots_json = match &record.plots {
            Some(plots) => Some(serde_json::to_string(plots)?),
            None => None,
        };
        self.conn.execute(
            "INSERT INTO user_record (
                identity, username, first_name, balance, energy, max_energy,
                inventory_json, plots_json, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                record.identity,
                record.username,
                record.first_name,
                to_sql_int("balance", record.balance)?,
                i64::from(record.energy),
                i64::from(record.max_energy),
                serde_json::to_string(&record.inventory)?,
                plots_json,
                now,
            ],
        )?;
        Ok(())
    }

    fn update_user_record(&mut self, identity: &str, update: &RecordUpdate) -> PersistenceResult<()> {
        let changed = self.conn.execute(
            "UPDATE user_record
             SET balance = ?1, energy = ?2, inventory_json = ?3, plots_json = ?4, updated_at = ?5
             WHERE identity = ?6",
            params![
                to_sql_int("balance", update.balance)?,
                i64::from(update.energy),
                serde_json::to_string(&update.inventory)?,
                serde_json::to_string(&update.plots)?,
                chrono::Utc::now().to_rfc3339(),
                identity,
            ],
        )?;
        if changed == 0 {
            return Err(PersistenceError::Rejected(format!(
                "no record for identity '{identity}'"
            )));
        }
        Ok(())
    }
}
