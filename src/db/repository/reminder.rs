use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::DoseSlot;
use crate::models::{Reminder, ReminderRecord};

fn insert_reminder(conn: &Connection, reminder: &Reminder) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO reminders (id, medicine_name, slot, scheduled_at, dosage, completed,
         completed_at, end_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            reminder.id().to_string(),
            reminder.medicine_name(),
            reminder.slot().as_str(),
            reminder.scheduled_at(),
            reminder.dosage(),
            reminder.is_completed(),
            reminder.completed_at(),
            reminder.end_date(),
        ],
    )?;
    Ok(())
}

/// Load every reminder. Rows that fail to parse are logged and skipped.
pub fn load_reminders(conn: &Connection) -> Result<Vec<Reminder>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, medicine_name, slot, scheduled_at, dosage, completed, completed_at, end_date
         FROM reminders ORDER BY scheduled_at, medicine_name",
    )?;

    let rows = stmt.query_map([], reminder_row_from_rusqlite)?;

    let mut reminders = Vec::new();
    for row in rows {
        let row = match row {
            Ok(row) => row,
            Err(e @ rusqlite::Error::FromSqlConversionFailure(..))
            | Err(e @ rusqlite::Error::InvalidColumnType(..)) => {
                tracing::warn!(error = %e, "Skipping unreadable reminder row");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let id = row.id.clone();
        match reminder_from_row(row) {
            Ok(r) => reminders.push(r),
            Err(e) => tracing::warn!(id = %id, error = %e, "Skipping malformed reminder row"),
        }
    }
    Ok(reminders)
}

/// Replace the stored collection with `reminders` in one transaction.
pub fn replace_all_reminders(
    conn: &mut Connection,
    reminders: &[Reminder],
) -> Result<(), DatabaseError> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM reminders", [])?;
    for reminder in reminders {
        insert_reminder(&tx, reminder)?;
    }
    tx.commit()?;
    Ok(())
}

// Internal row type for Reminder mapping
struct ReminderRow {
    id: String,
    medicine_name: String,
    slot: String,
    scheduled_at: NaiveDateTime,
    dosage: Option<String>,
    completed: bool,
    completed_at: Option<NaiveDateTime>,
    end_date: NaiveDate,
}

fn reminder_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<ReminderRow, rusqlite::Error> {
    Ok(ReminderRow {
        id: row.get(0)?,
        medicine_name: row.get(1)?,
        slot: row.get(2)?,
        scheduled_at: row.get(3)?,
        dosage: row.get(4)?,
        completed: row.get(5)?,
        completed_at: row.get(6)?,
        end_date: row.get(7)?,
    })
}

fn reminder_from_row(row: ReminderRow) -> Result<Reminder, DatabaseError> {
    let record = ReminderRecord {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(format!("id '{}': {e}", row.id)))?,
        medicine_name: row.medicine_name,
        slot: DoseSlot::from_str(&row.slot)?,
        scheduled_at: row.scheduled_at,
        dosage: row.dosage,
        completed: row.completed,
        completed_at: row.completed_at,
        end_date: row.end_date,
    };
    Reminder::try_from(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use chrono::NaiveTime;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(h, 0, 0).unwrap())
    }

    fn reminder(medicine: &str, d: u32) -> Reminder {
        Reminder::new(
            medicine,
            DoseSlot::Morning,
            at(d, 8),
            Some("10mg".into()),
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
        )
    }

    #[test]
    fn insert_and_load() {
        let conn = open_memory_database().unwrap();
        let r = reminder("Lisinopril", 1);
        insert_reminder(&conn, &r).unwrap();
        assert_eq!(load_reminders(&conn).unwrap(), vec![r]);
    }

    #[test]
    fn completion_time_keeps_subsecond_precision() {
        let mut conn = open_memory_database().unwrap();
        let mut r = reminder("Lisinopril", 1);
        let taken = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_milli_opt(8, 3, 0, 250)
            .unwrap();
        r.mark_completed(taken);
        replace_all_reminders(&mut conn, std::slice::from_ref(&r)).unwrap();

        let loaded = load_reminders(&conn).unwrap();
        assert_eq!(loaded, vec![r]);
        assert_eq!(loaded[0].completed_at(), Some(taken));
    }

    #[test]
    fn load_skips_malformed_rows() {
        let conn = open_memory_database().unwrap();
        insert_reminder(&conn, &reminder("Lisinopril", 1)).unwrap();
        conn.execute(
            "INSERT INTO reminders (id, medicine_name, slot, scheduled_at, completed, end_date)
             VALUES (?1, 'Broken', 'morning', 'not-a-date', 0, '2024-01-10')",
            params![Uuid::new_v4().to_string()],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO reminders (id, medicine_name, slot, scheduled_at, completed, end_date)
             VALUES (?1, 'Broken', 'midnight', '2024-01-01 08:00:00', 0, '2024-01-10')",
            params![Uuid::new_v4().to_string()],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO reminders (id, medicine_name, slot, scheduled_at, completed, end_date)
             VALUES (?1, 'Broken', 'morning', '2024-01-01 08:00:00', 1, '2024-01-10')",
            params![Uuid::new_v4().to_string()],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO reminders (id, medicine_name, slot, scheduled_at, completed, end_date)
             VALUES ('not-a-uuid', 'Broken', 'morning', '2024-01-01 08:00:00', 0, '2024-01-10')",
            [],
        )
        .unwrap();

        let loaded = load_reminders(&conn).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].medicine_name(), "Lisinopril");
    }

    #[test]
    fn replace_all_swaps_collection() {
        let mut conn = open_memory_database().unwrap();
        insert_reminder(&conn, &reminder("Lisinopril", 1)).unwrap();
        replace_all_reminders(&mut conn, &[reminder("Metformin", 2), reminder("Metformin", 3)])
            .unwrap();

        let loaded = load_reminders(&conn).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.iter().all(|r| r.medicine_name() == "Metformin"));
    }
}
