use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::Prescription;

/// Replace the stored prescription snapshot.
pub fn save_prescription_snapshot(
    conn: &mut Connection,
    prescriptions: &[Prescription],
) -> Result<(), DatabaseError> {
    let fetched_at = chrono::Local::now().naive_local();
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM prescription_snapshot", [])?;
    for p in prescriptions {
        let payload = serde_json::to_string(p)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;
        tx.execute(
            "INSERT OR REPLACE INTO prescription_snapshot (id, payload, fetched_at)
             VALUES (?1, ?2, ?3)",
            params![p.id.to_string(), payload, fetched_at],
        )?;
    }
    tx.commit()?;
    Ok(())
}

/// Load the last stored snapshot. Undecodable rows are logged and skipped.
pub fn load_prescription_snapshot(conn: &Connection) -> Result<Vec<Prescription>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, payload FROM prescription_snapshot ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut prescriptions = Vec::new();
    for row in rows {
        let (id, payload) = row?;
        match serde_json::from_str::<Prescription>(&payload) {
            Ok(p) => prescriptions.push(p),
            Err(e) => tracing::warn!(id = %id, error = %e, "Skipping malformed prescription snapshot"),
        }
    }
    Ok(prescriptions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::SlotTimes;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn prescription(name: &str) -> Prescription {
        Prescription {
            id: Uuid::new_v4(),
            medicine_name: name.into(),
            dosage: None,
            frequency: "once".into(),
            duration_days: 3,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
            times: SlotTimes::default(),
        }
    }

    #[test]
    fn snapshot_replaces_previous() {
        let mut conn = open_memory_database().unwrap();
        save_prescription_snapshot(&mut conn, &[prescription("A"), prescription("B")]).unwrap();
        let c = prescription("C");
        save_prescription_snapshot(&mut conn, std::slice::from_ref(&c)).unwrap();
        assert_eq!(load_prescription_snapshot(&conn).unwrap(), vec![c]);
    }

    #[test]
    fn snapshot_skips_garbage_payload() {
        let conn = open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO prescription_snapshot (id, payload, fetched_at) VALUES ('x', '{', 'now')",
            [],
        )
        .unwrap();
        assert!(load_prescription_snapshot(&conn).unwrap().is_empty());
    }
}
