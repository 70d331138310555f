use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::CleanedCourse;

pub fn load_cleaned_courses(conn: &Connection) -> Result<Vec<CleanedCourse>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT medicine_name, cleaned_through FROM cleaned_courses ORDER BY medicine_name",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(CleanedCourse { medicine_name: row.get(0)?, cleaned_through: row.get(1)? })
    })?;

    let mut courses = Vec::new();
    for row in rows {
        courses.push(row?);
    }
    Ok(courses)
}

pub fn replace_cleaned_courses(
    conn: &mut Connection,
    courses: &[CleanedCourse],
) -> Result<(), DatabaseError> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM cleaned_courses", [])?;
    for course in courses {
        tx.execute(
            "INSERT INTO cleaned_courses (medicine_name, cleaned_through) VALUES (?1, ?2)",
            params![course.medicine_name, course.cleaned_through],
        )?;
    }
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use chrono::NaiveDate;

    #[test]
    fn replace_and_load() {
        let mut conn = open_memory_database().unwrap();
        let through = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap();
        let first = CleanedCourse { medicine_name: "Amoxicillin".into(), cleaned_through: through };
        replace_cleaned_courses(&mut conn, std::slice::from_ref(&first)).unwrap();

        let second = CleanedCourse { medicine_name: "Paracetamol".into(), cleaned_through: through };
        replace_cleaned_courses(&mut conn, &[first.clone(), second.clone()]).unwrap();
        assert_eq!(load_cleaned_courses(&conn).unwrap(), vec![first, second]);
    }
}
