use crate::models::{CountByLabel, NewOng, Ong, ValidationStatus};
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension};

const ONG_COLUMNS: &str = "id, name, address, phone, email, domains, validation_status, \
                           logo_url, verification_doc_url, updated_at, user_id";

fn row_to_ong(row: &rusqlite::Row) -> rusqlite::Result<Ong> {
    let status_str: String = row.get(6)?;
    Ok(Ong {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        domains: row.get(5)?,
        validation_status: ValidationStatus::parse(&status_str).unwrap_or(ValidationStatus::Pending),
        logo_url: row.get(7)?,
        verification_doc_url: row.get(8)?,
        updated_at: row.get(9)?,
        user_id: row.get(10)?,
    })
}

pub fn create_ong(conn: &Connection, ong: &NewOng, user_id: i64) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO ongs (name, address, phone, email, domains, logo_url, verification_doc_url, user_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            ong.name,
            ong.address,
            ong.phone,
            ong.email,
            ong.domains,
            ong.logo_url,
            ong.verification_doc_url,
            user_id
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_ong_by_id(conn: &Connection, id: i64) -> Option<Ong> {
    conn.query_row(
        &format!("SELECT {} FROM ongs WHERE id = ?1", ONG_COLUMNS),
        [id],
        row_to_ong,
    )
    .optional()
    .unwrap_or(None)
}

pub fn read_ong_by_user_id(conn: &Connection, user_id: i64) -> Option<Ong> {
    conn.query_row(
        &format!("SELECT {} FROM ongs WHERE user_id = ?1", ONG_COLUMNS),
        [user_id],
        row_to_ong,
    )
    .optional()
    .unwrap_or(None)
}

pub fn read_all_ongs(conn: &Connection) -> Result<Vec<Ong>, RusqliteError> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM ongs ORDER BY name", ONG_COLUMNS))?;
    let iter = stmt.query_map([], row_to_ong)?;
    Ok(iter.filter_map(|o| o.ok()).collect())
}

pub fn read_ongs_by_status(
    conn: &Connection,
    status: ValidationStatus,
) -> Result<Vec<Ong>, RusqliteError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM ongs WHERE validation_status = ?1 ORDER BY name",
        ONG_COLUMNS
    ))?;
    let iter = stmt.query_map([status.as_str()], row_to_ong)?;
    Ok(iter.filter_map(|o| o.ok()).collect())
}

pub fn update_ong(
    conn: &Connection,
    id: i64,
    name: &str,
    address: &str,
    phone: &str,
    email: &str,
    domains: &str,
) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE ongs SET name = ?1, address = ?2, phone = ?3, email = ?4, domains = ?5,
                         updated_at = CURRENT_TIMESTAMP
         WHERE id = ?6",
        params![name, address, phone, email, domains, id],
    )
}

/// Moves an NGO to the given moderation state. Returns the number of rows that
/// actually changed, so setting an already-held state reports 0.
pub fn update_validation_status(
    conn: &Connection,
    id: i64,
    status: ValidationStatus,
) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE ongs SET validation_status = ?1, updated_at = CURRENT_TIMESTAMP
         WHERE id = ?2 AND validation_status <> ?1",
        params![status.as_str(), id],
    )
}

pub fn update_logo(conn: &Connection, id: i64, logo_url: &str) -> Result<usize, RusqliteError> {
    conn.execute("UPDATE ongs SET logo_url = ?1 WHERE id = ?2", params![logo_url, id])
}

pub fn update_verification_doc(
    conn: &Connection,
    id: i64,
    doc_url: &str,
) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE ongs SET verification_doc_url = ?1 WHERE id = ?2",
        params![doc_url, id],
    )
}

/// The legacy credential column shadows `users.password_hash` for older tooling.
pub fn update_password_mirror(
    conn: &Connection,
    id: i64,
    password_mirror: &str,
) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE ongs SET password = ?1 WHERE id = ?2",
        params![password_mirror, id],
    )
}

pub fn read_password_mirror(conn: &Connection, id: i64) -> Option<String> {
    conn.query_row("SELECT password FROM ongs WHERE id = ?1", [id], |row| row.get(0))
        .optional()
        .unwrap_or(None)
}

pub fn delete_ong_row(conn: &Connection, id: i64) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM ongs WHERE id = ?1", [id])
}

pub fn count_ongs(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM ongs", [], |row| row.get(0))
        .unwrap_or(0)
}

pub fn count_ongs_by_status(conn: &Connection, status: ValidationStatus) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM ongs WHERE validation_status = ?1",
        [status.as_str()],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

pub fn count_ongs_by_domain(conn: &Connection) -> Result<Vec<CountByLabel>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT domains, COUNT(*) FROM ongs GROUP BY domains ORDER BY COUNT(*) DESC",
    )?;
    let iter = stmt.query_map([], |row| {
        Ok(CountByLabel { label: row.get(0)?, count: row.get(1)? })
    })?;
    Ok(iter.filter_map(|c| c.ok()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::models::db_operations::users_db_operations;
    use crate::setup::db_setup;

    fn test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        db_setup::setup_database(&mut conn).unwrap();
        conn
    }

    fn sample_ong(email: &str) -> NewOng {
        NewOng {
            name: "Espoir".to_string(),
            address: "Nouakchott".to_string(),
            phone: "22200000".to_string(),
            email: email.to_string(),
            domains: "Santé".to_string(),
            logo_url: Some("/static/uploads/logos/logo_espoir.png".to_string()),
            verification_doc_url: None,
        }
    }

    #[test]
    fn new_ong_starts_pending() {
        let conn = test_conn();
        let user_id = users_db_operations::create_account(&conn, "e@o.org", "pw", Role::Ong).unwrap();
        let id = create_ong(&conn, &sample_ong("e@o.org"), user_id).unwrap();
        let ong = read_ong_by_id(&conn, id).unwrap();
        assert_eq!(ong.validation_status, ValidationStatus::Pending);
        assert_eq!(ong.user_id, Some(user_id));
    }

    #[test]
    fn validation_transition_reports_actual_change() {
        let conn = test_conn();
        let user_id = users_db_operations::create_account(&conn, "v@o.org", "pw", Role::Ong).unwrap();
        let id = create_ong(&conn, &sample_ong("v@o.org"), user_id).unwrap();

        assert_eq!(update_validation_status(&conn, id, ValidationStatus::Validated).unwrap(), 1);
        // Re-validating an already validated NGO changes nothing.
        assert_eq!(update_validation_status(&conn, id, ValidationStatus::Validated).unwrap(), 0);
        assert_eq!(
            read_ong_by_id(&conn, id).unwrap().validation_status,
            ValidationStatus::Validated
        );
    }

    #[test]
    fn status_counters() {
        let conn = test_conn();
        for (i, status) in [
            ValidationStatus::Pending,
            ValidationStatus::Validated,
            ValidationStatus::Validated,
        ]
        .iter()
        .enumerate()
        {
            let email = format!("c{}@o.org", i);
            let user_id = users_db_operations::create_account(&conn, &email, "pw", Role::Ong).unwrap();
            let id = create_ong(&conn, &sample_ong(&email), user_id).unwrap();
            update_validation_status(&conn, id, *status).unwrap();
        }
        assert_eq!(count_ongs(&conn), 3);
        assert_eq!(count_ongs_by_status(&conn, ValidationStatus::Validated), 2);
        assert_eq!(count_ongs_by_status(&conn, ValidationStatus::Pending), 1);
        assert_eq!(read_ongs_by_status(&conn, ValidationStatus::Pending).unwrap().len(), 1);
    }
}
