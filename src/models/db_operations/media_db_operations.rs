use crate::models::MediaItem;
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension};

fn row_to_media(row: &rusqlite::Row) -> rusqlite::Result<MediaItem> {
    Ok(MediaItem {
        id: row.get(0)?,
        case_id: row.get(1)?,
        file_url: row.get(2)?,
        description: row.get(3)?,
    })
}

pub fn add_media(
    conn: &Connection,
    case_id: i64,
    file_url: &str,
    description: Option<&str>,
) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO media (case_id, file_url, description) VALUES (?1, ?2, ?3)",
        params![case_id, file_url, description],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_media_by_id(conn: &Connection, id: i64) -> Option<MediaItem> {
    conn.query_row(
        "SELECT id, case_id, file_url, description FROM media WHERE id = ?1",
        [id],
        row_to_media,
    )
    .optional()
    .unwrap_or(None)
}

pub fn read_media_for_case(conn: &Connection, case_id: i64) -> Result<Vec<MediaItem>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT id, case_id, file_url, description FROM media WHERE case_id = ?1 ORDER BY id",
    )?;
    let iter = stmt.query_map([case_id], row_to_media)?;
    Ok(iter.filter_map(|m| m.ok()).collect())
}

/// File URLs of every media row belonging to any case of the given NGO.
pub fn read_media_urls_for_ong(conn: &Connection, ong_id: i64) -> Result<Vec<String>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT m.file_url FROM media m JOIN cases c ON c.id = m.case_id WHERE c.ong_id = ?1",
    )?;
    let iter = stmt.query_map([ong_id], |row| row.get(0))?;
    Ok(iter.filter_map(|u| u.ok()).collect())
}

pub fn delete_media_row(conn: &Connection, id: i64) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM media WHERE id = ?1", [id])
}

pub fn delete_media_for_case(conn: &Connection, case_id: i64) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM media WHERE case_id = ?1", [case_id])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::{case_db_operations, ong_db_operations, users_db_operations};
    use crate::models::{CaseStatus, NewCase, NewOng, Role};
    use crate::setup::db_setup;

    fn test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        db_setup::setup_database(&mut conn).unwrap();
        conn
    }

    fn make_ong(conn: &Connection) -> i64 {
        let user_id = users_db_operations::create_account(conn, "m@o.org", "pw", Role::Ong).unwrap();
        let ong = NewOng {
            name: "Secours".to_string(),
            address: "Zouérat".to_string(),
            phone: "44400000".to_string(),
            email: "m@o.org".to_string(),
            domains: "Urgence".to_string(),
            logo_url: None,
            verification_doc_url: None,
        };
        ong_db_operations::create_ong(conn, &ong, user_id).unwrap()
    }

    fn make_case(conn: &Connection, ong_id: i64, title: &str) -> i64 {
        case_db_operations::create_case(
            conn,
            &NewCase {
                title: title.to_string(),
                description: "desc".to_string(),
                address: None,
                wilaya: None,
                moughataa: None,
                published_on: None,
                status: CaseStatus::Ongoing,
                latitude: None,
                longitude: None,
                ong_id,
                category_id: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn attach_and_detach_rows() {
        let conn = test_conn();
        let ong_id = make_ong(&conn);
        let case_id = make_case(&conn, ong_id, "Cas média");
        let m1 = add_media(&conn, case_id, "/static/uploads/media/20240501120000_a.jpg", None).unwrap();
        add_media(&conn, case_id, "/static/uploads/media/20240501120001_b.jpg", Some("photo")).unwrap();

        assert_eq!(read_media_for_case(&conn, case_id).unwrap().len(), 2);
        assert_eq!(delete_media_row(&conn, m1).unwrap(), 1);
        // Deleting a row that is already gone is a no-op, not an error.
        assert_eq!(delete_media_row(&conn, m1).unwrap(), 0);
        assert_eq!(read_media_for_case(&conn, case_id).unwrap().len(), 1);
        assert_eq!(delete_media_for_case(&conn, case_id).unwrap(), 1);
    }

    #[test]
    fn ong_wide_urls_span_every_case() {
        let conn = test_conn();
        let ong_id = make_ong(&conn);
        let case_a = make_case(&conn, ong_id, "Cas A");
        let case_b = make_case(&conn, ong_id, "Cas B");
        add_media(&conn, case_a, "/static/uploads/media/20240501120000_a.jpg", None).unwrap();
        add_media(&conn, case_b, "/static/uploads/media/20240501120001_b.jpg", None).unwrap();

        let urls = read_media_urls_for_ong(&conn, ong_id).unwrap();
        assert_eq!(urls.len(), 2);
        assert!(urls.iter().any(|u| u.ends_with("_a.jpg")));
        assert!(urls.iter().any(|u| u.ends_with("_b.jpg")));
        assert!(read_media_urls_for_ong(&conn, ong_id + 1).unwrap().is_empty());
    }
}
