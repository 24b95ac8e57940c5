use crate::models::NotificationMessage;
use rusqlite::{params, Connection, Error as RusqliteError};

fn row_to_notification(row: &rusqlite::Row) -> rusqlite::Result<NotificationMessage> {
    Ok(NotificationMessage {
        id: row.get(0)?,
        case_id: row.get(1)?,
        message_fr: row.get(2)?,
        message_ar: row.get(3)?,
        created_at: row.get(4)?,
        is_read: row.get(5)?,
    })
}

/// Inserts the bilingual publication notice for a freshly approved case.
pub fn insert_case_approval(
    conn: &Connection,
    case_id: i64,
    case_title: &str,
) -> Result<i64, RusqliteError> {
    let message_fr = format!("Le cas social « {} » a été approuvé et publié.", case_title);
    let message_ar = format!("تمت الموافقة على الحالة الاجتماعية « {} » ونشرها.", case_title);
    conn.execute(
        "INSERT INTO notifications (case_id, message_fr, message_ar) VALUES (?1, ?2, ?3)",
        params![case_id, message_fr, message_ar],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_latest(conn: &Connection, limit: i64) -> Result<Vec<NotificationMessage>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT id, case_id, message_fr, message_ar, created_at, is_read
         FROM notifications ORDER BY id DESC LIMIT ?1",
    )?;
    let iter = stmt.query_map([limit], row_to_notification)?;
    Ok(iter.filter_map(|n| n.ok()).collect())
}

pub fn mark_read(conn: &Connection, id: i64) -> Result<usize, RusqliteError> {
    conn.execute("UPDATE notifications SET is_read = 1 WHERE id = ?1", [id])
}

pub fn count_for_case(conn: &Connection, case_id: i64) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE case_id = ?1",
        [case_id],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

pub fn delete_for_case(conn: &Connection, case_id: i64) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM notifications WHERE case_id = ?1", [case_id])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::db_setup;

    fn test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        db_setup::setup_database(&mut conn).unwrap();
        conn
    }

    #[test]
    fn approval_notice_carries_both_languages() {
        let conn = test_conn();
        insert_case_approval(&conn, 7, "Puits asséché").unwrap();
        let latest = read_latest(&conn, 10).unwrap();
        assert_eq!(latest.len(), 1);
        assert!(latest[0].message_fr.contains("Puits asséché"));
        assert!(latest[0].message_ar.contains("Puits asséché"));
        assert!(!latest[0].is_read);
        assert_eq!(latest[0].case_id, Some(7));
    }

    #[test]
    fn latest_is_newest_first_and_bounded() {
        let conn = test_conn();
        for i in 0..5 {
            insert_case_approval(&conn, i, &format!("Cas {}", i)).unwrap();
        }
        let latest = read_latest(&conn, 3).unwrap();
        assert_eq!(latest.len(), 3);
        assert_eq!(latest[0].case_id, Some(4));

        mark_read(&conn, latest[0].id).unwrap();
        let again = read_latest(&conn, 1).unwrap();
        assert!(again[0].is_read);
    }
}
