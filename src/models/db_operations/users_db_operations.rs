use crate::models::{Account, Admin, Role};
use bcrypt::{hash, verify, BcryptError};
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension};

pub fn bcrypt_to_rusqlite_error(e: BcryptError) -> RusqliteError {
    RusqliteError::ToSqlConversionFailure(Box::new(e))
}

/// A stored credential is in recognized hashed form iff it carries the bcrypt prefix.
pub fn is_hashed(stored: &str) -> bool {
    stored.starts_with("$2")
}

fn row_to_account(row: &rusqlite::Row) -> rusqlite::Result<Account> {
    let role_str: String = row.get(3)?;
    Ok(Account {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        role: Role::parse(&role_str).unwrap_or(Role::Ong),
        must_change_password: row.get(4)?,
        created_at: row.get(5)?,
    })
}

const ACCOUNT_COLUMNS: &str =
    "id, email, password_hash, role, must_change_password, created_at";

pub fn create_account(
    conn: &Connection,
    email: &str,
    password: &str,
    role: Role,
) -> Result<i64, RusqliteError> {
    let hashed = hash(password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "INSERT INTO users (email, password_hash, role) VALUES (?1, ?2, ?3)",
        params![email, hashed, role.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_account_by_email(conn: &Connection, email: &str) -> Option<Account> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE email = ?1", ACCOUNT_COLUMNS),
        [email],
        row_to_account,
    )
    .optional()
    .unwrap_or(None)
}

pub fn read_account_by_id(conn: &Connection, id: i64) -> Option<Account> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", ACCOUNT_COLUMNS),
        [id],
        row_to_account,
    )
    .optional()
    .unwrap_or(None)
}

pub fn email_exists(conn: &Connection, email: &str) -> bool {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        [email],
        |row| row.get(0),
    )
    .unwrap_or(false)
}

pub fn update_account_email(conn: &Connection, id: i64, email: &str) -> Result<usize, RusqliteError> {
    conn.execute("UPDATE users SET email = ?1 WHERE id = ?2", params![email, id])
}

/// Hashes and stores a password the account holder chose. Clears the must-change flag.
pub fn update_account_password(conn: &Connection, id: i64, password: &str) -> Result<String, RusqliteError> {
    let hashed = hash(password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "UPDATE users SET password_hash = ?1, must_change_password = 0 WHERE id = ?2",
        params![hashed, id],
    )?;
    Ok(hashed)
}

/// Hashes and stores a generated password and flags the account for a forced change.
pub fn set_temporary_password(conn: &Connection, id: i64, password: &str) -> Result<String, RusqliteError> {
    let hashed = hash(password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "UPDATE users SET password_hash = ?1, must_change_password = 1 WHERE id = ?2",
        params![hashed, id],
    )?;
    Ok(hashed)
}

pub fn delete_account(conn: &Connection, id: i64) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM users WHERE id = ?1", [id])
}

/// Verifies a candidate against a stored credential that may still be legacy
/// plaintext. On a plaintext match the stored value is upgraded to a bcrypt
/// hash in place. Plaintext never survives a successful login.
pub fn verify_and_upgrade(
    conn: &Connection,
    account_id: i64,
    stored: &str,
    candidate: &str,
) -> Result<bool, RusqliteError> {
    if is_hashed(stored) {
        return Ok(verify(candidate, stored).unwrap_or(false));
    }
    if stored != candidate {
        return Ok(false);
    }
    let hashed = hash(candidate, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![hashed, account_id],
    )?;
    log::info!("Upgraded legacy plaintext credential for account {}.", account_id);
    Ok(true)
}

// --- Admin profiles ---

fn row_to_admin(row: &rusqlite::Row) -> rusqlite::Result<Admin> {
    Ok(Admin {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        user_id: row.get(3)?,
    })
}

pub fn create_admin(
    conn: &Connection,
    name: &str,
    email: &str,
    password_mirror: &str,
    user_id: i64,
) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO admins (name, email, password, user_id) VALUES (?1, ?2, ?3, ?4)",
        params![name, email, password_mirror, user_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_admin_by_user_id(conn: &Connection, user_id: i64) -> Option<Admin> {
    conn.query_row(
        "SELECT id, name, email, user_id FROM admins WHERE user_id = ?1",
        [user_id],
        row_to_admin,
    )
    .optional()
    .unwrap_or(None)
}

pub fn read_admin_by_id(conn: &Connection, id: i64) -> Option<Admin> {
    conn.query_row(
        "SELECT id, name, email, user_id FROM admins WHERE id = ?1",
        [id],
        row_to_admin,
    )
    .optional()
    .unwrap_or(None)
}

pub fn read_all_admins(conn: &Connection) -> Result<Vec<Admin>, RusqliteError> {
    let mut stmt = conn.prepare("SELECT id, name, email, user_id FROM admins ORDER BY id")?;
    let iter = stmt.query_map([], row_to_admin)?;
    Ok(iter.filter_map(|a| a.ok()).collect())
}

pub fn count_admins(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM admins", [], |row| row.get(0))
        .unwrap_or(0)
}

pub fn update_admin(
    conn: &Connection,
    id: i64,
    name: &str,
    email: &str,
) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE admins SET name = ?1, email = ?2 WHERE id = ?3",
        params![name, email, id],
    )
}

pub fn update_admin_password_mirror(
    conn: &Connection,
    id: i64,
    password_mirror: &str,
) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE admins SET password = ?1 WHERE id = ?2",
        params![password_mirror, id],
    )
}

pub fn delete_admin(conn: &Connection, id: i64) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM admins WHERE id = ?1", [id])
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
    fn create_and_read_account() {
        let conn = test_conn();
        let id = create_account(&conn, "ong@example.org", "secret", Role::Ong).unwrap();
        let account = read_account_by_email(&conn, "ong@example.org").unwrap();
        assert_eq!(account.id, id);
        assert_eq!(account.role, Role::Ong);
        assert!(is_hashed(&account.password_hash));
        assert!(!account.must_change_password);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let conn = test_conn();
        create_account(&conn, "dup@example.org", "a", Role::Ong).unwrap();
        assert!(create_account(&conn, "dup@example.org", "b", Role::Ong).is_err());
        assert!(email_exists(&conn, "dup@example.org"));
        assert!(!email_exists(&conn, "other@example.org"));
    }

    #[test]
    fn plaintext_credential_is_upgraded_once() {
        let conn = test_conn();
        let id = create_account(&conn, "legacy@example.org", "x", Role::Ong).unwrap();
        conn.execute(
            "UPDATE users SET password_hash = 'motdepasse' WHERE id = ?1",
            [id],
        )
        .unwrap();

        let stored = read_account_by_id(&conn, id).unwrap().password_hash;
        assert!(!is_hashed(&stored));
        assert!(!verify_and_upgrade(&conn, id, &stored, "wrong").unwrap());
        // A failed attempt must not migrate anything.
        assert!(!is_hashed(&read_account_by_id(&conn, id).unwrap().password_hash));

        assert!(verify_and_upgrade(&conn, id, &stored, "motdepasse").unwrap());
        let upgraded = read_account_by_id(&conn, id).unwrap().password_hash;
        assert!(is_hashed(&upgraded));

        // Migration is one-way: subsequent logins verify against the hash.
        assert!(verify_and_upgrade(&conn, id, &upgraded, "motdepasse").unwrap());
        assert!(!verify_and_upgrade(&conn, id, &upgraded, "motdepasse2").unwrap());
    }

    #[test]
    fn temporary_password_sets_must_change_flag() {
        let conn = test_conn();
        let id = create_account(&conn, "reset@example.org", "old", Role::Ong).unwrap();
        set_temporary_password(&conn, id, "12345678").unwrap();
        let account = read_account_by_id(&conn, id).unwrap();
        assert!(account.must_change_password);
        assert!(verify_and_upgrade(&conn, id, &account.password_hash, "12345678").unwrap());

        update_account_password(&conn, id, "chosen-one").unwrap();
        let account = read_account_by_id(&conn, id).unwrap();
        assert!(!account.must_change_password);
    }

    #[test]
    fn delete_account_is_idempotent() {
        let conn = test_conn();
        let id = create_account(&conn, "gone@example.org", "x", Role::Admin).unwrap();
        assert_eq!(delete_account(&conn, id).unwrap(), 1);
        assert_eq!(delete_account(&conn, id).unwrap(), 0);
    }
}
