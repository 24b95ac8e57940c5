use crate::models::db_operations::{ong_db_operations, users_db_operations};
use crate::models::{Account, Admin, Ong, Role, ValidationStatus};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

/// Bearer tokens stay valid for 30 days, matching the mobile client's refresh cadence.
const TOKEN_VALIDITY_SECS: i64 = 30 * 24 * 60 * 60;

/// Result of a credential check against the unified account store.
#[derive(Debug)]
pub enum AuthOutcome {
    Admin(Admin),
    Ong(Ong),
    /// Valid credentials, but the NGO is still awaiting moderation.
    PendingApproval,
    /// Valid credentials, but the NGO was rejected.
    Rejected,
    /// The account exists but its profile row is gone.
    ProfileMissing,
    InvalidCredentials,
}

/// Checks credentials and resolves the caller's profile. Legacy plaintext
/// credentials are migrated to bcrypt on the first successful match; the
/// profile mirror column is kept in sync when that happens. NGOs that are not
/// validated never reach a logged-in outcome.
pub fn authenticate(
    conn: &Connection,
    email: &str,
    password: &str,
) -> Result<AuthOutcome, rusqlite::Error> {
    let account = match users_db_operations::read_account_by_email(conn, email) {
        Some(a) => a,
        None => return Ok(AuthOutcome::InvalidCredentials),
    };

    let was_plaintext = !users_db_operations::is_hashed(&account.password_hash);
    if !users_db_operations::verify_and_upgrade(conn, account.id, &account.password_hash, password)? {
        return Ok(AuthOutcome::InvalidCredentials);
    }
    if was_plaintext {
        sync_password_mirror(conn, &account)?;
    }

    match account.role {
        Role::Admin => Ok(match users_db_operations::read_admin_by_user_id(conn, account.id) {
            Some(admin) => AuthOutcome::Admin(admin),
            None => AuthOutcome::ProfileMissing,
        }),
        Role::Ong => {
            let ong = match ong_db_operations::read_ong_by_user_id(conn, account.id) {
                Some(o) => o,
                None => return Ok(AuthOutcome::ProfileMissing),
            };
            Ok(match ong.validation_status {
                ValidationStatus::Validated => AuthOutcome::Ong(ong),
                ValidationStatus::Pending => AuthOutcome::PendingApproval,
                ValidationStatus::Rejected => AuthOutcome::Rejected,
            })
        }
    }
}

fn sync_password_mirror(conn: &Connection, account: &Account) -> Result<(), rusqlite::Error> {
    let current = match users_db_operations::read_account_by_id(conn, account.id) {
        Some(a) => a.password_hash,
        None => return Ok(()),
    };
    match account.role {
        Role::Admin => {
            if let Some(admin) = users_db_operations::read_admin_by_user_id(conn, account.id) {
                users_db_operations::update_admin_password_mirror(conn, admin.id, &current)?;
            }
        }
        Role::Ong => {
            if let Some(ong) = ong_db_operations::read_ong_by_user_id(conn, account.id) {
                ong_db_operations::update_password_mirror(conn, ong.id, &current)?;
            }
        }
    }
    Ok(())
}

/// Destructive NGO actions require the caller to retype the account password.
/// The check runs through the same migrate-on-match routine as login.
pub fn verify_destructive_password(
    conn: &Connection,
    ong: &Ong,
    candidate: &str,
) -> Result<bool, rusqlite::Error> {
    if let Some(user_id) = ong.user_id {
        if let Some(account) = users_db_operations::read_account_by_id(conn, user_id) {
            let ok = users_db_operations::verify_and_upgrade(
                conn,
                account.id,
                &account.password_hash,
                candidate,
            )?;
            if ok {
                return Ok(true);
            }
        }
    }
    // Fall back to the legacy mirror for rows whose account link was severed.
    if let Some(mirror) = ong_db_operations::read_password_mirror(conn, ong.id) {
        if !mirror.is_empty() && !users_db_operations::is_hashed(&mirror) && mirror == candidate {
            return Ok(true);
        }
        if users_db_operations::is_hashed(&mirror) {
            return Ok(bcrypt::verify(candidate, &mirror).unwrap_or(false));
        }
    }
    Ok(false)
}

/// 8 random digits, the format the reset mail promises.
pub fn generate_temporary_password() -> String {
    let mut rng = rand::thread_rng();
    (0..8).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect()
}

/// Rotates the account password to a fresh temporary one, syncs the profile
/// mirror and flags the account for a forced change. Returns the plaintext
/// temporary password so the caller can mail it.
pub fn reset_account_password(conn: &Connection, account: &Account) -> Result<String, rusqlite::Error> {
    let temporary = generate_temporary_password();
    let hashed = users_db_operations::set_temporary_password(conn, account.id, &temporary)?;
    match account.role {
        Role::Admin => {
            if let Some(admin) = users_db_operations::read_admin_by_user_id(conn, account.id) {
                users_db_operations::update_admin_password_mirror(conn, admin.id, &hashed)?;
            }
        }
        Role::Ong => {
            if let Some(ong) = ong_db_operations::read_ong_by_user_id(conn, account.id) {
                ong_db_operations::update_password_mirror(conn, ong.id, &hashed)?;
            }
        }
    }
    Ok(temporary)
}

/// Stores a password the user chose and clears the must-change flag.
pub fn change_account_password(
    conn: &Connection,
    account: &Account,
    new_password: &str,
) -> Result<(), rusqlite::Error> {
    let hashed = users_db_operations::update_account_password(conn, account.id, new_password)?;
    match account.role {
        Role::Admin => {
            if let Some(admin) = users_db_operations::read_admin_by_user_id(conn, account.id) {
                users_db_operations::update_admin_password_mirror(conn, admin.id, &hashed)?;
            }
        }
        Role::Ong => {
            if let Some(ong) = ong_db_operations::read_ong_by_user_id(conn, account.id) {
                ong_db_operations::update_password_mirror(conn, ong.id, &hashed)?;
            }
        }
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub role: String,
    pub ong_id: Option<i64>,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_token(
    secret: &str,
    account_id: i64,
    role: Role,
    ong_id: Option<i64>,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: account_id,
        role: role.as_str().to_string(),
        ong_id,
        iat: now,
        exp: now + TOKEN_VALIDITY_SECS,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewOng;
    use crate::setup::db_setup;

    fn test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        db_setup::setup_database(&mut conn).unwrap();
        conn
    }

    fn register_ong(conn: &Connection, email: &str, password: &str) -> (i64, i64) {
        let user_id = users_db_operations::create_account(conn, email, password, Role::Ong).unwrap();
        let ong = NewOng {
            name: "Avenir".to_string(),
            address: "Néma".to_string(),
            phone: "55500000".to_string(),
            email: email.to_string(),
            domains: "Logement".to_string(),
            logo_url: None,
            verification_doc_url: None,
        };
        let ong_id = ong_db_operations::create_ong(conn, &ong, user_id).unwrap();
        (user_id, ong_id)
    }

    #[test]
    fn unknown_email_and_bad_password_fail() {
        let conn = test_conn();
        register_ong(&conn, "x@o.org", "pw");
        assert!(matches!(
            authenticate(&conn, "nobody@o.org", "pw").unwrap(),
            AuthOutcome::InvalidCredentials
        ));
        assert!(matches!(
            authenticate(&conn, "x@o.org", "wrong").unwrap(),
            AuthOutcome::InvalidCredentials
        ));
    }

    #[test]
    fn non_validated_ong_never_logs_in() {
        let conn = test_conn();
        let (_, ong_id) = register_ong(&conn, "p@o.org", "pw");
        assert!(matches!(
            authenticate(&conn, "p@o.org", "pw").unwrap(),
            AuthOutcome::PendingApproval
        ));

        ong_db_operations::update_validation_status(&conn, ong_id, ValidationStatus::Rejected).unwrap();
        assert!(matches!(
            authenticate(&conn, "p@o.org", "pw").unwrap(),
            AuthOutcome::Rejected
        ));

        ong_db_operations::update_validation_status(&conn, ong_id, ValidationStatus::Validated).unwrap();
        match authenticate(&conn, "p@o.org", "pw").unwrap() {
            AuthOutcome::Ong(ong) => assert_eq!(ong.id, ong_id),
            other => panic!("expected Ong outcome, got {:?}", other),
        }
    }

    #[test]
    fn legacy_login_migrates_and_syncs_mirror() {
        let conn = test_conn();
        let (user_id, ong_id) = register_ong(&conn, "l@o.org", "placeholder");
        ong_db_operations::update_validation_status(&conn, ong_id, ValidationStatus::Validated).unwrap();
        conn.execute(
            "UPDATE users SET password_hash = 'ancien' WHERE id = ?1",
            [user_id],
        )
        .unwrap();

        assert!(matches!(
            authenticate(&conn, "l@o.org", "ancien").unwrap(),
            AuthOutcome::Ong(_)
        ));

        let stored = users_db_operations::read_account_by_id(&conn, user_id).unwrap().password_hash;
        assert!(users_db_operations::is_hashed(&stored));
        let mirror = ong_db_operations::read_password_mirror(&conn, ong_id).unwrap();
        assert_eq!(mirror, stored);

        // Still logs in after migration, with the same password.
        assert!(matches!(
            authenticate(&conn, "l@o.org", "ancien").unwrap(),
            AuthOutcome::Ong(_)
        ));
    }

    #[test]
    fn admin_outcome_and_missing_profile() {
        let conn = test_conn();
        let user_id = users_db_operations::create_account(&conn, "a@o.org", "pw", Role::Admin).unwrap();
        assert!(matches!(
            authenticate(&conn, "a@o.org", "pw").unwrap(),
            AuthOutcome::ProfileMissing
        ));
        users_db_operations::create_admin(&conn, "Admin", "a@o.org", "", user_id).unwrap();
        assert!(matches!(
            authenticate(&conn, "a@o.org", "pw").unwrap(),
            AuthOutcome::Admin(_)
        ));
    }

    #[test]
    fn destructive_recheck_accepts_account_password_only() {
        let conn = test_conn();
        let (_, ong_id) = register_ong(&conn, "r@o.org", "secret");
        let ong = ong_db_operations::read_ong_by_id(&conn, ong_id).unwrap();
        assert!(verify_destructive_password(&conn, &ong, "secret").unwrap());
        assert!(!verify_destructive_password(&conn, &ong, "autre").unwrap());
    }

    #[test]
    fn reset_produces_eight_digits_and_forces_change() {
        let conn = test_conn();
        let (user_id, _) = register_ong(&conn, "f@o.org", "old");
        let account = users_db_operations::read_account_by_id(&conn, user_id).unwrap();
        let temp = reset_account_password(&conn, &account).unwrap();
        assert_eq!(temp.len(), 8);
        assert!(temp.chars().all(|c| c.is_ascii_digit()));

        let account = users_db_operations::read_account_by_id(&conn, user_id).unwrap();
        assert!(account.must_change_password);
        assert!(users_db_operations::verify_and_upgrade(&conn, account.id, &account.password_hash, &temp).unwrap());

        change_account_password(&conn, &account, "chosen").unwrap();
        let account = users_db_operations::read_account_by_id(&conn, user_id).unwrap();
        assert!(!account.must_change_password);
    }

    #[test]
    fn token_roundtrip_carries_role_and_profile() {
        let secret = "0123456789abcdef0123456789abcdef";
        let token = issue_token(secret, 42, Role::Ong, Some(7)).unwrap();
        let claims = decode_token(secret, &token).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, "ong");
        assert_eq!(claims.ong_id, Some(7));
        assert!(decode_token("wrong-secret-wrong-secret-wrong!", &token).is_err());
    }
}
