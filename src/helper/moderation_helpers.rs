use crate::helper::media_helpers;
use crate::models::db_operations::{
    case_db_operations, media_db_operations, notification_db_operations, ong_db_operations,
    users_db_operations,
};
use crate::models::{PurgeManifest, ValidationStatus};
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModerationError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

/// Attempts to remove one referenced upload. Missing files are logged and do
/// not count as failures; the database rows are the source of truth.
fn remove_file_best_effort(uploads_root: &Path, file_url: &str, manifest: &mut PurgeManifest) {
    let path = match media_helpers::resolve_upload_path(uploads_root, file_url) {
        Some(p) => p,
        None => {
            log::warn!("Skipping unresolvable file URL '{}' during purge.", file_url);
            return;
        }
    };
    manifest.files_attempted += 1;
    if !path.exists() {
        log::warn!("File '{}' was already missing during purge.", path.display());
        return;
    }
    if let Err(e) = fs::remove_file(&path) {
        manifest.files_failed += 1;
        log::error!("Failed to delete file '{}': {}", path.display(), e);
    }
}

/// Approves a case and fans out the bilingual notification, exactly once per
/// pending-to-approved transition. Returns false when the case does not exist
/// or was already approved. A failed notification insert never unwinds the
/// approval itself.
pub fn approve_case(conn: &Connection, case_id: i64) -> Result<bool, ModerationError> {
    let case = match case_db_operations::read_case_by_id(conn, case_id) {
        Some(c) => c,
        None => return Ok(false),
    };
    let changed = case_db_operations::approve_case(conn, case_id)?;
    if changed == 0 {
        return Ok(false);
    }
    if let Err(e) = notification_db_operations::insert_case_approval(conn, case_id, &case.title) {
        log::error!("Case {} approved but its notification insert failed: {}", case_id, e);
    }
    Ok(true)
}

/// Deletes every row under one case, children before the case row itself.
/// Callers supply the transaction so multi-case cascades stay atomic.
fn purge_case_rows(
    conn: &Connection,
    case_id: i64,
    manifest: &mut PurgeManifest,
) -> Result<(), ModerationError> {
    manifest.media_deleted += media_db_operations::delete_media_for_case(conn, case_id)?;
    manifest.beneficiaries_deleted +=
        case_db_operations::delete_beneficiaries_for_case(conn, case_id)?;
    manifest.notifications_deleted +=
        notification_db_operations::delete_for_case(conn, case_id)?;
    manifest.cases_deleted += case_db_operations::delete_case_row(conn, case_id)?;
    Ok(())
}

/// Hard-deletes a case and everything under it: media files (best effort),
/// then media rows, beneficiary rows, notification rows and the case row in a
/// single transaction, children before parents. Purging a case that no longer
/// exists is a success with an empty manifest.
pub fn purge_case(
    conn: &mut Connection,
    uploads_root: &Path,
    case_id: i64,
) -> Result<PurgeManifest, ModerationError> {
    let mut manifest = PurgeManifest::default();

    if case_db_operations::read_case_by_id(conn, case_id).is_none() {
        return Ok(manifest);
    }

    for media in media_db_operations::read_media_for_case(conn, case_id)? {
        remove_file_best_effort(uploads_root, &media.file_url, &mut manifest);
    }

    let tx = conn.transaction()?;
    purge_case_rows(&tx, case_id, &mut manifest)?;
    tx.commit()?;

    Ok(manifest)
}

/// Validates an NGO. Returns false when it does not exist or already is validated.
pub fn approve_ong(conn: &Connection, ong_id: i64) -> Result<bool, ModerationError> {
    Ok(ong_db_operations::update_validation_status(conn, ong_id, ValidationStatus::Validated)? > 0)
}

/// Rejects an NGO by erasing its entire footprint: media, logo and
/// verification document files go first (best effort), then every case's rows,
/// the profile row and the linked account row in one transaction, so a
/// mid-cascade failure leaves no half-purged NGO behind. Tolerant of an id
/// that no longer exists.
pub fn purge_ong(
    conn: &mut Connection,
    uploads_root: &Path,
    ong_id: i64,
) -> Result<PurgeManifest, ModerationError> {
    let mut manifest = PurgeManifest::default();

    let ong = match ong_db_operations::read_ong_by_id(conn, ong_id) {
        Some(o) => o,
        None => return Ok(manifest),
    };

    for url in media_db_operations::read_media_urls_for_ong(conn, ong_id)? {
        remove_file_best_effort(uploads_root, &url, &mut manifest);
    }
    if let Some(logo_url) = &ong.logo_url {
        remove_file_best_effort(uploads_root, logo_url, &mut manifest);
    }
    if let Some(doc_url) = &ong.verification_doc_url {
        remove_file_best_effort(uploads_root, doc_url, &mut manifest);
    }

    let case_ids: Vec<i64> = case_db_operations::read_cases_for_ong(conn, ong_id)?
        .into_iter()
        .map(|c| c.id)
        .collect();

    let tx = conn.transaction()?;
    for case_id in &case_ids {
        purge_case_rows(&tx, *case_id, &mut manifest)?;
    }
    manifest.ongs_deleted += ong_db_operations::delete_ong_row(&tx, ong_id)?;
    if let Some(user_id) = ong.user_id {
        manifest.accounts_deleted += users_db_operations::delete_account(&tx, user_id)?;
    }
    tx.commit()?;

    log::info!(
        "Purged NGO {}: {} cases, {} media rows, {} files attempted ({} failed).",
        ong_id,
        manifest.cases_deleted,
        manifest.media_deleted,
        manifest.files_attempted,
        manifest.files_failed
    );
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::users_db_operations;
    use crate::models::{CaseStatus, NewCase, NewOng, Role};
    use crate::setup::db_setup;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        db_setup::setup_database(&mut conn).unwrap();
        conn
    }

    struct TempUploads {
        root: PathBuf,
    }

    impl TempUploads {
        fn new() -> Self {
            let root = std::env::temp_dir().join(format!("ongconnect-test-{}", Uuid::new_v4()));
            fs::create_dir_all(root.join("media")).unwrap();
            fs::create_dir_all(root.join("logos")).unwrap();
            fs::create_dir_all(root.join("docs")).unwrap();
            TempUploads { root }
        }

        fn touch(&self, url: &str) {
            let path = media_helpers::resolve_upload_path(&self.root, url).unwrap();
            fs::write(path, b"data").unwrap();
        }

        fn exists(&self, url: &str) -> bool {
            media_helpers::resolve_upload_path(&self.root, url).unwrap().exists()
        }
    }

    impl Drop for TempUploads {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }

    fn seed_ong(conn: &Connection, email: &str, logo: Option<&str>) -> (i64, i64) {
        let user_id = users_db_operations::create_account(conn, email, "pw", Role::Ong).unwrap();
        let ong = NewOng {
            name: "Solidarité".to_string(),
            address: "Aleg".to_string(),
            phone: "66600000".to_string(),
            email: email.to_string(),
            domains: "Alimentation".to_string(),
            logo_url: logo.map(|s| s.to_string()),
            verification_doc_url: None,
        };
        let ong_id = ong_db_operations::create_ong(conn, &ong, user_id).unwrap();
        (ong_id, user_id)
    }

    fn seed_case(conn: &Connection, ong_id: i64, title: &str) -> i64 {
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
    fn approval_notifies_exactly_once() {
        let conn = test_conn();
        let (ong_id, _) = seed_ong(&conn, "n1@o.org", None);
        let case_id = seed_case(&conn, ong_id, "Cas notifié");

        assert!(approve_case(&conn, case_id).unwrap());
        assert!(!approve_case(&conn, case_id).unwrap());
        assert!(!approve_case(&conn, case_id).unwrap());
        assert_eq!(notification_db_operations::count_for_case(&conn, case_id), 1);

        // Unknown case: no-op, no notification.
        assert!(!approve_case(&conn, 9999).unwrap());
    }

    #[test]
    fn case_purge_clears_children_and_files() {
        let mut conn = test_conn();
        let uploads = TempUploads::new();
        let (ong_id, _) = seed_ong(&conn, "p1@o.org", None);
        let case_id = seed_case(&conn, ong_id, "Cas purgé");

        let url_a = "/static/uploads/media/20240501120000_a.jpg";
        let url_b = "/static/uploads/media/20240501120001_b.jpg";
        uploads.touch(url_a);
        // url_b is deliberately never written to disk.
        media_db_operations::add_media(&conn, case_id, url_a, None).unwrap();
        media_db_operations::add_media(&conn, case_id, url_b, None).unwrap();
        case_db_operations::create_beneficiary(&conn, "Sy", None, None, None, case_id).unwrap();
        approve_case(&conn, case_id).unwrap();

        let manifest = purge_case(&mut conn, &uploads.root, case_id).unwrap();
        assert_eq!(manifest.cases_deleted, 1);
        assert_eq!(manifest.media_deleted, 2);
        assert_eq!(manifest.beneficiaries_deleted, 1);
        assert_eq!(manifest.notifications_deleted, 1);
        assert_eq!(manifest.files_attempted, 2);
        assert_eq!(manifest.files_failed, 0);
        assert!(!uploads.exists(url_a));

        assert!(case_db_operations::read_case_by_id(&conn, case_id).is_none());
        assert!(media_db_operations::read_media_for_case(&conn, case_id).unwrap().is_empty());
        assert!(case_db_operations::read_beneficiaries_for_case(&conn, case_id).unwrap().is_empty());

        // Purging again is success with nothing to report.
        let again = purge_case(&mut conn, &uploads.root, case_id).unwrap();
        assert_eq!(again.cases_deleted, 0);
        assert_eq!(again.files_attempted, 0);
    }

    #[test]
    fn ong_purge_leaves_no_trace() {
        let mut conn = test_conn();
        let uploads = TempUploads::new();
        let logo_url = "/static/uploads/logos/logo_20240501_s.png";
        let (ong_id, user_id) = seed_ong(&conn, "p2@o.org", Some(logo_url));
        uploads.touch(logo_url);

        let case_a = seed_case(&conn, ong_id, "Cas A");
        let case_b = seed_case(&conn, ong_id, "Cas B");
        let media_url = "/static/uploads/media/20240501120002_c.jpg";
        uploads.touch(media_url);
        media_db_operations::add_media(&conn, case_a, media_url, None).unwrap();
        case_db_operations::create_beneficiary(&conn, "Fall", None, None, None, case_b).unwrap();

        let manifest = purge_ong(&mut conn, &uploads.root, ong_id).unwrap();
        assert_eq!(manifest.ongs_deleted, 1);
        assert_eq!(manifest.accounts_deleted, 1);
        assert_eq!(manifest.cases_deleted, 2);
        assert_eq!(manifest.media_deleted, 1);
        assert_eq!(manifest.beneficiaries_deleted, 1);
        assert_eq!(manifest.files_attempted, 2);
        assert_eq!(manifest.files_failed, 0);

        assert!(ong_db_operations::read_ong_by_id(&conn, ong_id).is_none());
        assert!(users_db_operations::read_account_by_id(&conn, user_id).is_none());
        assert!(case_db_operations::read_cases_for_ong(&conn, ong_id).unwrap().is_empty());
        assert!(!uploads.exists(logo_url));
        assert!(!uploads.exists(media_url));

        let again = purge_ong(&mut conn, &uploads.root, ong_id).unwrap();
        assert_eq!(again.ongs_deleted, 0);
    }

    #[test]
    fn failed_ong_purge_rolls_back_everything() {
        let mut conn = test_conn();
        let uploads = TempUploads::new();
        let (ong_id, user_id) = seed_ong(&conn, "p3@o.org", None);
        let case_a = seed_case(&conn, ong_id, "Cas A");
        let case_b = seed_case(&conn, ong_id, "Cas B");
        case_db_operations::create_beneficiary(&conn, "Ba", None, None, None, case_b).unwrap();

        // Abort any beneficiary delete, standing in for a mid-cascade failure.
        conn.execute_batch(
            "CREATE TRIGGER block_beneficiary_delete BEFORE DELETE ON beneficiaries
             BEGIN SELECT RAISE(ABORT, 'locked'); END;",
        )
        .unwrap();

        assert!(purge_ong(&mut conn, &uploads.root, ong_id).is_err());

        // Nothing committed: both cases, the profile and the account survive.
        assert!(ong_db_operations::read_ong_by_id(&conn, ong_id).is_some());
        assert!(users_db_operations::read_account_by_id(&conn, user_id).is_some());
        assert!(case_db_operations::read_case_by_id(&conn, case_a).is_some());
        assert!(case_db_operations::read_case_by_id(&conn, case_b).is_some());
        assert_eq!(
            case_db_operations::read_beneficiaries_for_case(&conn, case_b).unwrap().len(),
            1
        );

        conn.execute_batch("DROP TRIGGER block_beneficiary_delete;").unwrap();
        let manifest = purge_ong(&mut conn, &uploads.root, ong_id).unwrap();
        assert_eq!(manifest.ongs_deleted, 1);
        assert_eq!(manifest.cases_deleted, 2);
        assert_eq!(manifest.beneficiaries_deleted, 1);
        assert_eq!(manifest.accounts_deleted, 1);
    }

    #[test]
    fn ong_validation_is_idempotent() {
        let conn = test_conn();
        let (ong_id, _) = seed_ong(&conn, "v1@o.org", None);
        assert!(approve_ong(&conn, ong_id).unwrap());
        assert!(!approve_ong(&conn, ong_id).unwrap());
        assert!(!approve_ong(&conn, 9999).unwrap());
    }
}
