use crate::models::{
    ApprovalStatus, Beneficiary, CaseFilter, CasePatch, CaseStatus, Category, CountByLabel,
    NewCase, SocialCase,
};
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, Error as RusqliteError, OptionalExtension};

const CASE_COLUMNS: &str = "c.id, c.title, c.description, c.address, c.wilaya, c.moughataa, \
                            c.published_on, c.status, c.approval_status, c.latitude, c.longitude, \
                            c.ong_id, c.category_id, o.name, cat.name";

const CASE_FROM: &str = "FROM cases c \
                         JOIN ongs o ON o.id = c.ong_id \
                         LEFT JOIN categories cat ON cat.id = c.category_id";

fn row_to_case(row: &rusqlite::Row) -> rusqlite::Result<SocialCase> {
    let status_str: String = row.get(7)?;
    let approval_str: String = row.get(8)?;
    Ok(SocialCase {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        address: row.get(3)?,
        wilaya: row.get(4)?,
        moughataa: row.get(5)?,
        published_on: row.get(6)?,
        status: CaseStatus::parse(&status_str).unwrap_or(CaseStatus::Ongoing),
        approval_status: ApprovalStatus::parse(&approval_str).unwrap_or(ApprovalStatus::Pending),
        latitude: row.get(9)?,
        longitude: row.get(10)?,
        ong_id: row.get(11)?,
        category_id: row.get(12)?,
        ong_name: row.get(13)?,
        category_name: row.get(14)?,
    })
}

pub fn create_case(conn: &Connection, case: &NewCase) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO cases (title, description, address, wilaya, moughataa, published_on,
                            status, latitude, longitude, ong_id, category_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            case.title,
            case.description,
            case.address,
            case.wilaya,
            case.moughataa,
            case.published_on,
            case.status.as_str(),
            case.latitude,
            case.longitude,
            case.ong_id,
            case.category_id
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_case_by_id(conn: &Connection, id: i64) -> Option<SocialCase> {
    conn.query_row(
        &format!("SELECT {} {} WHERE c.id = ?1", CASE_COLUMNS, CASE_FROM),
        [id],
        row_to_case,
    )
    .optional()
    .unwrap_or(None)
}

pub fn read_all_cases(conn: &Connection) -> Result<Vec<SocialCase>, RusqliteError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} {} ORDER BY c.id DESC",
        CASE_COLUMNS, CASE_FROM
    ))?;
    let iter = stmt.query_map([], row_to_case)?;
    Ok(iter.filter_map(|c| c.ok()).collect())
}

pub fn read_cases_for_ong(conn: &Connection, ong_id: i64) -> Result<Vec<SocialCase>, RusqliteError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} {} WHERE c.ong_id = ?1 ORDER BY c.id DESC",
        CASE_COLUMNS, CASE_FROM
    ))?;
    let iter = stmt.query_map([ong_id], row_to_case)?;
    Ok(iter.filter_map(|c| c.ok()).collect())
}

pub fn read_cases_by_approval(
    conn: &Connection,
    status: ApprovalStatus,
) -> Result<Vec<SocialCase>, RusqliteError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} {} WHERE c.approval_status = ?1 ORDER BY c.id DESC",
        CASE_COLUMNS, CASE_FROM
    ))?;
    let iter = stmt.query_map([status.as_str()], row_to_case)?;
    Ok(iter.filter_map(|c| c.ok()).collect())
}

fn filter_clauses(filter: &CaseFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut sql = String::from(" WHERE c.approval_status = 'approved'");
    let mut bound: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(category_id) = filter.category_id {
        sql.push_str(" AND c.category_id = ?");
        bound.push(Box::new(category_id));
    }
    if let Some(ong_id) = filter.ong_id {
        sql.push_str(" AND c.ong_id = ?");
        bound.push(Box::new(ong_id));
    }
    if let Some(query) = &filter.query {
        sql.push_str(" AND (c.title LIKE ? OR c.description LIKE ?)");
        let like = format!("%{}%", query);
        bound.push(Box::new(like.clone()));
        bound.push(Box::new(like));
    }
    (sql, bound)
}

/// The complete approved set, newest first, optionally filtered.
pub fn read_approved_cases(
    conn: &Connection,
    filter: &CaseFilter,
) -> Result<Vec<SocialCase>, RusqliteError> {
    let (clauses, bound) = filter_clauses(filter);
    let mut stmt = conn.prepare(&format!(
        "SELECT {} {}{} ORDER BY c.id DESC",
        CASE_COLUMNS, CASE_FROM, clauses
    ))?;
    let iter = stmt.query_map(params_from_iter(bound.iter().map(|p| p.as_ref())), row_to_case)?;
    Ok(iter.filter_map(|c| c.ok()).collect())
}

pub fn read_approved_cases_page(
    conn: &Connection,
    filter: &CaseFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<SocialCase>, RusqliteError> {
    let (clauses, mut bound) = filter_clauses(filter);
    bound.push(Box::new(limit));
    bound.push(Box::new(offset));
    let mut stmt = conn.prepare(&format!(
        "SELECT {} {}{} ORDER BY c.id DESC LIMIT ? OFFSET ?",
        CASE_COLUMNS, CASE_FROM, clauses
    ))?;
    let iter = stmt.query_map(params_from_iter(bound.iter().map(|p| p.as_ref())), row_to_case)?;
    Ok(iter.filter_map(|c| c.ok()).collect())
}

pub fn count_approved_cases(conn: &Connection, filter: &CaseFilter) -> Result<i64, RusqliteError> {
    let (clauses, bound) = filter_clauses(filter);
    conn.query_row(
        &format!("SELECT COUNT(*) {}{}", CASE_FROM, clauses),
        params_from_iter(bound.iter().map(|p| p.as_ref())),
        |row| row.get(0),
    )
}

/// Flips a case to approved. Returns the number of rows changed, so an
/// already-approved case reports 0 and the caller can skip the notification.
pub fn approve_case(conn: &Connection, id: i64) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE cases SET approval_status = 'approved'
         WHERE id = ?1 AND approval_status <> 'approved'",
        [id],
    )
}

pub fn update_case(conn: &Connection, id: i64, patch: &CasePatch) -> Result<usize, RusqliteError> {
    if patch.is_empty() {
        return Ok(0);
    }
    conn.execute(
        "UPDATE cases SET
            title        = COALESCE(?2, title),
            description  = COALESCE(?3, description),
            address      = COALESCE(?4, address),
            wilaya       = COALESCE(?5, wilaya),
            moughataa    = COALESCE(?6, moughataa),
            published_on = COALESCE(?7, published_on),
            status       = COALESCE(?8, status),
            latitude     = COALESCE(?9, latitude),
            longitude    = COALESCE(?10, longitude),
            category_id  = COALESCE(?11, category_id)
         WHERE id = ?1",
        params![
            id,
            patch.title,
            patch.description,
            patch.address,
            patch.wilaya,
            patch.moughataa,
            patch.published_on,
            patch.status.map(|s| s.as_str()),
            patch.latitude,
            patch.longitude,
            patch.category_id
        ],
    )
}

pub fn update_case_status(
    conn: &Connection,
    id: i64,
    status: CaseStatus,
) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE cases SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )
}

pub fn delete_case_row(conn: &Connection, id: i64) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM cases WHERE id = ?1", [id])
}

pub fn count_cases(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM cases", [], |row| row.get(0))
        .unwrap_or(0)
}

pub fn count_cases_by_approval(conn: &Connection, status: ApprovalStatus) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM cases WHERE approval_status = ?1",
        [status.as_str()],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

fn grouped_counts(conn: &Connection, sql: &str) -> Result<Vec<CountByLabel>, RusqliteError> {
    let mut stmt = conn.prepare(sql)?;
    let iter = stmt.query_map([], |row| {
        Ok(CountByLabel { label: row.get(0)?, count: row.get(1)? })
    })?;
    Ok(iter.filter_map(|c| c.ok()).collect())
}

pub fn count_approved_by_wilaya(conn: &Connection) -> Result<Vec<CountByLabel>, RusqliteError> {
    grouped_counts(
        conn,
        "SELECT COALESCE(wilaya, 'Inconnue'), COUNT(*) FROM cases
         WHERE approval_status = 'approved' GROUP BY wilaya ORDER BY COUNT(*) DESC",
    )
}

pub fn count_approved_by_moughataa(conn: &Connection) -> Result<Vec<CountByLabel>, RusqliteError> {
    grouped_counts(
        conn,
        "SELECT COALESCE(moughataa, 'Inconnue'), COUNT(*) FROM cases
         WHERE approval_status = 'approved' GROUP BY moughataa ORDER BY COUNT(*) DESC LIMIT 10",
    )
}

pub fn count_approved_by_status(conn: &Connection) -> Result<Vec<CountByLabel>, RusqliteError> {
    grouped_counts(
        conn,
        "SELECT status, COUNT(*) FROM cases
         WHERE approval_status = 'approved' GROUP BY status ORDER BY COUNT(*) DESC",
    )
}

// --- Beneficiaries ---

fn row_to_beneficiary(row: &rusqlite::Row) -> rusqlite::Result<Beneficiary> {
    Ok(Beneficiary {
        id: row.get(0)?,
        last_name: row.get(1)?,
        first_name: row.get(2)?,
        address: row.get(3)?,
        situation: row.get(4)?,
        case_id: row.get(5)?,
    })
}

pub fn create_beneficiary(
    conn: &Connection,
    last_name: &str,
    first_name: Option<&str>,
    address: Option<&str>,
    situation: Option<&str>,
    case_id: i64,
) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO beneficiaries (last_name, first_name, address, situation, case_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![last_name, first_name, address, situation, case_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_beneficiary_by_id(conn: &Connection, id: i64) -> Option<Beneficiary> {
    conn.query_row(
        "SELECT id, last_name, first_name, address, situation, case_id
         FROM beneficiaries WHERE id = ?1",
        [id],
        row_to_beneficiary,
    )
    .optional()
    .unwrap_or(None)
}

pub fn read_beneficiaries_for_case(
    conn: &Connection,
    case_id: i64,
) -> Result<Vec<Beneficiary>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT id, last_name, first_name, address, situation, case_id
         FROM beneficiaries WHERE case_id = ?1 ORDER BY last_name",
    )?;
    let iter = stmt.query_map([case_id], row_to_beneficiary)?;
    Ok(iter.filter_map(|b| b.ok()).collect())
}

pub fn update_beneficiary(
    conn: &Connection,
    id: i64,
    last_name: &str,
    first_name: Option<&str>,
    address: Option<&str>,
    situation: Option<&str>,
) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE beneficiaries SET last_name = ?1, first_name = ?2, address = ?3, situation = ?4
         WHERE id = ?5",
        params![last_name, first_name, address, situation, id],
    )
}

pub fn delete_beneficiary(conn: &Connection, id: i64) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM beneficiaries WHERE id = ?1", [id])
}

pub fn delete_beneficiaries_for_case(conn: &Connection, case_id: i64) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM beneficiaries WHERE case_id = ?1", [case_id])
}

// --- Categories ---

fn row_to_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
    })
}

pub fn create_category(
    conn: &Connection,
    name: &str,
    description: &str,
) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO categories (name, description) VALUES (?1, ?2)",
        params![name, description],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_all_categories(conn: &Connection) -> Result<Vec<Category>, RusqliteError> {
    let mut stmt = conn.prepare("SELECT id, name, description FROM categories ORDER BY name")?;
    let iter = stmt.query_map([], row_to_category)?;
    Ok(iter.filter_map(|c| c.ok()).collect())
}

pub fn read_category_by_id(conn: &Connection, id: i64) -> Option<Category> {
    conn.query_row(
        "SELECT id, name, description FROM categories WHERE id = ?1",
        [id],
        row_to_category,
    )
    .optional()
    .unwrap_or(None)
}

pub fn update_category(
    conn: &Connection,
    id: i64,
    name: &str,
    description: &str,
) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE categories SET name = ?1, description = ?2 WHERE id = ?3",
        params![name, description, id],
    )
}

pub fn delete_category(conn: &Connection, id: i64) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM categories WHERE id = ?1", [id])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::{ong_db_operations, users_db_operations};
    use crate::models::{NewOng, Role};
    use crate::setup::db_setup;

    fn test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        db_setup::setup_database(&mut conn).unwrap();
        conn
    }

    fn make_ong(conn: &Connection, email: &str) -> i64 {
        let user_id = users_db_operations::create_account(conn, email, "pw", Role::Ong).unwrap();
        let ong = NewOng {
            name: "Entraide".to_string(),
            address: "Nouadhibou".to_string(),
            phone: "33300000".to_string(),
            email: email.to_string(),
            domains: "Éducation".to_string(),
            logo_url: None,
            verification_doc_url: None,
        };
        ong_db_operations::create_ong(conn, &ong, user_id).unwrap()
    }

    fn make_case(conn: &Connection, ong_id: i64, title: &str, wilaya: &str) -> i64 {
        create_case(
            conn,
            &NewCase {
                title: title.to_string(),
                description: format!("Description de {}", title),
                address: None,
                wilaya: Some(wilaya.to_string()),
                moughataa: None,
                published_on: Some("2024-05-01".to_string()),
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
    fn new_case_is_pending_and_invisible_publicly() {
        let conn = test_conn();
        let ong_id = make_ong(&conn, "a@o.org");
        let case_id = make_case(&conn, ong_id, "Famille sinistrée", "Nouakchott");

        let case = read_case_by_id(&conn, case_id).unwrap();
        assert_eq!(case.approval_status, ApprovalStatus::Pending);
        assert_eq!(case.ong_name.as_deref(), Some("Entraide"));

        let visible = read_approved_cases(&conn, &CaseFilter::default()).unwrap();
        assert!(visible.is_empty());
    }

    #[test]
    fn approved_listing_matches_approved_set_exactly() {
        let conn = test_conn();
        let ong_id = make_ong(&conn, "b@o.org");
        let a = make_case(&conn, ong_id, "Cas A", "Nouakchott");
        let _b = make_case(&conn, ong_id, "Cas B", "Kiffa");
        let c = make_case(&conn, ong_id, "Cas C", "Kiffa");
        approve_case(&conn, a).unwrap();
        approve_case(&conn, c).unwrap();

        let visible = read_approved_cases(&conn, &CaseFilter::default()).unwrap();
        let mut ids: Vec<i64> = visible.iter().map(|c| c.id).collect();
        ids.sort();
        assert_eq!(ids, vec![a, c]);
        assert_eq!(count_approved_cases(&conn, &CaseFilter::default()).unwrap(), 2);
    }

    #[test]
    fn approve_is_idempotent_at_row_level() {
        let conn = test_conn();
        let ong_id = make_ong(&conn, "c@o.org");
        let id = make_case(&conn, ong_id, "Cas D", "Atar");
        assert_eq!(approve_case(&conn, id).unwrap(), 1);
        assert_eq!(approve_case(&conn, id).unwrap(), 0);
    }

    #[test]
    fn filters_narrow_the_listing() {
        let conn = test_conn();
        let ong_a = make_ong(&conn, "fa@o.org");
        let ong_b = make_ong(&conn, "fb@o.org");
        let cat = create_category(&conn, "Hiver", "Campagnes d'hiver").unwrap();

        let one = make_case(&conn, ong_a, "Toiture détruite", "Atar");
        let two = make_case(&conn, ong_b, "Rentrée scolaire", "Atar");
        update_case(&conn, one, &CasePatch { category_id: Some(cat), ..Default::default() }).unwrap();
        approve_case(&conn, one).unwrap();
        approve_case(&conn, two).unwrap();

        let by_cat = read_approved_cases(
            &conn,
            &CaseFilter { category_id: Some(cat), ..Default::default() },
        )
        .unwrap();
        assert_eq!(by_cat.len(), 1);
        assert_eq!(by_cat[0].id, one);

        let by_ong = read_approved_cases(
            &conn,
            &CaseFilter { ong_id: Some(ong_b), ..Default::default() },
        )
        .unwrap();
        assert_eq!(by_ong.len(), 1);
        assert_eq!(by_ong[0].id, two);

        let by_text = read_approved_cases(
            &conn,
            &CaseFilter { query: Some("scolaire".to_string()), ..Default::default() },
        )
        .unwrap();
        assert_eq!(by_text.len(), 1);
        assert_eq!(by_text[0].id, two);
    }

    #[test]
    fn patch_updates_only_present_fields() {
        let conn = test_conn();
        let ong_id = make_ong(&conn, "d@o.org");
        let id = make_case(&conn, ong_id, "Titre initial", "Rosso");

        let patch = CasePatch {
            title: Some("Titre corrigé".to_string()),
            status: Some(CaseStatus::Urgent),
            ..Default::default()
        };
        assert_eq!(update_case(&conn, id, &patch).unwrap(), 1);

        let case = read_case_by_id(&conn, id).unwrap();
        assert_eq!(case.title, "Titre corrigé");
        assert_eq!(case.status, CaseStatus::Urgent);
        // Untouched fields keep their values.
        assert_eq!(case.wilaya.as_deref(), Some("Rosso"));
        assert_eq!(case.description, "Description de Titre initial");

        assert_eq!(update_case(&conn, id, &CasePatch::default()).unwrap(), 0);
    }

    #[test]
    fn operational_status_tokens_parse_both_forms() {
        assert_eq!(CaseStatus::parse("En cours"), Some(CaseStatus::Ongoing));
        assert_eq!(CaseStatus::parse("Résolu"), Some(CaseStatus::Resolved));
        assert_eq!(CaseStatus::parse("urgent"), Some(CaseStatus::Urgent));
        assert_eq!(CaseStatus::parse("fermé"), None);
    }

    #[test]
    fn beneficiary_crud_roundtrip() {
        let conn = test_conn();
        let ong_id = make_ong(&conn, "e@o.org");
        let case_id = make_case(&conn, ong_id, "Cas E", "Kaédi");

        let ben = create_beneficiary(&conn, "Ba", Some("Aminata"), None, Some("Sans abri"), case_id).unwrap();
        assert_eq!(read_beneficiaries_for_case(&conn, case_id).unwrap().len(), 1);

        update_beneficiary(&conn, ben, "Ba", Some("Aminata"), Some("Kaédi"), Some("Relogée")).unwrap();
        let row = read_beneficiary_by_id(&conn, ben).unwrap();
        assert_eq!(row.situation.as_deref(), Some("Relogée"));

        assert_eq!(delete_beneficiary(&conn, ben).unwrap(), 1);
        assert_eq!(delete_beneficiary(&conn, ben).unwrap(), 0);
    }

    #[test]
    fn default_categories_are_seeded() {
        let conn = test_conn();
        let cats = read_all_categories(&conn).unwrap();
        assert!(cats.len() >= 5);
        assert!(cats.iter().any(|c| c.name == "Santé"));
    }
}
