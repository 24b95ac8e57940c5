use crate::models::db_operations::{case_db_operations, ong_db_operations};
use crate::models::{
    ApprovalStatus, CaseFilter, CountByLabel, SocialCase, ValidationStatus,
};
use rusqlite::Connection;
use serde::Serialize;

/// Public dashboard page size.
pub const PAGE_SIZE: i64 = 3;

#[derive(Debug, Serialize)]
pub struct PageView {
    pub items: Vec<SocialCase>,
    pub page: u32,
    pub total_pages: u32,
    pub total: i64,
}

/// One page of the approved listing. The requested page is clamped into
/// bounds, so out-of-range values degrade to the nearest valid page instead
/// of erroring.
pub fn paginate_approved(
    conn: &Connection,
    filter: &CaseFilter,
    requested_page: u32,
) -> Result<PageView, rusqlite::Error> {
    let total = case_db_operations::count_approved_cases(conn, filter)?;
    let total_pages = ((total + PAGE_SIZE - 1) / PAGE_SIZE).max(1) as u32;
    let page = requested_page.clamp(1, total_pages);
    let offset = (page as i64 - 1) * PAGE_SIZE;
    let items = case_db_operations::read_approved_cases_page(conn, filter, PAGE_SIZE, offset)?;
    Ok(PageView { items, page, total_pages, total })
}

/// Page numbers for the dashboard pager: both edges, a window around the
/// current page, `None` where pages are elided.
pub fn pagination_iter(current: u32, total_pages: u32) -> Vec<Option<u32>> {
    let mut out: Vec<Option<u32>> = Vec::new();
    let mut last_shown = 0u32;
    for p in 1..=total_pages {
        let edge = p <= 2 || p > total_pages.saturating_sub(2);
        let window = p + 1 >= current && p <= current + 1;
        if edge || window {
            if last_shown != 0 && p != last_shown + 1 {
                out.push(None);
            }
            out.push(Some(p));
            last_shown = p;
        }
    }
    out
}

/// Who is looking at a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Public,
    Admin,
    Ong(i64),
}

/// The detail view exists for a viewer iff the case is approved, the viewer
/// is an admin, or the viewer owns it. Everything else is indistinguishable
/// from a missing case.
pub fn fetch_case_detail(conn: &Connection, case_id: i64, viewer: Viewer) -> Option<SocialCase> {
    let case = case_db_operations::read_case_by_id(conn, case_id)?;
    let visible = case.approval_status == ApprovalStatus::Approved
        || viewer == Viewer::Admin
        || viewer == Viewer::Ong(case.ong_id);
    if visible {
        Some(case)
    } else {
        None
    }
}

#[derive(Debug, Serialize)]
pub struct PlatformStats {
    pub total_cases: i64,
    pub approved_cases: i64,
    pub pending_cases: i64,
    pub total_ongs: i64,
    pub validated_ongs: i64,
    pub pending_ongs: i64,
    pub by_wilaya: Vec<CountByLabel>,
    pub by_moughataa: Vec<CountByLabel>,
    pub by_status: Vec<CountByLabel>,
    pub ongs_by_domain: Vec<CountByLabel>,
}

/// Aggregates for the statistics page. Geographic and status breakdowns only
/// count approved cases; pending material stays invisible.
pub fn gather_statistics(conn: &Connection) -> Result<PlatformStats, rusqlite::Error> {
    Ok(PlatformStats {
        total_cases: case_db_operations::count_cases(conn),
        approved_cases: case_db_operations::count_cases_by_approval(conn, ApprovalStatus::Approved),
        pending_cases: case_db_operations::count_cases_by_approval(conn, ApprovalStatus::Pending),
        total_ongs: ong_db_operations::count_ongs(conn),
        validated_ongs: ong_db_operations::count_ongs_by_status(conn, ValidationStatus::Validated),
        pending_ongs: ong_db_operations::count_ongs_by_status(conn, ValidationStatus::Pending),
        by_wilaya: case_db_operations::count_approved_by_wilaya(conn)?,
        by_moughataa: case_db_operations::count_approved_by_moughataa(conn)?,
        by_status: case_db_operations::count_approved_by_status(conn)?,
        ongs_by_domain: ong_db_operations::count_ongs_by_domain(conn)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::users_db_operations;
    use crate::models::{CaseStatus, NewCase, NewOng, Role};
    use crate::setup::db_setup;

    fn test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        db_setup::setup_database(&mut conn).unwrap();
        conn
    }

    fn seed_ong(conn: &Connection) -> i64 {
        let user_id =
            users_db_operations::create_account(conn, "pub@o.org", "pw", Role::Ong).unwrap();
        let ong = NewOng {
            name: "Lumière".to_string(),
            address: "Sélibaby".to_string(),
            phone: "77700000".to_string(),
            email: "pub@o.org".to_string(),
            domains: "Santé".to_string(),
            logo_url: None,
            verification_doc_url: None,
        };
        ong_db_operations::create_ong(conn, &ong, user_id).unwrap()
    }

    fn seed_case(conn: &Connection, ong_id: i64, n: usize, approved: bool) -> i64 {
        let id = case_db_operations::create_case(
            conn,
            &NewCase {
                title: format!("Cas {}", n),
                description: "desc".to_string(),
                address: None,
                wilaya: Some("Guidimakha".to_string()),
                moughataa: None,
                published_on: None,
                status: CaseStatus::Ongoing,
                latitude: None,
                longitude: None,
                ong_id,
                category_id: None,
            },
        )
        .unwrap();
        if approved {
            case_db_operations::approve_case(conn, id).unwrap();
        }
        id
    }

    #[test]
    fn pages_hold_three_and_clamp_out_of_range() {
        let conn = test_conn();
        let ong_id = seed_ong(&conn);
        for n in 0..7 {
            seed_case(&conn, ong_id, n, true);
        }
        seed_case(&conn, ong_id, 99, false);

        let filter = CaseFilter::default();
        let first = paginate_approved(&conn, &filter, 1).unwrap();
        assert_eq!(first.total, 7);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.items.len(), 3);

        let last = paginate_approved(&conn, &filter, 3).unwrap();
        assert_eq!(last.items.len(), 1);

        // Out-of-range pages clamp to bounds instead of failing.
        assert_eq!(paginate_approved(&conn, &filter, 0).unwrap().page, 1);
        assert_eq!(paginate_approved(&conn, &filter, 50).unwrap().page, 3);

        // An empty listing is a single empty page.
        let none = paginate_approved(
            &conn,
            &CaseFilter { query: Some("introuvable".to_string()), ..Default::default() },
            1,
        )
        .unwrap();
        assert_eq!(none.total_pages, 1);
        assert!(none.items.is_empty());
    }

    #[test]
    fn pager_elides_the_middle() {
        assert_eq!(pagination_iter(1, 3), vec![Some(1), Some(2), Some(3)]);
        let many = pagination_iter(5, 10);
        assert_eq!(
            many,
            vec![Some(1), Some(2), None, Some(4), Some(5), Some(6), None, Some(9), Some(10)]
        );
        assert_eq!(pagination_iter(1, 1), vec![Some(1)]);
        assert_eq!(pagination_iter(1, 0), Vec::<Option<u32>>::new());
    }

    #[test]
    fn visibility_is_approved_or_admin_or_owner() {
        let conn = test_conn();
        let ong_id = seed_ong(&conn);
        let pending = seed_case(&conn, ong_id, 0, false);
        let approved = seed_case(&conn, ong_id, 1, true);

        assert!(fetch_case_detail(&conn, approved, Viewer::Public).is_some());
        assert!(fetch_case_detail(&conn, pending, Viewer::Public).is_none());
        assert!(fetch_case_detail(&conn, pending, Viewer::Admin).is_some());
        assert!(fetch_case_detail(&conn, pending, Viewer::Ong(ong_id)).is_some());
        assert!(fetch_case_detail(&conn, pending, Viewer::Ong(ong_id + 1)).is_none());
        assert!(fetch_case_detail(&conn, 9999, Viewer::Admin).is_none());
    }

    #[test]
    fn statistics_only_count_approved_geography() {
        let conn = test_conn();
        let ong_id = seed_ong(&conn);
        seed_case(&conn, ong_id, 0, true);
        seed_case(&conn, ong_id, 1, false);

        let stats = gather_statistics(&conn).unwrap();
        assert_eq!(stats.total_cases, 2);
        assert_eq!(stats.approved_cases, 1);
        assert_eq!(stats.pending_cases, 1);
        assert_eq!(stats.total_ongs, 1);
        let guidimakha: i64 = stats
            .by_wilaya
            .iter()
            .filter(|c| c.label == "Guidimakha")
            .map(|c| c.count)
            .sum();
        assert_eq!(guidimakha, 1);
    }
}
