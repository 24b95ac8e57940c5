use crate::helper::public_helpers::Viewer;
use crate::helper::{form_helpers, public_helpers};
use crate::models::db_operations::{case_db_operations, media_db_operations, ong_db_operations};
use crate::models::{ApprovalStatus, CaseFilter, ValidationStatus};
use actix_session::Session;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use tera::{Context, Tera};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(landing))
        .route("/public/dashboard", web::get().to(dashboard))
        .route("/public/case/{id}", web::get().to(case_detail))
        .route("/public/statistics", web::get().to(statistics_page))
        .route("/ngos", web::get().to(ngo_directory))
        .route("/ngos/details/{id}", web::get().to(ngo_details));
}

#[derive(Deserialize)]
struct DashboardQuery {
    page: Option<u32>,
    category: Option<i64>,
    ong: Option<i64>,
    q: Option<String>,
}

/// Resolves the visibility context from whatever session cookie came along.
pub fn viewer_from_session(session: &Session) -> Viewer {
    let role = session.get::<String>("role").unwrap_or(None);
    let profile_id = session.get::<i64>("profile_id").unwrap_or(None);
    match (role.as_deref(), profile_id) {
        (Some("admin"), _) => Viewer::Admin,
        (Some("ong"), Some(id)) => Viewer::Ong(id),
        _ => Viewer::Public,
    }
}

pub fn render(tera: &Tera, template: &str, ctx: &Context) -> HttpResponse {
    match tera.render(template, ctx) {
        Ok(rendered) => HttpResponse::Ok().content_type("text/html; charset=utf-8").body(rendered),
        Err(e) => {
            log::error!("Template '{}' failed to render: {}", template, e);
            HttpResponse::InternalServerError().body("Template error")
        }
    }
}

async fn landing(
    session: Session,
    tera: web::Data<Tera>,
    pool: web::Data<crate::DbPool>,
) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };

    let mut ctx = Context::new();
    let spotlight = ong_db_operations::read_ongs_by_status(&conn, ValidationStatus::Validated)
        .unwrap_or_default();
    ctx.insert("ongs", &spotlight);
    ctx.insert(
        "approved_count",
        &case_db_operations::count_cases_by_approval(&conn, ApprovalStatus::Approved),
    );
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "public/landing.html", &ctx)
}

async fn dashboard(
    session: Session,
    tera: web::Data<Tera>,
    pool: web::Data<crate::DbPool>,
    query: web::Query<DashboardQuery>,
) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };

    let filter = CaseFilter {
        category_id: query.category,
        ong_id: query.ong,
        query: query.q.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
    };

    let page_view = match public_helpers::paginate_approved(&conn, &filter, query.page.unwrap_or(1)) {
        Ok(p) => p,
        Err(e) => {
            log::error!("Dashboard pagination failed: {}", e);
            return HttpResponse::InternalServerError().body("Database error.");
        }
    };
    // The full approved set backs the client-side category chips.
    let all_approved =
        case_db_operations::read_approved_cases(&conn, &CaseFilter::default()).unwrap_or_default();

    let mut ctx = Context::new();
    ctx.insert("cases", &page_view.items);
    ctx.insert("all_cases", &all_approved);
    ctx.insert("page", &page_view.page);
    ctx.insert("total_pages", &page_view.total_pages);
    ctx.insert("total", &page_view.total);
    ctx.insert(
        "pagination",
        &public_helpers::pagination_iter(page_view.page, page_view.total_pages),
    );
    ctx.insert(
        "categories",
        &case_db_operations::read_all_categories(&conn).unwrap_or_default(),
    );
    ctx.insert(
        "ongs",
        &ong_db_operations::read_ongs_by_status(&conn, ValidationStatus::Validated)
            .unwrap_or_default(),
    );
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "public/dashboard.html", &ctx)
}

async fn case_detail(
    session: Session,
    tera: web::Data<Tera>,
    pool: web::Data<crate::DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    let case_id = path.into_inner();
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };

    let viewer = viewer_from_session(&session);
    let case = match public_helpers::fetch_case_detail(&conn, case_id, viewer) {
        Some(c) => c,
        None => return HttpResponse::NotFound().body("Case not found."),
    };

    let mut ctx = Context::new();
    ctx.insert("case", &case);
    ctx.insert(
        "media",
        &media_db_operations::read_media_for_case(&conn, case_id).unwrap_or_default(),
    );
    ctx.insert(
        "beneficiaries",
        &case_db_operations::read_beneficiaries_for_case(&conn, case_id).unwrap_or_default(),
    );
    ctx.insert("is_admin", &(viewer == Viewer::Admin));
    ctx.insert("is_owner", &(viewer == Viewer::Ong(case.ong_id)));
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "public/case_detail.html", &ctx)
}

async fn statistics_page(tera: web::Data<Tera>, pool: web::Data<crate::DbPool>) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };
    let stats = match public_helpers::gather_statistics(&conn) {
        Ok(s) => s,
        Err(e) => {
            log::error!("Statistics aggregation failed: {}", e);
            return HttpResponse::InternalServerError().body("Database error.");
        }
    };
    let mut ctx = Context::new();
    ctx.insert("stats", &stats);
    render(&tera, "public/statistics.html", &ctx)
}

async fn ngo_directory(
    session: Session,
    tera: web::Data<Tera>,
    pool: web::Data<crate::DbPool>,
) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };

    // Admins see the whole register; the public only validated organisations.
    let is_admin = viewer_from_session(&session) == Viewer::Admin;
    let ongs = if is_admin {
        ong_db_operations::read_all_ongs(&conn).unwrap_or_default()
    } else {
        ong_db_operations::read_ongs_by_status(&conn, ValidationStatus::Validated)
            .unwrap_or_default()
    };

    let mut ctx = Context::new();
    ctx.insert("ongs", &ongs);
    ctx.insert("is_admin", &is_admin);
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "public/ngos.html", &ctx)
}

async fn ngo_details(
    session: Session,
    tera: web::Data<Tera>,
    pool: web::Data<crate::DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    let ong_id = path.into_inner();
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };

    let ong = match ong_db_operations::read_ong_by_id(&conn, ong_id) {
        Some(o) => o,
        None => return HttpResponse::NotFound().body("Organisation not found."),
    };
    let viewer = viewer_from_session(&session);
    let is_admin = viewer == Viewer::Admin;
    let is_owner = viewer == Viewer::Ong(ong_id);
    if ong.validation_status != ValidationStatus::Validated && !is_admin && !is_owner {
        return HttpResponse::NotFound().body("Organisation not found.");
    }

    // The public card only lists the organisation's approved cases.
    let filter = CaseFilter { ong_id: Some(ong_id), ..Default::default() };
    let cases = case_db_operations::read_approved_cases(&conn, &filter).unwrap_or_default();

    let mut ctx = Context::new();
    ctx.insert("ong", &ong);
    ctx.insert("cases", &cases);
    ctx.insert("is_admin", &is_admin);
    ctx.insert("is_owner", &is_owner);
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "public/ngo_details.html", &ctx)
}
