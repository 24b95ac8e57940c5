use crate::config::Config;
use crate::helper::auth_helpers::AuthOutcome;
use crate::helper::{auth_helpers, media_helpers, moderation_helpers, public_helpers, sanitization_helpers};
use crate::middleware::ApiAuth;
use crate::models::db_operations::{
    case_db_operations, media_db_operations, notification_db_operations, ong_db_operations,
    users_db_operations,
};
use crate::models::{
    ApprovalStatus, CaseFilter, CasePatch, CaseStatus, NewCase, NewOng, Role, ValidationStatus,
};
use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;

/// Bearer-authenticated JSON surface for the mobile clients, mounted under
/// `/api` outside the cookie session.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/auth/login", web::post().to(login))
            .route("/auth/register", web::post().to(register))
            .route("/cases", web::get().to(list_cases))
            .route("/cases/add", web::post().to(add_case))
            .route("/cases/edit/{id}", web::post().to(edit_case))
            .route("/cases/{id}", web::get().to(case_detail))
            .route("/cases/{id}", web::delete().to(delete_case))
            .route("/ong/cases", web::get().to(own_cases))
            .route("/ong/profile", web::get().to(own_profile))
            .route("/ong/profile/update", web::post().to(update_profile))
            .route("/ongs", web::get().to(list_ongs))
            .route("/ongs/{id}", web::get().to(ong_detail))
            .route("/categories", web::get().to(list_categories))
            .route("/notifications", web::get().to(list_notifications))
            .route("/notifications/{id}/read", web::post().to(mark_notification_read))
            .route("/statistics", web::get().to(statistics))
            .route("/admin/pending-ongs", web::get().to(pending_ongs))
            .route("/admin/pending-cases", web::get().to(pending_cases))
            .route("/admin/ong/{id}/approve", web::post().to(admin_approve_ong))
            .route("/admin/ong/{id}/reject", web::post().to(admin_reject_ong))
            .route("/admin/case/{id}/approve", web::post().to(admin_approve_case))
            .route("/admin/case/{id}/reject", web::post().to(admin_reject_case)),
    );
}

fn db_error() -> HttpResponse {
    HttpResponse::InternalServerError().json(json!({
        "success": false,
        "error": "Database unavailable."
    }))
}

fn not_found(what: &str) -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "success": false, "error": format!("{} not found.", what) }))
}

fn forbidden() -> HttpResponse {
    HttpResponse::Forbidden().json(json!({ "success": false, "error": "Permission denied." }))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// Maps a login outcome to token claim material, or to the rejection the
/// caller should see. A missing profile is reported as such, never folded
/// into bad credentials.
fn resolve_login(
    outcome: AuthOutcome,
) -> Result<(i64, Role, Option<i64>, String), (StatusCode, &'static str)> {
    match outcome {
        AuthOutcome::Admin(admin) => {
            Ok((admin.user_id.unwrap_or_default(), Role::Admin, None, admin.name))
        }
        AuthOutcome::Ong(ong) => {
            Ok((ong.user_id.unwrap_or_default(), Role::Ong, Some(ong.id), ong.name))
        }
        AuthOutcome::PendingApproval => {
            Err((StatusCode::FORBIDDEN, "This organisation is awaiting approval."))
        }
        AuthOutcome::Rejected => {
            Err((StatusCode::FORBIDDEN, "This organisation's registration was rejected."))
        }
        AuthOutcome::ProfileMissing => Err((
            StatusCode::FORBIDDEN,
            "This account has no active profile. Contact an administrator.",
        )),
        AuthOutcome::InvalidCredentials => {
            Err((StatusCode::UNAUTHORIZED, "Invalid email or password."))
        }
    }
}

async fn login(
    pool: web::Data<crate::DbPool>,
    config: web::Data<Config>,
    body: web::Json<LoginRequest>,
) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return db_error(),
    };

    let outcome = match auth_helpers::authenticate(&conn, body.email.trim(), &body.password) {
        Ok(o) => o,
        Err(e) => {
            log::error!("API login check failed: {}", e);
            return db_error();
        }
    };

    let (account_id, role, ong_id, name) = match resolve_login(outcome) {
        Ok(claims) => claims,
        Err((status, error)) => {
            return HttpResponse::build(status).json(json!({ "success": false, "error": error }))
        }
    };

    match auth_helpers::issue_token(&config.jwt_secret, account_id, role, ong_id) {
        Ok(token) => HttpResponse::Ok().json(json!({
            "success": true,
            "token": token,
            "role": role.as_str(),
            "ong_id": ong_id,
            "name": name,
        })),
        Err(e) => {
            log::error!("Token issuance failed: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Could not issue a token."
            }))
        }
    }
}

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    address: String,
    phone: String,
    email: String,
    domains: String,
    password: String,
}

async fn register(
    pool: web::Data<crate::DbPool>,
    body: web::Json<RegisterRequest>,
) -> impl Responder {
    let req = body.into_inner();
    if req.name.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": "Name, email and password are mandatory."
        }));
    }

    let mut conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return db_error(),
    };
    if users_db_operations::email_exists(&conn, req.email.trim()) {
        return HttpResponse::Conflict().json(json!({
            "success": false,
            "error": "An account with this email already exists."
        }));
    }

    let new_ong = NewOng {
        name: sanitization_helpers::strip_all_html(req.name.trim()),
        address: sanitization_helpers::strip_all_html(req.address.trim()),
        phone: sanitization_helpers::strip_all_html(req.phone.trim()),
        email: req.email.trim().to_string(),
        domains: sanitization_helpers::strip_all_html(req.domains.trim()),
        logo_url: None,
        verification_doc_url: None,
    };

    let created = (|| -> Result<i64, rusqlite::Error> {
        let tx = conn.transaction()?;
        let user_id = users_db_operations::create_account(&tx, &new_ong.email, &req.password, Role::Ong)?;
        let ong_id = ong_db_operations::create_ong(&tx, &new_ong, user_id)?;
        tx.commit()?;
        Ok(ong_id)
    })();

    match created {
        Ok(ong_id) => HttpResponse::Created().json(json!({
            "success": true,
            "ong_id": ong_id,
            "status": ValidationStatus::Pending.as_str(),
        })),
        Err(e) => {
            log::error!("API registration failed: {}", e);
            HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Registration failed."
            }))
        }
    }
}

#[derive(Deserialize)]
struct CaseQuery {
    page: Option<u32>,
    category: Option<i64>,
    ong: Option<i64>,
    q: Option<String>,
}

async fn list_cases(
    pool: web::Data<crate::DbPool>,
    query: web::Query<CaseQuery>,
) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return db_error(),
    };
    let filter = CaseFilter {
        category_id: query.category,
        ong_id: query.ong,
        query: query.q.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
    };

    match public_helpers::paginate_approved(&conn, &filter, query.page.unwrap_or(1)) {
        Ok(page) => HttpResponse::Ok().json(json!({
            "success": true,
            "cases": page.items,
            "page": page.page,
            "total_pages": page.total_pages,
            "total": page.total,
        })),
        Err(e) => {
            log::error!("API case listing failed: {}", e);
            db_error()
        }
    }
}

async fn case_detail(
    auth: Option<ApiAuth>,
    pool: web::Data<crate::DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    let case_id = path.into_inner();
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return db_error(),
    };

    let viewer = match &auth {
        Some(a) if a.is_admin() => public_helpers::Viewer::Admin,
        Some(a) => a.ong_id.map(public_helpers::Viewer::Ong).unwrap_or(public_helpers::Viewer::Public),
        None => public_helpers::Viewer::Public,
    };
    let case = match public_helpers::fetch_case_detail(&conn, case_id, viewer) {
        Some(c) => c,
        None => return not_found("Case"),
    };

    HttpResponse::Ok().json(json!({
        "success": true,
        "case": case,
        "media": media_db_operations::read_media_for_case(&conn, case_id).unwrap_or_default(),
        "beneficiaries": case_db_operations::read_beneficiaries_for_case(&conn, case_id).unwrap_or_default(),
    }))
}

const MEDIA_SPECS: [media_helpers::UploadSpec; 1] =
    [media_helpers::UploadSpec { field: "media", subdir: "media", prefix: "" }];

async fn add_case(
    auth: ApiAuth,
    pool: web::Data<crate::DbPool>,
    config: web::Data<Config>,
    payload: Multipart,
) -> impl Responder {
    let ong_id = match auth.ong_id {
        Some(id) if auth.role == Role::Ong => id,
        _ => return forbidden(),
    };
    let uploads_root = PathBuf::from(&config.uploads_path);
    let submission = match media_helpers::collect_multipart(payload, &uploads_root, &MEDIA_SPECS).await
    {
        Ok(s) => s,
        Err(e) => {
            return HttpResponse::BadRequest()
                .json(json!({ "success": false, "error": format!("Upload failed: {}", e) }))
        }
    };

    let (title, description) = match (submission.field("title"), submission.field("description")) {
        (Some(t), Some(d)) => (
            sanitization_helpers::strip_all_html(t),
            sanitization_helpers::strip_all_html(d),
        ),
        _ => {
            media_helpers::discard_saved_files(&uploads_root, &submission);
            return HttpResponse::BadRequest().json(json!({
                "success": false,
                "error": "Title and description are mandatory."
            }));
        }
    };
    let category_id = match submission.field("category_id").and_then(|v| v.parse::<i64>().ok()) {
        Some(id) => id,
        None => {
            media_helpers::discard_saved_files(&uploads_root, &submission);
            return HttpResponse::BadRequest().json(json!({
                "success": false,
                "error": "A category is mandatory."
            }));
        }
    };
    let new_case = NewCase {
        title,
        description,
        address: submission.field("address").map(sanitization_helpers::strip_all_html),
        wilaya: submission.field("wilaya").map(sanitization_helpers::strip_all_html),
        moughataa: submission.field("moughataa").map(sanitization_helpers::strip_all_html),
        published_on: submission
            .field("published_on")
            .map(|s| s.to_string())
            .or_else(|| Some(chrono::Utc::now().format("%Y-%m-%d").to_string())),
        status: submission.field("status").and_then(CaseStatus::parse).unwrap_or(CaseStatus::Ongoing),
        latitude: submission.field("latitude").and_then(|v| v.parse::<f64>().ok()),
        longitude: submission.field("longitude").and_then(|v| v.parse::<f64>().ok()),
        ong_id,
        category_id: Some(category_id),
    };

    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => {
            media_helpers::discard_saved_files(&uploads_root, &submission);
            return db_error();
        }
    };

    match case_db_operations::create_case(&conn, &new_case) {
        Ok(case_id) => {
            for url in submission.files.get("media").map(|v| v.as_slice()).unwrap_or_default() {
                if let Err(e) = media_db_operations::add_media(&conn, case_id, url, None) {
                    log::error!("Media row for '{}' was not recorded: {}", url, e);
                }
            }
            HttpResponse::Created().json(json!({
                "success": true,
                "case_id": case_id,
                "approval_status": ApprovalStatus::Pending.as_str(),
            }))
        }
        Err(e) => {
            log::error!("API case creation failed: {}", e);
            media_helpers::discard_saved_files(&uploads_root, &submission);
            db_error()
        }
    }
}

async fn edit_case(
    auth: ApiAuth,
    pool: web::Data<crate::DbPool>,
    config: web::Data<Config>,
    path: web::Path<i64>,
    payload: Multipart,
) -> impl Responder {
    let case_id = path.into_inner();
    let uploads_root = PathBuf::from(&config.uploads_path);
    let submission = match media_helpers::collect_multipart(payload, &uploads_root, &MEDIA_SPECS).await
    {
        Ok(s) => s,
        Err(e) => {
            return HttpResponse::BadRequest()
                .json(json!({ "success": false, "error": format!("Upload failed: {}", e) }))
        }
    };

    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => {
            media_helpers::discard_saved_files(&uploads_root, &submission);
            return db_error();
        }
    };
    let case = match case_db_operations::read_case_by_id(&conn, case_id) {
        Some(c) => c,
        None => {
            media_helpers::discard_saved_files(&uploads_root, &submission);
            return not_found("Case");
        }
    };
    if !auth.is_admin() && auth.ong_id != Some(case.ong_id) {
        media_helpers::discard_saved_files(&uploads_root, &submission);
        return forbidden();
    }

    let patch = CasePatch {
        title: submission.field("title").map(sanitization_helpers::strip_all_html),
        description: submission.field("description").map(sanitization_helpers::strip_all_html),
        address: submission.field("address").map(sanitization_helpers::strip_all_html),
        wilaya: submission.field("wilaya").map(sanitization_helpers::strip_all_html),
        moughataa: submission.field("moughataa").map(sanitization_helpers::strip_all_html),
        published_on: submission.field("published_on").map(|s| s.to_string()),
        status: submission.field("status").and_then(CaseStatus::parse),
        latitude: submission.field("latitude").and_then(|v| v.parse::<f64>().ok()),
        longitude: submission.field("longitude").and_then(|v| v.parse::<f64>().ok()),
        category_id: submission.field("category_id").and_then(|v| v.parse::<i64>().ok()),
    };

    let saved = (|| -> Result<(), rusqlite::Error> {
        case_db_operations::update_case(&conn, case_id, &patch)?;
        for url in submission.files.get("media").map(|v| v.as_slice()).unwrap_or_default() {
            media_db_operations::add_media(&conn, case_id, url, None)?;
        }
        Ok(())
    })();

    match saved {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true, "case_id": case_id })),
        Err(e) => {
            log::error!("API case {} update failed: {}", case_id, e);
            media_helpers::discard_saved_files(&uploads_root, &submission);
            db_error()
        }
    }
}

async fn delete_case(
    auth: ApiAuth,
    pool: web::Data<crate::DbPool>,
    config: web::Data<Config>,
    path: web::Path<i64>,
) -> impl Responder {
    let case_id = path.into_inner();
    {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return db_error(),
        };
        if let Some(case) = case_db_operations::read_case_by_id(&conn, case_id) {
            if !auth.is_admin() && auth.ong_id != Some(case.ong_id) {
                return forbidden();
            }
        }
    }

    let uploads_root = PathBuf::from(&config.uploads_path);
    let pool_for_block = pool.clone();
    let purged = web::block(move || {
        let mut conn = pool_for_block.get()?;
        moderation_helpers::purge_case(&mut conn, &uploads_root, case_id)
    })
    .await;

    match purged {
        Ok(Ok(manifest)) => HttpResponse::Ok().json(json!({ "success": true, "purged": manifest })),
        Ok(Err(e)) => {
            log::error!("API purge of case {} failed: {}", case_id, e);
            db_error()
        }
        Err(e) => {
            log::error!("Blocking error while purging case {}: {}", case_id, e);
            db_error()
        }
    }
}

async fn own_cases(auth: ApiAuth, pool: web::Data<crate::DbPool>) -> impl Responder {
    let ong_id = match auth.ong_id {
        Some(id) if auth.role == Role::Ong => id,
        _ => return forbidden(),
    };
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return db_error(),
    };
    match case_db_operations::read_cases_for_ong(&conn, ong_id) {
        Ok(cases) => HttpResponse::Ok().json(json!({ "success": true, "cases": cases })),
        Err(e) => {
            log::error!("API own-case listing failed: {}", e);
            db_error()
        }
    }
}

async fn own_profile(auth: ApiAuth, pool: web::Data<crate::DbPool>) -> impl Responder {
    let ong_id = match auth.ong_id {
        Some(id) if auth.role == Role::Ong => id,
        _ => return forbidden(),
    };
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return db_error(),
    };
    match ong_db_operations::read_ong_by_id(&conn, ong_id) {
        Some(ong) => HttpResponse::Ok().json(json!({ "success": true, "ong": ong })),
        None => not_found("Organisation"),
    }
}

#[derive(Deserialize)]
struct ProfileUpdateRequest {
    name: Option<String>,
    address: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    domains: Option<String>,
}

async fn update_profile(
    auth: ApiAuth,
    pool: web::Data<crate::DbPool>,
    body: web::Json<ProfileUpdateRequest>,
) -> impl Responder {
    let ong_id = match auth.ong_id {
        Some(id) if auth.role == Role::Ong => id,
        _ => return forbidden(),
    };
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return db_error(),
    };
    let current = match ong_db_operations::read_ong_by_id(&conn, ong_id) {
        Some(o) => o,
        None => return not_found("Organisation"),
    };

    let req = body.into_inner();
    let clean = |v: Option<String>, fallback: &str| {
        v.map(|s| sanitization_helpers::strip_all_html(s.trim()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| fallback.to_string())
    };
    let name = clean(req.name, &current.name);
    let address = clean(req.address, &current.address);
    let phone = clean(req.phone, &current.phone);
    let domains = clean(req.domains, &current.domains);
    let email = req
        .email
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| current.email.clone());

    if email != current.email && users_db_operations::email_exists(&conn, &email) {
        return HttpResponse::Conflict().json(json!({
            "success": false,
            "error": "An account with this email already exists."
        }));
    }

    let updated = (|| -> Result<(), rusqlite::Error> {
        ong_db_operations::update_ong(&conn, ong_id, &name, &address, &phone, &email, &domains)?;
        if email != current.email {
            if let Some(user_id) = current.user_id {
                users_db_operations::update_account_email(&conn, user_id, &email)?;
            }
        }
        Ok(())
    })();

    match updated {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => {
            log::error!("API profile update for ONG {} failed: {}", ong_id, e);
            db_error()
        }
    }
}

async fn list_ongs(pool: web::Data<crate::DbPool>) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return db_error(),
    };
    match ong_db_operations::read_ongs_by_status(&conn, ValidationStatus::Validated) {
        Ok(ongs) => HttpResponse::Ok().json(json!({ "success": true, "ongs": ongs })),
        Err(e) => {
            log::error!("API ONG listing failed: {}", e);
            db_error()
        }
    }
}

async fn ong_detail(
    auth: Option<ApiAuth>,
    pool: web::Data<crate::DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    let ong_id = path.into_inner();
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return db_error(),
    };
    let ong = match ong_db_operations::read_ong_by_id(&conn, ong_id) {
        Some(o) => o,
        None => return not_found("Organisation"),
    };

    let is_admin = auth.as_ref().map(|a| a.is_admin()).unwrap_or(false);
    let is_owner = auth.as_ref().and_then(|a| a.ong_id) == Some(ong_id);
    if ong.validation_status != ValidationStatus::Validated && !is_admin && !is_owner {
        return not_found("Organisation");
    }

    let filter = CaseFilter { ong_id: Some(ong_id), ..Default::default() };
    HttpResponse::Ok().json(json!({
        "success": true,
        "ong": ong,
        "cases": case_db_operations::read_approved_cases(&conn, &filter).unwrap_or_default(),
    }))
}

async fn list_categories(pool: web::Data<crate::DbPool>) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return db_error(),
    };
    match case_db_operations::read_all_categories(&conn) {
        Ok(categories) => HttpResponse::Ok().json(json!({ "success": true, "categories": categories })),
        Err(e) => {
            log::error!("API category listing failed: {}", e);
            db_error()
        }
    }
}

async fn list_notifications(pool: web::Data<crate::DbPool>) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return db_error(),
    };
    match notification_db_operations::read_latest(&conn, 50) {
        Ok(notifications) => {
            HttpResponse::Ok().json(json!({ "success": true, "notifications": notifications }))
        }
        Err(e) => {
            log::error!("API notification listing failed: {}", e);
            db_error()
        }
    }
}

async fn mark_notification_read(
    _auth: ApiAuth,
    pool: web::Data<crate::DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    let notification_id = path.into_inner();
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return db_error(),
    };
    match notification_db_operations::mark_read(&conn, notification_id) {
        Ok(changed) => HttpResponse::Ok().json(json!({ "success": true, "changed": changed > 0 })),
        Err(e) => {
            log::error!("API mark-read of notification {} failed: {}", notification_id, e);
            db_error()
        }
    }
}

async fn statistics(pool: web::Data<crate::DbPool>) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return db_error(),
    };
    match public_helpers::gather_statistics(&conn) {
        Ok(stats) => HttpResponse::Ok().json(json!({ "success": true, "statistics": stats })),
        Err(e) => {
            log::error!("API statistics failed: {}", e);
            db_error()
        }
    }
}

async fn pending_ongs(auth: ApiAuth, pool: web::Data<crate::DbPool>) -> impl Responder {
    if !auth.is_admin() {
        return forbidden();
    }
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return db_error(),
    };
    match ong_db_operations::read_ongs_by_status(&conn, ValidationStatus::Pending) {
        Ok(ongs) => HttpResponse::Ok().json(json!({ "success": true, "ongs": ongs })),
        Err(e) => {
            log::error!("API pending-ONG listing failed: {}", e);
            db_error()
        }
    }
}

async fn pending_cases(auth: ApiAuth, pool: web::Data<crate::DbPool>) -> impl Responder {
    if !auth.is_admin() {
        return forbidden();
    }
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return db_error(),
    };
    match case_db_operations::read_cases_by_approval(&conn, ApprovalStatus::Pending) {
        Ok(cases) => HttpResponse::Ok().json(json!({ "success": true, "cases": cases })),
        Err(e) => {
            log::error!("API pending-case listing failed: {}", e);
            db_error()
        }
    }
}

async fn admin_approve_ong(
    auth: ApiAuth,
    pool: web::Data<crate::DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    if !auth.is_admin() {
        return forbidden();
    }
    let ong_id = path.into_inner();
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return db_error(),
    };
    match moderation_helpers::approve_ong(&conn, ong_id) {
        Ok(changed) => HttpResponse::Ok().json(json!({ "success": true, "changed": changed })),
        Err(e) => {
            log::error!("API validation of ONG {} failed: {}", ong_id, e);
            db_error()
        }
    }
}

async fn admin_reject_ong(
    auth: ApiAuth,
    pool: web::Data<crate::DbPool>,
    config: web::Data<Config>,
    path: web::Path<i64>,
) -> impl Responder {
    if !auth.is_admin() {
        return forbidden();
    }
    let ong_id = path.into_inner();
    let uploads_root = PathBuf::from(&config.uploads_path);
    let pool_for_block = pool.clone();

    let purged = web::block(move || {
        let mut conn = pool_for_block.get()?;
        moderation_helpers::purge_ong(&mut conn, &uploads_root, ong_id)
    })
    .await;

    match purged {
        Ok(Ok(manifest)) => HttpResponse::Ok().json(json!({ "success": true, "purged": manifest })),
        Ok(Err(e)) => {
            log::error!("API rejection purge of ONG {} failed: {}", ong_id, e);
            db_error()
        }
        Err(e) => {
            log::error!("Blocking error while purging ONG {}: {}", ong_id, e);
            db_error()
        }
    }
}

async fn admin_approve_case(
    auth: ApiAuth,
    pool: web::Data<crate::DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    if !auth.is_admin() {
        return forbidden();
    }
    let case_id = path.into_inner();
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return db_error(),
    };
    match moderation_helpers::approve_case(&conn, case_id) {
        Ok(changed) => HttpResponse::Ok().json(json!({ "success": true, "changed": changed })),
        Err(e) => {
            log::error!("API approval of case {} failed: {}", case_id, e);
            db_error()
        }
    }
}

async fn admin_reject_case(
    auth: ApiAuth,
    pool: web::Data<crate::DbPool>,
    config: web::Data<Config>,
    path: web::Path<i64>,
) -> impl Responder {
    if !auth.is_admin() {
        return forbidden();
    }
    let case_id = path.into_inner();
    let uploads_root = PathBuf::from(&config.uploads_path);
    let pool_for_block = pool.clone();

    let purged = web::block(move || {
        let mut conn = pool_for_block.get()?;
        moderation_helpers::purge_case(&mut conn, &uploads_root, case_id)
    })
    .await;

    match purged {
        Ok(Ok(manifest)) => HttpResponse::Ok().json(json!({ "success": true, "purged": manifest })),
        Ok(Err(e)) => {
            log::error!("API rejection purge of case {} failed: {}", case_id, e);
            db_error()
        }
        Err(e) => {
            log::error!("Blocking error while purging case {}: {}", case_id, e);
            db_error()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_profile_is_not_bad_credentials() {
        let (missing_status, missing_error) =
            resolve_login(AuthOutcome::ProfileMissing).unwrap_err();
        let (invalid_status, invalid_error) =
            resolve_login(AuthOutcome::InvalidCredentials).unwrap_err();

        assert_eq!(missing_status, StatusCode::FORBIDDEN);
        assert_eq!(invalid_status, StatusCode::UNAUTHORIZED);
        assert_ne!(missing_error, invalid_error);
    }

    #[test]
    fn unvalidated_outcomes_never_yield_claims() {
        assert!(resolve_login(AuthOutcome::PendingApproval).is_err());
        assert!(resolve_login(AuthOutcome::Rejected).is_err());
    }
}
