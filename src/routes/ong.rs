use crate::config::Config;
use crate::helper::{auth_helpers, form_helpers, media_helpers, moderation_helpers, sanitization_helpers};
use crate::middleware::AuthenticatedUser;
use crate::models::db_operations::{
    case_db_operations, media_db_operations, ong_db_operations, users_db_operations,
};
use crate::models::{CasePatch, CaseStatus, NewCase, SocialCase};
use crate::routes::public::render;
use actix_multipart::Multipart;
use actix_session::Session;
use actix_web::{web, HttpResponse, Responder};
use std::fs;
use std::path::PathBuf;
use tera::{Context, Tera};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/ong/dashboard", web::get().to(dashboard))
        .route("/ong/profile", web::get().to(show_profile))
        .route("/ong/profile", web::post().to(handle_profile_update))
        .route("/ong/case/{id}", web::get().to(show_case_management))
        .route("/cases", web::get().to(list_cases))
        .route("/cases/add", web::get().to(show_add_case))
        .route("/cases/add", web::post().to(handle_add_case))
        .route("/cases/edit/{id}", web::get().to(show_edit_case))
        .route("/cases/edit/{id}", web::post().to(handle_edit_case))
        .route("/cases/update-status/{id}", web::post().to(handle_update_status))
        .route("/cases/delete/{id}", web::post().to(handle_delete_case))
        .route("/media/delete/{id}", web::post().to(handle_delete_media))
        .route("/beneficiaries/add", web::post().to(handle_add_beneficiary))
        .route("/beneficiaries/edit/{id}", web::post().to(handle_edit_beneficiary))
        .route("/beneficiaries/delete/{id}", web::post().to(handle_delete_beneficiary));
}

fn redirect(url: &str) -> HttpResponse {
    HttpResponse::Found().append_header(("location", url)).finish()
}

/// Admins can manage any case, an organisation only its own.
fn can_manage(user: &AuthenticatedUser, case: &SocialCase) -> bool {
    user.is_admin() || user.ong_id() == Some(case.ong_id)
}

const MEDIA_SPECS: [media_helpers::UploadSpec; 1] =
    [media_helpers::UploadSpec { field: "media", subdir: "media", prefix: "" }];

async fn dashboard(
    user: AuthenticatedUser,
    session: Session,
    tera: web::Data<Tera>,
    pool: web::Data<crate::DbPool>,
) -> impl Responder {
    let ong_id = match user.ong_id() {
        Some(id) => id,
        None => return redirect("/admin/dashboard"),
    };
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };

    let ong = match ong_db_operations::read_ong_by_id(&conn, ong_id) {
        Some(o) => o,
        None => {
            session.clear();
            return redirect("/login");
        }
    };
    let cases = case_db_operations::read_cases_for_ong(&conn, ong_id).unwrap_or_default();
    let pending = cases
        .iter()
        .filter(|c| c.approval_status == crate::models::ApprovalStatus::Pending)
        .count();

    let mut ctx = Context::new();
    ctx.insert("ong", &ong);
    ctx.insert("cases", &cases);
    ctx.insert("pending_count", &pending);
    ctx.insert("user", &user);
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "ong/dashboard.html", &ctx)
}

/// Management listing: admins see every case, an organisation its own.
async fn list_cases(
    user: AuthenticatedUser,
    session: Session,
    tera: web::Data<Tera>,
    pool: web::Data<crate::DbPool>,
) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };

    let cases = match user.ong_id() {
        Some(ong_id) => case_db_operations::read_cases_for_ong(&conn, ong_id).unwrap_or_default(),
        None => case_db_operations::read_all_cases(&conn).unwrap_or_default(),
    };

    let mut ctx = Context::new();
    ctx.insert("cases", &cases);
    ctx.insert("user", &user);
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "ong/cases.html", &ctx)
}

/// Owner's working view of a case, with its media and beneficiaries.
async fn show_case_management(
    user: AuthenticatedUser,
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
    let case = match case_db_operations::read_case_by_id(&conn, case_id) {
        Some(c) => c,
        None => return HttpResponse::NotFound().body("Case not found."),
    };
    if !can_manage(&user, &case) {
        return HttpResponse::Forbidden().body("Permission denied.");
    }

    let mut ctx = Context::new();
    ctx.insert("case", &case);
    ctx.insert("media", &media_db_operations::read_media_for_case(&conn, case_id).unwrap_or_default());
    ctx.insert(
        "beneficiaries",
        &case_db_operations::read_beneficiaries_for_case(&conn, case_id).unwrap_or_default(),
    );
    ctx.insert("user", &user);
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "ong/case_detail.html", &ctx)
}

async fn show_profile(
    user: AuthenticatedUser,
    session: Session,
    tera: web::Data<Tera>,
    pool: web::Data<crate::DbPool>,
) -> impl Responder {
    let ong_id = match user.ong_id() {
        Some(id) => id,
        None => return redirect("/admin/dashboard"),
    };
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };
    let ong = match ong_db_operations::read_ong_by_id(&conn, ong_id) {
        Some(o) => o,
        None => return HttpResponse::NotFound().body("Organisation not found."),
    };

    let mut ctx = Context::new();
    ctx.insert("ong", &ong);
    ctx.insert("user", &user);
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "ong/profile.html", &ctx)
}

async fn handle_profile_update(
    user: AuthenticatedUser,
    session: Session,
    pool: web::Data<crate::DbPool>,
    config: web::Data<Config>,
    payload: Multipart,
) -> impl Responder {
    let ong_id = match user.ong_id() {
        Some(id) => id,
        None => return redirect("/admin/dashboard"),
    };
    let uploads_root = PathBuf::from(&config.uploads_path);
    let specs = [
        media_helpers::UploadSpec { field: "logo", subdir: "logos", prefix: "logo_" },
        media_helpers::UploadSpec { field: "verification_doc", subdir: "docs", prefix: "doc_" },
    ];
    let submission = match media_helpers::collect_multipart(payload, &uploads_root, &specs).await {
        Ok(s) => s,
        Err(e) => {
            form_helpers::set_flash(&session, &format!("Upload failed: {}", e), "error");
            return redirect("/ong/profile");
        }
    };

    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => {
            media_helpers::discard_saved_files(&uploads_root, &submission);
            return HttpResponse::InternalServerError().body("Database unavailable.");
        }
    };
    let current = match ong_db_operations::read_ong_by_id(&conn, ong_id) {
        Some(o) => o,
        None => {
            media_helpers::discard_saved_files(&uploads_root, &submission);
            return HttpResponse::NotFound().body("Organisation not found.");
        }
    };

    let name = submission
        .field("name")
        .map(sanitization_helpers::strip_all_html)
        .unwrap_or_else(|| current.name.clone());
    let address = submission
        .field("address")
        .map(sanitization_helpers::strip_all_html)
        .unwrap_or_else(|| current.address.clone());
    let phone = submission
        .field("phone")
        .map(sanitization_helpers::strip_all_html)
        .unwrap_or_else(|| current.phone.clone());
    let domains = submission
        .field("domains")
        .map(sanitization_helpers::strip_all_html)
        .unwrap_or_else(|| current.domains.clone());
    let email = submission.field("email").map(|s| s.to_string()).unwrap_or_else(|| current.email.clone());

    if email != current.email && users_db_operations::email_exists(&conn, &email) {
        media_helpers::discard_saved_files(&uploads_root, &submission);
        form_helpers::set_flash(&session, "An account with this email already exists.", "error");
        return redirect("/ong/profile");
    }

    let updated = (|| -> Result<(), rusqlite::Error> {
        ong_db_operations::update_ong(&conn, ong_id, &name, &address, &phone, &email, &domains)?;
        if email != current.email {
            if let Some(user_id) = current.user_id {
                users_db_operations::update_account_email(&conn, user_id, &email)?;
            }
        }
        if let Some(logo_url) = submission.first_file("logo") {
            ong_db_operations::update_logo(&conn, ong_id, logo_url)?;
            replace_file(&uploads_root, current.logo_url.as_deref());
        }
        if let Some(doc_url) = submission.first_file("verification_doc") {
            ong_db_operations::update_verification_doc(&conn, ong_id, doc_url)?;
            replace_file(&uploads_root, current.verification_doc_url.as_deref());
        }
        Ok(())
    })();

    match updated {
        Ok(()) => {
            // Keep the greeting in the navbar current.
            session.insert("name", &name).ok();
            form_helpers::set_flash(&session, "Profile updated.", "success");
        }
        Err(e) => {
            log::error!("Profile update for ONG {} failed: {}", ong_id, e);
            media_helpers::discard_saved_files(&uploads_root, &submission);
            form_helpers::set_flash(&session, "Profile update failed. Please retry.", "error");
        }
    }
    redirect("/ong/profile")
}

/// Removes the previous upload once its replacement is stored. Best effort.
fn replace_file(uploads_root: &std::path::Path, old_url: Option<&str>) {
    if let Some(path) = old_url.and_then(|u| media_helpers::resolve_upload_path(uploads_root, u)) {
        fs::remove_file(&path).unwrap_or_else(|e| {
            log::warn!("Replaced file '{}' was not removed: {}", path.display(), e)
        });
    }
}

async fn show_add_case(
    user: AuthenticatedUser,
    session: Session,
    tera: web::Data<Tera>,
    pool: web::Data<crate::DbPool>,
) -> impl Responder {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };
    let mut ctx = Context::new();
    ctx.insert("categories", &case_db_operations::read_all_categories(&conn).unwrap_or_default());
    // Admins create on behalf of an organisation they pick in the form.
    if user.is_admin() {
        ctx.insert("ongs", &ong_db_operations::read_all_ongs(&conn).unwrap_or_default());
    }
    ctx.insert("user", &user);
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "ong/case_form.html", &ctx)
}

async fn handle_add_case(
    user: AuthenticatedUser,
    session: Session,
    pool: web::Data<crate::DbPool>,
    config: web::Data<Config>,
    payload: Multipart,
) -> impl Responder {
    let uploads_root = PathBuf::from(&config.uploads_path);
    let submission = match media_helpers::collect_multipart(payload, &uploads_root, &MEDIA_SPECS).await
    {
        Ok(s) => s,
        Err(e) => {
            form_helpers::set_flash(&session, &format!("Upload failed: {}", e), "error");
            return redirect("/cases/add");
        }
    };

    // Admins must name the organisation the case belongs to.
    let ong_id = match user.ong_id() {
        Some(id) => id,
        None => match submission.field("ong_id").and_then(|v| v.parse::<i64>().ok()) {
            Some(id) => id,
            None => {
                media_helpers::discard_saved_files(&uploads_root, &submission);
                form_helpers::set_flash(&session, "Select the organisation this case belongs to.", "error");
                return redirect("/cases/add");
            }
        },
    };

    let (title, description) = match (submission.field("title"), submission.field("description")) {
        (Some(t), Some(d)) => (
            sanitization_helpers::strip_all_html(t),
            sanitization_helpers::strip_all_html(d),
        ),
        _ => {
            media_helpers::discard_saved_files(&uploads_root, &submission);
            form_helpers::set_flash(&session, "Title and description are mandatory.", "error");
            return redirect("/cases/add");
        }
    };
    let category_id = match submission.field("category_id").and_then(|v| v.parse::<i64>().ok()) {
        Some(id) => id,
        None => {
            media_helpers::discard_saved_files(&uploads_root, &submission);
            form_helpers::set_flash(&session, "A category is mandatory.", "error");
            return redirect("/cases/add");
        }
    };
    let status = submission
        .field("status")
        .and_then(CaseStatus::parse)
        .unwrap_or(CaseStatus::Ongoing);
    let new_case = NewCase {
        title,
        description,
        address: submission.field("address").map(sanitization_helpers::strip_all_html),
        wilaya: submission.field("wilaya").map(sanitization_helpers::strip_all_html),
        moughataa: submission.field("moughataa").map(sanitization_helpers::strip_all_html),
        // Publication date defaults to today when the form leaves it blank.
        published_on: submission
            .field("published_on")
            .map(|s| s.to_string())
            .or_else(|| Some(chrono::Utc::now().format("%Y-%m-%d").to_string())),
        status,
        latitude: submission.field("latitude").and_then(|v| v.parse::<f64>().ok()),
        longitude: submission.field("longitude").and_then(|v| v.parse::<f64>().ok()),
        ong_id,
        category_id: Some(category_id),
    };

    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => {
            media_helpers::discard_saved_files(&uploads_root, &submission);
            return HttpResponse::InternalServerError().body("Database unavailable.");
        }
    };

    match case_db_operations::create_case(&conn, &new_case) {
        Ok(case_id) => {
            for url in submission.files.get("media").map(|v| v.as_slice()).unwrap_or_default() {
                if let Err(e) = media_db_operations::add_media(&conn, case_id, url, None) {
                    log::error!("Media row for '{}' was not recorded: {}", url, e);
                }
            }
            form_helpers::set_flash(
                &session,
                "Case submitted. It will appear publicly once approved.",
                "success",
            );
            if user.is_admin() {
                redirect("/cases")
            } else {
                redirect("/ong/dashboard")
            }
        }
        Err(e) => {
            log::error!("Case creation for ONG {} failed: {}", ong_id, e);
            media_helpers::discard_saved_files(&uploads_root, &submission);
            form_helpers::set_flash(&session, "The case could not be saved. Please retry.", "error");
            redirect("/cases/add")
        }
    }
}

async fn show_edit_case(
    user: AuthenticatedUser,
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
    let case = match case_db_operations::read_case_by_id(&conn, case_id) {
        Some(c) => c,
        None => return HttpResponse::NotFound().body("Case not found."),
    };
    if !can_manage(&user, &case) {
        return HttpResponse::Forbidden().body("Permission denied.");
    }

    let mut ctx = Context::new();
    ctx.insert("case", &case);
    ctx.insert("categories", &case_db_operations::read_all_categories(&conn).unwrap_or_default());
    ctx.insert("media", &media_db_operations::read_media_for_case(&conn, case_id).unwrap_or_default());
    ctx.insert(
        "beneficiaries",
        &case_db_operations::read_beneficiaries_for_case(&conn, case_id).unwrap_or_default(),
    );
    ctx.insert("user", &user);
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "ong/case_form.html", &ctx)
}

async fn handle_edit_case(
    user: AuthenticatedUser,
    session: Session,
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
            form_helpers::set_flash(&session, &format!("Upload failed: {}", e), "error");
            return redirect(&format!("/cases/edit/{}", case_id));
        }
    };

    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => {
            media_helpers::discard_saved_files(&uploads_root, &submission);
            return HttpResponse::InternalServerError().body("Database unavailable.");
        }
    };
    let case = match case_db_operations::read_case_by_id(&conn, case_id) {
        Some(c) => c,
        None => {
            media_helpers::discard_saved_files(&uploads_root, &submission);
            return HttpResponse::NotFound().body("Case not found.");
        }
    };
    if !can_manage(&user, &case) {
        media_helpers::discard_saved_files(&uploads_root, &submission);
        return HttpResponse::Forbidden().body("Permission denied.");
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
        Ok(()) => form_helpers::set_flash(&session, "Case updated.", "success"),
        Err(e) => {
            log::error!("Case {} update failed: {}", case_id, e);
            media_helpers::discard_saved_files(&uploads_root, &submission);
            form_helpers::set_flash(&session, "The case could not be updated. Please retry.", "error");
        }
    }
    redirect(&format!("/cases/edit/{}", case_id))
}

async fn handle_update_status(
    user: AuthenticatedUser,
    session: Session,
    pool: web::Data<crate::DbPool>,
    path: web::Path<i64>,
    body: web::Bytes,
) -> impl Responder {
    let case_id = path.into_inner();
    let form = match form_helpers::parse_form(&body) {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };
    let case = match case_db_operations::read_case_by_id(&conn, case_id) {
        Some(c) => c,
        None => return HttpResponse::NotFound().body("Case not found."),
    };
    if !can_manage(&user, &case) {
        return HttpResponse::Forbidden().body("Permission denied.");
    }

    let status = match form_helpers::get_trimmed(&form, "status").and_then(CaseStatus::parse) {
        Some(s) => s,
        None => {
            form_helpers::set_flash(&session, "Invalid status value.", "error");
            return redirect(&format!("/public/case/{}", case_id));
        }
    };

    match case_db_operations::update_case_status(&conn, case_id, status) {
        Ok(_) => form_helpers::set_flash(&session, "Status updated.", "success"),
        Err(e) => {
            log::error!("Status change on case {} failed: {}", case_id, e);
            form_helpers::set_flash(&session, "The status could not be changed.", "error");
        }
    }
    redirect(&format!("/public/case/{}", case_id))
}

async fn handle_delete_case(
    user: AuthenticatedUser,
    session: Session,
    pool: web::Data<crate::DbPool>,
    config: web::Data<Config>,
    path: web::Path<i64>,
    body: web::Bytes,
) -> impl Responder {
    let case_id = path.into_inner();
    let form = match form_helpers::parse_form(&body) {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
        };
        if let Some(case) = case_db_operations::read_case_by_id(&conn, case_id) {
            if !can_manage(&user, &case) {
                return HttpResponse::Forbidden().body("Permission denied.");
            }
            // Organisations must re-type their password before a hard delete.
            if let Some(ong_id) = user.ong_id() {
                let candidate = form.get("password").cloned().unwrap_or_default();
                let ong = match ong_db_operations::read_ong_by_id(&conn, ong_id) {
                    Some(o) => o,
                    None => return HttpResponse::Forbidden().body("Permission denied."),
                };
                match auth_helpers::verify_destructive_password(&conn, &ong, &candidate) {
                    Ok(true) => {}
                    Ok(false) => {
                        form_helpers::set_flash(&session, "Incorrect password. The case was not deleted.", "error");
                        return redirect(&format!("/public/case/{}", case_id));
                    }
                    Err(e) => {
                        log::error!("Password re-check before delete failed: {}", e);
                        return HttpResponse::InternalServerError().body("Database error.");
                    }
                }
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
        Ok(Ok(manifest)) => {
            form_helpers::set_flash(
                &session,
                &format!(
                    "Case deleted: {} case(s), {} media item(s), {} beneficiary record(s) removed.",
                    manifest.cases_deleted, manifest.media_deleted, manifest.beneficiaries_deleted
                ),
                "success",
            );
            if user.is_admin() {
                redirect("/admin/dashboard")
            } else {
                redirect("/ong/dashboard")
            }
        }
        Ok(Err(e)) => {
            log::error!("Purge of case {} failed: {}", case_id, e);
            form_helpers::set_flash(&session, "The case could not be deleted. Please retry.", "error");
            redirect(&format!("/public/case/{}", case_id))
        }
        Err(e) => {
            log::error!("Blocking error while purging case {}: {}", case_id, e);
            HttpResponse::InternalServerError().body("Internal error.")
        }
    }
}

async fn handle_delete_media(
    user: AuthenticatedUser,
    session: Session,
    pool: web::Data<crate::DbPool>,
    config: web::Data<Config>,
    path: web::Path<i64>,
) -> impl Responder {
    let media_id = path.into_inner();
    let caller = match user.ong_id() {
        Some(id) => media_helpers::MediaCaller::Ong(id),
        None => media_helpers::MediaCaller::Admin,
    };
    let uploads_root = PathBuf::from(&config.uploads_path);

    match media_helpers::detach_media(&pool, uploads_root, media_id, &caller).await {
        Ok(case_id) => {
            form_helpers::set_flash(&session, "Media removed.", "success");
            redirect(&format!("/cases/edit/{}", case_id))
        }
        Err(e) => {
            form_helpers::set_flash(&session, &format!("Media was not removed: {}", e), "error");
            redirect(if user.is_admin() { "/admin/dashboard" } else { "/ong/dashboard" })
        }
    }
}

async fn handle_add_beneficiary(
    user: AuthenticatedUser,
    session: Session,
    pool: web::Data<crate::DbPool>,
    body: web::Bytes,
) -> impl Responder {
    let form = match form_helpers::parse_form(&body) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let case_id = match form_helpers::get_i64(&form, "case_id") {
        Some(id) => id,
        None => return HttpResponse::BadRequest().body("Missing case id."),
    };
    let last_name = match form_helpers::get_trimmed(&form, "last_name") {
        Some(n) => sanitization_helpers::strip_all_html(n),
        None => {
            form_helpers::set_flash(&session, "The beneficiary's last name is mandatory.", "error");
            return redirect(&format!("/cases/edit/{}", case_id));
        }
    };

    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };
    let case = match case_db_operations::read_case_by_id(&conn, case_id) {
        Some(c) => c,
        None => return HttpResponse::NotFound().body("Case not found."),
    };
    if !can_manage(&user, &case) {
        return HttpResponse::Forbidden().body("Permission denied.");
    }

    let result = case_db_operations::create_beneficiary(
        &conn,
        &last_name,
        form_helpers::get_trimmed(&form, "first_name").map(sanitization_helpers::strip_all_html).as_deref(),
        form_helpers::get_trimmed(&form, "address").map(sanitization_helpers::strip_all_html).as_deref(),
        form_helpers::get_trimmed(&form, "situation").map(sanitization_helpers::strip_all_html).as_deref(),
        case_id,
    );
    match result {
        Ok(_) => form_helpers::set_flash(&session, "Beneficiary added.", "success"),
        Err(e) => {
            log::error!("Beneficiary insert on case {} failed: {}", case_id, e);
            form_helpers::set_flash(&session, "The beneficiary could not be saved.", "error");
        }
    }
    redirect(&format!("/cases/edit/{}", case_id))
}

async fn handle_edit_beneficiary(
    user: AuthenticatedUser,
    session: Session,
    pool: web::Data<crate::DbPool>,
    path: web::Path<i64>,
    body: web::Bytes,
) -> impl Responder {
    let beneficiary_id = path.into_inner();
    let form = match form_helpers::parse_form(&body) {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };
    let beneficiary = match case_db_operations::read_beneficiary_by_id(&conn, beneficiary_id) {
        Some(b) => b,
        None => return HttpResponse::NotFound().body("Beneficiary not found."),
    };
    let case = match case_db_operations::read_case_by_id(&conn, beneficiary.case_id) {
        Some(c) => c,
        None => return HttpResponse::NotFound().body("Case not found."),
    };
    if !can_manage(&user, &case) {
        return HttpResponse::Forbidden().body("Permission denied.");
    }

    let last_name = form_helpers::get_trimmed(&form, "last_name")
        .map(sanitization_helpers::strip_all_html)
        .unwrap_or_else(|| beneficiary.last_name.clone());
    let result = case_db_operations::update_beneficiary(
        &conn,
        beneficiary_id,
        &last_name,
        form_helpers::get_trimmed(&form, "first_name").map(sanitization_helpers::strip_all_html).as_deref(),
        form_helpers::get_trimmed(&form, "address").map(sanitization_helpers::strip_all_html).as_deref(),
        form_helpers::get_trimmed(&form, "situation").map(sanitization_helpers::strip_all_html).as_deref(),
    );
    match result {
        Ok(_) => form_helpers::set_flash(&session, "Beneficiary updated.", "success"),
        Err(e) => {
            log::error!("Beneficiary {} update failed: {}", beneficiary_id, e);
            form_helpers::set_flash(&session, "The beneficiary could not be updated.", "error");
        }
    }
    redirect(&format!("/cases/edit/{}", beneficiary.case_id))
}

async fn handle_delete_beneficiary(
    user: AuthenticatedUser,
    session: Session,
    pool: web::Data<crate::DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    let beneficiary_id = path.into_inner();
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };
    let beneficiary = match case_db_operations::read_beneficiary_by_id(&conn, beneficiary_id) {
        Some(b) => b,
        None => return HttpResponse::NotFound().body("Beneficiary not found."),
    };
    let case = match case_db_operations::read_case_by_id(&conn, beneficiary.case_id) {
        Some(c) => c,
        None => return HttpResponse::NotFound().body("Case not found."),
    };
    if !can_manage(&user, &case) {
        return HttpResponse::Forbidden().body("Permission denied.");
    }

    match case_db_operations::delete_beneficiary(&conn, beneficiary_id) {
        Ok(_) => form_helpers::set_flash(&session, "Beneficiary removed.", "success"),
        Err(e) => {
            log::error!("Beneficiary {} delete failed: {}", beneficiary_id, e);
            form_helpers::set_flash(&session, "The beneficiary could not be removed.", "error");
        }
    }
    redirect(&format!("/cases/edit/{}", beneficiary.case_id))
}
