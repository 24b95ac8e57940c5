use crate::config::Config;
use crate::helper::{
    auth_helpers, form_helpers, mail_helpers, moderation_helpers, public_helpers,
    sanitization_helpers,
};
use crate::middleware::AuthenticatedUser;
use crate::models::db_operations::{
    case_db_operations, notification_db_operations, ong_db_operations, users_db_operations,
};
use crate::models::{ApprovalStatus, PurgeManifest, Role, ValidationStatus};
use crate::routes::public::render;
use actix_session::Session;
use actix_web::{web, HttpResponse, Responder};
use std::path::PathBuf;
use tera::{Context, Tera};

/// Routes mounted under the session-guarded `/admin` scope.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/dashboard", web::get().to(dashboard))
        .route("/ong/{id}/validate", web::post().to(validate_ong))
        .route("/ong/{id}/reject", web::post().to(reject_ong))
        .route("/ong/{id}/reset-password", web::post().to(reset_ong_password))
        .route("/case/{id}/approve", web::post().to(approve_case))
        .route("/case/{id}/reject", web::post().to(reject_case))
        .route("/admins", web::get().to(list_admins))
        .route("/admins/add", web::post().to(add_admin))
        .route("/admins/edit/{id}", web::post().to(edit_admin))
        .route("/admins/delete/{id}", web::post().to(delete_admin))
        .route("/categories", web::get().to(list_categories))
        .route("/categories/add", web::post().to(add_category))
        .route("/categories/edit/{id}", web::post().to(edit_category))
        .route("/categories/delete/{id}", web::post().to(delete_category));
}

/// First-run bootstrap, mounted outside the guarded scope. Disabled as soon
/// as one administrator exists.
pub fn config_bootstrap(cfg: &mut web::ServiceConfig) {
    cfg.route("/admin/bootstrap", web::post().to(bootstrap_admin));
}

/// Direct NGO management under `/ngos`, admin only. Lives outside the `/admin`
/// prefix because the listing page at `/ngos` is shared with the public side.
pub fn config_ngo_management(cfg: &mut web::ServiceConfig) {
    cfg.route("/ngos/add", web::get().to(show_add_ngo))
        .route("/ngos/add", web::post().to(handle_add_ngo))
        .route("/ngos/edit/{id}", web::get().to(show_edit_ngo))
        .route("/ngos/edit/{id}", web::post().to(handle_edit_ngo))
        .route("/ngos/delete/{id}", web::post().to(handle_delete_ngo));
}

fn redirect(url: &str) -> HttpResponse {
    HttpResponse::Found().append_header(("location", url)).finish()
}

fn purge_summary(manifest: &PurgeManifest) -> String {
    format!(
        "{} organisation(s), {} account(s), {} case(s), {} media item(s), {} beneficiary record(s) removed ({} file(s) touched, {} failed).",
        manifest.ongs_deleted,
        manifest.accounts_deleted,
        manifest.cases_deleted,
        manifest.media_deleted,
        manifest.beneficiaries_deleted,
        manifest.files_attempted,
        manifest.files_failed
    )
}

async fn dashboard(
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
    ctx.insert("user", &user);
    ctx.insert(
        "pending_ongs",
        &ong_db_operations::read_ongs_by_status(&conn, ValidationStatus::Pending).unwrap_or_default(),
    );
    ctx.insert(
        "pending_cases",
        &case_db_operations::read_cases_by_approval(&conn, ApprovalStatus::Pending)
            .unwrap_or_default(),
    );
    ctx.insert("ongs", &ong_db_operations::read_all_ongs(&conn).unwrap_or_default());
    ctx.insert("total_cases", &case_db_operations::count_cases(&conn));
    ctx.insert(
        "approved_cases",
        &case_db_operations::count_cases_by_approval(&conn, ApprovalStatus::Approved),
    );
    ctx.insert("total_ongs", &ong_db_operations::count_ongs(&conn));
    ctx.insert(
        "notifications",
        &notification_db_operations::read_latest(&conn, 20).unwrap_or_default(),
    );
    match public_helpers::gather_statistics(&conn) {
        Ok(stats) => ctx.insert("stats", &stats),
        Err(e) => log::error!("Dashboard statistics failed: {}", e),
    }
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "admin/dashboard.html", &ctx)
}

async fn validate_ong(
    session: Session,
    pool: web::Data<crate::DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    let ong_id = path.into_inner();
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };

    match moderation_helpers::approve_ong(&conn, ong_id) {
        Ok(true) => form_helpers::set_flash(&session, "Organisation validated. It can now sign in.", "success"),
        Ok(false) => form_helpers::set_flash(&session, "This organisation was already validated.", "success"),
        Err(e) => {
            log::error!("Validation of ONG {} failed: {}", ong_id, e);
            form_helpers::set_flash(&session, "The organisation could not be validated.", "error");
        }
    }
    redirect("/admin/dashboard")
}

async fn reject_ong(
    session: Session,
    pool: web::Data<crate::DbPool>,
    config: web::Data<Config>,
    path: web::Path<i64>,
) -> impl Responder {
    let ong_id = path.into_inner();
    let uploads_root = PathBuf::from(&config.uploads_path);
    let pool_for_block = pool.clone();

    let purged = web::block(move || {
        let mut conn = pool_for_block.get()?;
        moderation_helpers::purge_ong(&mut conn, &uploads_root, ong_id)
    })
    .await;

    match purged {
        Ok(Ok(manifest)) => {
            form_helpers::set_flash(
                &session,
                &format!("Organisation rejected. {}", purge_summary(&manifest)),
                "success",
            );
        }
        Ok(Err(e)) => {
            log::error!("Rejection purge of ONG {} failed: {}", ong_id, e);
            form_helpers::set_flash(&session, "The organisation could not be removed.", "error");
        }
        Err(e) => {
            log::error!("Blocking error while purging ONG {}: {}", ong_id, e);
            form_helpers::set_flash(&session, "Internal error during removal.", "error");
        }
    }
    redirect("/admin/dashboard")
}

async fn reset_ong_password(
    session: Session,
    pool: web::Data<crate::DbPool>,
    config: web::Data<Config>,
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
    let account = match ong.user_id.and_then(|id| users_db_operations::read_account_by_id(&conn, id)) {
        Some(a) => a,
        None => {
            form_helpers::set_flash(&session, "This organisation has no linked account.", "error");
            return redirect("/admin/dashboard");
        }
    };

    match auth_helpers::reset_account_password(&conn, &account) {
        Ok(temporary) => {
            let config = config.clone();
            let to = account.email.clone();
            let sent = web::block(move || {
                mail_helpers::send_temporary_password(&config, &to, &temporary)
            })
            .await;
            match sent {
                Ok(Ok(())) => form_helpers::set_flash(
                    &session,
                    &format!("Temporary password sent to {}.", account.email),
                    "success",
                ),
                Ok(Err(e)) => {
                    log::warn!("Reset mail to '{}' was not sent: {}", account.email, e);
                    form_helpers::set_flash(
                        &session,
                        "Password reset, but the notification mail could not be sent.",
                        "error",
                    );
                }
                Err(e) => {
                    log::error!("Blocking error while sending reset mail: {}", e);
                    form_helpers::set_flash(
                        &session,
                        "Password reset, but the notification mail could not be sent.",
                        "error",
                    );
                }
            }
        }
        Err(e) => {
            log::error!("Password reset for ONG {} failed: {}", ong_id, e);
            form_helpers::set_flash(&session, "The password could not be reset.", "error");
        }
    }
    redirect("/admin/dashboard")
}

async fn approve_case(
    session: Session,
    pool: web::Data<crate::DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    let case_id = path.into_inner();
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };

    match moderation_helpers::approve_case(&conn, case_id) {
        Ok(true) => form_helpers::set_flash(&session, "Case approved and published.", "success"),
        Ok(false) => form_helpers::set_flash(&session, "This case was already published or does not exist.", "success"),
        Err(e) => {
            log::error!("Approval of case {} failed: {}", case_id, e);
            form_helpers::set_flash(&session, "The case could not be approved.", "error");
        }
    }
    redirect("/admin/dashboard")
}

async fn reject_case(
    session: Session,
    pool: web::Data<crate::DbPool>,
    config: web::Data<Config>,
    path: web::Path<i64>,
) -> impl Responder {
    let case_id = path.into_inner();
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
                    "Case rejected and removed: {} media item(s), {} beneficiary record(s) deleted.",
                    manifest.media_deleted, manifest.beneficiaries_deleted
                ),
                "success",
            );
        }
        Ok(Err(e)) => {
            log::error!("Rejection purge of case {} failed: {}", case_id, e);
            form_helpers::set_flash(&session, "The case could not be removed.", "error");
        }
        Err(e) => {
            log::error!("Blocking error while purging case {}: {}", case_id, e);
            form_helpers::set_flash(&session, "Internal error during removal.", "error");
        }
    }
    redirect("/admin/dashboard")
}

async fn list_admins(
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
    ctx.insert("user", &user);
    ctx.insert("admins", &users_db_operations::read_all_admins(&conn).unwrap_or_default());
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "admin/admins.html", &ctx)
}

async fn add_admin(
    session: Session,
    pool: web::Data<crate::DbPool>,
    body: web::Bytes,
) -> impl Responder {
    let form = match form_helpers::parse_form(&body) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let name = form_helpers::get_trimmed(&form, "name").map(sanitization_helpers::strip_all_html);
    let email = form_helpers::get_trimmed(&form, "email").map(|s| s.to_string());
    let password = form.get("password").cloned().filter(|p| !p.is_empty());
    let (name, email, password) = match (name, email, password) {
        (Some(n), Some(e), Some(p)) => (n, e, p),
        _ => {
            form_helpers::set_flash(&session, "Name, email and password are mandatory.", "error");
            return redirect("/admin/admins");
        }
    };

    let mut conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };
    if users_db_operations::email_exists(&conn, &email) {
        form_helpers::set_flash(&session, "An account with this email already exists.", "error");
        return redirect("/admin/admins");
    }

    let created = (|| -> Result<(), rusqlite::Error> {
        let tx = conn.transaction()?;
        let user_id = users_db_operations::create_account(&tx, &email, &password, Role::Admin)?;
        let account = users_db_operations::read_account_by_id(&tx, user_id)
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        users_db_operations::create_admin(&tx, &name, &email, &account.password_hash, user_id)?;
        tx.commit()
    })();

    match created {
        Ok(()) => form_helpers::set_flash(&session, "Administrator created.", "success"),
        Err(e) => {
            log::error!("Administrator creation failed: {}", e);
            form_helpers::set_flash(&session, "The administrator could not be created.", "error");
        }
    }
    redirect("/admin/admins")
}

async fn edit_admin(
    session: Session,
    pool: web::Data<crate::DbPool>,
    path: web::Path<i64>,
    body: web::Bytes,
) -> impl Responder {
    let admin_id = path.into_inner();
    let form = match form_helpers::parse_form(&body) {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };
    let admin = match users_db_operations::read_admin_by_id(&conn, admin_id) {
        Some(a) => a,
        None => return HttpResponse::NotFound().body("Administrator not found."),
    };

    let name = form_helpers::get_trimmed(&form, "name")
        .map(sanitization_helpers::strip_all_html)
        .unwrap_or_else(|| admin.name.clone());
    let email = form_helpers::get_trimmed(&form, "email")
        .map(|s| s.to_string())
        .unwrap_or_else(|| admin.email.clone());

    if email != admin.email && users_db_operations::email_exists(&conn, &email) {
        form_helpers::set_flash(&session, "An account with this email already exists.", "error");
        return redirect("/admin/admins");
    }

    let updated = (|| -> Result<(), rusqlite::Error> {
        users_db_operations::update_admin(&conn, admin_id, &name, &email)?;
        if email != admin.email {
            if let Some(user_id) = admin.user_id {
                users_db_operations::update_account_email(&conn, user_id, &email)?;
            }
        }
        Ok(())
    })();

    match updated {
        Ok(()) => form_helpers::set_flash(&session, "Administrator updated.", "success"),
        Err(e) => {
            log::error!("Administrator {} update failed: {}", admin_id, e);
            form_helpers::set_flash(&session, "The administrator could not be updated.", "error");
        }
    }
    redirect("/admin/admins")
}

async fn delete_admin(
    user: AuthenticatedUser,
    session: Session,
    pool: web::Data<crate::DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    let admin_id = path.into_inner();
    let mut conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };

    let admin = match users_db_operations::read_admin_by_id(&conn, admin_id) {
        Some(a) => a,
        None => {
            form_helpers::set_flash(&session, "This administrator no longer exists.", "success");
            return redirect("/admin/admins");
        }
    };
    if admin.user_id == Some(user.account_id) {
        form_helpers::set_flash(&session, "You cannot delete your own account.", "error");
        return redirect("/admin/admins");
    }
    if users_db_operations::count_admins(&conn) <= 1 {
        form_helpers::set_flash(&session, "The last administrator cannot be deleted.", "error");
        return redirect("/admin/admins");
    }

    let deleted = (|| -> Result<(), rusqlite::Error> {
        let tx = conn.transaction()?;
        users_db_operations::delete_admin(&tx, admin_id)?;
        if let Some(user_id) = admin.user_id {
            users_db_operations::delete_account(&tx, user_id)?;
        }
        tx.commit()
    })();

    match deleted {
        Ok(()) => form_helpers::set_flash(&session, "Administrator deleted.", "success"),
        Err(e) => {
            log::error!("Administrator {} delete failed: {}", admin_id, e);
            form_helpers::set_flash(&session, "The administrator could not be deleted.", "error");
        }
    }
    redirect("/admin/admins")
}

async fn list_categories(
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
    ctx.insert("user", &user);
    ctx.insert("categories", &case_db_operations::read_all_categories(&conn).unwrap_or_default());
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "admin/categories.html", &ctx)
}

async fn add_category(
    session: Session,
    pool: web::Data<crate::DbPool>,
    body: web::Bytes,
) -> impl Responder {
    let form = match form_helpers::parse_form(&body) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let name = match form_helpers::get_trimmed(&form, "name") {
        Some(n) => sanitization_helpers::strip_all_html(n),
        None => {
            form_helpers::set_flash(&session, "The category name is mandatory.", "error");
            return redirect("/admin/categories");
        }
    };
    let description = form_helpers::get_trimmed(&form, "description")
        .map(sanitization_helpers::strip_all_html)
        .unwrap_or_default();

    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };
    match case_db_operations::create_category(&conn, &name, &description) {
        Ok(_) => form_helpers::set_flash(&session, "Category created.", "success"),
        Err(e) => {
            log::error!("Category creation failed: {}", e);
            form_helpers::set_flash(&session, "The category could not be created. Is the name unique?", "error");
        }
    }
    redirect("/admin/categories")
}

async fn edit_category(
    session: Session,
    pool: web::Data<crate::DbPool>,
    path: web::Path<i64>,
    body: web::Bytes,
) -> impl Responder {
    let category_id = path.into_inner();
    let form = match form_helpers::parse_form(&body) {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };
    let category = match case_db_operations::read_category_by_id(&conn, category_id) {
        Some(c) => c,
        None => return HttpResponse::NotFound().body("Category not found."),
    };

    let name = form_helpers::get_trimmed(&form, "name")
        .map(sanitization_helpers::strip_all_html)
        .unwrap_or_else(|| category.name.clone());
    let description = form_helpers::get_trimmed(&form, "description")
        .map(sanitization_helpers::strip_all_html)
        .unwrap_or_else(|| category.description.clone());

    match case_db_operations::update_category(&conn, category_id, &name, &description) {
        Ok(_) => form_helpers::set_flash(&session, "Category updated.", "success"),
        Err(e) => {
            log::error!("Category {} update failed: {}", category_id, e);
            form_helpers::set_flash(&session, "The category could not be updated.", "error");
        }
    }
    redirect("/admin/categories")
}

async fn delete_category(
    session: Session,
    pool: web::Data<crate::DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    let category_id = path.into_inner();
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };

    // Cases keep running with a NULL category once theirs is removed.
    let cleared = (|| -> Result<(), rusqlite::Error> {
        conn.execute("UPDATE cases SET category_id = NULL WHERE category_id = ?1", [category_id])?;
        case_db_operations::delete_category(&conn, category_id)?;
        Ok(())
    })();

    match cleared {
        Ok(()) => form_helpers::set_flash(&session, "Category deleted.", "success"),
        Err(e) => {
            log::error!("Category {} delete failed: {}", category_id, e);
            form_helpers::set_flash(&session, "The category could not be deleted.", "error");
        }
    }
    redirect("/admin/categories")
}

async fn show_add_ngo(
    user: AuthenticatedUser,
    session: Session,
    tera: web::Data<Tera>,
) -> impl Responder {
    if !user.is_admin() {
        return HttpResponse::Forbidden().body("Permission denied.");
    }
    let mut ctx = Context::new();
    ctx.insert("user", &user);
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "admin/ngo_form.html", &ctx)
}

/// Admin-created organisations skip the moderation queue: they are validated
/// on creation.
async fn handle_add_ngo(
    user: AuthenticatedUser,
    session: Session,
    pool: web::Data<crate::DbPool>,
    config: web::Data<Config>,
    payload: actix_multipart::Multipart,
) -> impl Responder {
    if !user.is_admin() {
        return HttpResponse::Forbidden().body("Permission denied.");
    }
    let uploads_root = PathBuf::from(&config.uploads_path);
    let specs = [
        crate::helper::media_helpers::UploadSpec { field: "logo", subdir: "logos", prefix: "logo_" },
        crate::helper::media_helpers::UploadSpec {
            field: "verification_doc",
            subdir: "docs",
            prefix: "doc_",
        },
    ];
    let submission =
        match crate::helper::media_helpers::collect_multipart(payload, &uploads_root, &specs).await {
            Ok(s) => s,
            Err(e) => {
                form_helpers::set_flash(&session, &format!("Upload failed: {}", e), "error");
                return redirect("/ngos/add");
            }
        };

    let required = ["name", "address", "phone", "email", "domains", "password"];
    for key in required {
        if submission.field(key).is_none() {
            crate::helper::media_helpers::discard_saved_files(&uploads_root, &submission);
            form_helpers::set_flash(&session, &format!("Field '{}' is mandatory.", key), "error");
            return redirect("/ngos/add");
        }
    }

    let email = submission.field("email").unwrap_or_default().to_string();
    let password = submission.field("password").unwrap_or_default().to_string();
    let new_ong = crate::models::NewOng {
        name: sanitization_helpers::strip_all_html(submission.field("name").unwrap_or_default()),
        address: sanitization_helpers::strip_all_html(submission.field("address").unwrap_or_default()),
        phone: sanitization_helpers::strip_all_html(submission.field("phone").unwrap_or_default()),
        email: email.clone(),
        domains: sanitization_helpers::strip_all_html(submission.field("domains").unwrap_or_default()),
        logo_url: submission.first_file("logo").map(|s| s.to_string()),
        verification_doc_url: submission.first_file("verification_doc").map(|s| s.to_string()),
    };

    let mut conn = match pool.get() {
        Ok(c) => c,
        Err(_) => {
            crate::helper::media_helpers::discard_saved_files(&uploads_root, &submission);
            return HttpResponse::InternalServerError().body("Database unavailable.");
        }
    };
    if users_db_operations::email_exists(&conn, &email) {
        crate::helper::media_helpers::discard_saved_files(&uploads_root, &submission);
        form_helpers::set_flash(&session, "An account with this email already exists.", "error");
        return redirect("/ngos/add");
    }

    let created = (|| -> Result<(), rusqlite::Error> {
        let tx = conn.transaction()?;
        let user_id = users_db_operations::create_account(&tx, &email, &password, Role::Ong)?;
        let ong_id = ong_db_operations::create_ong(&tx, &new_ong, user_id)?;
        ong_db_operations::update_validation_status(&tx, ong_id, ValidationStatus::Validated)?;
        tx.commit()
    })();

    match created {
        Ok(()) => {
            form_helpers::set_flash(&session, "Organisation created and validated.", "success");
            redirect("/ngos")
        }
        Err(e) => {
            log::error!("Admin NGO creation failed: {}", e);
            crate::helper::media_helpers::discard_saved_files(&uploads_root, &submission);
            form_helpers::set_flash(&session, "The organisation could not be created.", "error");
            redirect("/ngos/add")
        }
    }
}

async fn show_edit_ngo(
    user: AuthenticatedUser,
    session: Session,
    tera: web::Data<Tera>,
    pool: web::Data<crate::DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    if !user.is_admin() {
        return HttpResponse::Forbidden().body("Permission denied.");
    }
    let ong_id = path.into_inner();
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };
    let ong = match ong_db_operations::read_ong_by_id(&conn, ong_id) {
        Some(o) => o,
        None => return HttpResponse::NotFound().body("Organisation not found."),
    };

    let mut ctx = Context::new();
    ctx.insert("user", &user);
    ctx.insert("ong", &ong);
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "admin/ngo_form.html", &ctx)
}

async fn handle_edit_ngo(
    user: AuthenticatedUser,
    session: Session,
    pool: web::Data<crate::DbPool>,
    path: web::Path<i64>,
    body: web::Bytes,
) -> impl Responder {
    if !user.is_admin() {
        return HttpResponse::Forbidden().body("Permission denied.");
    }
    let ong_id = path.into_inner();
    let form = match form_helpers::parse_form(&body) {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };
    let current = match ong_db_operations::read_ong_by_id(&conn, ong_id) {
        Some(o) => o,
        None => return HttpResponse::NotFound().body("Organisation not found."),
    };

    let pick = |key: &str, fallback: &str| {
        form_helpers::get_trimmed(&form, key)
            .map(sanitization_helpers::strip_all_html)
            .unwrap_or_else(|| fallback.to_string())
    };
    let name = pick("name", &current.name);
    let address = pick("address", &current.address);
    let phone = pick("phone", &current.phone);
    let domains = pick("domains", &current.domains);
    let email = form_helpers::get_trimmed(&form, "email")
        .map(|s| s.to_string())
        .unwrap_or_else(|| current.email.clone());

    if email != current.email && users_db_operations::email_exists(&conn, &email) {
        form_helpers::set_flash(&session, "An account with this email already exists.", "error");
        return redirect(&format!("/ngos/edit/{}", ong_id));
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
        Ok(()) => form_helpers::set_flash(&session, "Organisation updated.", "success"),
        Err(e) => {
            log::error!("Admin NGO {} update failed: {}", ong_id, e);
            form_helpers::set_flash(&session, "The organisation could not be updated.", "error");
        }
    }
    redirect("/ngos")
}

async fn handle_delete_ngo(
    user: AuthenticatedUser,
    session: Session,
    pool: web::Data<crate::DbPool>,
    config: web::Data<Config>,
    path: web::Path<i64>,
) -> impl Responder {
    if !user.is_admin() {
        return HttpResponse::Forbidden().body("Permission denied.");
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
        Ok(Ok(manifest)) => {
            form_helpers::set_flash(
                &session,
                &format!("Organisation deleted. {}", purge_summary(&manifest)),
                "success",
            );
        }
        Ok(Err(e)) => {
            log::error!("Deletion purge of ONG {} failed: {}", ong_id, e);
            form_helpers::set_flash(&session, "The organisation could not be removed.", "error");
        }
        Err(e) => {
            log::error!("Blocking error while purging ONG {}: {}", ong_id, e);
            form_helpers::set_flash(&session, "Internal error during removal.", "error");
        }
    }
    redirect("/ngos")
}

/// Creates the very first administrator account. Returns 404 once any
/// administrator exists, so the endpoint is inert on a configured instance.
async fn bootstrap_admin(
    session: Session,
    pool: web::Data<crate::DbPool>,
    body: web::Bytes,
) -> impl Responder {
    let form = match form_helpers::parse_form(&body) {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    let mut conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };
    if users_db_operations::count_admins(&conn) > 0 {
        return HttpResponse::NotFound().body("Not found.");
    }

    let name = form_helpers::get_trimmed(&form, "name").map(sanitization_helpers::strip_all_html);
    let email = form_helpers::get_trimmed(&form, "email").map(|s| s.to_string());
    let password = form.get("password").cloned().filter(|p| !p.is_empty());
    let (name, email, password) = match (name, email, password) {
        (Some(n), Some(e), Some(p)) => (n, e, p),
        _ => return HttpResponse::BadRequest().body("Name, email and password are mandatory."),
    };

    let created = (|| -> Result<(), rusqlite::Error> {
        let tx = conn.transaction()?;
        let user_id = users_db_operations::create_account(&tx, &email, &password, Role::Admin)?;
        let account = users_db_operations::read_account_by_id(&tx, user_id)
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        users_db_operations::create_admin(&tx, &name, &email, &account.password_hash, user_id)?;
        tx.commit()
    })();

    match created {
        Ok(()) => {
            form_helpers::set_flash(&session, "Administrator account created. You can sign in.", "success");
            redirect("/login")
        }
        Err(e) => {
            log::error!("Bootstrap administrator creation failed: {}", e);
            HttpResponse::InternalServerError().body("The administrator could not be created.")
        }
    }
}
