use crate::config::Config;
use crate::helper::auth_helpers::AuthOutcome;
use crate::helper::{auth_helpers, form_helpers, mail_helpers, media_helpers, sanitization_helpers};
use crate::middleware::{store_session_identity, AuthenticatedUser};
use crate::models::db_operations::{ong_db_operations, users_db_operations};
use crate::models::{NewOng, Role};
use crate::routes::public::render;
use actix_csrf::extractor::{Csrf, CsrfGuarded, CsrfToken};
use actix_multipart::Multipart;
use actix_session::Session;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use std::path::PathBuf;
use tera::{Context, Tera};

#[derive(Deserialize)]
struct LoginForm {
    csrf_token: CsrfToken,
    email: String,
    password: String,
}

impl CsrfGuarded for LoginForm {
    fn csrf_token(&self) -> &CsrfToken {
        &self.csrf_token
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/login", web::get().to(show_login))
        .route("/login", web::post().to(handle_login))
        .route("/logout", web::post().to(handle_logout))
        .route("/register", web::get().to(show_register))
        .route("/register", web::post().to(handle_register))
        .route("/forgot_password", web::get().to(show_forgot_password))
        .route("/forgot_password", web::post().to(handle_forgot_password))
        .route("/change_password", web::get().to(show_change_password))
        .route("/change_password", web::post().to(handle_change_password));
}

fn redirect(url: &str) -> HttpResponse {
    HttpResponse::Found().append_header(("location", url)).finish()
}

fn home_url_for(role: Role) -> &'static str {
    match role {
        Role::Admin => "/admin/dashboard",
        Role::Ong => "/ong/dashboard",
    }
}

async fn show_login(session: Session, tera: web::Data<Tera>, token: CsrfToken) -> impl Responder {
    if let Some(role) = session.get::<String>("role").unwrap_or(None) {
        if let Some(role) = Role::parse(&role) {
            return redirect(home_url_for(role));
        }
    }
    let mut ctx = Context::new();
    ctx.insert("csrf_token", token.get());
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "auth/login.html", &ctx)
}

async fn handle_login(
    session: Session,
    pool: web::Data<crate::DbPool>,
    form: Csrf<web::Form<LoginForm>>,
) -> impl Responder {
    let login = form.into_inner();
    let email = login.email.trim().to_string();

    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };

    let outcome = match auth_helpers::authenticate(&conn, &email, &login.password) {
        Ok(o) => o,
        Err(e) => {
            log::error!("Login check failed for '{}': {}", email, e);
            form_helpers::set_flash(&session, "An internal error occurred. Please retry.", "error");
            return redirect("/login");
        }
    };

    match outcome {
        AuthOutcome::Admin(admin) => {
            let must_change = users_db_operations::read_account_by_email(&conn, &email)
                .map(|a| a.must_change_password)
                .unwrap_or(false);
            store_session_identity(
                &session,
                admin.user_id.unwrap_or_default(),
                Role::Admin,
                &admin.name,
                admin.id,
                must_change,
            );
            if must_change {
                form_helpers::set_flash(&session, "Please choose a new password.", "error");
                return redirect("/change_password");
            }
            redirect("/admin/dashboard")
        }
        AuthOutcome::Ong(ong) => {
            let must_change = users_db_operations::read_account_by_email(&conn, &email)
                .map(|a| a.must_change_password)
                .unwrap_or(false);
            store_session_identity(
                &session,
                ong.user_id.unwrap_or_default(),
                Role::Ong,
                &ong.name,
                ong.id,
                must_change,
            );
            if must_change {
                form_helpers::set_flash(&session, "Please choose a new password.", "error");
                return redirect("/change_password");
            }
            redirect("/ong/dashboard")
        }
        AuthOutcome::PendingApproval => {
            form_helpers::set_flash(
                &session,
                "Your organisation is still awaiting approval by an administrator.",
                "error",
            );
            redirect("/login")
        }
        AuthOutcome::Rejected => {
            form_helpers::set_flash(
                &session,
                "Your organisation's registration was rejected.",
                "error",
            );
            redirect("/login")
        }
        AuthOutcome::ProfileMissing => {
            form_helpers::set_flash(
                &session,
                "This account has no active profile. Contact an administrator.",
                "error",
            );
            redirect("/login")
        }
        AuthOutcome::InvalidCredentials => {
            form_helpers::set_flash(&session, "Invalid email or password.", "error");
            redirect("/login")
        }
    }
}

async fn handle_logout(session: Session) -> impl Responder {
    session.clear();
    redirect("/login")
}

async fn show_register(session: Session, tera: web::Data<Tera>, token: CsrfToken) -> impl Responder {
    let mut ctx = Context::new();
    ctx.insert("csrf_token", token.get());
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "auth/register.html", &ctx)
}

async fn handle_register(
    session: Session,
    pool: web::Data<crate::DbPool>,
    config: web::Data<Config>,
    payload: Multipart,
) -> impl Responder {
    let uploads_root = PathBuf::from(&config.uploads_path);
    let specs = [
        media_helpers::UploadSpec { field: "logo", subdir: "logos", prefix: "logo_" },
        media_helpers::UploadSpec { field: "verification_doc", subdir: "docs", prefix: "doc_" },
    ];

    let submission = match media_helpers::collect_multipart(payload, &uploads_root, &specs).await {
        Ok(s) => s,
        Err(e) => {
            form_helpers::set_flash(&session, &format!("Upload failed: {}", e), "error");
            return redirect("/register");
        }
    };

    let required = ["name", "address", "phone", "email", "domains", "password"];
    for key in required {
        if submission.field(key).is_none() {
            media_helpers::discard_saved_files(&uploads_root, &submission);
            form_helpers::set_flash(&session, &format!("Field '{}' is mandatory.", key), "error");
            return redirect("/register");
        }
    }
    let logo_url = match submission.first_file("logo") {
        Some(url) => url.to_string(),
        None => {
            media_helpers::discard_saved_files(&uploads_root, &submission);
            form_helpers::set_flash(&session, "A logo is mandatory.", "error");
            return redirect("/register");
        }
    };

    let email = submission.field("email").unwrap_or_default().to_string();
    let password = submission.field("password").unwrap_or_default().to_string();
    let new_ong = NewOng {
        name: sanitization_helpers::strip_all_html(submission.field("name").unwrap_or_default()),
        address: sanitization_helpers::strip_all_html(submission.field("address").unwrap_or_default()),
        phone: sanitization_helpers::strip_all_html(submission.field("phone").unwrap_or_default()),
        email: email.clone(),
        domains: sanitization_helpers::strip_all_html(submission.field("domains").unwrap_or_default()),
        logo_url: Some(logo_url),
        verification_doc_url: submission.first_file("verification_doc").map(|s| s.to_string()),
    };

    let mut conn = match pool.get() {
        Ok(c) => c,
        Err(_) => {
            media_helpers::discard_saved_files(&uploads_root, &submission);
            return HttpResponse::InternalServerError().body("Database unavailable.");
        }
    };

    if users_db_operations::email_exists(&conn, &email) {
        media_helpers::discard_saved_files(&uploads_root, &submission);
        form_helpers::set_flash(&session, "An account with this email already exists.", "error");
        return redirect("/register");
    }

    let created = (|| -> Result<(), rusqlite::Error> {
        let tx = conn.transaction()?;
        let user_id = users_db_operations::create_account(&tx, &email, &password, Role::Ong)?;
        ong_db_operations::create_ong(&tx, &new_ong, user_id)?;
        tx.commit()
    })();

    match created {
        Ok(()) => {
            form_helpers::set_flash(
                &session,
                "Registration received. You will be able to sign in once an administrator approves your organisation.",
                "success",
            );
            redirect("/login")
        }
        Err(e) => {
            log::error!("Registration for '{}' failed: {}", email, e);
            media_helpers::discard_saved_files(&uploads_root, &submission);
            form_helpers::set_flash(&session, "Registration failed. Please retry.", "error");
            redirect("/register")
        }
    }
}

async fn show_forgot_password(
    session: Session,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> impl Responder {
    let mut ctx = Context::new();
    ctx.insert("csrf_token", token.get());
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "auth/forgot_password.html", &ctx)
}

async fn handle_forgot_password(
    session: Session,
    pool: web::Data<crate::DbPool>,
    config: web::Data<Config>,
    body: web::Bytes,
) -> impl Responder {
    let form = match form_helpers::parse_form(&body) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let email = match form_helpers::get_trimmed(&form, "email") {
        Some(e) => e.to_string(),
        None => {
            form_helpers::set_flash(&session, "Please provide your email address.", "error");
            return redirect("/forgot_password");
        }
    };

    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };

    if let Some(account) = users_db_operations::read_account_by_email(&conn, &email) {
        match auth_helpers::reset_account_password(&conn, &account) {
            Ok(temporary) => {
                let config = config.clone();
                let to = email.clone();
                let sent = web::block(move || {
                    mail_helpers::send_temporary_password(&config, &to, &temporary)
                })
                .await;
                match sent {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => log::warn!("Reset mail to '{}' was not sent: {}", email, e),
                    Err(e) => log::error!("Blocking error while sending reset mail: {}", e),
                }
            }
            Err(e) => {
                log::error!("Password reset for '{}' failed: {}", email, e);
                form_helpers::set_flash(&session, "An internal error occurred. Please retry.", "error");
                return redirect("/forgot_password");
            }
        }
    }

    // Same answer whether or not the account exists.
    form_helpers::set_flash(
        &session,
        "If this address has an account, a temporary password has been sent to it.",
        "success",
    );
    redirect("/login")
}

async fn show_change_password(
    user: AuthenticatedUser,
    session: Session,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> impl Responder {
    let mut ctx = Context::new();
    ctx.insert("csrf_token", token.get());
    ctx.insert("user", &user);
    if let Some(flash) = form_helpers::take_flash(&session) {
        ctx.insert("flash", &flash);
    }
    render(&tera, "auth/change_password.html", &ctx)
}

async fn handle_change_password(
    user: AuthenticatedUser,
    session: Session,
    pool: web::Data<crate::DbPool>,
    body: web::Bytes,
) -> impl Responder {
    let form = match form_helpers::parse_form(&body) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let current = form.get("current_password").cloned().unwrap_or_default();
    let new_password = form.get("new_password").cloned().unwrap_or_default();
    let confirm = form.get("confirm_password").cloned().unwrap_or_default();

    if new_password.len() < 6 {
        form_helpers::set_flash(&session, "The new password must be at least 6 characters.", "error");
        return redirect("/change_password");
    }
    if new_password != confirm {
        form_helpers::set_flash(&session, "The password confirmation does not match.", "error");
        return redirect("/change_password");
    }

    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return HttpResponse::InternalServerError().body("Database unavailable."),
    };
    let account = match users_db_operations::read_account_by_id(&conn, user.account_id) {
        Some(a) => a,
        None => return HttpResponse::InternalServerError().body("Account not found."),
    };

    let current_ok = auth_helpers::authenticate(&conn, &account.email, &current)
        .map(|o| !matches!(o, AuthOutcome::InvalidCredentials))
        .unwrap_or(false);
    if !current_ok {
        form_helpers::set_flash(&session, "The current password is incorrect.", "error");
        return redirect("/change_password");
    }

    match auth_helpers::change_account_password(&conn, &account, &new_password) {
        Ok(()) => {
            session.insert("must_change_password", false).ok();
            form_helpers::set_flash(&session, "Password updated.", "success");
            redirect(home_url_for(user.role))
        }
        Err(e) => {
            log::error!("Password change for account {} failed: {}", account.id, e);
            form_helpers::set_flash(&session, "An internal error occurred. Please retry.", "error");
            redirect("/change_password")
        }
    }
}
