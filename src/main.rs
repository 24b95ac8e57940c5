use actix_cors::Cors;
use actix_csrf::CsrfMiddleware;
use actix_session::{storage::CookieSessionStore, SessionExt, SessionMiddleware};
use actix_web::{
    cookie::Key,
    middleware::{DefaultHeaders, Logger},
    web, App, HttpServer,
};
use clap::Parser;
use ongconnect_backend::{config::Config, middleware::admin_guard, routes};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rand::prelude::StdRng;
use std::convert::TryFrom;
use std::fs;
use std::path::PathBuf;
use tera::Tera;

#[derive(Parser, Debug)]
#[command(name = "ongconnect_server", author, version, about = "Starts the ONG Connect web server.")]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    // Load configuration first
    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    // Initialize logger using the value from config
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    let tera = Tera::new("templates/**/*.html").expect("Tera initialization failed");

    fs::create_dir_all(&config.database_path).expect("Failed to create database directory");
    fs::create_dir_all(config.media_dir()).expect("Failed to create media upload directory");
    fs::create_dir_all(config.logos_dir()).expect("Failed to create logo upload directory");
    fs::create_dir_all(config.docs_dir()).expect("Failed to create document upload directory");

    let manager = SqliteConnectionManager::file(config.db_path());
    let pool = Pool::builder()
        .build(manager)
        .expect("FATAL: Failed to create Rusqlite connection pool.");

    let session_key_bytes = hex::decode(&config.session_secret_key)
        .expect("FATAL: SESSION_SECRET_KEY in .env is not a valid hex string.");
    let session_key = Key::try_from(session_key_bytes.as_slice())
        .expect("FATAL: The decoded SESSION_SECRET_KEY is not long enough (minimum 64 bytes required).");

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    println!("🚀 Server starting at http://{}", server_address);

    HttpServer::new(move || {
        let session_mw =
            SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
                .cookie_secure(config.use_secure_cookies)
                .cookie_http_only(true)
                .cookie_same_site(actix_web::cookie::SameSite::Lax)
                .build();

        let cors = {
            let allowed_origins_str = &config.allowed_origins;
            if allowed_origins_str.trim() == "*" {
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .supports_credentials()
                    .max_age(3600)
            } else {
                let mut cors = Cors::default();
                let origins: Vec<&str> = allowed_origins_str
                    .split(',')
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .collect();
                for origin in origins {
                    cors = cors.allowed_origin(origin);
                }
                cors.allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .supports_credentials()
                    .max_age(3600)
            }
        };

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY"))
                    .add(("X-XSS-Protection", "1; mode=block")),
            )
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(tera.clone()))
            .app_data(web::Data::new(pool.clone()))
            // The bearer-token API lives outside the cookie session.
            .configure(routes::api::config)
            .service(actix_files::Files::new("/static/uploads", &config.uploads_path))
            .service(actix_files::Files::new("/ssr_static", "./ssr_static"))
            // Everything below shares the cookie session and CSRF protection.
            .service(
                web::scope("")
                    .wrap(
                        CsrfMiddleware::<StdRng>::new()
                            .set_cookie(actix_web::http::Method::GET, "/login")
                            .set_cookie(actix_web::http::Method::GET, "/register")
                            .set_cookie(actix_web::http::Method::GET, "/forgot_password")
                            .set_cookie(actix_web::http::Method::GET, "/change_password"),
                    )
                    .wrap(session_mw)
                    .configure(routes::public::config)
                    .configure(routes::auth::config)
                    .configure(routes::admin::config_bootstrap)
                    .configure(routes::admin::config_ngo_management)
                    .configure(routes::ong::config)
                    .service(
                        web::scope("/admin")
                            .guard(actix_web::guard::fn_guard(|ctx| {
                                admin_guard(&ctx.get_session())
                            }))
                            .configure(routes::admin::config),
                    ),
            )
    })
    .bind(server_address)?
    .run()
    .await
}
