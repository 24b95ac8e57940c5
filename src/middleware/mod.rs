use crate::config::Config;
use crate::helper::auth_helpers;
use crate::models::Role;
use actix_session::{Session, SessionExt};
use actix_web::{dev, web, FromRequest, HttpRequest};
use serde::Serialize;
use std::future::{ready, Ready as StdReady};

/// Request-scoped identity resolved from the cookie session. Handlers take
/// this instead of poking at the session themselves.
#[derive(Debug, Serialize)]
pub struct AuthenticatedUser {
    pub account_id: i64,
    pub role: Role,
    pub display_name: String,
    /// The NGO profile id for `Role::Ong`, the admin row id for `Role::Admin`.
    pub profile_id: i64,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owner id this session acts for, None for admins.
    pub fn ong_id(&self) -> Option<i64> {
        match self.role {
            Role::Ong => Some(self.profile_id),
            Role::Admin => None,
        }
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = StdReady<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let session = req.get_session();
        let account_id = session.get::<i64>("account_id").unwrap_or(None);
        let role = session
            .get::<String>("role")
            .unwrap_or(None)
            .and_then(|r| Role::parse(&r));
        let display_name = session.get::<String>("name").unwrap_or(None);
        let profile_id = session.get::<i64>("profile_id").unwrap_or(None);

        if let (Some(account_id), Some(role), Some(display_name), Some(profile_id)) =
            (account_id, role, display_name, profile_id)
        {
            ready(Ok(AuthenticatedUser { account_id, role, display_name, profile_id }))
        } else {
            ready(Err(actix_web::error::ErrorUnauthorized("Not logged in.")))
        }
    }
}

/// Fills the session after a successful login.
pub fn store_session_identity(
    session: &Session,
    account_id: i64,
    role: Role,
    display_name: &str,
    profile_id: i64,
    must_change_password: bool,
) {
    session.insert("account_id", account_id).ok();
    session.insert("role", role.as_str()).ok();
    session.insert("name", display_name).ok();
    session.insert("profile_id", profile_id).ok();
    session.insert("must_change_password", must_change_password).ok();
}

pub fn admin_guard(session: &Session) -> bool {
    session.get::<String>("role").unwrap_or(None) == Some("admin".to_string())
}

pub fn ong_guard(session: &Session) -> bool {
    session.get::<String>("role").unwrap_or(None) == Some("ong".to_string())
}

pub fn logged_in_guard(session: &Session) -> bool {
    session.get::<i64>("account_id").unwrap_or(None).is_some()
}

/// Bearer-token identity for the JSON API, decoded from the Authorization
/// header with the configured secret.
#[derive(Debug, Serialize)]
pub struct ApiAuth {
    pub account_id: i64,
    pub role: Role,
    pub ong_id: Option<i64>,
}

impl ApiAuth {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl FromRequest for ApiAuth {
    type Error = actix_web::Error;
    type Future = StdReady<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let config = match req.app_data::<web::Data<Config>>() {
            Some(c) => c,
            None => {
                log::error!("Config is not registered as app data; bearer auth cannot run.");
                return ready(Err(actix_web::error::ErrorInternalServerError("Server misconfiguration.")));
            }
        };

        let token = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|v| v.trim().to_string());

        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => return ready(Err(actix_web::error::ErrorUnauthorized("Missing bearer token."))),
        };

        match auth_helpers::decode_token(&config.jwt_secret, &token) {
            Ok(claims) => {
                let role = match Role::parse(&claims.role) {
                    Some(r) => r,
                    None => {
                        return ready(Err(actix_web::error::ErrorUnauthorized("Unknown role in token.")))
                    }
                };
                ready(Ok(ApiAuth { account_id: claims.sub, role, ong_id: claims.ong_id }))
            }
            Err(e) => {
                log::debug!("Rejected bearer token: {}", e);
                ready(Err(actix_web::error::ErrorUnauthorized("Invalid or expired token.")))
            }
        }
    }
}
