use crate::models::FlashMessage;
use actix_session::Session;
use actix_web::{web, HttpResponse};
use std::collections::HashMap;
use url::form_urlencoded;

/// Parses URL-encoded form data from bytes, handling potential UTF-8 errors gracefully.
pub fn parse_form(form_bytes: &web::Bytes) -> Result<HashMap<String, String>, HttpResponse> {
    let body = match String::from_utf8(form_bytes.to_vec()) {
        Ok(s) => s,
        Err(_) => return Err(HttpResponse::BadRequest().body("Invalid UTF-8 in request body.")),
    };
    Ok(form_urlencoded::parse(body.as_bytes()).into_owned().collect())
}

/// Trimmed, non-empty form value or None.
pub fn get_trimmed<'a>(form: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    form.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

pub fn get_i64(form: &HashMap<String, String>, key: &str) -> Option<i64> {
    get_trimmed(form, key).and_then(|v| v.parse::<i64>().ok())
}

/// Stores a one-shot status message for the next rendered page.
pub fn set_flash(session: &Session, message: &str, kind: &str) {
    let flash = FlashMessage { message: message.to_string(), r#type: kind.to_string() };
    if session.insert("flash", flash).is_err() {
        log::warn!("Could not store flash message in session.");
    }
}

/// Takes the pending flash message, clearing it.
pub fn take_flash(session: &Session) -> Option<FlashMessage> {
    let flash = session.get::<FlashMessage>("flash").unwrap_or(None);
    if flash.is_some() {
        session.remove("flash");
    }
    flash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_values_are_trimmed_and_typed() {
        let mut form = HashMap::new();
        form.insert("title".to_string(), "  Cas urgent  ".to_string());
        form.insert("empty".to_string(), "   ".to_string());
        form.insert("lat".to_string(), "18.07".to_string());
        form.insert("category_id".to_string(), "4".to_string());

        assert_eq!(get_trimmed(&form, "title"), Some("Cas urgent"));
        assert_eq!(get_trimmed(&form, "empty"), None);
        assert_eq!(get_trimmed(&form, "missing"), None);
        assert_eq!(get_i64(&form, "category_id"), Some(4));
        assert_eq!(get_i64(&form, "lat"), None);
    }

    #[test]
    fn urlencoded_bodies_parse() {
        let bytes = web::Bytes::from_static(b"email=a%40o.org&password=secret");
        let form = parse_form(&bytes).unwrap();
        assert_eq!(form.get("email").map(|s| s.as_str()), Some("a@o.org"));
        assert_eq!(form.get("password").map(|s| s.as_str()), Some("secret"));
    }
}
