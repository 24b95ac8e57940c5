use crate::models::db_operations::{case_db_operations, media_db_operations};
use crate::DbPool;
use actix_multipart::{Field, Multipart};
use actix_web::web;
use chrono::Utc;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Hard cap per uploaded file.
pub const MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// Keeps letters, digits, dot, dash and underscore; everything else becomes '_'.
/// An empty or fully-mangled name falls back to a generated one.
pub fn sanitize_filename(original: &str) -> String {
    let cleaned: String = original
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        format!("upload-{}", Uuid::new_v4())
    } else {
        cleaned
    }
}

/// Upload filenames are `YYYYmmddHHMMSS_<sanitized original>`, optionally
/// tagged with a purpose prefix (`logo_`, `doc_`).
pub fn timestamped_filename(prefix: &str, original: &str) -> String {
    format!(
        "{}{}_{}",
        prefix,
        Utc::now().format("%Y%m%d%H%M%S"),
        sanitize_filename(original)
    )
}

pub fn public_url(subdir: &str, filename: &str) -> String {
    format!("/static/uploads/{}/{}", subdir, filename)
}

/// Maps a stored public URL back to the file on disk. Returns None for URLs
/// outside the uploads tree or containing traversal segments.
pub fn resolve_upload_path(uploads_root: &Path, file_url: &str) -> Option<PathBuf> {
    let relative = file_url.strip_prefix("/static/uploads/")?;
    if relative.is_empty() || relative.split('/').any(|seg| seg == ".." || seg.is_empty()) {
        return None;
    }
    Some(uploads_root.join(relative))
}

/// Streams one multipart file field to disk, enforcing the size cap per chunk.
/// Returns the number of bytes written.
async fn save_field_to(
    field: &mut Field,
    destination: PathBuf,
) -> Result<u64, Box<dyn std::error::Error>> {
    let dir = destination
        .parent()
        .map(|p| p.to_path_buf())
        .ok_or("Upload destination has no parent directory.")?;
    web::block(move || fs::create_dir_all(&dir)).await??;

    let mut f = web::block({
        let destination = destination.clone();
        move || fs::File::create(destination)
    })
    .await??;

    let mut written: u64 = 0;
    while let Some(chunk) = field.next().await {
        let data = chunk?;
        written += data.len() as u64;
        if written > MAX_UPLOAD_BYTES {
            drop(f);
            let _ = fs::remove_file(&destination);
            return Err(format!(
                "File is too large. Maximum size is {}MB.",
                MAX_UPLOAD_BYTES / (1024 * 1024)
            )
            .into());
        }
        f = web::block(move || f.write_all(&data).map(|_| f)).await??;
    }
    Ok(written)
}

async fn read_text_field(field: &mut Field) -> Result<String, Box<dyn std::error::Error>> {
    let mut data = Vec::new();
    while let Some(chunk) = field.next().await {
        data.extend_from_slice(&chunk?);
    }
    String::from_utf8(data).map_err(|_| "Invalid UTF-8 in form field.".into())
}

/// A file field routed to a directory with a filename prefix.
pub struct UploadSpec {
    pub field: &'static str,
    pub subdir: &'static str,
    pub prefix: &'static str,
}

/// Everything pulled out of a multipart submission: plain text fields plus the
/// public URLs of files saved per spec, in arrival order.
pub struct MultipartSubmission {
    pub fields: HashMap<String, String>,
    pub files: HashMap<&'static str, Vec<String>>,
}

impl MultipartSubmission {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.trim()).filter(|s| !s.is_empty())
    }

    pub fn first_file(&self, field: &str) -> Option<&str> {
        self.files.get(field).and_then(|v| v.first()).map(|s| s.as_str())
    }
}

/// Walks a multipart payload, saving file fields that match a spec and
/// collecting everything else as text. Unknown file fields are drained and
/// discarded.
pub async fn collect_multipart(
    mut payload: Multipart,
    uploads_root: &Path,
    specs: &[UploadSpec],
) -> Result<MultipartSubmission, Box<dyn std::error::Error>> {
    let mut fields = HashMap::new();
    let mut files: HashMap<&'static str, Vec<String>> = HashMap::new();

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let field_name = field.content_disposition().get_name().unwrap_or_default().to_string();
        let filename = field.content_disposition().get_filename().map(|s| s.to_string());

        match filename {
            Some(original) => {
                let spec = match specs.iter().find(|s| s.field == field_name) {
                    Some(s) => s,
                    None => {
                        // Drain the unexpected file without keeping it.
                        while let Some(chunk) = field.next().await {
                            chunk?;
                        }
                        continue;
                    }
                };
                // Browsers send an empty filename for untouched file inputs.
                if original.is_empty() {
                    while let Some(chunk) = field.next().await {
                        chunk?;
                    }
                    continue;
                }
                let stored_name = timestamped_filename(spec.prefix, &original);
                let destination = uploads_root.join(spec.subdir).join(&stored_name);
                save_field_to(&mut field, destination).await?;
                files.entry(spec.field).or_default().push(public_url(spec.subdir, &stored_name));
            }
            None => {
                let value = read_text_field(&mut field).await?;
                fields.insert(field_name, value);
            }
        }
    }

    Ok(MultipartSubmission { fields, files })
}

/// Removes any files already saved for a submission whose database write failed.
pub fn discard_saved_files(uploads_root: &Path, submission: &MultipartSubmission) {
    for urls in submission.files.values() {
        for url in urls {
            if let Some(path) = resolve_upload_path(uploads_root, url) {
                if let Err(e) = fs::remove_file(&path) {
                    log::warn!("Could not discard orphaned upload '{}': {}", url, e);
                }
            }
        }
    }
}

pub enum MediaCaller {
    Admin,
    Ong(i64),
}

/// Detaches one media item: file first (best effort), then the tracking row.
/// Returns the parent case id so web callers can redirect back to it.
pub async fn detach_media(
    pool: &web::Data<DbPool>,
    uploads_root: PathBuf,
    media_id: i64,
    caller: &MediaCaller,
) -> Result<i64, Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    let media = media_db_operations::read_media_by_id(&conn, media_id)
        .ok_or("Media not found.")?;
    let case = case_db_operations::read_case_by_id(&conn, media.case_id)
        .ok_or("Parent case not found.")?;

    match caller {
        MediaCaller::Admin => {}
        MediaCaller::Ong(ong_id) => {
            if case.ong_id != *ong_id {
                return Err("Permission denied. This media belongs to another organisation.".into());
            }
        }
    }

    if let Some(path) = resolve_upload_path(&uploads_root, &media.file_url) {
        web::block(move || fs::remove_file(&path))
            .await
            .map_err(|e| format!("Blocking error on file delete: {}", e))?
            .unwrap_or_else(|e| {
                log::warn!("Media file for row {} was not removed: {}", media_id, e)
            });
    } else {
        log::warn!("Media row {} holds an unresolvable file URL '{}'.", media_id, media.file_url);
    }

    media_db_operations::delete_media_row(&conn, media_id)?;
    Ok(media.case_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_flattened_to_a_safe_charset() {
        assert_eq!(sanitize_filename("photo du cas.jpg"), "photo_du_cas.jpg");
        assert_eq!(sanitize_filename("../../etc/passwd"), ".._.._etc_passwd");
        assert!(sanitize_filename("").starts_with("upload-"));
        assert!(sanitize_filename("...").starts_with("upload-"));
    }

    #[test]
    fn timestamped_names_carry_prefix_and_stamp() {
        let name = timestamped_filename("logo_", "espoir.png");
        assert!(name.starts_with("logo_"));
        assert!(name.ends_with("_espoir.png"));
        // logo_ + 14-digit stamp + _ + original
        assert_eq!(name.len(), "logo_".len() + 14 + 1 + "espoir.png".len());
    }

    #[test]
    fn upload_urls_resolve_inside_the_root_only() {
        let root = Path::new("/srv/uploads");
        assert_eq!(
            resolve_upload_path(root, "/static/uploads/media/a.jpg"),
            Some(PathBuf::from("/srv/uploads/media/a.jpg"))
        );
        assert_eq!(resolve_upload_path(root, "/static/uploads/../secret"), None);
        assert_eq!(resolve_upload_path(root, "/elsewhere/a.jpg"), None);
        assert_eq!(resolve_upload_path(root, "/static/uploads/"), None);
    }
}
