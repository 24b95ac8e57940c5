use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::env;
use config;

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    // These fields are populated from the .env file
    pub database_path: String,
    pub uploads_path: String,
    pub allowed_origins: String,
    pub log_level: String,
    pub session_secret_key: String,
    pub jwt_secret: String,
    pub use_secure_cookies: bool,
    // SMTP is optional; password-reset mail is skipped when unset.
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub mail_from: Option<String>,
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        // Load the specified .env file. Propagate an error if it fails.
        dotenvy::from_path(env_path)
            .map_err(|e| config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}", env_path.display(), e
            )))?;

        let database_path = env::var("DATABASE_PATH")
            .map_err(|_| config::ConfigError::Message(
                "FATAL: Environment variable 'DATABASE_PATH' is not set in your .env file.".to_string()
            ))?;

        let uploads_path = env::var("UPLOADS_PATH")
            .map_err(|_| config::ConfigError::Message(
                "FATAL: Environment variable 'UPLOADS_PATH' is not set in your .env file.".to_string()
            ))?;

        let session_secret_key = env::var("SESSION_SECRET_KEY")
            .map_err(|_| config::ConfigError::Message(
                "FATAL: Environment variable 'SESSION_SECRET_KEY' is not set in your .env file.".to_string()
            ))?;

        // The session key must be 128 hex characters (64 bytes).
        if session_secret_key.len() != 128 || !session_secret_key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(config::ConfigError::Message(
                "FATAL: 'SESSION_SECRET_KEY' must be 128 hexadecimal characters long (64 bytes).".to_string()
            ));
        }

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| config::ConfigError::Message(
                "FATAL: Environment variable 'JWT_SECRET' is not set in your .env file.".to_string()
            ))?;

        if jwt_secret.len() < 32 {
            return Err(config::ConfigError::Message(
                "FATAL: 'JWT_SECRET' must be at least 32 characters long.".to_string()
            ));
        }

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "".to_string());

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let use_secure_cookies = env::var("USE_SECURE_COOKIES")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        // Check that the paths are absolute.
        if Path::new(&database_path).is_relative() {
            return Err(config::ConfigError::Message(format!(
                "FATAL: The 'DATABASE_PATH' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
                database_path
            )));
        }

        if Path::new(&uploads_path).is_relative() {
            return Err(config::ConfigError::Message(format!(
                "FATAL: The 'UPLOADS_PATH' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
                uploads_path
            )));
        }

        let mut builder = config::Config::builder()
            // Base settings from the TOML file (web host/port).
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml))
            .set_override("database_path", database_path)?
            .set_override("uploads_path", uploads_path)?
            .set_override("session_secret_key", session_secret_key)?
            .set_override("jwt_secret", jwt_secret)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("use_secure_cookies", use_secure_cookies)?;

        // SMTP settings are only applied when present.
        if let Ok(v) = env::var("SMTP_HOST") {
            builder = builder.set_override("smtp_host", v)?;
        }
        if let Ok(v) = env::var("SMTP_PORT") {
            let port = v.parse::<u16>().map_err(|_| config::ConfigError::Message(
                "FATAL: 'SMTP_PORT' must be a valid port number.".to_string()
            ))?;
            builder = builder.set_override("smtp_port", port as i64)?;
        }
        if let Ok(v) = env::var("SMTP_USERNAME") {
            builder = builder.set_override("smtp_username", v)?;
        }
        if let Ok(v) = env::var("SMTP_PASSWORD") {
            builder = builder.set_override("smtp_password", v)?;
        }
        if let Ok(v) = env::var("MAIL_FROM") {
            builder = builder.set_override("mail_from", v)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Returns the full path to the SQLite database file inside its own folder.
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path).join("ongconnect.db")
    }

    /// Case media files live here.
    pub fn media_dir(&self) -> PathBuf {
        PathBuf::from(&self.uploads_path).join("media")
    }

    /// NGO logos live here.
    pub fn logos_dir(&self) -> PathBuf {
        PathBuf::from(&self.uploads_path).join("logos")
    }

    /// NGO verification documents live here.
    pub fn docs_dir(&self) -> PathBuf {
        PathBuf::from(&self.uploads_path).join("docs")
    }
}
