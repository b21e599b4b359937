use std::env;
use std::path::PathBuf;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Directory uploaded images are written to.
    pub media_root: PathBuf,
    /// URL prefix the media directory is served under (debug mode only).
    pub media_url: String,
    pub default_avatar: String,
    pub debug: bool,
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://bookworm.db?mode=rwc".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            media_root: env::var("MEDIA_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("media")),
            media_url: env::var("MEDIA_URL").unwrap_or_else(|_| "/media/".to_string()),
            default_avatar: env::var("DEFAULT_AVATAR")
                .unwrap_or_else(|_| "/static/images/default_avatar.png".to_string()),
            debug: env::var("DEBUG")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(false),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(Vec::new),
        }
    }
}
