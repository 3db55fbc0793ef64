//! Server configuration types.
//!
//! `taskboard-server` reads `taskboard.toml` into [`ServerConfig`] and then
//! applies environment overrides. Every field has a default so an empty or
//! missing file yields a runnable (if unauthenticated) server.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "taskboard.toml";

/// Environment variable naming an alternate config file.
pub const CONFIG_PATH_ENV: &str = "TASKBOARD_CONFIG";

/// Longest invitation lifetime accepted by [`ServerConfig::validate`].
pub const MAX_INVITATION_TTL_DAYS: u32 = 3650;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level server configuration (persisted as `taskboard.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub invitations: InvitationSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Pre-built frontend served as the fallback route, if it exists.
    #[serde(default = "default_web_dir")]
    pub web_dir: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            base_url: default_base_url(),
            web_dir: default_web_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSettings {
    /// HS256 signing secret. Empty disables every authenticated endpoint.
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_false")]
    pub cookie_secure: bool,
    #[serde(default = "default_true")]
    pub registration_open: bool,
    #[serde(default = "default_password_iterations")]
    pub password_iterations: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            cookie_secure: false,
            registration_open: true,
            password_iterations: default_password_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageSettings {
    /// Holds `taskboard.db` and the `attachments/` directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvitationSettings {
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u32,
}

impl Default for InvitationSettings {
    fn default() -> Self {
        Self {
            ttl_days: default_ttl_days(),
        }
    }
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}
fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_web_dir() -> String {
    "web/build".to_string()
}
fn default_password_iterations() -> u32 {
    600_000
}
fn default_data_dir() -> String {
    "data".to_string()
}
fn default_max_upload_bytes() -> u64 {
    25 * 1024 * 1024
}
fn default_ttl_days() -> u32 {
    7
}

// ── Loading ─────────────────────────────────────────────────────────────

impl ServerConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read `path`, or defaults when it does not exist.
    pub fn from_file_or_default(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                tracing::info!("loaded config from {}", path.display());
                Self::from_toml(&text, path)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("{} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Read `path`, apply process environment overrides, and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file_or_default(path)?;
        config.apply_overrides(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Config path from `TASKBOARD_CONFIG`, else `taskboard.toml`.
    pub fn default_path() -> PathBuf {
        std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Apply environment overrides through `lookup` (the process
    /// environment in production, a map in tests).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(bind) = lookup("TASKBOARD_BIND") {
            self.server.bind = bind;
        }
        if let Some(port) = lookup("PORT") {
            let port: u16 = parse_env("PORT", port)?;
            let host = self
                .server
                .bind
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.server.bind = format!("{host}:{port}");
        }
        if let Some(url) = lookup("BASE_URL") {
            self.server.base_url = url;
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(secure) = lookup("TASKBOARD_COOKIE_SECURE") {
            self.auth.cookie_secure = parse_bool("TASKBOARD_COOKIE_SECURE", secure)?;
        }
        if let Some(mode) = lookup("TASKBOARD_REGISTRATION") {
            self.auth.registration_open = match mode.trim().to_ascii_lowercase().as_str() {
                "open" => true,
                "closed" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: "TASKBOARD_REGISTRATION",
                        value: mode,
                    });
                }
            };
        }
        if let Some(dir) = lookup("TASKBOARD_DATA_DIR") {
            self.storage.data_dir = dir;
        }
        if let Some(bytes) = lookup("TASKBOARD_MAX_UPLOAD_BYTES") {
            self.storage.max_upload_bytes = parse_env("TASKBOARD_MAX_UPLOAD_BYTES", bytes)?;
        }
        if let Some(days) = lookup("TASKBOARD_INVITATION_TTL_DAYS") {
            self.invitations.ttl_days = parse_env("TASKBOARD_INVITATION_TTL_DAYS", days)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "storage.max_upload_bytes must be positive".into(),
            ));
        }
        if !(1..=MAX_INVITATION_TTL_DAYS).contains(&self.invitations.ttl_days) {
            return Err(ConfigError::Invalid(format!(
                "invitations.ttl_days must be between 1 and {MAX_INVITATION_TTL_DAYS}"
            )));
        }
        if self.auth.password_iterations < 1000 {
            return Err(ConfigError::Invalid(
                "auth.password_iterations must be at least 1000".into(),
            ));
        }
        Ok(())
    }

    pub fn auth_enabled(&self) -> bool {
        !self.auth.jwt_secret.is_empty()
    }

    /// Path of the SQLite database file.
    pub fn db_path(&self) -> PathBuf {
        Path::new(&self.storage.data_dir).join("taskboard.db")
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}

fn parse_bool(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_stable() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.server.bind, "0.0.0.0:3000");
        assert_eq!(cfg.storage.max_upload_bytes, 26_214_400);
        assert_eq!(cfg.invitations.ttl_days, 7);
        assert_eq!(cfg.auth.password_iterations, 600_000);
        assert!(cfg.auth.registration_open);
        assert!(!cfg.auth_enabled());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg = ServerConfig::from_toml(
            r#"
[auth]
jwt_secret = "s3cret"

[storage]
data_dir = "/var/lib/taskboard"
"#,
            Path::new("test.toml"),
        )
        .expect("parse toml");

        assert!(cfg.auth_enabled());
        assert!(cfg.auth.registration_open);
        assert_eq!(cfg.storage.data_dir, "/var/lib/taskboard");
        assert_eq!(cfg.storage.max_upload_bytes, 26_214_400);
        assert_eq!(cfg.server, ServerSettings::default());
        assert_eq!(
            cfg.db_path(),
            Path::new("/var/lib/taskboard").join("taskboard.db")
        );
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let err = ServerConfig::from_toml("[auth\njwt_secret = 1", Path::new("bad.toml"))
            .expect_err("should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = ServerConfig::default();
        cfg.apply_overrides(env(&[
            ("PORT", "8080"),
            ("JWT_SECRET", "abc"),
            ("TASKBOARD_COOKIE_SECURE", "true"),
            ("TASKBOARD_REGISTRATION", "closed"),
            ("TASKBOARD_MAX_UPLOAD_BYTES", "1024"),
            ("TASKBOARD_INVITATION_TTL_DAYS", "3"),
        ]))
        .expect("apply overrides");

        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
        assert_eq!(cfg.auth.jwt_secret, "abc");
        assert!(cfg.auth.cookie_secure);
        assert!(!cfg.auth.registration_open);
        assert_eq!(cfg.storage.max_upload_bytes, 1024);
        assert_eq!(cfg.invitations.ttl_days, 3);
    }

    #[test]
    fn bind_override_then_port() {
        let mut cfg = ServerConfig::default();
        cfg.apply_overrides(env(&[("TASKBOARD_BIND", "127.0.0.1:9000"), ("PORT", "9100")]))
            .expect("apply overrides");
        assert_eq!(cfg.server.bind, "127.0.0.1:9100");
    }

    #[test]
    fn invalid_numeric_override_is_rejected() {
        let mut cfg = ServerConfig::default();
        let err = cfg
            .apply_overrides(env(&[("PORT", "eighty")]))
            .expect_err("should fail");
        assert!(matches!(err, ConfigError::InvalidEnv { var: "PORT", .. }));

        let err = cfg
            .apply_overrides(env(&[("TASKBOARD_REGISTRATION", "maybe")]))
            .expect_err("should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "TASKBOARD_REGISTRATION",
                ..
            }
        ));
    }

    #[test]
    fn validate_rejects_degenerate_values() {
        let mut cfg = ServerConfig::default();
        cfg.storage.max_upload_bytes = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = ServerConfig::default();
        cfg.invitations.ttl_days = 0;
        assert!(cfg.validate().is_err());
        cfg.invitations.ttl_days = MAX_INVITATION_TTL_DAYS + 1;
        assert!(cfg.validate().is_err());
        cfg.invitations.ttl_days = u32::MAX;
        assert!(cfg.validate().is_err());
        cfg.invitations.ttl_days = MAX_INVITATION_TTL_DAYS;
        assert!(cfg.validate().is_ok());

        let mut cfg = ServerConfig::default();
        cfg.auth.password_iterations = 999;
        assert!(cfg.validate().is_err());
        cfg.auth.password_iterations = 1000;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.toml");
        let cfg = ServerConfig::from_file_or_default(&path).expect("load");
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[invitations]\nttl_days = 14\n").expect("write");
        let cfg = ServerConfig::from_file_or_default(&path).expect("load");
        assert_eq!(cfg.invitations.ttl_days, 14);
    }
}
