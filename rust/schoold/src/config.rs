use std::path::PathBuf;

pub const WORKSPACE_ENV: &str = "SCHOOLD_WORKSPACE";
pub const ADMIN_USER_ENV: &str = "SCHOOLD_ADMIN_USER";
pub const ADMIN_PASSWORD_ENV: &str = "SCHOOLD_ADMIN_PASSWORD";

const ADMIN_USER_DEFAULT: &str = "admin";
const ADMIN_PASSWORD_DEFAULT: &str = "admin123";

const TRACING_FILTER_DEFAULT: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl AdminCredentials {
    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Opened at start-up when set, before any `workspace.select`.
    pub workspace: Option<PathBuf>,
    pub admin: AdminCredentials,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let workspace = non_empty(WORKSPACE_ENV).map(PathBuf::from);
        let admin = AdminCredentials {
            username: non_empty(ADMIN_USER_ENV).unwrap_or_else(|| ADMIN_USER_DEFAULT.to_string()),
            password: non_empty(ADMIN_PASSWORD_ENV)
                .unwrap_or_else(|| ADMIN_PASSWORD_DEFAULT.to_string()),
        };
        if let Some(path) = &workspace {
            tracing::debug!("{} = {}", WORKSPACE_ENV, path.to_string_lossy());
        }
        Config { workspace, admin }
    }
}

/// Logs go to stderr; stdout carries the protocol.
pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|err| {
        if let Ok(raw) = std::env::var("RUST_LOG") {
            if !raw.is_empty() {
                eprintln!("Failed to parse RUST_LOG '{}': {}", raw, err);
            }
        }
        tracing_subscriber::EnvFilter::new(TRACING_FILTER_DEFAULT)
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_when_unset_or_blank() {
        let vars: HashMap<&str, &str> = HashMap::from([(ADMIN_USER_ENV, "  ")]);
        let cfg = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert!(cfg.workspace.is_none());
        assert!(cfg.admin.matches("admin", "admin123"));
    }

    #[test]
    fn env_overrides_are_read() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (WORKSPACE_ENV, "/tmp/school"),
            (ADMIN_USER_ENV, "head"),
            (ADMIN_PASSWORD_ENV, "s3cret"),
        ]);
        let cfg = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/school")));
        assert!(cfg.admin.matches("head", "s3cret"));
        assert!(!cfg.admin.matches("admin", "admin123"));
    }
}
