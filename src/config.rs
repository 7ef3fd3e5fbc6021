//! Server configuration loaded from the environment.

use std::env;
use std::path::PathBuf;

use tracing::warn;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_DATA_DIR: &str = "./data";

/// Runtime configuration, all overridable through environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the server listens on (`PORT`)
    pub port: u16,
    /// Directory holding the collection JSON files (`DATA_DIR`)
    pub data_dir: PathBuf,
    /// Directory uploads are written to and served from (`UPLOAD_DIR`,
    /// defaults to `uploads/` under the data dir)
    pub upload_dir: PathBuf,
    /// Admin login username (`ADMIN_USERNAME`)
    pub admin_username: Option<String>,
    /// Admin login password (`ADMIN_PASSWORD`)
    pub admin_password: Option<String>,
    /// GA4 property id (`GA_PROPERTY_ID`)
    pub ga_property_id: Option<String>,
    /// Path to the GA service account key (`GA_CREDENTIALS`)
    pub ga_credentials: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            upload_dir: PathBuf::from(DEFAULT_DATA_DIR).join("uploads"),
            admin_username: None,
            admin_password: None,
            ga_property_id: None,
            ga_credentials: None,
        }
    }
}

impl Config {
    /// Load from the environment, falling back to defaults
    pub fn load() -> Self {
        let port = match var("PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("Invalid PORT value {:?}: {}", raw, e);
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        let data_dir = var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let upload_dir = var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("uploads"));

        Self {
            port,
            data_dir,
            upload_dir,
            admin_username: var("ADMIN_USERNAME"),
            admin_password: var("ADMIN_PASSWORD"),
            ga_property_id: var("GA_PROPERTY_ID"),
            ga_credentials: var("GA_CREDENTIALS").map(PathBuf::from),
        }
    }
}

/// A non-empty environment variable, if set
fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 3001);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.upload_dir, PathBuf::from("./data/uploads"));
        assert!(config.admin_username.is_none());
        assert!(config.ga_property_id.is_none());
    }

    #[test]
    fn test_var_skips_empty_values() {
        env::set_var("PORTFOLIO_CONFIG_TEST_EMPTY", "   ");
        env::set_var("PORTFOLIO_CONFIG_TEST_SET", "value");

        assert_eq!(var("PORTFOLIO_CONFIG_TEST_EMPTY"), None);
        assert_eq!(var("PORTFOLIO_CONFIG_TEST_UNSET"), None);
        assert_eq!(var("PORTFOLIO_CONFIG_TEST_SET"), Some("value".to_string()));
    }
}
