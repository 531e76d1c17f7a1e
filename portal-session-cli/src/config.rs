//! CLI configuration handling.

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use portal_session_client::{PageLocation, SessionConfig};
use portal_session_core::StoreBackend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Keyring service name used when `store = "keyring"`.
const KEYRING_SERVICE: &str = "portal-session";

/// Where the CLI keeps credentials between invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// `credentials.json` under `data_dir`.
    #[default]
    File,
    /// OS keyring, falling back to memory when unavailable.
    Keyring,
    /// Nothing survives the process.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Client settings, the `[session]` table.
    pub session: SessionConfig,

    pub store: StoreKind,

    /// Directory for the credentials file.
    pub data_dir: PathBuf,

    /// Logging level when `RUST_LOG` is unset.
    pub log_level: String,

    /// Page the CLI pretends to be on when issuing requests.
    pub page_url: String,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".portal-session"));

        Self {
            session: SessionConfig::default(),
            store: StoreKind::default(),
            data_dir,
            log_level: "info".to_string(),
            page_url: "http://localhost:3000/admin/dashboard".to_string(),
            config_path: PathBuf::new(),
        }
    }
}

impl CliConfig {
    /// Backend for [`create_store`](portal_session_core::create_store).
    pub fn store_backend(&self) -> StoreBackend {
        match self.store {
            StoreKind::File => StoreBackend::File {
                path: self.data_dir.join("credentials.json"),
            },
            StoreKind::Keyring => StoreBackend::Keyring {
                service: KEYRING_SERVICE.to_string(),
            },
            StoreKind::Memory => StoreBackend::Memory,
        }
    }

    /// The configured page, with its path replaced by `path` when given.
    pub fn page(&self, path: Option<&str>) -> Result<PageLocation> {
        let mut page = PageLocation::parse(&self.page_url)
            .with_context(|| format!("Invalid page_url {:?}", self.page_url))?;
        if let Some(path) = path {
            page.path = path.to_string();
        }
        Ok(page)
    }
}

/// Load configuration from `explicit`, or the default location.
///
/// A missing file at the default location yields defaults; an explicitly
/// requested file must exist.
pub fn load_config(explicit: Option<&Path>) -> Result<CliConfig> {
    let config_path = match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("Config file {:?} does not exist", path);
            }
            path.to_path_buf()
        }
        None => default_config_path(),
    };

    let mut config = if config_path.exists() {
        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", config_path))?
    } else {
        CliConfig::default()
    };

    config.config_path = config_path;

    config
        .session
        .validate()
        .with_context(|| format!("Invalid [session] in {:?}", config.config_path))?;

    Ok(config)
}

fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("portal-session.toml"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "portal-session", "portal-session")
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_session_client::MixedContentPolicy;
    use tempfile::TempDir;

    fn write_config(contents: &str) -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        (temp, path)
    }

    #[test]
    fn test_full_config() {
        let (_temp, path) = write_config(
            r#"
store = "memory"
data_dir = "/var/lib/portal"
log_level = "warn"
page_url = "https://studio.example.com/client/projects"

[session]
base_url = "https://api.example.com/api"
timeout_secs = 10
auth_failure_statuses = [401, 419]
mixed_content = "reject"

[session.destinations]
client = "/portal/login"

[[session.slots]]
name = "client"
token_key = "client_token"
profile_key = "client_user"
"#,
        );

        let config = load_config(Some(path.as_path())).unwrap();

        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.store_backend(), StoreBackend::Memory);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.config_path, path);
        assert_eq!(config.session.timeout_secs, 10);
        assert_eq!(config.session.auth_failure_statuses, vec![401, 419]);
        assert_eq!(config.session.mixed_content, MixedContentPolicy::Reject);
        assert_eq!(config.session.destinations.client, "/portal/login");
        assert_eq!(config.session.destinations.admin, "/admin/login");
        assert_eq!(config.session.slots.slots().len(), 1);

        let page = config.page(None).unwrap();
        assert!(page.is_secure());
        assert_eq!(page.path, "/client/projects");
        assert_eq!(config.page(Some("/admin/login")).unwrap().path, "/admin/login");
    }

    #[test]
    fn test_empty_config_is_defaults() {
        let (_temp, path) = write_config("");

        let config = load_config(Some(path.as_path())).unwrap();

        assert_eq!(config.store, StoreKind::File);
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(
            config.store_backend(),
            StoreBackend::File {
                path: config.data_dir.join("credentials.json")
            }
        );
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let temp = TempDir::new().unwrap();
        assert!(load_config(Some(temp.path().join("nope.toml").as_path())).is_err());
    }

    #[test]
    fn test_invalid_session_rejected() {
        let (_temp, path) = write_config("[session]\nbase_url = \"ftp://files\"\n");
        assert!(load_config(Some(path.as_path())).is_err());

        let (_temp, path) = write_config(
            "[[session.slots]]\nname = \"a\"\ntoken_key = \"k\"\n[[session.slots]]\nname = \"b\"\ntoken_key = \"k\"\n",
        );
        assert!(load_config(Some(path.as_path())).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let (_temp, path) = write_config("[session]\ntimeout_secs = 0\n");
        let err = load_config(Some(path.as_path())).unwrap_err();
        assert!(format!("{:#}", err).contains("timeout_secs"));
    }
}
