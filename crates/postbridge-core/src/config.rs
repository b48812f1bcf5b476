//! Configuration management for postbridge.
//!
//! Loads configuration from ${POSTBRIDGE_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use postbridge_types::Platform;
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the backend base URL.
pub const API_URL_ENV: &str = "POSTBRIDGE_API_URL";

/// Backend used when neither env nor config names one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Returns the default config template with comments.
///
/// Embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Parses the user's config and lays its values over the current template.
///
/// Template comments and sections added since the file was written come
/// through; every key the user set keeps its value.
fn upgrade_user_config(user_config: &str) -> Result<toml_edit::DocumentMut> {
    let mut doc: toml_edit::DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;
    let user_doc: toml_edit::DocumentMut =
        user_config.parse().context("Failed to parse user config")?;

    overlay_values(doc.as_table_mut(), user_doc.as_table());
    Ok(doc)
}

fn overlay_values(target: &mut toml_edit::Table, user: &toml_edit::Table) {
    use toml_edit::Item;

    for (key, item) in user.iter() {
        if let (Some(Item::Table(section)), Item::Table(user_section)) = (target.get_mut(key), item)
        {
            overlay_values(section, user_section);
            continue;
        }
        if !item.is_none() {
            target[key] = item.clone();
        }
    }
}

/// Writes `contents` to a sibling `.tmp` file and renames it over `path`,
/// creating parent directories as needed. `private` files are created 0600
/// on unix.
pub(crate) fn write_atomic(path: &Path, contents: &str, private: bool) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);
    // A leftover temp file would keep its old permissions.
    if tmp_path.exists() {
        fs::remove_file(&tmp_path)
            .with_context(|| format!("Failed to remove stale {}", tmp_path.display()))?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        if private {
            options.mode(0o600);
        }
    }
    #[cfg(not(unix))]
    let _ = private;

    let mut file = options
        .open(&tmp_path)
        .with_context(|| format!("Failed to open {} for writing", tmp_path.display()))?;
    file.write_all(contents.as_bytes())
        .and_then(|()| file.sync_all())
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    drop(file);

    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            tmp_path.display(),
            path.display()
        )
    })
}

pub mod paths {
    //! Path resolution for postbridge configuration and state.
    //!
    //! POSTBRIDGE_HOME resolution order:
    //! 1. POSTBRIDGE_HOME environment variable (if set)
    //! 2. ~/.config/postbridge (default)

    use std::path::PathBuf;

    /// Returns the postbridge home directory.
    pub fn postbridge_home() -> PathBuf {
        if let Ok(home) = std::env::var("POSTBRIDGE_HOME")
            && !home.trim().is_empty()
        {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".postbridge"),
            |h| h.join(".config").join("postbridge"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        postbridge_home().join("config.toml")
    }

    /// Returns the path to the persisted session file.
    pub fn session_path() -> PathBuf {
        postbridge_home().join("session.json")
    }
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the backend (optional; see [`Config::effective_base_url`])
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Request timeout in seconds (0 disables)
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
        }
    }
}

/// Backend paths, one per operation.
///
/// Init and callback-exchange paths are kept independent: the backend serves
/// them under different prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub login: String,
    pub signup: String,
    pub me: String,
    pub oauth_status: String,
    pub oauth_init: String,
    pub oauth_callback: String,
    pub accounts: String,
    pub unlink_account: String,
    pub posts: String,
    pub create_post: String,
    pub instant_post: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            login: "/api/auth/login".to_string(),
            signup: "/api/auth/signup".to_string(),
            me: "/api/auth/me".to_string(),
            oauth_status: "/api/oauth/status".to_string(),
            oauth_init: "/api/oauth/social/auth/{platform}/init".to_string(),
            oauth_callback: "/api/social/auth/{platform}/callback".to_string(),
            accounts: "/api/oauth/social/accounts".to_string(),
            unlink_account: "/api/oauth/social/accounts/{platform}".to_string(),
            posts: "/api/posts".to_string(),
            create_post: "/api/posts/create".to_string(),
            instant_post: "/api/posts/instant".to_string(),
        }
    }
}

impl EndpointsConfig {
    /// Substitutes the `{platform}` placeholder in a path template.
    pub fn for_platform(template: &str, platform: Platform) -> String {
        template.replace("{platform}", platform.id())
    }

    pub fn oauth_init_for(&self, platform: Platform) -> String {
        Self::for_platform(&self.oauth_init, platform)
    }

    pub fn oauth_callback_for(&self, platform: Platform) -> String {
        Self::for_platform(&self.oauth_callback, platform)
    }

    pub fn unlink_account_for(&self, platform: Platform) -> String {
        Self::for_platform(&self.unlink_account, platform)
    }
}

/// OAuth linking behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub success_redirect_delay_ms: u64,
    pub failure_redirect_delay_ms: u64,
    pub open_browser: bool,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            success_redirect_delay_ms: 2000,
            failure_redirect_delay_ms: 3000,
            open_browser: true,
        }
    }
}

impl OAuthConfig {
    pub fn success_delay(&self) -> Duration {
        Duration::from_millis(self.success_redirect_delay_ms)
    }

    pub fn failure_delay(&self) -> Duration {
        Duration::from_millis(self.failure_redirect_delay_ms)
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub endpoints: EndpointsConfig,
    pub oauth: OAuthConfig,
}

impl Config {
    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Resolves the backend base URL with precedence: env > config > default.
    ///
    /// # Errors
    /// Returns an error if the chosen URL is not a valid absolute URL.
    pub fn effective_base_url(&self) -> Result<String> {
        resolve_base_url(self.api.base_url.as_deref(), API_URL_ENV, DEFAULT_BASE_URL)
    }

    /// Returns the request timeout, or None when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        if self.api.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.api.timeout_secs))
        }
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        write_atomic(path, default_config_template(), false)
    }

    /// Saves only `api.base_url` to the default config file.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the file cannot be written.
    pub fn save_base_url(base_url: &str) -> Result<()> {
        Self::save_base_url_to(&paths::config_path(), base_url)
    }

    /// Saves only `api.base_url` to a specific config file path.
    ///
    /// Creates the file with default template if it doesn't exist.
    /// If file exists, merges user values into the latest template.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the file cannot be written.
    pub fn save_base_url_to(path: &Path, base_url: &str) -> Result<()> {
        use toml_edit::{DocumentMut, Item, Table, value};

        let base_url = base_url.trim();
        validate_url(base_url)?;

        let mut doc: DocumentMut = if path.exists() {
            let user_config = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            upgrade_user_config(&user_config)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?
        } else {
            default_config_template()
                .parse()
                .context("Failed to parse default config template")?
        };

        if !doc.contains_table("api") {
            doc["api"] = Item::Table(Table::new());
        }
        doc["api"]["base_url"] = value(base_url);

        write_atomic(path, &doc.to_string(), false)
    }
}

/// Resolves a base URL with precedence: env > config > default.
///
/// Empty or whitespace-only values are treated as unset.
///
/// # Errors
/// Returns an error if the selected env or config value is not a valid URL.
pub fn resolve_base_url(
    config_base_url: Option<&str>,
    env_var: &str,
    default_url: &str,
) -> Result<String> {
    if let Ok(env_url) = std::env::var(env_var) {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    if let Some(config_url) = config_base_url {
        let trimmed = config_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    Ok(default_url.to_string())
}

fn validate_url(url: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid backend base URL: {url}"))?;
    Ok(())
}
