//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The refresh secret is never stored in the TOML — it lives in the session
//! file or the REDGIFS_REFRESH_TOKEN env var, resolved by the session store.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

/// HTTP proxy settings
#[derive(Debug, Deserialize)]
pub struct ProxyConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Token acquisition settings
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// Path to the session file holding the refresh secret. Optional:
    /// without it the env var is the only secret source and login
    /// persistence is disabled.
    #[serde(default)]
    pub session_file: Option<PathBuf>,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default = "default_temporary_endpoint")]
    pub temporary_endpoint: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_file: None,
            token_endpoint: default_token_endpoint(),
            temporary_endpoint: default_temporary_endpoint(),
        }
    }
}

/// Media passthrough settings
#[derive(Debug, Deserialize)]
pub struct MediaConfig {
    /// Hosts (and their subdomains) media may be proxied from
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: default_allowed_hosts(),
        }
    }
}

fn default_api_base() -> String {
    redgifs_auth::API_BASE.to_owned()
}

fn default_token_endpoint() -> String {
    redgifs_auth::TOKEN_ENDPOINT.to_owned()
}

fn default_temporary_endpoint() -> String {
    redgifs_auth::TEMPORARY_ENDPOINT.to_owned()
}

fn default_allowed_hosts() -> Vec<String> {
    vec!["redgifs.com".to_owned()]
}

fn default_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    1000
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        for (name, url) in [
            ("api_base", &config.proxy.api_base),
            ("token_endpoint", &config.auth.token_endpoint),
            ("temporary_endpoint", &config.auth.temporary_endpoint),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if config.proxy.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.proxy.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if config.media.allowed_hosts.is_empty() {
            return Err(common::Error::Config(
                "media.allowed_hosts must not be empty".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("media-proxy.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn valid_toml() -> &'static str {
        r#"
[proxy]
listen_addr = "127.0.0.1:3001"

[auth]
session_file = "/var/lib/media-proxy/session.json"
"#
    }

    fn write_config(dir_name: &str, contents: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(dir_name);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn load_valid_config_applies_defaults() {
        let (dir, path) = write_config("media-proxy-test-valid", valid_toml());

        let config = Config::load(&path).unwrap();
        assert_eq!(config.proxy.listen_addr.port(), 3001);
        assert_eq!(config.proxy.api_base, "https://api.redgifs.com");
        assert_eq!(config.proxy.timeout_secs, 30);
        assert_eq!(config.proxy.max_connections, 1000);
        assert_eq!(
            config.auth.token_endpoint,
            "https://auth2.redgifs.com/oauth2/token"
        );
        assert_eq!(
            config.auth.session_file.as_deref(),
            Some(Path::new("/var/lib/media-proxy/session.json"))
        );
        assert_eq!(config.media.allowed_hosts, vec!["redgifs.com"]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn minimal_config_has_no_session_file() {
        let (dir, path) = write_config(
            "media-proxy-test-minimal",
            "[proxy]\nlisten_addr = \"127.0.0.1:3001\"\n",
        );

        let config = Config::load(&path).unwrap();
        assert!(config.auth.session_file.is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn load_missing_file_errors() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_invalid_toml_errors() {
        let (dir, path) = write_config("media-proxy-test-invalid", "not valid {{{{ toml");
        let result = Config::load(&path);
        assert!(result.is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn api_base_without_scheme_rejected() {
        let (dir, path) = write_config(
            "media-proxy-test-bad-url",
            "[proxy]\nlisten_addr = \"127.0.0.1:3001\"\napi_base = \"api.redgifs.com\"\n",
        );

        let result = Config::load(&path);
        assert!(result.is_err(), "api_base without scheme must be rejected");
        let err = format!("{}", result.unwrap_err());
        assert!(
            err.contains("api_base must start with http"),
            "error message should explain the issue, got: {err}"
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn zero_timeout_rejected() {
        let (dir, path) = write_config(
            "media-proxy-test-zero-timeout",
            "[proxy]\nlisten_addr = \"127.0.0.1:3001\"\ntimeout_secs = 0\n",
        );
        assert!(Config::load(&path).is_err(), "timeout_secs = 0 must be rejected");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn zero_max_connections_rejected() {
        let (dir, path) = write_config(
            "media-proxy-test-zero-maxconn",
            "[proxy]\nlisten_addr = \"127.0.0.1:3001\"\nmax_connections = 0\n",
        );
        assert!(
            Config::load(&path).is_err(),
            "max_connections = 0 must be rejected"
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_allowed_hosts_rejected() {
        let (dir, path) = write_config(
            "media-proxy-test-empty-hosts",
            "[proxy]\nlisten_addr = \"127.0.0.1:3001\"\n\n[media]\nallowed_hosts = []\n",
        );
        assert!(
            Config::load(&path).is_err(),
            "empty allowed_hosts must be rejected"
        );
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("media-proxy.toml"));
    }

    #[test]
    fn resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(
            path,
            PathBuf::from("/cli/wins.toml"),
            "CLI arg must take precedence over CONFIG_PATH env var"
        );
        unsafe { remove_env("CONFIG_PATH") };
    }
}
