//! Filter configuration.
//!
//! Filters read their configuration once, at construction. Parameters use
//! the servlet-style names (`logoutFromForceDotCom`, ...) so existing
//! deployment descriptors translate one-to-one; `from_env` maps
//! `FORCE_*` environment variables onto the same names.

use force_auth::{Error, ErrorKind, Result, StorageMethod};

/// Whether logout also ends the provider's browser session.
pub const LOGOUT_FROM_FORCE_DOT_COM: &str = "logoutFromForceDotCom";

/// Local page users land on after logout.
pub const LOGOUT_SUCCESS_URL: &str = "logoutSuccessUrl";

/// `cookie` or `session`.
pub const SECURITY_CONTEXT_STORAGE_METHOD: &str = "securityContextStorageMethod";

/// Comma-separated paths the authentication filter lets through.
pub const EXCLUDED_PATHS: &str = "excludedPaths";

/// API version for the session endpoint.
pub const API_VERSION: &str = "apiVersion";

const LOGOUT_ENV: &[(&str, &str)] = &[
    ("FORCE_LOGOUT_FROM_FORCE_DOT_COM", LOGOUT_FROM_FORCE_DOT_COM),
    ("FORCE_LOGOUT_SUCCESS_URL", LOGOUT_SUCCESS_URL),
    ("FORCE_SECURITY_CONTEXT_STORAGE_METHOD", SECURITY_CONTEXT_STORAGE_METHOD),
];

const AUTH_ENV: &[(&str, &str)] = &[
    ("FORCE_SECURITY_CONTEXT_STORAGE_METHOD", SECURITY_CONTEXT_STORAGE_METHOD),
    ("FORCE_EXCLUDED_PATHS", EXCLUDED_PATHS),
    ("FORCE_API_VERSION", API_VERSION),
];

/// Configuration of the logout filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutFilterConfig {
    /// Also log out of the provider by redirecting through its logout page.
    pub logout_from_force_dot_com: bool,
    /// Local target after logout.
    pub logout_success_url: String,
    /// Where the security context is stored.
    pub storage_method: StorageMethod,
}

impl Default for LogoutFilterConfig {
    fn default() -> Self {
        Self {
            logout_from_force_dot_com: true,
            logout_success_url: "/".to_string(),
            storage_method: StorageMethod::Cookie,
        }
    }
}

impl LogoutFilterConfig {
    pub fn with_logout_from_force_dot_com(mut self, enabled: bool) -> Self {
        self.logout_from_force_dot_com = enabled;
        self
    }

    pub fn with_logout_success_url(mut self, url: impl Into<String>) -> Self {
        self.logout_success_url = url.into();
        self
    }

    pub fn with_storage_method(mut self, method: StorageMethod) -> Self {
        self.storage_method = method;
        self
    }

    /// Parse init parameters; missing ones keep their defaults.
    pub fn from_init_params<I, K, V>(params: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (name, value) in params {
            let value = value.as_ref();
            match name.as_ref() {
                LOGOUT_FROM_FORCE_DOT_COM => {
                    config.logout_from_force_dot_com = parse_bool(LOGOUT_FROM_FORCE_DOT_COM, value)?
                }
                LOGOUT_SUCCESS_URL => {
                    if value.trim().is_empty() {
                        return Err(invalid(LOGOUT_SUCCESS_URL, "must not be empty"));
                    }
                    config.logout_success_url = value.trim().to_string();
                }
                SECURITY_CONTEXT_STORAGE_METHOD => config.storage_method = value.parse()?,
                other => tracing::debug!(param = other, "Ignoring unknown logout filter parameter"),
            }
        }
        Ok(config)
    }

    /// Read the parameters from `FORCE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_init_params(env_params(LOGOUT_ENV))
    }
}

/// Configuration of the authentication filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFilterConfig {
    /// Where the security context is stored.
    pub storage_method: StorageMethod,
    /// Paths passed through without authentication.
    pub excluded_paths: Vec<String>,
    /// API version used to build the session endpoint.
    pub api_version: String,
}

impl Default for AuthFilterConfig {
    fn default() -> Self {
        Self {
            storage_method: StorageMethod::Cookie,
            excluded_paths: vec!["/logout".to_string()],
            api_version: force_auth::DEFAULT_API_VERSION.to_string(),
        }
    }
}

impl AuthFilterConfig {
    pub fn with_storage_method(mut self, method: StorageMethod) -> Self {
        self.storage_method = method;
        self
    }

    /// Replace the excluded paths.
    pub fn with_excluded_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.excluded_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Returns true if `path` bypasses authentication.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_paths.iter().any(|p| p == path)
    }

    /// Parse init parameters; missing ones keep their defaults.
    pub fn from_init_params<I, K, V>(params: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (name, value) in params {
            let value = value.as_ref();
            match name.as_ref() {
                SECURITY_CONTEXT_STORAGE_METHOD => config.storage_method = value.parse()?,
                EXCLUDED_PATHS => {
                    config.excluded_paths = value
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect()
                }
                API_VERSION => {
                    if value.trim().is_empty() {
                        return Err(invalid(API_VERSION, "must not be empty"));
                    }
                    config.api_version = value.trim().to_string();
                }
                other => tracing::debug!(param = other, "Ignoring unknown auth filter parameter"),
            }
        }
        Ok(config)
    }

    /// Read the parameters from `FORCE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_init_params(env_params(AUTH_ENV))
    }
}

fn env_params(mapping: &[(&str, &'static str)]) -> Vec<(&'static str, String)> {
    mapping
        .iter()
        .filter_map(|(var, param)| std::env::var(var).ok().map(|value| (*param, value)))
        .collect()
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(name, "expected 'true' or 'false'")),
    }
}

fn invalid(name: &str, reason: &str) -> Error {
    Error::new(ErrorKind::Config(format!("{}: {}", name, reason)))
}
