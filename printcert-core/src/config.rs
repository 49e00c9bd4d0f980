use crate::error::{ConsoleError, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix; nested keys are separated by `__`,
/// e.g. `PRINTCERT_DEVICE__HOST`.
pub const ENV_PREFIX: &str = "PRINTCERT_";

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub material: MaterialConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Connection settings for the printer's web console.
#[derive(Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub password: String,
    /// Talk plain HTTP to the console (insecure).
    #[serde(default)]
    pub use_http: bool,
    /// Accept a console certificate that fails verification, e.g. the
    /// self-signed factory preset.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Wait after upload/delete for device-side processing.
    #[serde(default = "default_settle")]
    pub settle_secs: u64,
    /// Wait after activation for the device to reboot.
    #[serde(default = "default_reboot_wait")]
    pub reboot_wait_secs: u64,
    #[serde(default = "default_tls_port")]
    pub tls_port: u16,
    /// Overrides the default `printcert/<version> (<os>; <arch>)`.
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Where the new key and certificate come from. For each of key and cert,
/// exactly one of the inline PEM or the file path must be set.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct MaterialConfig {
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    #[serde(default)]
    pub cert_file: Option<PathBuf>,
    #[serde(default)]
    pub key_pem: Option<String>,
    #[serde(default)]
    pub cert_pem: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

// ── Defaults ──────────────────────────────────────────────────

fn default_request_timeout() -> u64 { 30 }
fn default_settle() -> u64 { 10 }
fn default_reboot_wait() -> u64 { 60 }
fn default_tls_port() -> u16 { 443 }
fn default_log_level() -> String { "info".into() }

/// `printcert/<version> (<os>; <arch>)`
pub fn default_user_agent() -> String {
    format!(
        "printcert/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

// ── Impls ─────────────────────────────────────────────────────

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            password: String::new(),
            use_http: false,
            accept_invalid_certs: false,
            request_timeout_secs: default_request_timeout(),
            settle_secs: default_settle(),
            reboot_wait_secs: default_reboot_wait(),
            tls_port: default_tls_port(),
            user_agent: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// The password never reaches logs.
impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("host", &self.host)
            .field("password", &"[REDACTED]")
            .field("use_http", &self.use_http)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("settle_secs", &self.settle_secs)
            .field("reboot_wait_secs", &self.reboot_wait_secs)
            .field("tls_port", &self.tls_port)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl fmt::Debug for MaterialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterialConfig")
            .field("key_file", &self.key_file)
            .field("cert_file", &self.cert_file)
            .field("key_pem", &self.key_pem.as_ref().map(|_| "[inline]"))
            .field("cert_pem", &self.cert_pem.as_ref().map(|_| "[inline]"))
            .finish()
    }
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ConsoleError::Config("hostname must be specified".into()));
        }
        if self.password.is_empty() {
            return Err(ConsoleError::Config("password must be specified".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn reboot_wait(&self) -> Duration {
        Duration::from_secs(self.reboot_wait_secs)
    }

    pub fn effective_user_agent(&self) -> String {
        match &self.user_agent {
            Some(ua) if !ua.trim().is_empty() => ua.clone(),
            _ => default_user_agent(),
        }
    }
}

impl MaterialConfig {
    /// Resolve the key and certificate PEM bytes from inline values or files.
    pub fn pem_bytes(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let key = read_one("key", self.key_pem.as_deref(), self.key_file.as_deref())?;
        let cert = read_one("cert", self.cert_pem.as_deref(), self.cert_file.as_deref())?;
        Ok((key, cert))
    }
}

fn read_one(what: &str, inline: Option<&str>, file: Option<&Path>) -> Result<Vec<u8>> {
    let inline = inline.filter(|s| !s.is_empty());
    let file = file.filter(|p| !p.as_os_str().is_empty());
    match (inline, file) {
        (Some(_), Some(_)) => Err(ConsoleError::Config(format!(
            "both {what} pem and {what} file specified"
        ))),
        (None, None) => Err(ConsoleError::Config(format!(
            "neither {what} pem nor {what} file specified"
        ))),
        (Some(pem), None) => Ok(pem.as_bytes().to_vec()),
        (None, Some(path)) => std::fs::read(path).map_err(|e| {
            ConsoleError::Config(format!("failed to read {what} file {}: {e}", path.display()))
        }),
    }
}

impl AppConfig {
    /// Defaults, then the optional YAML file, then `PRINTCERT_*` env vars.
    /// Callers may merge further providers (command-line flags) on top.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load configuration from YAML file + env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(path))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        figment
            .extract()
            .map_err(|e| ConsoleError::Config(e.to_string()))
    }
}
