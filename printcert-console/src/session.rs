//! Cookie-bearing HTTP session against the printer's web console.
//!
//! Redirects are never followed: the console answers form POSTs with a 30x
//! whose target page does not carry what the next protocol step needs.

use printcert_core::config::{DeviceConfig, default_user_agent};
use printcert_core::{ConsoleError, PROTOCOL, Result};
use regex::Regex;
use reqwest::blocking::{Client, multipart::Form};
use reqwest::redirect::Policy;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Everything needed to open a [`Session`] except the password.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Hostname or IP, optionally with `:port` for the web console.
    pub host: String,
    pub use_http: bool,
    pub user_agent: String,
    pub timeout: Duration,
    /// Wait after upload/delete before re-reading inventory.
    pub settle: Duration,
    /// Port used for the raw TLS handshake when reconciling serials.
    pub tls_port: u16,
    pub accept_invalid_certs: bool,
}

impl ConnectOptions {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            use_http: false,
            user_agent: default_user_agent(),
            timeout: Duration::from_secs(30),
            settle: Duration::from_secs(10),
            tls_port: 443,
            accept_invalid_certs: false,
        }
    }

    pub fn from_device(cfg: &DeviceConfig) -> Self {
        Self {
            host: cfg.host.trim().to_string(),
            use_http: cfg.use_http,
            user_agent: cfg.effective_user_agent(),
            timeout: cfg.request_timeout(),
            settle: cfg.settle(),
            tls_port: cfg.tls_port,
            accept_invalid_certs: cfg.accept_invalid_certs,
        }
    }

    fn base_url(&self) -> Result<Url> {
        let scheme = if self.use_http { "http" } else { "https" };
        Url::parse(&format!("{scheme}://{}/", self.host))
            .map_err(|e| ConsoleError::Config(format!("invalid host '{}': {e}", self.host)))
    }
}

/// A console response: status plus the full body.
#[derive(Debug)]
pub struct Page {
    pub status: u16,
    pub body: String,
}

impl Page {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }
}

/// An authenticated console session.
///
/// Created by a successful login; a reboot invalidates it and a fresh one
/// must be connected. Not meant to be shared between concurrent callers:
/// multi-step submissions depend on page-bound tokens.
pub struct Session {
    client: Client,
    base_url: Url,
    secure: bool,
    settle: Duration,
    timeout: Duration,
    tls_port: u16,
}

impl Session {
    /// Build the client and log in.
    pub fn connect(opts: &ConnectOptions, password: &str) -> Result<Self> {
        let base_url = opts.base_url()?;
        let client = Client::builder()
            .redirect(Policy::none())
            .cookie_store(true)
            .user_agent(opts.user_agent.clone())
            .timeout(opts.timeout)
            .danger_accept_invalid_certs(opts.accept_invalid_certs)
            .build()
            .map_err(ConsoleError::transport)?;

        let session = Self {
            client,
            base_url,
            secure: !opts.use_http,
            settle: opts.settle,
            timeout: opts.timeout,
            tls_port: opts.tls_port,
        };
        session.login(password)?;
        info!(url = %session.base_url, "Logged in to printer console");
        Ok(session)
    }

    fn login(&self, password: &str) -> Result<()> {
        let path = PROTOCOL.paths.login;
        let login_page = self.get_ok(path, &[])?;
        let field = password_field_name(&login_page)?;

        let resp = self
            .client
            .post(self.url(path)?)
            .form(&[
                (field.as_str(), password),
                (PROTOCOL.login.return_url_field, path),
            ])
            .send()
            .map_err(ConsoleError::transport)?;

        let authed = resp
            .cookies()
            .any(|c| c.name() == PROTOCOL.login.auth_cookie);
        debug!(path, status = resp.status().as_u16(), authed, "Login form submitted");
        if !authed {
            return Err(ConsoleError::Auth);
        }
        Ok(())
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Host without scheme or port, for the TLS handshake.
    pub fn host(&self) -> &str {
        self.base_url.host_str().unwrap_or_default()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn tls_port(&self) -> u16 {
        self.tls_port
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn settle(&self) -> Duration {
        self.settle
    }

    /// Block for the settle period so the device can finish processing.
    pub fn wait_settle(&self) {
        if !self.settle.is_zero() {
            debug!(secs = self.settle.as_secs_f64(), "Waiting for device to settle");
            std::thread::sleep(self.settle);
        }
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ConsoleError::Config(format!("invalid console path '{path}': {e}")))
    }

    pub fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Page> {
        let resp = self
            .client
            .get(self.url(path)?)
            .query(query)
            .send()
            .map_err(ConsoleError::transport)?;
        read_page(path, resp)
    }

    /// GET a page that must answer 200; returns its body.
    pub fn get_ok(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let page = self.get(path, query)?;
        if !page.is_ok() {
            return Err(ConsoleError::Status {
                path: path.to_string(),
                status: page.status,
            });
        }
        Ok(page.body)
    }

    pub fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<Page> {
        let resp = self
            .client
            .post(self.url(path)?)
            .form(fields)
            .send()
            .map_err(ConsoleError::transport)?;
        read_page(path, resp)
    }

    pub fn post_multipart(&self, path: &str, form: Form) -> Result<Page> {
        let resp = self
            .client
            .post(self.url(path)?)
            .multipart(form)
            .send()
            .map_err(ConsoleError::transport)?;
        read_page(path, resp)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url.as_str())
            .field("secure", &self.secure)
            .finish()
    }
}

fn read_page(path: &str, resp: reqwest::blocking::Response) -> Result<Page> {
    let status = resp.status().as_u16();
    let body = resp.text().map_err(ConsoleError::transport)?;
    debug!(path, status, bytes = body.len(), "Console response");
    Ok(Page { status, body })
}

/// Known shapes of the login form's password input, most recent first.
/// The field name is a firmware-generated token, so it is discovered.
static PASSWORD_FIELD_SHAPES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)<input[^>]*?\stype\s*=\s*["']password["'][^>]*?\sname\s*=\s*["']([^"']+)["']"#,
        r#"(?i)<input[^>]*?\sname\s*=\s*["']([^"']+)["'][^>]*?\stype\s*=\s*["']password["']"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("password field pattern"))
    .collect()
});

/// Name attribute of the login form's password input.
pub fn password_field_name(html: &str) -> Result<String> {
    PASSWORD_FIELD_SHAPES
        .iter()
        .find_map(|re| re.captures(html).and_then(|c| c.get(1)))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            ConsoleError::ProtocolDrift("password field not found in login form".into())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_field_type_before_name() {
        let html = r#"<form><input type="password" id="LogBox" name="B7a1" value=""/></form>"#;
        assert_eq!(password_field_name(html).unwrap(), "B7a1");
    }

    #[test]
    fn password_field_name_before_type() {
        let html = r#"<input class="x" name="Baf9" autocomplete="off" type="password">"#;
        assert_eq!(password_field_name(html).unwrap(), "Baf9");
    }

    #[test]
    fn password_field_ignores_other_inputs() {
        let html = r#"<input type="hidden" name="loginurl" value="/general/status.html"/>
            <input type="password" name="B7c2"/>"#;
        assert_eq!(password_field_name(html).unwrap(), "B7c2");
    }

    #[test]
    fn missing_password_field_is_protocol_drift() {
        let err = password_field_name("<form><input type=\"text\" name=\"user\"></form>").unwrap_err();
        assert!(err.is_protocol_drift());
    }

    #[test]
    fn base_url_follows_scheme_flag() {
        let mut opts = ConnectOptions::new("printer.lan");
        assert_eq!(opts.base_url().unwrap().as_str(), "https://printer.lan/");
        opts.use_http = true;
        assert_eq!(opts.base_url().unwrap().as_str(), "http://printer.lan/");
    }

    #[test]
    fn base_url_keeps_explicit_port() {
        let mut opts = ConnectOptions::new("10.0.0.5:8080");
        opts.use_http = true;
        let url = opts.base_url().unwrap();
        assert_eq!(url.host_str(), Some("10.0.0.5"));
        assert_eq!(url.port(), Some(8080));
    }

    #[test]
    fn connect_options_from_device_config() {
        let cfg = DeviceConfig {
            host: " printer.lan ".into(),
            use_http: true,
            settle_secs: 2,
            tls_port: 8443,
            ..DeviceConfig::default()
        };
        let opts = ConnectOptions::from_device(&cfg);
        assert_eq!(opts.host, "printer.lan");
        assert!(opts.use_http);
        assert_eq!(opts.settle, Duration::from_secs(2));
        assert_eq!(opts.tls_port, 8443);
        assert!(opts.user_agent.starts_with("printcert/"));
    }
}
