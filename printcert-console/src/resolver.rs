//! Which installed certificate is the device serving?
//!
//! Resolution runs an ordered list of strategies and stops at the first
//! that succeeds. The settings page is a single request but misses
//! certificates without a common name; the handshake fallback compares the
//! served serial against every installed certificate.

use crate::handshake::current_leaf_serial;
use crate::inventory::{fetch_serial, list_identifiers};
use crate::session::Session;
use printcert_core::cert::serials_match;
use printcert_core::{ActiveCertificate, CertificateId, ConsoleError, PROTOCOL, Result};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// One way of finding the active certificate.
#[derive(Clone, Copy)]
pub struct Strategy {
    pub name: &'static str,
    pub resolve: fn(&Session) -> Result<ActiveCertificate>,
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

pub const HTTP_SETTINGS: Strategy = Strategy {
    name: "http_settings",
    resolve: from_http_settings,
};

pub const TLS_HANDSHAKE: Strategy = Strategy {
    name: "tls_handshake",
    resolve: from_tls_handshake,
};

pub const DEFAULT_STRATEGIES: &[Strategy] = &[HTTP_SETTINGS, TLS_HANDSHAKE];

/// Resolve with the default strategies.
pub fn resolve_active(session: &Session) -> Result<ActiveCertificate> {
    resolve_with(session, DEFAULT_STRATEGIES)
}

/// First success wins; if all fail the error lists each failure.
pub fn resolve_with(session: &Session, strategies: &[Strategy]) -> Result<ActiveCertificate> {
    let mut failures = Vec::with_capacity(strategies.len());
    for strategy in strategies {
        match (strategy.resolve)(session) {
            Ok(active) => {
                info!(id = %active.id, via = strategy.name, "Active certificate resolved");
                return Ok(active);
            }
            Err(e) => {
                debug!(via = strategy.name, error = %e, "Resolution strategy failed");
                failures.push(format!("{}: {e}", strategy.name));
            }
        }
    }
    Err(ConsoleError::Resolution(failures))
}

fn from_http_settings(session: &Session) -> Result<ActiveCertificate> {
    let html = session.get_ok(PROTOCOL.paths.http_settings, &[])?;
    let (id, name) = parse_selected_option(&html).ok_or_else(|| {
        ConsoleError::ProtocolDrift("no selected certificate on the HTTP server settings page".into())
    })?;
    Ok(ActiveCertificate {
        id,
        display_name: Some(name),
        resolved_by: HTTP_SETTINGS.name,
    })
}

fn from_tls_handshake(session: &Session) -> Result<ActiveCertificate> {
    if !session.is_secure() {
        return Err(ConsoleError::Config(
            "https is not in use, cannot read the served certificate".into(),
        ));
    }
    let served = current_leaf_serial(session)?;
    let ids = list_identifiers(session)?;
    let id = find_by_serial(&ids, &served, |id| fetch_serial(session, id)).ok_or_else(|| {
        ConsoleError::ProtocolDrift(format!(
            "served certificate serial {} matches no installed certificate",
            hex::encode(&served)
        ))
    })?;
    Ok(ActiveCertificate {
        id,
        display_name: None,
        resolved_by: TLS_HANDSHAKE.name,
    })
}

/// First id whose serial matches `served`. Ids whose serial cannot be read
/// are skipped. Duplicate uploads of one certificate are indistinguishable,
/// so the earliest listed wins.
pub fn find_by_serial<F>(ids: &[CertificateId], served: &[u8], mut fetch: F) -> Option<CertificateId>
where
    F: FnMut(&CertificateId) -> Result<Vec<u8>>,
{
    ids.iter()
        .find(|id| match fetch(id) {
            Ok(serial) => serials_match(&serial, served),
            Err(e) => {
                warn!(id = %id, error = %e, "Skipping certificate with unreadable serial");
                false
            }
        })
        .cloned()
}

// <select name="B903" id="B903"> ... </select>
static CERT_SELECT: LazyLock<Regex> = LazyLock::new(|| {
    let name = regex::escape(PROTOCOL.activate.select_field);
    Regex::new(&format!(
        r#"(?is)<select\b[^>]*?\s(?:name|id)\s*=\s*["']{name}["'][^>]*>(.*?)</select>"#
    ))
    .expect("certificate select pattern")
});

// <option value="3" selected="selected">printer.lan</option>
static SELECTED_OPTION: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let selected = r#"\sselected\b(?:\s*=\s*["']selected["'])?"#;
    let value = r#"\svalue\s*=\s*["']([^"']+)["']"#;
    [
        format!(r#"(?is)<option\b[^>]*?{value}[^>]*?{selected}[^>]*>([^<]*)</option>"#),
        format!(r#"(?is)<option\b[^>]*?{selected}[^>]*?{value}[^>]*>([^<]*)</option>"#),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("selected option pattern"))
    .collect()
});

/// Selected `(id, name)` in the certificate drop-down.
///
/// Scoped to the certificate `<select>` when the page has one, so other
/// drop-downs on the settings page cannot be mistaken for it. The name is
/// entity-decoded and trimmed.
pub fn parse_selected_option(html: &str) -> Option<(CertificateId, String)> {
    let scope = CERT_SELECT
        .captures(html)
        .and_then(|c| c.get(1))
        .map_or(html, |m| m.as_str());

    SELECTED_OPTION
        .iter()
        .filter_map(|re| re.captures(scope))
        .min_by_key(|caps| caps.get(0).map_or(usize::MAX, |m| m.start()))
        .and_then(|caps| {
            let id = caps.get(1)?.as_str().trim();
            if id.is_empty() {
                return None;
            }
            let name = caps.get(2).map_or("", |m| m.as_str());
            let name = html_escape::decode_html_entities(name).trim().to_string();
            Some((CertificateId::new(id), name))
        })
}
