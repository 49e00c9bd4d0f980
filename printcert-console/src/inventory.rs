//! Installed-certificate inventory scraped from the certificate pages.

use crate::session::Session;
use printcert_core::{CertificateId, CertificateRecord, ConsoleError, PROTOCOL, Result};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

// e.g. `<td><a href="view.html?idx=58">View</a></td>`
static VIEW_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a[^>]+href="view\.html\?idx=([^"&]+)"[^>]*>"#).expect("view link pattern")
});

// e.g. `<dt>Serial&#32;Number</dt><dd>06:22:61:1a:32:3a</dd>`
static SERIAL_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<dt>\s*Serial(?:\s|&#32;|&nbsp;)Number\s*</dt>\s*<dd>\s*([A-Za-z0-9:]+)\s*</dd>")
        .expect("serial pattern")
});

/// Identifiers referenced by "view" links, in page order.
pub fn parse_identifiers(html: &str) -> Vec<CertificateId> {
    VIEW_LINK
        .captures_iter(html)
        // wrong arity: skip rather than abort the list
        .filter_map(|caps| caps.get(1))
        .map(|m| CertificateId::new(m.as_str()))
        .collect()
}

pub fn list_identifiers(session: &Session) -> Result<Vec<CertificateId>> {
    let html = session.get_ok(PROTOCOL.paths.cert_list, &[])?;
    let ids = parse_identifiers(&html);
    debug!(count = ids.len(), "Certificate inventory listed");
    Ok(ids)
}

/// Serial number bytes for `id`, read from its view page.
pub fn fetch_serial(session: &Session, id: &CertificateId) -> Result<Vec<u8>> {
    let html = session.get_ok(PROTOCOL.paths.cert_view, &[(PROTOCOL.id_query, id.as_str())])?;
    parse_serial(id, &html)
}

pub fn parse_serial(id: &CertificateId, html: &str) -> Result<Vec<u8>> {
    let raw = SERIAL_ENTRY
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| {
            ConsoleError::ProtocolDrift(format!(
                "serial number for certificate id '{id}' not found on view page"
            ))
        })?;
    decode_serial(id, raw.as_str())
}

/// Decode a colon separated hex serial such as `06:22:af`.
///
/// Every byte must be exactly two hex digits. One stray leading and one
/// stray trailing colon are tolerated.
pub fn decode_serial(id: &CertificateId, raw: &str) -> Result<Vec<u8>> {
    let malformed = || ConsoleError::SerialFormat {
        id: id.to_string(),
        raw: raw.to_string(),
    };

    let body = raw.strip_prefix(':').unwrap_or(raw);
    let body = body.strip_suffix(':').unwrap_or(body);
    if body.is_empty() {
        return Err(malformed());
    }

    body.split(':')
        .map(|group| {
            let mut byte = [0u8; 1];
            hex::decode_to_slice(group, &mut byte).map_err(|_| malformed())?;
            Ok(byte[0])
        })
        .collect()
}

/// Every installed certificate with its serial. An unreadable serial is
/// logged and left empty rather than failing the listing.
pub fn list_records(session: &Session) -> Result<Vec<CertificateRecord>> {
    let ids = list_identifiers(session)?;
    let mut records = Vec::with_capacity(ids.len());
    for id in ids {
        let mut record = CertificateRecord::new(id);
        match fetch_serial(session, &record.id) {
            Ok(serial) => record.serial = Some(serial),
            Err(e) => warn!(id = %record.id, error = %e, "Could not read certificate serial"),
        }
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> CertificateId {
        CertificateId::new(s)
    }

    #[test]
    fn identifiers_are_listed_in_page_order() {
        let html = r#"
            <table>
              <tr><td>Preset</td><td><a href="view.html?idx=0">View</a></td></tr>
              <tr><td>printer.lan</td><td><a class="l" href="view.html?idx=58">View</a></td>
                  <td><a href="delete.html?idx=58">Delete</a></td></tr>
              <tr><td>other</td><td><a href="view.html?idx=3" title="v">View</a></td></tr>
            </table>"#;
        assert_eq!(parse_identifiers(html), vec![id("0"), id("58"), id("3")]);
    }

    #[test]
    fn empty_list_page_yields_no_identifiers() {
        assert!(parse_identifiers("<table></table>").is_empty());
    }

    #[test]
    fn serial_is_parsed_from_view_page() {
        let html = "<dl><dt>Issuer</dt><dd>x</dd><dt>Serial&#32;Number</dt>\
                    <dd>06:22:61:1a:32:3a:f8:ea</dd><dt>Subject</dt></dl>";
        assert_eq!(
            parse_serial(&id("4"), html).unwrap(),
            vec![0x06, 0x22, 0x61, 0x1a, 0x32, 0x3a, 0xf8, 0xea]
        );
    }

    #[test]
    fn missing_serial_is_protocol_drift() {
        let err = parse_serial(&id("4"), "<dl><dt>Issuer</dt></dl>").unwrap_err();
        assert!(matches!(err, ConsoleError::ProtocolDrift(_)));
        assert!(err.to_string().contains("'4'"));
    }

    #[test]
    fn decode_matches_plain_hex_decode() {
        let cases = ["06:22:61:1a", "AB:cd:EF", "00", "ff:00:ff:00:10"];
        for raw in cases {
            let direct = hex::decode(raw.replace(':', "")).unwrap();
            assert_eq!(decode_serial(&id("1"), raw).unwrap(), direct, "{raw}");
        }
    }

    #[test]
    fn decode_tolerates_one_stray_edge_separator() {
        assert_eq!(decode_serial(&id("1"), ":0a:0b").unwrap(), vec![0x0a, 0x0b]);
        assert_eq!(decode_serial(&id("1"), "0a:0b:").unwrap(), vec![0x0a, 0x0b]);
        assert_eq!(decode_serial(&id("1"), ":0a:0b:").unwrap(), vec![0x0a, 0x0b]);
    }

    #[test]
    fn decode_rejects_malformed_groupings() {
        let bad = ["0a:b:0c", "0a0b", "0a::0b", "0a:0g", "0a:0b0", "::0a", "0a:b", ":", ""];
        for raw in bad {
            match decode_serial(&id("12"), raw) {
                Err(ConsoleError::SerialFormat { id, raw: got }) => {
                    assert_eq!(id, "12");
                    assert_eq!(got, raw);
                }
                other => panic!("expected SerialFormat for {raw:?}, got {other:?}"),
            }
        }
    }
}
