use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque certificate identifier assigned by the device.
///
/// Unique among the certificates installed at one instant; the device may
/// hand out the same value again after a deletion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateId(String);

impl CertificateId {
    /// Factory preset certificate. Never deletable.
    pub const PRESET: &'static str = "0";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_preset(&self) -> bool {
        self.0 == Self::PRESET
    }
}

impl fmt::Display for CertificateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl FromStr for CertificateId {
    type Err = crate::ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(crate::ConsoleError::InvalidIdentifier(s.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for CertificateId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What is known about one installed certificate.
///
/// `display_name` only comes from the active-certificate dropdown and
/// `serial` only from the per-certificate view page, so either may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub id: CertificateId,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub serial: Option<Vec<u8>>,
}

impl CertificateRecord {
    pub fn new(id: CertificateId) -> Self {
        Self {
            id,
            display_name: None,
            serial: None,
        }
    }

    /// Colon separated upper-case hex, the way the console prints serials.
    pub fn serial_hex(&self) -> Option<String> {
        self.serial.as_deref().map(format_serial)
    }
}

/// The certificate currently terminating TLS on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCertificate {
    pub id: CertificateId,
    /// `None` when the console omits the certificate from its dropdown
    /// (certificates without a common name).
    pub display_name: Option<String>,
    /// Name of the resolution strategy that produced this answer.
    pub resolved_by: &'static str,
}

impl ActiveCertificate {
    pub fn name_or_placeholder(&self) -> &str {
        self.display_name.as_deref().unwrap_or("[no name]")
    }
}

impl fmt::Display for ActiveCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id: {})", self.name_or_placeholder(), self.id)
    }
}

pub fn format_serial(serial: &[u8]) -> String {
    serial
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Compare two serial numbers as unsigned big-endian integers.
///
/// Leading zero bytes are ignored: the console may print the DER sign byte
/// while a parsed certificate reports the bare magnitude.
pub fn serials_match(a: &[u8], b: &[u8]) -> bool {
    fn magnitude(s: &[u8]) -> &[u8] {
        let start = s.iter().position(|&b| b != 0).unwrap_or(s.len());
        &s[start..]
    }
    magnitude(a) == magnitude(b)
}
