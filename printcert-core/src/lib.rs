pub mod cert;
pub mod config;
pub mod error;
pub mod protocol;

pub use cert::{ActiveCertificate, CertificateId, CertificateRecord};
pub use config::AppConfig;
pub use error::{ConsoleError, Result};
pub use protocol::PROTOCOL;
