//! Raw TLS handshake used to learn which certificate the device serves.
//!
//! Trust is intentionally not evaluated: the device usually presents a
//! self-signed or not-yet-trusted certificate and only its serial matters.
//! Handshake signatures are still checked against the presented key.

use crate::session::Session;
use printcert_core::{ConsoleError, Result};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, SignatureScheme};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Accepts whatever chain the peer presents.
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

fn handshake_error(host: &str, port: u16, e: impl std::fmt::Display) -> ConsoleError {
    ConsoleError::Transport(format!("tls handshake with {host}:{port} failed: {e}"))
}

/// Connect to `host:port`, complete a handshake and return the DER of the
/// leaf certificate the peer presented.
pub fn peer_leaf_certificate(host: &str, port: u16, timeout: Duration) -> Result<Vec<u8>> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| handshake_error(host, port, e))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
        .with_no_client_auth();

    // url hosts keep IPv6 brackets; neither socket nor SNI want them
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    let server_name =
        ServerName::try_from(bare.to_string()).map_err(|e| handshake_error(host, port, e))?;
    let mut conn = ClientConnection::new(Arc::new(config), server_name)
        .map_err(|e| handshake_error(host, port, e))?;

    let addr = (bare, port)
        .to_socket_addrs()
        .map_err(|e| handshake_error(host, port, e))?
        .next()
        .ok_or_else(|| handshake_error(host, port, "no address resolved"))?;
    let mut sock = TcpStream::connect_timeout(&addr, timeout).map_err(|e| handshake_error(host, port, e))?;
    sock.set_read_timeout(Some(timeout))?;
    sock.set_write_timeout(Some(timeout))?;

    while conn.is_handshaking() {
        conn.complete_io(&mut sock)
            .map_err(|e| handshake_error(host, port, e))?;
    }

    let leaf = conn
        .peer_certificates()
        .and_then(|certs| certs.first())
        .ok_or_else(|| handshake_error(host, port, "peer presented no certificate"))?;
    debug!(host, port, bytes = leaf.len(), "Peer certificate received");
    Ok(leaf.as_ref().to_vec())
}

/// Serial of the certificate the device is serving right now.
pub fn current_leaf_serial(session: &Session) -> Result<Vec<u8>> {
    let der = peer_leaf_certificate(session.host(), session.tls_port(), session.timeout())?;
    crate::bundle::certificate_serial(&der)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
    use std::net::TcpListener;

    #[test]
    fn supported_schemes_come_from_the_provider() {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let verifier = AcceptAnyCertificate(provider);
        let schemes = verifier.supported_verify_schemes();
        assert!(schemes.contains(&SignatureScheme::RSA_PKCS1_SHA256));
        assert!(schemes.contains(&SignatureScheme::ECDSA_NISTP256_SHA256));
    }

    #[test]
    fn refused_connection_is_a_transport_error() {
        // bind then drop to get a port nothing listens on
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let err = peer_leaf_certificate("127.0.0.1", port, Duration::from_secs(2)).unwrap_err();
        assert_eq!(err.kind(), "transport");
        assert!(err.to_string().contains("127.0.0.1"));
    }

    #[test]
    fn serves_leaf_of_a_local_tls_listener() {
        let cert = rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_string()]).unwrap();
        let cert_der = CertificateDer::from(cert.serialize_der().unwrap());
        let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.serialize_private_key_der()));
        let server_config = rustls::ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der.clone()], key_der)
        .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut conn = rustls::ServerConnection::new(Arc::new(server_config)).unwrap();
            while conn.is_handshaking() {
                if conn.complete_io(&mut sock).is_err() {
                    break;
                }
            }
            // flush remaining records so the client sees the finished handshake
            let _ = conn.complete_io(&mut sock);
        });

        let leaf = peer_leaf_certificate("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        server.join().unwrap();
        assert_eq!(leaf, cert_der.as_ref());
    }
}
