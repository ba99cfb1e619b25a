//! Client TLS configuration.
//!
//! Peers use self-signed certificates; identity is the SHA-256 fingerprint
//! of the leaf, checked against the expected device id after the handshake.
//! The chain verifier therefore accepts any presented certificate while the
//! handshake signatures are still verified.

use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use farview_shared::constants::BEP_ALPN;
use farview_shared::DeviceId;

use crate::error::{NetError, Result};

/// The local certificate, key and derived device id.
pub struct TlsIdentity {
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
    local_id: DeviceId,
}

impl TlsIdentity {
    /// Load the certificate and private key PEM files. RSA and ECDSA keys
    /// are both accepted.
    pub fn load(cert_path: &Path, key_path: &Path) -> Result<Self> {
        let cert_pem = std::fs::read(cert_path)?;
        let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut &cert_pem[..])
            .collect::<std::result::Result<_, _>>()?;
        let leaf = certs.first().ok_or(NetError::NoCertificate)?;
        let local_id = DeviceId::from_der(leaf);

        let key_pem = std::fs::read(key_path)?;
        let key = rustls_pemfile::private_key(&mut &key_pem[..])?.ok_or(NetError::NoPrivateKey)?;

        tracing::info!(device = %local_id, "loaded local certificate");
        Ok(TlsIdentity {
            certs,
            key,
            local_id,
        })
    }

    pub fn local_id(&self) -> DeviceId {
        self.local_id
    }

    /// Build the client config: our cert for client auth, fingerprint-only
    /// trust for the server side, BEP ALPN.
    pub fn client_config(&self) -> Result<Arc<ClientConfig>> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut config = ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
            .with_client_auth_cert(self.certs.clone(), self.key.clone_key())?;
        config.alpn_protocols = vec![BEP_ALPN.to_vec()];
        Ok(Arc::new(config))
    }
}

/// The peer's device id, recomputed from its TLS leaf certificate.
pub fn peer_device_id(stream: &TlsStream<TcpStream>) -> Result<DeviceId> {
    let (_, conn) = stream.get_ref();
    let leaf = conn
        .peer_certificates()
        .and_then(|certs| certs.first())
        .ok_or(NetError::NoCertificate)?;
    Ok(DeviceId::from_der(leaf))
}

/// Accepts any presented chain; handshake signatures are still verified.
/// Trust comes from the post-handshake fingerprint pin.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
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
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
