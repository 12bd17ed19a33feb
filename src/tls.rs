//! Insecure TLS trust policy for operator-trusted webhook targets.
//!
//! Nothing here validates a certificate chain or a hostname. It is installed
//! only when [`HttpClientOptions::insecure_tls`](crate::HttpClientOptions) is
//! set.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{self, CryptoProvider, WebPkiSupportedAlgorithms};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};

/// Certificate verifier that trusts every server.
///
/// Any chain, any issuer, any expiry and any server name are accepted. The
/// handshake signature is still checked against the presented certificate so
/// the session keys belong to whoever sent it.
#[derive(Debug)]
pub struct InsecureTrustPolicy {
    algorithms: WebPkiSupportedAlgorithms,
}

impl InsecureTrustPolicy {
    pub fn new(provider: &CryptoProvider) -> Self {
        Self {
            algorithms: provider.signature_verification_algorithms,
        }
    }
}

impl ServerCertVerifier for InsecureTrustPolicy {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        crypto::verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

/// Builds a client TLS context on the ring provider that trusts every server.
///
/// Returns `None` after logging a warning if the provider cannot supply a
/// usable configuration. Callers then keep the default verifying TLS stack.
pub fn insecure_tls_context() -> Option<ClientConfig> {
    insecure_tls_context_with(crypto::ring::default_provider())
}

pub(crate) fn insecure_tls_context_with(provider: CryptoProvider) -> Option<ClientConfig> {
    let policy = Arc::new(InsecureTrustPolicy::new(&provider));
    let builder = ClientConfig::builder_with_provider(Arc::new(provider))
        .with_safe_default_protocol_versions();
    match builder {
        Ok(builder) => Some(
            builder
                .dangerous()
                .with_custom_certificate_verifier(policy)
                .with_no_client_auth(),
        ),
        Err(err) => {
            tracing::warn!(
                error = %err,
                "error building TLS context, using default TLS verification"
            );
            None
        }
    }
}
