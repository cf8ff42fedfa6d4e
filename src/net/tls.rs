//! TLS context creation from a PEM certificate store.
//!
//! # Responsibilities
//! - Resolve the certificate store from a filesystem path or a named
//!   resource looked up in the resource roots
//! - Check the store holds a certificate chain and exactly one private key
//! - Produce the rustls acceptor configuration when a listener binds
//!
//! # Design Decisions
//! - The store is a single PEM bundle (chain followed by key), so one file
//!   plays the role a keystore plays elsewhere
//! - Passwords are carried for the record; encrypted keys are rejected

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls_pemfile::Item;

use crate::error::{Result, RunnerError};

/// Prefix marking a certificate source as a named resource.
pub const RESOURCE_PREFIX: &str = "resource:";

/// Where the certificate store comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertSource {
    /// A path on disk, used as-is.
    Path(PathBuf),
    /// A name looked up in each resource root in order.
    Resource(String),
}

impl FromStr for CertSource {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RunnerError::CertificateNotFound(
                "no certificate store configured".into(),
            ));
        }
        match s.strip_prefix(RESOURCE_PREFIX) {
            Some(name) if name.trim_start_matches('/').is_empty() => Err(
                RunnerError::CertificateNotFound(format!("empty resource name in '{}'", s)),
            ),
            Some(name) => Ok(CertSource::Resource(name.trim_start_matches('/').to_string())),
            None => Ok(CertSource::Path(PathBuf::from(s))),
        }
    }
}

impl fmt::Display for CertSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertSource::Path(path) => write!(f, "{}", path.display()),
            CertSource::Resource(name) => write!(f, "{}{}", RESOURCE_PREFIX, name),
        }
    }
}

impl CertSource {
    /// Locate the store on disk.
    pub fn resolve(&self, resource_roots: &[PathBuf]) -> Option<PathBuf> {
        match self {
            CertSource::Path(path) => path.is_file().then(|| path.clone()),
            CertSource::Resource(name) => resource_roots
                .iter()
                .map(|root| root.join(name))
                .find(|candidate| candidate.is_file()),
        }
    }
}

/// A validated certificate store ready to back TLS listeners.
#[derive(Clone)]
pub struct TlsContext {
    path: PathBuf,
    pem: Arc<Vec<u8>>,
    chain_len: usize,
    store_password: Option<String>,
    key_password: Option<String>,
}

impl fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsContext")
            .field("path", &self.path)
            .field("chain_len", &self.chain_len)
            .field("store_password", &self.store_password.as_ref().map(|_| "***"))
            .field("key_password", &self.key_password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl TlsContext {
    /// Path the store was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of certificates in the chain.
    pub fn chain_len(&self) -> usize {
        self.chain_len
    }

    pub fn has_store_password(&self) -> bool {
        self.store_password.is_some()
    }

    /// Build the acceptor configuration.
    pub async fn rustls_config(&self) -> Result<RustlsConfig> {
        RustlsConfig::from_pem(self.pem.to_vec(), self.pem.to_vec())
            .await
            .map_err(|e| self.invalid(e.to_string()))
    }

    fn invalid(&self, reason: impl Into<String>) -> RunnerError {
        RunnerError::InvalidCertificate {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

/// Resolve and validate a certificate store.
///
/// `cert_source` is either a path or `resource:<name>`. Fails with
/// `CertificateNotFound` when nothing resolves and `InvalidCertificate`
/// when the store cannot back a TLS listener.
pub fn new_tls_context(
    cert_source: &str,
    resource_roots: &[PathBuf],
    store_password: Option<&str>,
    key_password: Option<&str>,
) -> Result<TlsContext> {
    let source: CertSource = cert_source.parse()?;
    let path = source
        .resolve(resource_roots)
        .ok_or_else(|| RunnerError::CertificateNotFound(source.to_string()))?;

    let pem = fs::read(&path)?;
    let invalid = |reason: &str| RunnerError::InvalidCertificate {
        path: path.clone(),
        reason: reason.to_string(),
    };

    let mut certs = 0;
    let mut keys = 0;
    for item in rustls_pemfile::read_all(&mut pem.as_slice()) {
        match item.map_err(|e| invalid(&e.to_string()))? {
            Item::X509Certificate(_) => certs += 1,
            Item::Pkcs1Key(_) | Item::Pkcs8Key(_) | Item::Sec1Key(_) => keys += 1,
            _ => {}
        }
    }

    if certs == 0 {
        return Err(invalid("no certificate found"));
    }
    if keys == 0 && String::from_utf8_lossy(&pem).contains("ENCRYPTED PRIVATE KEY") {
        return Err(invalid("encrypted private keys are not supported"));
    }
    if keys != 1 {
        return Err(invalid(&format!("expected exactly one private key, found {}", keys)));
    }

    if key_password.is_some() {
        tracing::warn!(
            path = %path.display(),
            "Key password ignored: the private key is stored unencrypted"
        );
    }

    tracing::debug!(path = %path.display(), chain_len = certs, "Certificate store loaded");

    Ok(TlsContext {
        path,
        pem: Arc::new(pem),
        chain_len: certs,
        store_password: store_password.map(str::to_string),
        key_password: key_password.map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn self_signed_bundle() -> String {
        let key = rcgen::KeyPair::generate().unwrap();
        let params = rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        let cert = params.self_signed(&key).unwrap();
        format!("{}{}", cert.pem(), key.serialize_pem())
    }

    #[test]
    fn parses_sources() {
        assert_eq!(
            "resource:keystore.pem".parse::<CertSource>().unwrap(),
            CertSource::Resource("keystore.pem".into())
        );
        assert_eq!(
            "/etc/tls/store.pem".parse::<CertSource>().unwrap(),
            CertSource::Path("/etc/tls/store.pem".into())
        );
        assert!(matches!(
            "".parse::<CertSource>(),
            Err(RunnerError::CertificateNotFound(_))
        ));
        assert!("resource:".parse::<CertSource>().is_err());
    }

    #[test]
    fn missing_store_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = new_tls_context(
            "resource:missing.pem",
            &[dir.path().to_path_buf()],
            None,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, RunnerError::CertificateNotFound(_)));
        assert!(err.is_tls_unavailable());
    }

    #[test]
    fn resource_found_in_later_root() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::write(second.path().join("keystore.pem"), self_signed_bundle()).unwrap();

        let roots = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let context = new_tls_context("resource:keystore.pem", &roots, Some("changeit"), None)
            .unwrap();
        assert_eq!(context.path(), second.path().join("keystore.pem"));
        assert_eq!(context.chain_len(), 1);
        assert!(context.has_store_password());
    }

    #[test]
    fn store_without_key_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let key = rcgen::KeyPair::generate().unwrap();
        let params = rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        let cert = params.self_signed(&key).unwrap();
        let path = dir.path().join("cert-only.pem");
        fs::write(&path, cert.pem()).unwrap();

        let err = new_tls_context(path.to_str().unwrap(), &[], None, None).unwrap_err();
        assert!(matches!(err, RunnerError::InvalidCertificate { .. }));
    }

    #[test]
    fn garbage_store_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.pem");
        fs::write(&path, "not a pem file").unwrap();

        let err = new_tls_context(path.to_str().unwrap(), &[], None, None).unwrap_err();
        assert!(err.is_tls_unavailable());
    }

    #[tokio::test]
    async fn valid_store_builds_rustls_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.pem");
        fs::write(&path, self_signed_bundle()).unwrap();

        let context = new_tls_context(path.to_str().unwrap(), &[], None, None).unwrap();
        assert!(context.rustls_config().await.is_ok());
    }
}
