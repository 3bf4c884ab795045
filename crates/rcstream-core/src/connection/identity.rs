//! Package identity sent with every stream request.
//!
//! The realtime endpoint enforces API key restrictions by package name and
//! signing certificate fingerprint. The fingerprint is computed on demand
//! from the certificate file, never cached across attempts.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const BUF_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("no such package: {0}")]
    PackageNotFound(String),
    #[error("read certificate {path}: {source}")]
    Certificate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source of the package name and certificate fingerprint.
pub trait PackageIdentity: Send + Sync {
    fn package_name(&self) -> &str;

    /// Raw fingerprint bytes. `Ok(None)` when the package has no certificate
    /// to report.
    fn certificate_hash(&self) -> Result<Option<Vec<u8>>, IdentityError>;
}

/// Identity taken from configuration: a fixed package name and an optional
/// DER/PEM certificate file whose SHA-256 digest is the fingerprint.
#[derive(Debug, Clone)]
pub struct StaticPackageIdentity {
    package_name: String,
    certificate_path: Option<PathBuf>,
}

impl StaticPackageIdentity {
    pub fn new(package_name: impl Into<String>, certificate_path: Option<PathBuf>) -> Self {
        Self {
            package_name: package_name.into(),
            certificate_path,
        }
    }
}

impl PackageIdentity for StaticPackageIdentity {
    fn package_name(&self) -> &str {
        &self.package_name
    }

    fn certificate_hash(&self) -> Result<Option<Vec<u8>>, IdentityError> {
        let Some(path) = &self.certificate_path else {
            return Ok(None);
        };
        if self.package_name.is_empty() {
            return Err(IdentityError::PackageNotFound(self.package_name.clone()));
        }
        fingerprint_path(path).map(Some)
    }
}

/// SHA-256 digest of a certificate file.
/// Reads in chunks to keep memory use bounded.
pub fn fingerprint_path(path: &Path) -> Result<Vec<u8>, IdentityError> {
    let io_err = |source| IdentityError::Certificate {
        path: path.to_path_buf(),
        source,
    };
    let mut f = File::open(path).map_err(io_err)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; BUF_SIZE];
    loop {
        let n = f.read(&mut buf).map_err(io_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fingerprint_of_known_content() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        let digest = fingerprint_path(f.path()).unwrap();
        assert_eq!(
            hex::encode_upper(digest),
            "5891B5B522D5DF086D0FF0B110FBD9D21BB4FC7163AF34D08286A2E846F6BE03"
        );
    }

    #[test]
    fn no_certificate_configured_is_none() {
        let id = StaticPackageIdentity::new("com.example.app", None);
        assert_eq!(id.package_name(), "com.example.app");
        assert!(id.certificate_hash().unwrap().is_none());
    }

    #[test]
    fn missing_certificate_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let id = StaticPackageIdentity::new("com.example.app", Some(dir.path().join("nope.der")));
        assert!(matches!(
            id.certificate_hash(),
            Err(IdentityError::Certificate { .. })
        ));
    }
}
