//! TLS configuration and certificate loading.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::Config;
use crate::engine::EngineError;

/// Load TLS configuration from the certificate and key files named in `config`.
pub async fn load_tls_config(config: &Config) -> Result<RustlsConfig, EngineError> {
    let cert_path = Path::new(&config.tls_certfile);
    let key_path = Path::new(&config.tls_keyfile);

    check_pem(cert_path, PemKind::Certificate)?;
    check_pem(key_path, PemKind::PrivateKey)?;

    let tls = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|source| EngineError::Tls {
            path: cert_path.to_path_buf(),
            source,
        })?;

    tracing::info!(cert = %cert_path.display(), "TLS configuration loaded");
    Ok(tls)
}

#[derive(Clone, Copy)]
enum PemKind {
    Certificate,
    PrivateKey,
}

/// Fail early, with the offending path, when a file is missing or holds no PEM items.
fn check_pem(path: &Path, kind: PemKind) -> Result<(), EngineError> {
    let tls_err = |source| EngineError::Tls {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = BufReader::new(File::open(path).map_err(tls_err)?);
    let found = match kind {
        PemKind::Certificate => rustls_pemfile::certs(&mut reader)
            .next()
            .transpose()
            .map_err(tls_err)?
            .is_some(),
        PemKind::PrivateKey => rustls_pemfile::private_key(&mut reader)
            .map_err(tls_err)?
            .is_some(),
    };

    if found {
        Ok(())
    } else {
        let what = match kind {
            PemKind::Certificate => "no certificate found",
            PemKind::PrivateKey => "no private key found",
        };
        Err(tls_err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            what,
        )))
    }
}
