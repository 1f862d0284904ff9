//! TLS termination for the client-facing listener.

use std::path::{Path, PathBuf};

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("{what} file not found: {path}")]
    MissingFile { what: &'static str, path: PathBuf },

    #[error("failed to load certificate/key pair: {0}")]
    Load(#[from] std::io::Error),
}

/// Load the PEM certificate chain and private key named by `config`.
pub async fn load_tls_config(config: &TlsConfig) -> Result<RustlsConfig, TlsError> {
    let cert_path = Path::new(&config.cert_path);
    let key_path = Path::new(&config.key_path);

    ensure_exists("Certificate", cert_path)?;
    ensure_exists("Private key", key_path)?;

    let rustls = RustlsConfig::from_pem_file(cert_path, key_path).await?;
    tracing::info!(cert = %cert_path.display(), "TLS certificate loaded");
    Ok(rustls)
}

fn ensure_exists(what: &'static str, path: &Path) -> Result<(), TlsError> {
    if path.exists() {
        Ok(())
    } else {
        Err(TlsError::MissingFile {
            what,
            path: path.to_path_buf(),
        })
    }
}
